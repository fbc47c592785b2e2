// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::{string::String, vec::Vec};

use snafu::prelude::*;
use tracing::{debug, instrument};

use crate::{
    address::LedgerAddress,
    ledger::slot::{decode_length, derived_slot, increment_slot, positional_slot, shift_word_right, StorageSlot},
    parameters::LedgerParameters,
};

/// Errors that can arise reading from ledger storage.
#[derive(Debug, Snafu)]
pub enum StorageError {
    /// The ledger state could not be queried.
    #[snafu(display("Ledger state could not be queried: {reason}"))]
    Unavailable {
        /// The reason the query failed.
        reason: String,
    },
}

/// Errors that can arise decoding a certificate record.
#[derive(Debug, Snafu)]
pub enum DecodeError {
    /// A storage read failed.
    #[snafu(display("Ledger storage is unavailable"))]
    LedgerUnavailable {
        /// The underlying storage error.
        source: StorageError,
    },
    /// The stored record is inconsistent.
    #[snafu(display("Stored certificate record is corrupt: {reason}"))]
    CorruptRecord {
        /// The reason the record was rejected.
        reason: &'static str,
    },
}

/// Read access to contract storage.
pub trait LedgerStorage {
    /// Read the word stored at `slot` of `contract`. Unset slots read as zero.
    fn get_storage_slot(&self, contract: &LedgerAddress, slot: &StorageSlot) -> Result<StorageSlot, StorageError>;
}

impl<T: LedgerStorage + ?Sized> LedgerStorage for &T {
    fn get_storage_slot(&self, contract: &LedgerAddress, slot: &StorageSlot) -> Result<StorageSlot, StorageError> {
        (**self).get_storage_slot(contract, slot)
    }
}

/// An unconfirmed certificate record, as read from the authentication contract.
///
/// If the requested certificate does not exist yet, only `index_word` is populated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnconfirmedRecord {
    index_word: StorageSlot,
    account: Option<StorageSlot>,
    ring_signature: String,
    public_key: String,
    check_cert_id: u64,
}

impl UnconfirmedRecord {
    /// Get the raw word read from the unconfirmed index array.
    pub fn index_word(&self) -> &StorageSlot {
        &self.index_word
    }

    /// Get the account key the record is stored under, if the record exists.
    pub fn account(&self) -> Option<&StorageSlot> {
        self.account.as_ref()
    }

    /// Get the stored ring signature text.
    pub fn ring_signature(&self) -> &str {
        &self.ring_signature
    }

    /// Get the stored public key text.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Get the certificate ID to check next, or zero if the record does not exist.
    pub fn check_cert_id(&self) -> u64 {
        self.check_cert_id
    }

    /// Check whether the requested record was found.
    pub fn is_found(&self) -> bool {
        self.account.is_some()
    }
}

/// Decodes certificate records out of the authentication contract's storage.
pub struct RecordDecoder<S> {
    storage: S,
    params: LedgerParameters,
}

impl<S: LedgerStorage> RecordDecoder<S> {
    /// Create a decoder reading from `storage` with the contract address and layout in `params`.
    pub fn new(storage: S, params: LedgerParameters) -> Self {
        Self { storage, params }
    }

    /// Get the ledger parameters.
    pub fn get_params(&self) -> &LedgerParameters {
        &self.params
    }

    /// Read the unconfirmed certificate record at position `index` of the unconfirmed array.
    ///
    /// The word at that position is a certificate count. If `check_cert_id` is not below it, the record does not exist
    /// yet and only the index word is returned. Otherwise the word keys the account mapping, and the account keys the
    /// certificate record, whose ring signature and public key fields are reassembled from their data slots.
    #[instrument(skip(self))]
    pub fn read_unconfirmed(&self, index: u64, check_cert_id: u64) -> Result<UnconfirmedRecord, DecodeError> {
        let layout = self.params.get_layout();

        let index_word = self.read(&positional_slot(layout.unconfirmed_addresses, None, index))?;
        let count = decode_length(&index_word).context(CorruptRecordSnafu {
            reason: "certificate count does not fit in 64 bits",
        })?;
        if check_cert_id >= count {
            debug!(check_cert_id, count, "Certificate not yet registered");
            return Ok(UnconfirmedRecord {
                index_word,
                account: None,
                ring_signature: String::new(),
                public_key: String::new(),
                check_cert_id: 0,
            });
        }

        let account_word = self.read(&positional_slot(layout.cert_to_address, Some(&index_word), 0))?;
        let account = shift_word_right(&account_word);

        let ring_signature = self.read_text(&positional_slot(layout.certificate_addresses, Some(&account), 1))?;
        let public_key = self.read_text(&positional_slot(layout.certificate_addresses, Some(&account), 2))?;

        Ok(UnconfirmedRecord {
            index_word,
            account: Some(account),
            ring_signature,
            public_key,
            check_cert_id: count,
        })
    }

    fn read(&self, slot: &StorageSlot) -> Result<StorageSlot, DecodeError> {
        self.storage
            .get_storage_slot(self.params.get_authentication_contract(), slot)
            .context(LedgerUnavailableSnafu)
    }

    // The length word holds the length of the hex text the field was written from, so the stored byte count is half
    // of it. Data words start at `keccak256(field)`.
    fn read_text(&self, field: &StorageSlot) -> Result<String, DecodeError> {
        let length = decode_length(&self.read(field)?).context(CorruptRecordSnafu {
            reason: "field length does not fit in 64 bits",
        })?;
        let last = length / 64;
        if last >= self.params.get_max_field_slots() {
            return Err(DecodeError::CorruptRecord {
                reason: "field spans too many storage words",
            });
        }

        let data = derived_slot(field, &[]);
        let mut bytes = Vec::new();
        for j in 0..=last {
            bytes.extend_from_slice(self.read(&increment_slot(&data, j))?.as_bytes());
        }
        bytes.truncate((length / 2) as usize);

        String::from_utf8(bytes).ok().context(CorruptRecordSnafu {
            reason: "field is not valid UTF-8",
        })
    }
}
