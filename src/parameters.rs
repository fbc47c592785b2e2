// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use core::time::Duration;

use snafu::prelude::*;

use crate::address::LedgerAddress;

/// Errors that can arise relating to parameters.
#[derive(Debug, Snafu)]
pub enum ParameterError {
    /// An invalid parameter was provided.
    #[snafu(display("An invalid parameter was provided: {reason}"))]
    InvalidParameter {
        /// The reason for the parameter error.
        reason: &'static str,
    },
}

/// Bounds on the in-memory share history kept by the matching engine.
///
/// The history is keyed by scan token. Once `max_tokens` tokens are held, recording a share for a new token evicts
/// the oldest one. Each token accepts shares from at most `max_senders` committee members, and each message carries
/// at most `max_shares_per_message` entries; together these bound the pairwise matching work. Tokens older than
/// `token_ttl`, if set, are dropped when the history is pruned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryParameters {
    max_tokens: usize,
    max_senders: usize,
    max_shares_per_message: usize,
    token_ttl: Option<Duration>,
}

impl HistoryParameters {
    /// Generate new history parameters.
    ///
    /// At least one token and one share per message must be allowed, at least two senders are needed for a pair to
    /// exist, and a TTL, if given, must be nonzero. If any of these conditions is not met, returns an error.
    pub fn new(
        max_tokens: usize,
        max_senders: usize,
        max_shares_per_message: usize,
        token_ttl: Option<Duration>,
    ) -> Result<Self, ParameterError> {
        if max_tokens == 0 {
            return Err(ParameterError::InvalidParameter {
                reason: "`max_tokens` must be nonzero",
            });
        }
        if max_senders < 2 {
            return Err(ParameterError::InvalidParameter {
                reason: "`max_senders` must allow at least one pair",
            });
        }
        if max_shares_per_message == 0 {
            return Err(ParameterError::InvalidParameter {
                reason: "`max_shares_per_message` must be nonzero",
            });
        }
        if token_ttl == Some(Duration::ZERO) {
            return Err(ParameterError::InvalidParameter {
                reason: "`token_ttl` must be nonzero",
            });
        }

        Ok(Self {
            max_tokens,
            max_senders,
            max_shares_per_message,
            token_ttl,
        })
    }

    /// Get the maximum number of tracked scan tokens.
    pub fn get_max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Get the maximum number of senders recorded per scan token.
    pub fn get_max_senders(&self) -> usize {
        self.max_senders
    }

    /// Get the maximum number of share entries accepted in one message.
    pub fn get_max_shares_per_message(&self) -> usize {
        self.max_shares_per_message
    }

    /// Get the scan token time-to-live, if any.
    pub fn get_token_ttl(&self) -> Option<Duration> {
        self.token_ttl
    }
}

impl Default for HistoryParameters {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            max_senders: 64,
            max_shares_per_message: 64,
            token_ttl: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

/// Base storage slot IDs of the authentication contract's fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StorageLayout {
    /// Array of unconfirmed certificate indexes.
    pub unconfirmed_addresses: u64,
    /// Mapping from certificate index to account.
    pub cert_to_address: u64,
    /// Mapping from account to its certificate record (ring signature at field 1, public key at field 2).
    pub certificate_addresses: u64,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            unconfirmed_addresses: 2,
            cert_to_address: 3,
            certificate_addresses: 4,
        }
    }
}

/// Parameters describing where committee messages go and how contract storage is laid out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedgerParameters {
    verifier_address: LedgerAddress,
    authentication_contract: LedgerAddress,
    layout: StorageLayout,
    max_field_slots: u64,
}

impl LedgerParameters {
    // Default bound on the number of storage words read for one dynamic field
    const DEFAULT_MAX_FIELD_SLOTS: u64 = 1024;

    /// Generate new ledger parameters with the default storage layout.
    ///
    /// Public-share messages are sent to `verifier_address`; confirmations are sent to, and records are read from,
    /// `authentication_contract`. The two must differ.
    pub fn new(
        verifier_address: LedgerAddress,
        authentication_contract: LedgerAddress,
    ) -> Result<Self, ParameterError> {
        Self::new_with_layout(
            verifier_address,
            authentication_contract,
            StorageLayout::default(),
            Self::DEFAULT_MAX_FIELD_SLOTS,
        )
    }

    /// Generate new ledger parameters with a specific storage layout.
    ///
    /// The layout's base slots must be distinct, and at least one storage word must be readable per dynamic field.
    pub fn new_with_layout(
        verifier_address: LedgerAddress,
        authentication_contract: LedgerAddress,
        layout: StorageLayout,
        max_field_slots: u64,
    ) -> Result<Self, ParameterError> {
        if verifier_address == authentication_contract {
            return Err(ParameterError::InvalidParameter {
                reason: "verifier and authentication contract addresses must differ",
            });
        }
        if layout.unconfirmed_addresses == layout.cert_to_address ||
            layout.unconfirmed_addresses == layout.certificate_addresses ||
            layout.cert_to_address == layout.certificate_addresses
        {
            return Err(ParameterError::InvalidParameter {
                reason: "storage layout slots must be distinct",
            });
        }
        if max_field_slots == 0 {
            return Err(ParameterError::InvalidParameter {
                reason: "`max_field_slots` must be nonzero",
            });
        }

        Ok(Self {
            verifier_address,
            authentication_contract,
            layout,
            max_field_slots,
        })
    }

    /// Get the address public-share messages are sent to.
    pub fn get_verifier_address(&self) -> &LedgerAddress {
        &self.verifier_address
    }

    /// Get the authentication contract address.
    pub fn get_authentication_contract(&self) -> &LedgerAddress {
        &self.authentication_contract
    }

    /// Get the contract storage layout.
    pub fn get_layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Get the maximum number of storage words read for one dynamic field.
    pub fn get_max_field_slots(&self) -> u64 {
        self.max_field_slots
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_history_parameters() {
        assert!(HistoryParameters::new(1, 2, 1, None).is_ok());
        assert!(HistoryParameters::new(0, 2, 1, None).is_err());
        assert!(HistoryParameters::new(1, 1, 1, None).is_err());
        assert!(HistoryParameters::new(1, 2, 0, None).is_err());
        assert!(HistoryParameters::new(1, 2, 1, Some(Duration::ZERO)).is_err());

        let defaults = HistoryParameters::default();
        assert_eq!(
            HistoryParameters::new(
                defaults.get_max_tokens(),
                defaults.get_max_senders(),
                defaults.get_max_shares_per_message(),
                defaults.get_token_ttl()
            )
            .unwrap(),
            defaults
        );
    }

    #[test]
    fn test_ledger_parameters() {
        let verifier = LedgerAddress([1u8; 20]);
        let contract = LedgerAddress([2u8; 20]);

        let params = LedgerParameters::new(verifier, contract).unwrap();
        assert_eq!(params.get_layout(), &StorageLayout::default());
        assert_eq!(params.get_verifier_address(), &verifier);

        assert!(LedgerParameters::new(verifier, verifier).is_err());

        let clashing = StorageLayout {
            unconfirmed_addresses: 1,
            cert_to_address: 1,
            certificate_addresses: 2,
        };
        assert!(LedgerParameters::new_with_layout(verifier, contract, clashing, 8).is_err());
        assert!(LedgerParameters::new_with_layout(verifier, contract, StorageLayout::default(), 0).is_err());
    }
}
