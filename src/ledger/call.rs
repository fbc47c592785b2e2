// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::{string::String, vec::Vec};
use core::fmt;

use snafu::prelude::*;

use crate::address::LedgerAddress;

/// The function selector of the authentication contract's account confirmation entry point.
pub const CONFIRM_ACCOUNT_SELECTOR: [u8; 4] = [0xc0, 0x3c, 0x17, 0x96];

/// The length of an encoded confirmation call.
pub const CONFIRM_CALL_LENGTH: usize = 4 + 2 * 32;

/// Errors that can arise submitting a transaction.
#[derive(Debug, Snafu)]
pub enum SubmitError {
    /// The ledger refused the transaction.
    #[snafu(display("Transaction was rejected: {reason}"))]
    Rejected {
        /// The reason given for the rejection.
        reason: String,
    },
    /// The ledger could not be reached.
    #[snafu(display("Ledger is unavailable: {reason}"))]
    Unavailable {
        /// The reason the ledger could not be reached.
        reason: String,
    },
}

/// The identifier a ledger assigns to a submitted transaction.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct SubmissionId(pub [u8; 32]);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubmissionId({self})")
    }
}

/// Submission of signed transactions to the ledger.
///
/// Signing with the committee member's account key and nonce management are left to the implementation.
pub trait LedgerSubmitter {
    /// Submit a transaction carrying `payload` to `recipient`.
    fn submit(&self, recipient: &LedgerAddress, payload: &[u8]) -> Result<SubmissionId, SubmitError>;
}

impl<T: LedgerSubmitter + ?Sized> LedgerSubmitter for &T {
    fn submit(&self, recipient: &LedgerAddress, payload: &[u8]) -> Result<SubmissionId, SubmitError> {
        (**self).submit(recipient, payload)
    }
}

// The contract reads its arguments as words whose hex digits are the decimal digits of the value
fn decimal_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    let mut remaining = value;
    let mut nibble = 0;
    while remaining > 0 {
        let digit = (remaining % 10) as u8;
        let byte = 31 - nibble / 2;
        word[byte] |= if nibble % 2 == 0 { digit } else { digit << 4 };
        remaining /= 10;
        nibble += 1;
    }

    word
}

/// Encode a call to the account confirmation entry point for certificate `cert_id` with status code `status`.
pub fn encode_confirm_call(cert_id: u64, status: u64) -> Vec<u8> {
    let mut call = Vec::with_capacity(CONFIRM_CALL_LENGTH);
    call.extend_from_slice(&CONFIRM_ACCOUNT_SELECTOR);
    call.extend_from_slice(&decimal_word(cert_id));
    call.extend_from_slice(&decimal_word(status));

    call
}
