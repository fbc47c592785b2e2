// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::{string::String, vec::Vec};
use core::fmt;

use crypto_bigint::{Encoding, U256};

use crate::util::keccak256;

/// A 32-byte storage word, used both as a slot key and as a slot value.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StorageSlot(pub [u8; 32]);

impl StorageSlot {
    /// The all-zero word, which is also what an unset slot reads as.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Encode an integer as a big-endian word.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());

        Self(bytes)
    }

    /// Get the raw word.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode the word as `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(66);
        out.push_str("0x");
        out.push_str(&hex::encode(self.0));
        out
    }
}

impl fmt::Display for StorageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for StorageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageSlot({})", self.to_hex())
    }
}

/// Derive the slot of element `index` of a field stored at base slot `base`.
///
/// Without a key, this addresses element `index` of the dynamic array at `base`: `keccak256(base) + index`.
/// With a key, this addresses member `index` of the mapping entry `key` at `base`: `keccak256(key || base) + index`.
pub fn positional_slot(base: u64, key: Option<&StorageSlot>, index: u64) -> StorageSlot {
    let base = StorageSlot::from_u64(base);
    let mut preimage = Vec::with_capacity(64);
    if let Some(key) = key {
        preimage.extend_from_slice(key.as_bytes());
    }
    preimage.extend_from_slice(base.as_bytes());

    increment_slot(&StorageSlot(keccak256(&preimage)), index)
}

/// Derive the data slot for a slot and salt: `keccak256(base || salt)`.
///
/// With an empty salt this is where the data of a dynamic byte array stored at `base` begins.
pub fn derived_slot(base: &StorageSlot, salt: &[u8]) -> StorageSlot {
    let mut preimage = Vec::with_capacity(32 + salt.len());
    preimage.extend_from_slice(base.as_bytes());
    preimage.extend_from_slice(salt);

    StorageSlot(keccak256(&preimage))
}

/// Advance a slot by `n`, wrapping modulo `2^256`.
pub fn increment_slot(base: &StorageSlot, n: u64) -> StorageSlot {
    let sum = U256::from_be_bytes(base.0).wrapping_add(&U256::from_u64(n));

    StorageSlot(sum.to_be_bytes())
}

/// Interpret a word as a big-endian length or count.
///
/// Returns `None` if the value does not fit in a `u64`.
pub fn decode_length(word: &StorageSlot) -> Option<u64> {
    if word.0[..24].iter().any(|byte| *byte != 0) {
        return None;
    }

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word.0[24..]);
    Some(u64::from_be_bytes(bytes))
}

/// Shift a word right by one byte, dropping its last byte and prepending a zero byte.
///
/// Account words read from the certificate index mapping are stored one byte off from the key the certificate record
/// mapping uses.
pub fn shift_word_right(word: &StorageSlot) -> StorageSlot {
    let mut shifted = [0u8; 32];
    shifted[1..].copy_from_slice(&word.0[..31]);

    StorageSlot(shifted)
}
