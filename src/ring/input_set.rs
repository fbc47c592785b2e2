// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::vec::Vec;

use blake3::Hasher;
use k256::{ProjectivePoint, PublicKey};

use crate::{address::compress_point, domains, ring::RingError, util::hash_to_point};

/// The largest anonymity set a signature may be made over.
pub const MAX_RING_SIZE: usize = 1 << 12;

/// An anonymity set of public keys.
///
/// Internally, it also holds each key's hash to the curve, used for key images, and a cryptographic hash of the set
/// for transcripting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnonymitySet {
    keys: Vec<PublicKey>,
    hash_points: Vec<ProjectivePoint>,
    hash: Vec<u8>,
}

impl AnonymitySet {
    /// Generate a new anonymity set from a slice of public keys.
    ///
    /// The set must be nonempty, hold at most [`MAX_RING_SIZE`] keys, and contain no key twice.
    /// If any of these conditions is not met, returns an error.
    pub fn new(keys: &[PublicKey]) -> Result<Self, RingError> {
        if keys.is_empty() {
            return Err(RingError::InvalidParameter {
                reason: "anonymity set must be nonempty",
            });
        }
        if keys.len() > MAX_RING_SIZE {
            return Err(RingError::InvalidParameter {
                reason: "anonymity set is too large",
            });
        }

        let mut compressed = keys.iter().map(compress_point).collect::<Vec<_>>();
        let mut hasher = Hasher::new();
        hasher.update(domains::ANONYMITY_SET.as_bytes());
        for key in &compressed {
            hasher.update(key);
        }

        compressed.sort_unstable();
        if compressed.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(RingError::InvalidParameter {
                reason: "anonymity set contains a duplicate key",
            });
        }

        let hash_points = keys
            .iter()
            .map(|key| hash_to_point(domains::KEY_IMAGE_BASE, key))
            .collect::<Option<Vec<_>>>()
            .ok_or(RingError::InvalidParameter {
                reason: "could not hash a key to the curve",
            })?;

        Ok(Self {
            keys: keys.to_vec(),
            hash_points,
            hash: hasher.finalize().as_bytes().to_vec(),
        })
    }

    /// Get the public keys in this set.
    pub fn get_keys(&self) -> &[PublicKey] {
        &self.keys
    }

    /// Get the position of `key` in this set, if it is a member.
    pub fn position(&self, key: &PublicKey) -> Option<usize> {
        self.keys.iter().position(|item| item == key)
    }

    /// Get the number of keys in this set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check whether this set is empty, which a validated set never is.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub(crate) fn get_hash_points(&self) -> &[ProjectivePoint] {
        &self.hash_points
    }

    /// Get a cryptographic hash representation of this set, suitable for transcripting.
    pub(crate) fn get_hash(&self) -> &[u8] {
        &self.hash
    }
}
