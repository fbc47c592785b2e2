// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use blake3::Hasher;
use k256::{
    elliptic_curve::{ops::Reduce, sec1::ToEncodedPoint},
    FieldBytes,
    ProjectivePoint,
    PublicKey,
    Scalar,
    U256,
};
use sha3::{Digest, Keccak256};

/// Keccak-256, as used by the ledger for storage slots and message digests.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Reduce 32 big-endian bytes to a scalar.
pub(crate) fn scalar_from_bytes(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(bytes))
}

/// Hash a point to a scalar under a domain separator.
pub(crate) fn hash_point_to_scalar(domain: &str, point: &ProjectivePoint) -> Scalar {
    let mut hasher = Hasher::new();
    hasher.update(domain.as_bytes());
    hasher.update(point.to_affine().to_encoded_point(true).as_bytes());

    scalar_from_bytes(hasher.finalize().as_bytes())
}

// Bounds the try-and-increment loop; each attempt succeeds with probability about one half
const HASH_TO_POINT_ATTEMPTS: u32 = 256;

/// Hash a public key to a curve point with no known discrete logarithm, using try-and-increment.
///
/// This is variable time, which is fine since the input is public.
pub(crate) fn hash_to_point(domain: &str, key: &PublicKey) -> Option<ProjectivePoint> {
    let mut candidate = [0u8; 33];
    candidate[0] = 0x02;

    for counter in 0..HASH_TO_POINT_ATTEMPTS {
        let mut hasher = Hasher::new();
        hasher.update(domain.as_bytes());
        hasher.update(key.to_encoded_point(true).as_bytes());
        hasher.update(&counter.to_le_bytes());
        candidate[1..].copy_from_slice(hasher.finalize().as_bytes());

        if let Ok(point) = PublicKey::from_sec1_bytes(&candidate) {
            return Some(point.to_projective());
        }
    }

    None
}
