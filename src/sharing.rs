// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::{string::String, vec::Vec};

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use k256::{
    elliptic_curve::{sec1::ToEncodedPoint, PrimeField},
    FieldBytes,
    NonZeroScalar,
    ProjectivePoint,
    PublicKey,
    Scalar,
};
use snafu::prelude::*;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    address::{compress_point, AbAddress},
    domains,
    message::{ShareEntry, FIELD_LENGTH},
    util::hash_point_to_scalar,
};

/// Errors that can arise relating to secret shares.
#[derive(Debug, Snafu)]
pub enum SharingError {
    /// A share or share key could not be decoded.
    #[snafu(display("Invalid share: {reason}"))]
    InvalidShare {
        /// The reason for the error.
        reason: &'static str,
    },
    /// Both shares came from the same share owner, so they cannot be combined.
    #[snafu(display("Shares have the same owner"))]
    DuplicateShareOwner,
    /// A computation produced the identity point.
    #[snafu(display("Computation produced the identity point"))]
    IdentityPoint,
}

/// Homomorphic share combination and scan derivation over secp256k1.
///
/// The matching engine only needs these two operations, so any threshold-2 sharing scheme can be plugged in.
pub trait ShareCombiner {
    /// Combine two public shares from distinct owners into the shared public key.
    fn combine_shares(&self, first: &ShareEntry, second: &ShareEntry) -> Result<PublicKey, SharingError>;

    /// Derive the identity point that a one-time address with scan-auxiliary point `s1` would carry for the shared
    /// key `key`.
    fn scan_derive(&self, key: &PublicKey, s1: &PublicKey) -> Result<PublicKey, SharingError>;
}

/// Encode a 32-byte big-endian value as a fixed-width 44-character field.
pub fn encode_coordinate(bytes: &[u8; 32]) -> String {
    URL_SAFE.encode(bytes)
}

/// Decode a fixed-width 44-character field into a 32-byte big-endian value.
pub fn decode_coordinate(text: &str) -> Result<[u8; 32], SharingError> {
    if text.len() != FIELD_LENGTH {
        return Err(SharingError::InvalidShare {
            reason: "coordinate must be 44 characters",
        });
    }

    URL_SAFE
        .decode(text)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes.as_slice()).ok())
        .ok_or(SharingError::InvalidShare {
            reason: "coordinate is not base64 for 32 bytes",
        })
}

// Decode a share owner ID field into its nonzero evaluation point
fn decode_owner_id(text: &str) -> Result<Scalar, SharingError> {
    let bytes = decode_coordinate(text)?;
    let id = Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(&bytes))).ok_or(
        SharingError::InvalidShare {
            reason: "owner ID is not a canonical scalar",
        },
    )?;
    if id == Scalar::ZERO {
        return Err(SharingError::InvalidShare {
            reason: "owner ID is zero",
        });
    }

    Ok(id)
}

// Decode a share entry into its owner ID and public share point
fn decode_entry(entry: &ShareEntry) -> Result<(Scalar, ProjectivePoint), SharingError> {
    let id = decode_owner_id(entry.owner_id())?;

    let mut encoded = [0u8; 65];
    encoded[0] = 0x04;
    encoded[1..33].copy_from_slice(&decode_coordinate(entry.x())?);
    encoded[33..].copy_from_slice(&decode_coordinate(entry.y())?);
    let point = PublicKey::from_sec1_bytes(&encoded).map_err(|_| SharingError::InvalidShare {
        reason: "share is not a valid curve point",
    })?;

    Ok((id, point.to_projective()))
}

// Encode a scalar owner ID as a fixed-width field
fn encode_owner_id(id: &Scalar) -> String {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&id.to_bytes());
    encode_coordinate(&bytes)
}

/// A committee member's secret share `t_i = f(i)` of the system private key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ShareKey {
    id: Scalar,
    secret: Scalar,
}

impl ShareKey {
    /// Build a share key from an owner ID and secret share.
    ///
    /// Both the ID and the secret must be nonzero.
    pub fn new(id: u64, secret: &Scalar) -> Result<Self, SharingError> {
        if id == 0 || secret == &Scalar::ZERO {
            return Err(SharingError::InvalidShare {
                reason: "share ID and secret must be nonzero",
            });
        }

        Ok(Self {
            id: Scalar::from(id),
            secret: *secret,
        })
    }

    /// Parse a share key from its 88-character text form: the owner ID field followed by the secret field.
    pub fn from_text(text: &str) -> Result<Self, SharingError> {
        if text.len() != 2 * FIELD_LENGTH || !text.is_ascii() {
            return Err(SharingError::InvalidShare {
                reason: "share key must be 88 characters",
            });
        }

        let id = decode_owner_id(&text[..FIELD_LENGTH])?;
        let mut secret_bytes = decode_coordinate(&text[FIELD_LENGTH..])?;
        let secret = Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(&secret_bytes)));
        secret_bytes.zeroize();
        let secret = secret
            .filter(|s| s != &Scalar::ZERO)
            .ok_or(SharingError::InvalidShare {
                reason: "share secret is not a canonical nonzero scalar",
            })?;

        Ok(Self { id, secret })
    }

    /// Get the owner ID field for this share key.
    pub fn owner_id(&self) -> String {
        encode_owner_id(&self.id)
    }
}

/// The default [`ShareCombiner`]: Lagrange interpolation of secp256k1 public shares at zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct Secp256k1Sharing;

impl Secp256k1Sharing {
    /// Compute this member's public shares `t_i * A` for each key `A` in `keys`.
    pub fn generate_pub_shares(&self, share_key: &ShareKey, keys: &[PublicKey]) -> Vec<ShareEntry> {
        let owner_id = share_key.owner_id();

        keys.iter()
            .filter_map(|key| {
                let share = (key.to_projective() * share_key.secret).to_affine();
                let encoded = share.to_encoded_point(false);
                let (x, y) = (encoded.x()?, encoded.y()?);

                let mut x_bytes = [0u8; 32];
                let mut y_bytes = [0u8; 32];
                x_bytes.copy_from_slice(x);
                y_bytes.copy_from_slice(y);

                ShareEntry::from_fields(&owner_id, &encode_coordinate(&x_bytes), &encode_coordinate(&y_bytes)).ok()
            })
            .collect()
    }

    /// Derive a scan token for the owner of `owner_secret`, whose shared point with the system key `system_key` only
    /// the committee can reconstruct.
    ///
    /// The token carries `A1 = H(a * B) * G + S1` and `S1 = s * G`.
    pub fn derive_scan_token(
        &self,
        owner_secret: &NonZeroScalar,
        system_key: &PublicKey,
        aux_secret: &NonZeroScalar,
    ) -> Result<AbAddress, SharingError> {
        let shared = PublicKey::from_affine((system_key.to_projective() * owner_secret.as_ref()).to_affine())
            .map_err(|_| SharingError::IdentityPoint)?;
        let s1 = PublicKey::from_affine((ProjectivePoint::GENERATOR * aux_secret.as_ref()).to_affine())
            .map_err(|_| SharingError::IdentityPoint)?;
        let a1 = self.scan_derive(&shared, &s1)?;

        Ok(AbAddress::from_parts(&compress_point(&a1), &compress_point(&s1)))
    }
}

impl ShareCombiner for Secp256k1Sharing {
    #[allow(non_snake_case)]
    fn combine_shares(&self, first: &ShareEntry, second: &ShareEntry) -> Result<PublicKey, SharingError> {
        let (x1, P1) = decode_entry(first)?;
        let (x2, P2) = decode_entry(second)?;
        if x1 == x2 {
            return Err(SharingError::DuplicateShareOwner);
        }

        // Lagrange coefficients for evaluation at zero
        let inverse = Option::<Scalar>::from((x2 - x1).invert()).ok_or(SharingError::DuplicateShareOwner)?;
        let lambda1 = x2 * inverse;
        let lambda2 = -(x1 * inverse);

        PublicKey::from_affine((P1 * lambda1 + P2 * lambda2).to_affine()).map_err(|_| SharingError::IdentityPoint)
    }

    fn scan_derive(&self, key: &PublicKey, s1: &PublicKey) -> Result<PublicKey, SharingError> {
        let h = hash_point_to_scalar(domains::SCAN_DERIVATION, &key.to_projective());

        PublicKey::from_affine((ProjectivePoint::GENERATOR * h + s1.to_projective()).to_affine())
            .map_err(|_| SharingError::IdentityPoint)
    }
}

#[cfg(test)]
mod test {
    use k256::elliptic_curve::Field;
    use rand_chacha::ChaCha12Rng;
    use rand_core::SeedableRng;

    use super::*;

    fn public_key(secret: &Scalar) -> PublicKey {
        PublicKey::from_affine((ProjectivePoint::GENERATOR * secret).to_affine()).unwrap()
    }

    #[test]
    fn test_coordinate_encoding() {
        let mut bytes = [0u8; 32];
        bytes[31] = 2;
        let encoded = encode_coordinate(&bytes);
        assert_eq!(encoded, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAI=");
        assert_eq!(decode_coordinate(&encoded).unwrap(), bytes);

        assert!(decode_coordinate("AAAA").is_err());
        assert!(decode_coordinate(&"*".repeat(FIELD_LENGTH)).is_err());
    }

    #[test]
    fn test_share_key_text() {
        let key = ShareKey::from_text(
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAI=dwOoQA6zD-kc0KQHm7srZ7sePn_pkOIalCZGbTD1WrI=",
        )
        .unwrap();
        assert_eq!(key.owner_id(), "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAI=");

        // Zero owner IDs are not evaluation points
        assert!(ShareKey::from_text(
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=dwOoQA6zD-kc0KQHm7srZ7sePn_pkOIalCZGbTD1WrI="
        )
        .is_err());
        assert!(ShareKey::from_text("short").is_err());
        assert!(ShareKey::new(0, &Scalar::ONE).is_err());
        assert!(ShareKey::new(1, &Scalar::ZERO).is_err());
    }

    #[test]
    #[allow(non_snake_case)]
    fn test_combine_reconstructs_shared_key() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let sharing = Secp256k1Sharing;

        // Shares of `b` on the line `f(x) = b + c*x`
        let b = Scalar::random(&mut rng);
        let c = Scalar::random(&mut rng);
        let f = |x: u64| b + c * Scalar::from(x);

        let a = Scalar::random(&mut rng);
        let A = public_key(&a);
        let expected = public_key(&(a * b));

        let shares = (1..=3u64)
            .map(|i| sharing.generate_pub_shares(&ShareKey::new(i, &f(i)).unwrap(), &[A]))
            .collect::<Vec<Vec<ShareEntry>>>();

        // Any two distinct owners reconstruct `b * A`, in either order
        for (i, j) in [(0, 1), (1, 2), (0, 2), (2, 0)] {
            assert_eq!(sharing.combine_shares(&shares[i][0], &shares[j][0]).unwrap(), expected);
        }

        // The same owner twice cannot be combined
        assert!(matches!(
            sharing.combine_shares(&shares[0][0], &shares[0][0]),
            Err(SharingError::DuplicateShareOwner)
        ));
    }

    #[test]
    #[allow(non_snake_case)]
    fn test_scan_token_matches_committee_derivation() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let sharing = Secp256k1Sharing;

        let a = NonZeroScalar::random(&mut rng);
        let b = NonZeroScalar::random(&mut rng);
        let s = NonZeroScalar::random(&mut rng);

        let token = sharing.derive_scan_token(&a, &public_key(&b), &s).unwrap();
        let (A1, S1) = token.decompress().unwrap();

        // The committee knows `b * A`, which equals `a * B`
        let bA = public_key(&(*a * *b));
        assert_eq!(sharing.scan_derive(&bA, &S1).unwrap(), A1);
    }
}
