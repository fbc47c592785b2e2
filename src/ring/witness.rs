// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use k256::{PublicKey, Scalar, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::ring::{AnonymitySet, RingError};

/// A ring signature witness.
///
/// The witness consists of a signing key and the index where the corresponding public key appears in an
/// [`AnonymitySet`]. It also holds the key image the signing key produces over that set.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RingWitness {
    l: u32,
    x: Scalar,
    #[zeroize(skip)]
    key_image: PublicKey,
}

impl RingWitness {
    /// Generate a new [`RingWitness`] for `signing_key` over `input_set`.
    ///
    /// The public key of `signing_key` must be a member of `input_set`; otherwise, returns an error.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(input_set: &AnonymitySet, signing_key: &SecretKey) -> Result<Self, RingError> {
        let l = input_set
            .position(&signing_key.public_key())
            .ok_or(RingError::SignerNotInRing)?;
        let x = *signing_key.to_nonzero_scalar();

        let key_image = PublicKey::from_affine((input_set.get_hash_points()[l] * x).to_affine()).map_err(|_| {
            RingError::InvalidParameter {
                reason: "key image is the identity",
            }
        })?;

        Ok(Self {
            // This can't truncate since the set size is bounded well below `u32::MAX`
            l: l as u32,
            x,
            key_image,
        })
    }

    /// Get the index of the signer's public key in the anonymity set.
    pub fn get_l(&self) -> u32 {
        self.l
    }

    /// Get the signing key.
    pub fn get_x(&self) -> &Scalar {
        &self.x
    }

    /// Get the key image.
    pub fn get_key_image(&self) -> &PublicKey {
        &self.key_image
    }
}

#[cfg(test)]
mod test {
    use alloc::vec::Vec;

    use k256::{ProjectivePoint, SecretKey};
    use rand_chacha::ChaCha12Rng;
    use rand_core::SeedableRng;

    use super::*;

    #[test]
    fn test_witness() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let signing_keys = (0..3).map(|_| SecretKey::random(&mut rng)).collect::<Vec<_>>();
        let keys = signing_keys.iter().map(SecretKey::public_key).collect::<Vec<_>>();
        let set = AnonymitySet::new(&keys).unwrap();

        let witness = RingWitness::new(&set, &signing_keys[1]).unwrap();
        assert_eq!(witness.get_l(), 1);
        assert_eq!(ProjectivePoint::GENERATOR * witness.get_x(), keys[1].to_projective());

        // The key image depends only on the signing key
        let other = AnonymitySet::new(&[keys[2], keys[1]]).unwrap();
        let moved = RingWitness::new(&other, &signing_keys[1]).unwrap();
        assert_eq!(moved.get_l(), 1);
        assert_eq!(moved.get_key_image(), witness.get_key_image());
        assert_ne!(
            RingWitness::new(&set, &signing_keys[0]).unwrap().get_key_image(),
            witness.get_key_image()
        );
    }

    #[test]
    fn test_signer_not_in_ring() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let signing_keys = (0..3).map(|_| SecretKey::random(&mut rng)).collect::<Vec<_>>();
        let keys = signing_keys[..2].iter().map(SecretKey::public_key).collect::<Vec<_>>();
        let set = AnonymitySet::new(&keys).unwrap();

        assert!(matches!(
            RingWitness::new(&set, &signing_keys[2]),
            Err(RingError::SignerNotInRing)
        ));
    }
}
