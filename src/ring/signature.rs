// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::{string::String, vec, vec::Vec};

#[cfg(feature = "borsh")]
use borsh::{BorshDeserialize, BorshSerialize};
use k256::{
    elliptic_curve::{ff::PrimeField, sec1::ToEncodedPoint, Field},
    FieldBytes,
    ProjectivePoint,
    PublicKey,
    Scalar,
    SecretKey,
};
use rand_core::CryptoRngCore;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::{
    address::{compress_point, COMPRESSED_POINT_LENGTH},
    ring::{
        input_set::MAX_RING_SIZE,
        transcript::SignatureTranscript,
        AnonymitySet,
        RingError,
        RingScheme,
        RingSignatureOutput,
        RingWitness,
    },
};

const SCALAR_LENGTH: usize = 32;

/// A linkable ring signature.
///
/// The signature carries the anonymity set it was made over, so it can be verified from its encoding alone.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkableRingSignature {
    input_set: AnonymitySet,
    key_image: PublicKey,
    c0: Scalar,
    s: Vec<Scalar>,
}

impl LinkableRingSignature {
    /// Generate a ring signature over `message` from a witness and the anonymity set it was built for.
    ///
    /// You must also supply a [`CryptoRngCore`] random number generator `rng`, which is mixed into nonce generation.
    #[allow(non_snake_case)]
    pub fn sign<R: CryptoRngCore>(
        witness: &RingWitness,
        input_set: &AnonymitySet,
        message: &[u8],
        rng: &mut R,
    ) -> Result<Self, RingError> {
        let n = input_set.len();
        let l = witness.get_l() as usize;
        if l >= n || input_set.get_keys()[l].to_projective() != ProjectivePoint::GENERATOR * witness.get_x() {
            return Err(RingError::SignerNotInRing);
        }

        let P = input_set.get_keys();
        let Hp = input_set.get_hash_points();
        let I = witness.get_key_image().to_projective();

        let transcript = SignatureTranscript::new(input_set, witness.get_key_image(), message);
        let mut nonce_rng = transcript.build_rng(witness, rng);

        let mut c = vec![Scalar::ZERO; n];
        let mut s = vec![Scalar::ZERO; n];

        let alpha = Scalar::random(&mut nonce_rng);
        c[(l + 1) % n] = transcript.challenge(&(ProjectivePoint::GENERATOR * alpha), &(Hp[l] * alpha));

        // Walk the ring from the signer's successor back around to the signer
        for offset in 1..n {
            let i = (l + offset) % n;
            s[i] = Scalar::random(&mut nonce_rng);
            let L = ProjectivePoint::GENERATOR * s[i] + P[i].to_projective() * c[i];
            let R = Hp[i] * s[i] + I * c[i];
            c[(i + 1) % n] = transcript.challenge(&L, &R);
        }

        // Close the ring
        s[l] = alpha - c[l] * witness.get_x();

        Ok(Self {
            input_set: input_set.clone(),
            key_image: *witness.get_key_image(),
            c0: c[0],
            s,
        })
    }

    /// Verify this signature against `message`.
    ///
    /// If the signature does not close the ring, returns an error.
    #[allow(non_snake_case)]
    pub fn verify(&self, message: &[u8]) -> Result<(), RingError> {
        let P = self.input_set.get_keys();
        let Hp = self.input_set.get_hash_points();
        if self.s.len() != P.len() {
            return Err(RingError::InvalidParameter {
                reason: "response count does not match the anonymity set",
            });
        }
        let I = self.key_image.to_projective();

        let transcript = SignatureTranscript::new(&self.input_set, &self.key_image, message);
        let mut c = self.c0;
        for (i, s_i) in self.s.iter().enumerate() {
            let L = ProjectivePoint::GENERATOR * s_i + P[i].to_projective() * c;
            let R = Hp[i] * s_i + I * c;
            c = transcript.challenge(&L, &R);
        }

        if bool::from(c.ct_eq(&self.c0)) {
            Ok(())
        } else {
            Err(RingError::FailedVerification)
        }
    }

    /// Get the anonymity set this signature was made over.
    pub fn get_input_set(&self) -> &AnonymitySet {
        &self.input_set
    }

    /// Get the key image.
    pub fn get_key_image(&self) -> &PublicKey {
        &self.key_image
    }

    /// Serialize this signature to a canonical byte vector.
    ///
    /// The encoding is the ring size as a little-endian `u32`, the compressed ring keys, the compressed key image, the
    /// initial challenge, and the responses.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.input_set.len();
        let mut result = Vec::with_capacity(Self::encoded_length(n));

        // The ring size is bounded well below `u32::MAX`
        result.extend_from_slice(&(n as u32).to_le_bytes());
        for key in self.input_set.get_keys() {
            result.extend_from_slice(&compress_point(key));
        }
        result.extend_from_slice(&compress_point(&self.key_image));
        result.extend_from_slice(&self.c0.to_bytes());
        for s in &self.s {
            result.extend_from_slice(&s.to_bytes());
        }

        result
    }

    /// Deserialize a signature from its canonical byte encoding.
    ///
    /// Any encoding that is not exactly what [`Self::to_bytes`] would produce is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RingError> {
        let mut rest = bytes;
        let n = u32::from_le_bytes(read_array::<4>(&mut rest)?) as usize;
        if n == 0 || n > MAX_RING_SIZE {
            return Err(RingError::InvalidEncoding {
                reason: "ring size out of range",
            });
        }
        if bytes.len() != Self::encoded_length(n) {
            return Err(RingError::InvalidEncoding {
                reason: "unexpected signature length",
            });
        }

        let mut keys = Vec::with_capacity(n);
        for _ in 0..n {
            keys.push(read_point(&mut rest)?);
        }
        let input_set = AnonymitySet::new(&keys).map_err(|_| RingError::InvalidEncoding {
            reason: "invalid anonymity set",
        })?;
        let key_image = read_point(&mut rest)?;
        let c0 = read_scalar(&mut rest)?;
        let s = (0..n).map(|_| read_scalar(&mut rest)).collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            input_set,
            key_image,
            c0,
            s,
        })
    }

    /// Serialize this signature as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Deserialize a signature from hex.
    pub fn from_hex(text: &str) -> Result<Self, RingError> {
        let bytes = hex::decode(text).map_err(|_| RingError::InvalidEncoding {
            reason: "signature is not valid hex",
        })?;

        Self::from_bytes(&bytes)
    }

    fn encoded_length(n: usize) -> usize {
        4 + n * COMPRESSED_POINT_LENGTH + COMPRESSED_POINT_LENGTH + SCALAR_LENGTH + n * SCALAR_LENGTH
    }
}

// Take the next `N` bytes off the front of `bytes`
fn read_array<const N: usize>(bytes: &mut &[u8]) -> Result<[u8; N], RingError> {
    if bytes.len() < N {
        return Err(RingError::InvalidEncoding {
            reason: "truncated signature",
        });
    }
    let (head, rest) = bytes.split_at(N);
    *bytes = rest;

    let mut array = [0u8; N];
    array.copy_from_slice(head);
    Ok(array)
}

fn read_point(bytes: &mut &[u8]) -> Result<PublicKey, RingError> {
    let point = read_array::<COMPRESSED_POINT_LENGTH>(bytes)?;

    // Only the compressed form is canonical
    if point[0] != 0x02 && point[0] != 0x03 {
        return Err(RingError::InvalidEncoding {
            reason: "point is not compressed",
        });
    }
    PublicKey::from_sec1_bytes(&point).map_err(|_| RingError::InvalidEncoding {
        reason: "invalid point",
    })
}

fn read_scalar(bytes: &mut &[u8]) -> Result<Scalar, RingError> {
    let scalar = read_array::<SCALAR_LENGTH>(bytes)?;

    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(scalar))).ok_or(RingError::InvalidEncoding {
        reason: "scalar is not canonical",
    })
}

#[cfg(feature = "borsh")]
impl BorshSerialize for LinkableRingSignature {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        BorshSerialize::serialize(&self.to_bytes(), writer)
    }
}

#[cfg(feature = "borsh")]
impl BorshDeserialize for LinkableRingSignature {
    fn deserialize_reader<R: borsh::io::Read>(reader: &mut R) -> borsh::io::Result<Self> {
        let bytes: Vec<u8> = BorshDeserialize::deserialize_reader(reader)?;
        Self::from_bytes(&bytes)
            .map_err(|_| borsh::io::Error::new(borsh::io::ErrorKind::InvalidInput, "Invalid ring signature"))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for LinkableRingSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for LinkableRingSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// The default ring signature scheme: bLSAG over secp256k1 with hex-encoded artifacts.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lsag;

impl RingScheme for Lsag {
    fn generate_ring_signature<R: CryptoRngCore>(
        &self,
        message: &[u8],
        signing_key: &SecretKey,
        ring: &[PublicKey],
        rng: &mut R,
    ) -> Result<RingSignatureOutput, RingError> {
        let input_set = AnonymitySet::new(ring)?;
        let witness = RingWitness::new(&input_set, signing_key)?;
        let signature = LinkableRingSignature::sign(&witness, &input_set, message, rng)?;

        Ok(RingSignatureOutput {
            signature: signature.to_hex(),
            key_image: hex::encode(signature.get_key_image().to_encoded_point(true).as_bytes()),
        })
    }

    fn verify_ring_signature(&self, message: &[u8], signature: &str) -> bool {
        match LinkableRingSignature::from_hex(signature).and_then(|signature| signature.verify(message)) {
            Ok(()) => true,
            Err(error) => {
                debug!(%error, "Ring signature rejected");
                false
            },
        }
    }

    fn signature_ring(&self, signature: &str) -> Option<Vec<PublicKey>> {
        LinkableRingSignature::from_hex(signature)
            .ok()
            .map(|signature| signature.get_input_set().get_keys().to_vec())
    }
}
