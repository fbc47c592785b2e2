// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

//! Linkable ring signatures over secp256k1.
//!
//! A ring signature shows that the signer knows the signing key of one member of an [`AnonymitySet`] of public keys,
//! without revealing which. Each signature carries a key image `I = x * Hp(P)`, where `x` is the signing key, `P` its
//! public key and `Hp` a hash to the curve. Two valid signatures with the same key image were made with the same
//! signing key, which lets the ledger detect a membership proof being used twice.
//!
//! The construction is a back-linked spontaneous anonymous group (bLSAG) signature. Challenges are derived from a
//! [Merlin](https://merlin.cool/) transcript bound to the anonymity set, key image and message. Nonces come from a
//! transcript generator keyed with the witness and an external random number generator.
//!
//! Callers that only need hex artifacts go through the [`RingScheme`] capability, implemented by [`Lsag`].

use alloc::{string::String, vec::Vec};

use k256::{PublicKey, SecretKey};
use rand_core::CryptoRngCore;
use snafu::prelude::*;

/// Anonymity sets.
pub mod input_set;
pub use input_set::AnonymitySet;
/// Ring signatures and the default ring signature scheme.
pub mod signature;
pub use signature::{LinkableRingSignature, Lsag};
/// Signature transcripts.
pub(crate) mod transcript;
/// Signing witnesses.
pub mod witness;
pub use witness::RingWitness;

/// Errors that can arise relating to ring signatures.
#[derive(Debug, Snafu)]
pub enum RingError {
    /// An invalid parameter was provided.
    #[snafu(display("An invalid parameter was provided: {reason}"))]
    InvalidParameter {
        /// The reason for the parameter error.
        reason: &'static str,
    },
    /// The signing key's public key is not a member of the anonymity set.
    #[snafu(display("The signing key is not in the anonymity set"))]
    SignerNotInRing,
    /// A signature failed to verify.
    #[snafu(display("Ring signature failed to verify"))]
    FailedVerification,
    /// A signature could not be decoded.
    #[snafu(display("Ring signature could not be decoded: {reason}"))]
    InvalidEncoding {
        /// The reason the encoding was rejected.
        reason: &'static str,
    },
}

/// The artifacts of a ring signature, as hex text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RingSignatureOutput {
    /// The canonically encoded signature.
    pub signature: String,
    /// The compressed key image.
    pub key_image: String,
}

/// A ring signature capability.
pub trait RingScheme {
    /// Sign `message` with `signing_key`, whose public key must appear in `ring`.
    fn generate_ring_signature<R: CryptoRngCore>(
        &self,
        message: &[u8],
        signing_key: &SecretKey,
        ring: &[PublicKey],
        rng: &mut R,
    ) -> Result<RingSignatureOutput, RingError>;

    /// Check a hex-encoded ring signature against `message`.
    ///
    /// Anything that does not decode or verify is `false`.
    fn verify_ring_signature(&self, message: &[u8], signature: &str) -> bool;

    /// Get the ring a hex-encoded signature was made over, if it decodes.
    fn signature_ring(&self, signature: &str) -> Option<Vec<PublicKey>>;
}
