// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::{string::String, vec::Vec};

use k256::{PublicKey, SecretKey};
#[cfg(feature = "rand")]
use rand_core::OsRng;
use rand_core::CryptoRngCore;
use snafu::prelude::*;
use tracing::{debug, warn};

use crate::{
    address::LedgerAddress,
    ring::{RingError, RingScheme},
    util::keccak256,
};

/// Errors that can arise binding a transaction to an anonymity set.
#[derive(Debug, Snafu)]
pub enum BindingError {
    /// The ring signature capability failed.
    #[snafu(display("Ring signature generation failed"))]
    RingSignatureFailed {
        /// The underlying ring signature error.
        source: RingError,
    },
}

/// The message a binding signature for `address` is made over.
///
/// This is the Keccak-256 digest of the address's checksummed hex text.
pub fn binding_message(address: &LedgerAddress) -> [u8; 32] {
    keccak256(address.to_checksum_hex().as_bytes())
}

/// A ring signature binding a sending account to an anonymity set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SigningRequest {
    message: [u8; 32],
    ring_signature: String,
    key_image: String,
}

impl SigningRequest {
    /// Get the signed message.
    pub fn message(&self) -> &[u8; 32] {
        &self.message
    }

    /// Get the hex-encoded ring signature.
    pub fn ring_signature(&self) -> &str {
        &self.ring_signature
    }

    /// Get the hex-encoded key image.
    pub fn key_image(&self) -> &str {
        &self.key_image
    }
}

/// Produces and checks ring signatures binding ledger accounts to anonymity sets.
#[derive(Clone, Debug, Default)]
pub struct BindingAdapter<S> {
    scheme: S,
}

impl<S: RingScheme> BindingAdapter<S> {
    /// Create an adapter over a ring signature capability.
    pub fn new(scheme: S) -> Self {
        Self { scheme }
    }

    /// Sign the binding message for `from` with `signing_key`, whose public key must appear in `ring`.
    ///
    /// Failures of the ring signature capability are returned as they are; signing is never retried.
    ///
    /// This requires a [`CryptoRngCore`] random number generator `rng`.
    /// If you'd like a cryptographically-secure one provided for you, use [`BindingAdapter::build_signing_request`].
    pub fn build_signing_request_with_rng<R: CryptoRngCore>(
        &self,
        signing_key: &SecretKey,
        from: &LedgerAddress,
        ring: &[PublicKey],
        rng: &mut R,
    ) -> Result<SigningRequest, BindingError> {
        let message = binding_message(from);
        let output = self
            .scheme
            .generate_ring_signature(&message, signing_key, ring, rng)
            .inspect_err(|error| warn!(%from, ring_size = ring.len(), %error, "Could not sign binding"))
            .context(RingSignatureFailedSnafu)?;

        debug!(%from, key_image = %output.key_image, "Signed binding");

        Ok(SigningRequest {
            message,
            ring_signature: output.signature,
            key_image: output.key_image,
        })
    }

    /// Sign the binding message for `from` with `signing_key`, whose public key must appear in `ring`.
    ///
    /// This uses [`OsRng`] for nonce generation.
    #[cfg(feature = "rand")]
    pub fn build_signing_request(
        &self,
        signing_key: &SecretKey,
        from: &LedgerAddress,
        ring: &[PublicKey],
    ) -> Result<SigningRequest, BindingError> {
        self.build_signing_request_with_rng(signing_key, from, ring, &mut OsRng)
    }

    /// Check that `ring_signature` binds `address`.
    ///
    /// A signature that does not decode or verify is a normal negative result.
    ///
    /// The ring is taken from the signature itself, so this only shows that the signer holds one of the keys in that
    /// ring. It does not show the ring is drawn from any particular set of eligible keys; use
    /// [`BindingAdapter::verify_binding_in_set`] for that.
    pub fn verify_binding(&self, address: &LedgerAddress, ring_signature: &str) -> bool {
        let verified = self
            .scheme
            .verify_ring_signature(&binding_message(address), ring_signature);
        if !verified {
            debug!(%address, "Binding did not verify");
        }

        verified
    }

    /// Check that `ring_signature` binds `address`, and that every key in its ring is one of the `eligible` keys.
    pub fn verify_binding_in_set(&self, address: &LedgerAddress, ring_signature: &str, eligible: &[PublicKey]) -> bool {
        let Some(ring) = self.scheme.signature_ring(ring_signature) else {
            debug!(%address, "Binding ring did not decode");
            return false;
        };
        if !ring.iter().all(|key| eligible.contains(key)) {
            debug!(%address, ring_size = ring.len(), "Binding ring is not drawn from the eligible keys");
            return false;
        }

        self.verify_binding(address, ring_signature)
    }
}
