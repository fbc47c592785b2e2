// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use k256::{elliptic_curve::sec1::ToEncodedPoint, ProjectivePoint, PublicKey, Scalar};
use merlin::{Transcript, TranscriptRng};
use rand_core::CryptoRngCore;

use crate::{
    domains,
    ring::{AnonymitySet, RingWitness},
    util::scalar_from_bytes,
};

/// A ring signature transcript.
///
/// The base transcript binds the anonymity set, key image and message; each ring position's challenge forks it.
pub(crate) struct SignatureTranscript {
    transcript: Transcript,
}

impl SignatureTranscript {
    /// Initialize a transcript.
    pub(crate) fn new(input_set: &AnonymitySet, key_image: &PublicKey, message: &[u8]) -> Self {
        let mut transcript = Transcript::new(domains::TRANSCRIPT_SIGNATURE.as_bytes());
        transcript.append_u64(b"version", domains::VERSION);
        transcript.append_message(b"input_set", input_set.get_hash());
        transcript.append_message(b"key_image", key_image.to_encoded_point(true).as_bytes());
        transcript.append_message(b"message", message);

        Self { transcript }
    }

    /// Produce the challenge for the next ring position from this position's commitments.
    #[allow(non_snake_case)]
    pub(crate) fn challenge(&self, L: &ProjectivePoint, R: &ProjectivePoint) -> Scalar {
        let mut transcript = self.transcript.clone();
        transcript.append_message(b"L", L.to_affine().to_encoded_point(true).as_bytes());
        transcript.append_message(b"R", R.to_affine().to_encoded_point(true).as_bytes());

        let mut c_bytes = [0u8; 32];
        transcript.challenge_bytes(b"c", &mut c_bytes);
        scalar_from_bytes(&c_bytes)
    }

    /// Build a nonce generator from the transcript, binding in witness data.
    pub(crate) fn build_rng<R: CryptoRngCore>(&self, witness: &RingWitness, external_rng: &mut R) -> TranscriptRng {
        self.transcript
            .build_rng()
            .rekey_with_witness_bytes(b"l", &witness.get_l().to_le_bytes())
            .rekey_with_witness_bytes(b"x", &witness.get_x().to_bytes())
            .finalize(external_rng)
    }
}
