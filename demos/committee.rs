// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

//! A committee confirms that a requester's scan token links to their AB address.
//!
//! Three committee members each hold a share of the system secret. Two of them publish public shares for the
//! requester's keys over an in-memory ledger, and the third ingests those messages and runs the match. Once the link is
//! confirmed, the third member submits the certificate confirmation, and the requester binds a one-time account to an
//! anonymity set with a ring signature.
//!
//! Run with `RUST_LOG=debug cargo run --example committee` to see the events the library emits.

use std::cell::RefCell;

use ab_committee::{
    ledger::{encode_confirm_call, LedgerSubmitter, SubmissionId, SubmitError},
    AbAddress,
    BindingAdapter,
    CommitteeMember,
    HistoryParameters,
    LedgerAddress,
    LedgerParameters,
    Lsag,
    ScanToken,
    Secp256k1Sharing,
    ShareKey,
    ShareMatcher,
};
use k256::{elliptic_curve::Field, NonZeroScalar, PublicKey, Scalar, SecretKey};
use rand_chacha::ChaCha12Rng;
use rand_core::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A ledger that keeps every transaction in memory.
#[derive(Default)]
struct MemoryLedger {
    transactions: RefCell<Vec<(LedgerAddress, Vec<u8>)>>,
}

impl LedgerSubmitter for MemoryLedger {
    #[allow(clippy::cast_possible_truncation)]
    fn submit(&self, recipient: &LedgerAddress, payload: &[u8]) -> Result<SubmissionId, SubmitError> {
        let mut transactions = self.transactions.borrow_mut();
        transactions.push((*recipient, payload.to_vec()));

        let mut id = [0u8; 32];
        id[24..].copy_from_slice(&(transactions.len() as u64).to_be_bytes());
        Ok(SubmissionId(id))
    }
}

#[allow(non_snake_case)]
fn run() -> bool {
    // In practice you should use an actual random number generator; this is just for easier testing
    let mut rng = ChaCha12Rng::seed_from_u64(8675309);

    let params = LedgerParameters::new(LedgerAddress([0x11; 20]), LedgerAddress([0x22; 20])).unwrap();
    let ledger = MemoryLedger::default();

    // The committee shares the system secret `b` on the line `f(x) = b + c*x`
    let b = NonZeroScalar::random(&mut rng);
    let c = Scalar::random(&mut rng);
    let B = PublicKey::from_secret_scalar(&b);
    let members = (1..=3)
        .map(|id: u64| {
            let share_key = ShareKey::new(id, &(*b + c * Scalar::from(id))).unwrap();
            CommitteeMember::new(id, share_key, &ledger, params)
        })
        .collect::<Vec<_>>();

    // The requester owns the AB address for `A = a*G`, and derives a scan token only the committee can open
    let a = NonZeroScalar::random(&mut rng);
    let A = PublicKey::from_secret_scalar(&a);
    let address = AbAddress::from_public_key(&A);
    let token = ScanToken::from_address(
        &Secp256k1Sharing
            .derive_scan_token(&a, &B, &NonZeroScalar::random(&mut rng))
            .unwrap(),
    );
    info!(%address, "Requester registered");

    // The requester's key is listed among decoys
    let decoy = PublicKey::from_secret_scalar(&NonZeroScalar::random(&mut rng));
    let keys = [decoy, A];

    // Two members publish their public shares to the verifier address
    let cert_id = 7;
    for member in &members[..2] {
        member.publish_pub_shares(&token, cert_id, &keys).unwrap();
    }

    // The third member ingests every message sent to the verifier address and tries to match
    let matcher = ShareMatcher::new(Secp256k1Sharing, HistoryParameters::default());
    for (recipient, payload) in ledger.transactions.borrow().iter() {
        if recipient == params.get_verifier_address() {
            let raw = String::from_utf8(payload.clone()).unwrap();
            matcher.ingest(&raw).unwrap();
        }
    }
    let matched = matcher.try_match_token(&token);
    info!(matched, senders = matcher.sender_count(&token), "Match attempted");
    if !matched {
        return false;
    }

    // Confirm the certificate and release the shares
    members[2].submit_confirmation(cert_id, 1).unwrap();
    matcher.confirm(&token);
    let confirmed = ledger
        .transactions
        .borrow()
        .iter()
        .any(|(recipient, payload)| {
            recipient == params.get_authentication_contract() && payload == &encode_confirm_call(cert_id, 1)
        });

    // The requester binds a one-time account to an anonymity set of keys
    let signing_key = SecretKey::random(&mut rng);
    let mut ring = (0..7)
        .map(|_| SecretKey::random(&mut rng).public_key())
        .collect::<Vec<PublicKey>>();
    ring.insert(3, signing_key.public_key());

    let one_time = LedgerAddress([0x33; 20]);
    let adapter = BindingAdapter::new(Lsag);
    let request = adapter
        .build_signing_request_with_rng(&signing_key, &one_time, &ring, &mut rng)
        .unwrap();
    let bound = adapter.verify_binding(&one_time, request.ring_signature());
    info!(key_image = request.key_image(), bound, "Binding signed");

    confirmed && bound
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    assert!(run());
}
