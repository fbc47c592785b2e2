// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Instant,
    vec::Vec,
};

use itertools::{iproduct, Itertools};
use k256::PublicKey;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::{
    address::AbAddress,
    history::{RecordOutcome, SenderShares, ShareHistory, TokenState},
    message::{split_share_entries, MessageError, PubShareMessage, ScanToken, ShareEntry},
    parameters::HistoryParameters,
    sharing::ShareCombiner,
};

/// The share matching engine.
///
/// Committee members' public shares are recorded per scan token. A match is confirmed when some pair of shares from
/// two distinct senders combines into a key whose scan derivation reproduces the candidate's identity point.
///
/// The history sits behind a single lock. Recording a message is atomic, and matching works on a snapshot of the
/// token's messages taken under the lock, so combination work never blocks ingestion.
pub struct ShareMatcher<C> {
    combiner: C,
    params: HistoryParameters,
    history: Mutex<ShareHistory>,
}

impl<C: ShareCombiner> ShareMatcher<C> {
    /// Create a matching engine with an empty history.
    pub fn new(combiner: C, params: HistoryParameters) -> Self {
        Self {
            combiner,
            params,
            history: Mutex::new(ShareHistory::new(params)),
        }
    }

    // History updates are single steps, so a poisoned lock still guards a consistent history
    fn history(&self) -> MutexGuard<'_, ShareHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the share data `share_blob` sent by `sender_id` for `token`.
    ///
    /// The data must be a nonempty, whole number of share entries within the configured per-message limit; otherwise
    /// nothing is recorded. Recording is idempotent per sender and token.
    pub fn record_share(
        &self,
        token: &ScanToken,
        sender_id: u64,
        share_blob: &str,
    ) -> Result<RecordOutcome, MessageError> {
        let entries = split_share_entries(share_blob)?;
        if entries.is_empty() {
            return Err(MessageError::MalformedMessage {
                reason: "message carries no share entries",
            });
        }
        let limit = self.params.get_max_shares_per_message();
        if entries.len() > limit {
            return Err(MessageError::TooManyShares {
                count: entries.len(),
                limit,
            });
        }

        let outcome = self.history().record(token, sender_id, entries, Instant::now());
        match outcome {
            RecordOutcome::Recorded => debug!(%token, sender_id, "Recorded public shares"),
            RecordOutcome::DuplicateSender => debug!(%token, sender_id, "Ignoring repeated public shares"),
            RecordOutcome::SenderLimitReached => warn!(%token, sender_id, "Sender limit reached, dropping shares"),
        }

        Ok(outcome)
    }

    /// Decode a public-share message and record its shares.
    pub fn ingest(&self, raw: &str) -> Result<RecordOutcome, MessageError> {
        let result = PubShareMessage::decode(raw)
            .and_then(|message| self.record_share(message.token(), message.sender_id(), message.share_data()));
        if let Err(error) = &result {
            warn!(%error, "Rejected public-share message");
        }

        result
    }

    /// Check whether the shares recorded for `token` link it to `candidate`.
    ///
    /// The candidate decomposes into an identity point `A1` and a scan-auxiliary point `S1`. Every unordered pair of
    /// distinct senders is tried, and within a pair every combination of their entries; the first combination whose
    /// scan derivation equals `A1` confirms the link. Which combination matches first is unspecified.
    #[allow(non_snake_case)]
    pub fn try_match(&self, token: &ScanToken, candidate: &AbAddress) -> bool {
        let (A1, S1) = match candidate.decompress() {
            Ok(points) => points,
            Err(error) => {
                warn!(%token, %error, "Candidate address did not decode");
                return false;
            },
        };

        let (generation, messages): (u64, Vec<SenderShares>) = match self.history().snapshot(token) {
            Some((generation, messages)) if messages.len() >= 2 => (generation, messages.to_vec()),
            _ => {
                debug!(%token, "Fewer than two senders, no match attempted");
                return false;
            },
        };

        let matched = messages.iter().tuple_combinations().any(|(first, second)| {
            iproduct!(first.entries(), second.entries()).any(|(x, y)| self.check_pair(x, y, &A1, &S1))
        });

        if matched {
            // The token may have been dropped and recorded again while the lock was released
            if !self.history().mark_matched(token, generation) {
                debug!(%token, "Token changed during matching, state left as is");
            }
            info!(%token, "Found a matching account");
        } else {
            debug!(%token, senders = messages.len(), "No pair of shares matched");
        }

        matched
    }

    /// Check whether the shares recorded for `token` match the points the token itself carries.
    pub fn try_match_token(&self, token: &ScanToken) -> bool {
        match token.to_address() {
            Ok(candidate) => self.try_match(token, &candidate),
            Err(error) => {
                warn!(%token, %error, "Scan token did not decode");
                false
            },
        }
    }

    #[allow(non_snake_case)]
    fn check_pair(&self, first: &ShareEntry, second: &ShareEntry, A1: &PublicKey, S1: &PublicKey) -> bool {
        let combined = match self.combiner.combine_shares(first, second) {
            Ok(key) => key,
            Err(error) => {
                debug!(%error, "Could not combine shares");
                return false;
            },
        };
        match self.combiner.scan_derive(&combined, S1) {
            Ok(derived) => derived.to_projective().ct_eq(&A1.to_projective()).into(),
            Err(error) => {
                debug!(%error, "Could not derive scan point");
                false
            },
        }
    }

    /// Get the matching state of `token`, if it is tracked.
    pub fn state(&self, token: &ScanToken) -> Option<TokenState> {
        self.history().state(token)
    }

    /// Get the number of distinct senders recorded for `token`.
    pub fn sender_count(&self, token: &ScanToken) -> usize {
        self.history().sender_count(token)
    }

    /// Drop `token` once its verification is confirmed on the ledger.
    pub fn confirm(&self, token: &ScanToken) -> bool {
        self.history().evict(token)
    }

    /// Drop tokens older than the configured TTL.
    pub fn prune_expired(&self) -> usize {
        let pruned = self.history().prune_expired(Instant::now());
        if pruned > 0 {
            debug!(pruned, "Pruned expired scan tokens");
        }

        pruned
    }
}

#[cfg(test)]
mod test {
    use std::{
        string::String,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
            OnceLock,
            Weak,
        },
        thread,
        vec,
    };

    use k256::{elliptic_curve::Field, NonZeroScalar, ProjectivePoint, Scalar};
    use rand_chacha::ChaCha12Rng;
    use rand_core::SeedableRng;

    use super::*;
    use crate::{
        message::FIELD_LENGTH,
        sharing::{Secp256k1Sharing, ShareKey, SharingError},
    };

    fn public_key(secret: &Scalar) -> PublicKey {
        PublicKey::from_affine((ProjectivePoint::GENERATOR * secret).to_affine()).unwrap()
    }

    fn blob(entries: &[ShareEntry]) -> String {
        entries.iter().map(ShareEntry::as_str).collect()
    }

    // A requester's scan token, plus share data from two honest members and one unrelated member
    struct Scenario {
        token: ScanToken,
        honest: [(u64, String); 2],
        unrelated: (u64, String),
    }

    #[allow(non_snake_case)]
    fn scenario() -> Scenario {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let sharing = Secp256k1Sharing;

        // The committee shares `b` on the line `f(x) = b + c*x`
        let b = NonZeroScalar::random(&mut rng);
        let c = Scalar::random(&mut rng);
        let f = |x: u64| *b + c * Scalar::from(x);
        let B = public_key(&b);

        // The requester owns `A = a*G`, listed among decoys
        let a = NonZeroScalar::random(&mut rng);
        let keys = [public_key(&Scalar::random(&mut rng)), public_key(&a)];
        let address = sharing
            .derive_scan_token(&a, &B, &NonZeroScalar::random(&mut rng))
            .unwrap();

        let share = |id: u64, secret: Scalar| blob(&sharing.generate_pub_shares(&ShareKey::new(id, &secret).unwrap(), &keys));

        Scenario {
            token: ScanToken::from_address(&address),
            honest: [(1, share(1, f(1))), (2, share(2, f(2)))],
            unrelated: (3, share(3, Scalar::random(&mut rng))),
        }
    }

    // Fails every combination, counting attempts
    #[derive(Default)]
    struct CountingCombiner {
        calls: AtomicUsize,
    }

    impl ShareCombiner for CountingCombiner {
        fn combine_shares(&self, _: &ShareEntry, _: &ShareEntry) -> Result<PublicKey, SharingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SharingError::IdentityPoint)
        }

        fn scan_derive(&self, key: &PublicKey, _: &PublicKey) -> Result<PublicKey, SharingError> {
            Ok(*key)
        }
    }

    // Combines honestly, but on the first combination drops the token and records other senders' shares for it
    struct InterleavingCombiner {
        matcher: OnceLock<Weak<ShareMatcher<InterleavingCombiner>>>,
        token: ScanToken,
        replacement: Vec<(u64, String)>,
        fired: AtomicBool,
    }

    impl ShareCombiner for InterleavingCombiner {
        fn combine_shares(&self, first: &ShareEntry, second: &ShareEntry) -> Result<PublicKey, SharingError> {
            if !self.fired.swap(true, Ordering::SeqCst) {
                if let Some(matcher) = self.matcher.get().and_then(Weak::upgrade) {
                    assert!(matcher.confirm(&self.token));
                    for (sender, data) in &self.replacement {
                        matcher.record_share(&self.token, *sender, data).unwrap();
                    }
                }
            }
            Secp256k1Sharing.combine_shares(first, second)
        }

        fn scan_derive(&self, key: &PublicKey, s1: &PublicKey) -> Result<PublicKey, SharingError> {
            Secp256k1Sharing.scan_derive(key, s1)
        }
    }

    #[test]
    fn test_match_is_order_independent() {
        let Scenario {
            token,
            honest,
            unrelated,
        } = scenario();

        let forward = [&honest[0], &honest[1], &unrelated];
        let backward = [&unrelated, &honest[1], &honest[0]];
        for order in [forward, backward] {
            let matcher = ShareMatcher::new(Secp256k1Sharing, HistoryParameters::default());
            for (sender, data) in order {
                assert_eq!(matcher.record_share(&token, *sender, data).unwrap(), RecordOutcome::Recorded);
            }

            assert_eq!(matcher.state(&token), Some(TokenState::Pending));
            assert!(matcher.try_match_token(&token));
            assert_eq!(matcher.state(&token), Some(TokenState::Matched));
        }
    }

    #[test]
    fn test_unrelated_pairs_do_not_match() {
        let Scenario {
            token,
            honest,
            unrelated,
        } = scenario();

        let matcher = ShareMatcher::new(Secp256k1Sharing, HistoryParameters::default());
        matcher.record_share(&token, honest[0].0, &honest[0].1).unwrap();
        matcher.record_share(&token, unrelated.0, &unrelated.1).unwrap();

        assert!(!matcher.try_match_token(&token));
        assert_eq!(matcher.state(&token), Some(TokenState::Pending));

        // A different candidate never matches, even with honest shares
        matcher.record_share(&token, honest[1].0, &honest[1].1).unwrap();
        let other = token.to_address().unwrap();
        let (A1, _) = other.decompress().unwrap();
        let swapped = AbAddress::from_keys(&A1, &A1);
        assert!(!matcher.try_match(&token, &swapped));
        assert!(matcher.try_match(&token, &other));
    }

    #[test]
    fn test_single_sender_never_combines() {
        let Scenario { token, honest, .. } = scenario();
        let matcher = ShareMatcher::new(CountingCombiner::default(), HistoryParameters::default());

        // Nothing recorded
        assert!(!matcher.try_match_token(&token));

        // One sender, even if repeated
        matcher.record_share(&token, 7, &honest[0].1).unwrap();
        assert_eq!(
            matcher.record_share(&token, 7, &honest[1].1).unwrap(),
            RecordOutcome::DuplicateSender
        );
        assert_eq!(matcher.sender_count(&token), 1);
        assert!(!matcher.try_match_token(&token));
        assert_eq!(matcher.combiner.calls.load(Ordering::SeqCst), 0);

        // With a second sender, every entry combination is tried
        matcher.record_share(&token, 8, &honest[1].1).unwrap();
        assert!(!matcher.try_match_token(&token));
        assert_eq!(matcher.combiner.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_ingest_messages() {
        let Scenario { token, honest, .. } = scenario();
        let matcher = ShareMatcher::new(Secp256k1Sharing, HistoryParameters::default());

        for (sender, data) in &honest {
            let entries = split_share_entries(data).unwrap();
            let raw = PubShareMessage::new(token.clone(), 99, *sender, &entries)
                .unwrap()
                .encode();
            assert_eq!(matcher.ingest(&raw).unwrap(), RecordOutcome::Recorded);
            assert_eq!(matcher.ingest(&raw).unwrap(), RecordOutcome::DuplicateSender);
        }
        assert!(matcher.try_match_token(&token));

        // Malformed messages are rejected whole
        let raw = PubShareMessage::new(token.clone(), 99, 5, &split_share_entries(&honest[0].1).unwrap())
            .unwrap()
            .encode();
        assert!(matcher.ingest(&raw[..raw.len() - 1]).is_err());
        assert_eq!(matcher.sender_count(&token), 2);
    }

    #[test]
    fn test_share_limits() {
        let Scenario { token, honest, .. } = scenario();
        let params = HistoryParameters::new(8, 2, 1, None).unwrap();
        let matcher = ShareMatcher::new(Secp256k1Sharing, params);

        // Two entries exceed the per-message limit
        assert!(matches!(
            matcher.record_share(&token, 1, &honest[0].1),
            Err(MessageError::TooManyShares { count: 2, limit: 1 })
        ));
        assert!(matches!(
            matcher.record_share(&token, 1, ""),
            Err(MessageError::MalformedMessage { .. })
        ));
        assert!(matches!(
            matcher.record_share(&token, 1, &honest[0].1[..FIELD_LENGTH]),
            Err(MessageError::MisalignedShareData { .. })
        ));
        assert_eq!(matcher.sender_count(&token), 0);
    }

    #[test]
    fn test_confirm_evicts() {
        let Scenario { token, honest, .. } = scenario();
        let matcher = ShareMatcher::new(Secp256k1Sharing, HistoryParameters::default());
        for (sender, data) in &honest {
            matcher.record_share(&token, *sender, data).unwrap();
        }
        assert!(matcher.try_match_token(&token));

        assert!(matcher.confirm(&token));
        assert_eq!(matcher.state(&token), None);
        assert!(!matcher.try_match_token(&token));
        assert_eq!(matcher.prune_expired(), 0);
    }

    #[test]
    fn test_undecodable_token() {
        let token = ScanToken::new(&"zz".repeat(66)).unwrap();
        let Scenario { honest, .. } = scenario();
        let matcher = ShareMatcher::new(Secp256k1Sharing, HistoryParameters::default());
        for (sender, data) in &honest {
            matcher.record_share(&token, *sender, data).unwrap();
        }

        assert!(!matcher.try_match_token(&token));
        assert_eq!(matcher.state(&token), Some(TokenState::Pending));
    }

    #[test]
    fn test_match_does_not_mark_a_newer_token() {
        let Scenario {
            token,
            honest,
            unrelated,
        } = scenario();

        let combiner = InterleavingCombiner {
            matcher: OnceLock::new(),
            token: token.clone(),
            replacement: vec![(5, unrelated.1.clone()), (6, unrelated.1)],
            fired: AtomicBool::new(false),
        };
        let matcher = Arc::new(ShareMatcher::new(combiner, HistoryParameters::default()));
        assert!(matcher.combiner.matcher.set(Arc::downgrade(&matcher)).is_ok());
        for (sender, data) in &honest {
            matcher.record_share(&token, *sender, data).unwrap();
        }

        // The honest shares still match, but the token now tracked holds only the replacement shares
        assert!(matcher.try_match_token(&token));
        assert_eq!(matcher.sender_count(&token), 2);
        assert_eq!(matcher.state(&token), Some(TokenState::Pending));
        assert!(!matcher.try_match_token(&token));
        assert_eq!(matcher.state(&token), Some(TokenState::Pending));
    }

    #[test]
    fn test_matcher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ShareMatcher<Secp256k1Sharing>>();
    }

    #[test]
    fn test_concurrent_record_and_match() {
        const EXTRA_SENDERS: u64 = 6;

        let Scenario {
            token,
            honest,
            unrelated,
        } = scenario();
        let matcher = ShareMatcher::new(Secp256k1Sharing, HistoryParameters::default());
        let (matcher, token) = (&matcher, &token);

        thread::scope(|scope| {
            for (sender, data) in &honest {
                scope.spawn(move || {
                    assert_eq!(matcher.record_share(token, *sender, data).unwrap(), RecordOutcome::Recorded);
                });
            }
            for sender in 10..10 + EXTRA_SENDERS {
                let data = &unrelated.1;
                scope.spawn(move || {
                    assert_eq!(matcher.record_share(token, sender, data).unwrap(), RecordOutcome::Recorded);
                    // A repeat is still a duplicate
                    assert_eq!(
                        matcher.record_share(token, sender, data).unwrap(),
                        RecordOutcome::DuplicateSender
                    );
                });
            }
            for _ in 0..2 {
                scope.spawn(move || {
                    for _ in 0..3 {
                        matcher.try_match_token(token);
                    }
                });
            }
        });

        assert_eq!(matcher.sender_count(token), 2 + EXTRA_SENDERS as usize);
        assert!(matcher.try_match_token(token));
        assert_eq!(matcher.state(token), Some(TokenState::Matched));
    }
}
