// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::Instant,
    vec::Vec,
};

use tracing::debug;

use crate::{
    message::{ScanToken, ShareEntry},
    parameters::HistoryParameters,
};

/// The result of recording a committee member's shares.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordOutcome {
    /// The shares were added to the history.
    Recorded,
    /// The sender already contributed shares for this token; nothing changed.
    DuplicateSender,
    /// The token already holds shares from the maximum number of senders; nothing changed.
    SenderLimitReached,
}

/// The matching state of a scan token.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenState {
    /// Shares are accumulating and no pair has matched yet.
    Pending,
    /// A pair of shares reconstructed the scan target.
    Matched,
}

/// The share entries one committee member contributed for a scan token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SenderShares {
    sender_id: u64,
    entries: Vec<ShareEntry>,
}

impl SenderShares {
    /// Get the sending committee member's ID.
    pub fn sender_id(&self) -> u64 {
        self.sender_id
    }

    /// Get the share entries, in message order.
    pub fn entries(&self) -> &[ShareEntry] {
        &self.entries
    }
}

struct TokenShares {
    generation: u64,
    senders: HashSet<u64>,
    messages: Vec<SenderShares>,
    first_seen: Instant,
    state: TokenState,
}

/// A bounded history of public shares, keyed by scan token.
///
/// Each token keeps its messages in arrival order alongside the set of senders already recorded, so a sender is
/// only ever counted once per token.
///
/// Every time a token starts being tracked it gets a fresh generation number. A token that is evicted and recorded
/// again is a different generation, so state derived from an earlier snapshot can be told apart from the current one.
pub struct ShareHistory {
    params: HistoryParameters,
    next_generation: u64,
    tokens: HashMap<ScanToken, TokenShares>,
    // Insertion order, oldest first
    order: VecDeque<ScanToken>,
}

impl ShareHistory {
    /// Create an empty history with the given bounds.
    pub fn new(params: HistoryParameters) -> Self {
        Self {
            params,
            next_generation: 0,
            tokens: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record the shares `entries` sent by `sender_id` for `token`.
    ///
    /// Recording is idempotent per sender and token. Recording for a new token when the history is full evicts the
    /// oldest token.
    pub fn record(
        &mut self,
        token: &ScanToken,
        sender_id: u64,
        entries: Vec<ShareEntry>,
        now: Instant,
    ) -> RecordOutcome {
        if !self.tokens.contains_key(token) {
            while self.tokens.len() >= self.params.get_max_tokens() {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                debug!(token = %oldest, "History full, evicting oldest scan token");
                self.tokens.remove(&oldest);
            }

            let generation = self.next_generation;
            self.next_generation = self.next_generation.wrapping_add(1);
            self.tokens.insert(token.clone(), TokenShares {
                generation,
                senders: HashSet::new(),
                messages: Vec::new(),
                first_seen: now,
                state: TokenState::Pending,
            });
            self.order.push_back(token.clone());
        }

        let Some(shares) = self.tokens.get_mut(token) else {
            return RecordOutcome::SenderLimitReached;
        };
        if shares.senders.contains(&sender_id) {
            return RecordOutcome::DuplicateSender;
        }
        if shares.messages.len() >= self.params.get_max_senders() {
            return RecordOutcome::SenderLimitReached;
        }

        shares.senders.insert(sender_id);
        shares.messages.push(SenderShares { sender_id, entries });

        RecordOutcome::Recorded
    }

    /// Get the messages recorded for `token`, in arrival order.
    pub fn messages(&self, token: &ScanToken) -> Option<&[SenderShares]> {
        self.tokens.get(token).map(|shares| shares.messages.as_slice())
    }

    /// Get the generation of `token` along with its messages, if it is tracked.
    pub fn snapshot(&self, token: &ScanToken) -> Option<(u64, &[SenderShares])> {
        self.tokens
            .get(token)
            .map(|shares| (shares.generation, shares.messages.as_slice()))
    }

    /// Get the number of distinct senders recorded for `token`.
    pub fn sender_count(&self, token: &ScanToken) -> usize {
        self.tokens.get(token).map_or(0, |shares| shares.senders.len())
    }

    /// Get the matching state of `token`, if it is tracked.
    pub fn state(&self, token: &ScanToken) -> Option<TokenState> {
        self.tokens.get(token).map(|shares| shares.state)
    }

    /// Mark `token` as matched, if it is still tracked at `generation`.
    ///
    /// Returns whether the token was marked. A token that was dropped and recorded again since the snapshot was taken
    /// is left alone.
    pub fn mark_matched(&mut self, token: &ScanToken, generation: u64) -> bool {
        match self.tokens.get_mut(token) {
            Some(shares) if shares.generation == generation => {
                shares.state = TokenState::Matched;
                true
            },
            _ => false,
        }
    }

    /// Drop `token`, returning whether it was tracked.
    pub fn evict(&mut self, token: &ScanToken) -> bool {
        if self.tokens.remove(token).is_none() {
            return false;
        }
        self.order.retain(|item| item != token);

        true
    }

    /// Drop every token first seen more than the configured TTL before `now`, returning how many were dropped.
    pub fn prune_expired(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.params.get_token_ttl() else {
            return 0;
        };

        let before = self.tokens.len();
        self.tokens
            .retain(|_, shares| now.saturating_duration_since(shares.first_seen) <= ttl);
        let tokens = &self.tokens;
        self.order.retain(|token| tokens.contains_key(token));

        before - self.tokens.len()
    }

    /// Get the number of tracked tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check whether no tokens are tracked.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::{format, time::Duration, vec};

    use super::*;
    use crate::message::{FIELD_LENGTH, SCAN_TOKEN_LENGTH};

    fn token(seed: u8) -> ScanToken {
        ScanToken::new(&format!("{seed:02x}").repeat(SCAN_TOKEN_LENGTH / 2)).unwrap()
    }

    fn entry() -> ShareEntry {
        ShareEntry::new(&"A".repeat(3 * FIELD_LENGTH)).unwrap()
    }

    #[test]
    fn test_dedup_senders() {
        let mut history = ShareHistory::new(HistoryParameters::default());
        let now = Instant::now();

        assert_eq!(history.record(&token(1), 7, vec![entry()], now), RecordOutcome::Recorded);
        assert_eq!(
            history.record(&token(1), 7, vec![entry(), entry()], now),
            RecordOutcome::DuplicateSender
        );

        // Exactly one message from sender 7, and it is the first one
        let messages = history.messages(&token(1)).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_id(), 7);
        assert_eq!(messages[0].entries().len(), 1);
        assert_eq!(history.sender_count(&token(1)), 1);

        // The same sender may contribute to another token
        assert_eq!(history.record(&token(2), 7, vec![entry()], now), RecordOutcome::Recorded);
        assert_eq!(history.state(&token(2)), Some(TokenState::Pending));
    }

    #[test]
    fn test_sender_limit() {
        let params = HistoryParameters::new(4, 2, 1, None).unwrap();
        let mut history = ShareHistory::new(params);
        let now = Instant::now();

        assert_eq!(history.record(&token(1), 1, vec![entry()], now), RecordOutcome::Recorded);
        assert_eq!(history.record(&token(1), 2, vec![entry()], now), RecordOutcome::Recorded);
        assert_eq!(
            history.record(&token(1), 3, vec![entry()], now),
            RecordOutcome::SenderLimitReached
        );
        assert_eq!(history.sender_count(&token(1)), 2);
    }

    #[test]
    fn test_token_limit_evicts_oldest() {
        let params = HistoryParameters::new(2, 2, 1, None).unwrap();
        let mut history = ShareHistory::new(params);
        let now = Instant::now();

        history.record(&token(1), 1, vec![entry()], now);
        history.record(&token(2), 1, vec![entry()], now);
        history.record(&token(3), 1, vec![entry()], now);

        assert_eq!(history.len(), 2);
        assert!(history.messages(&token(1)).is_none());
        assert!(history.messages(&token(2)).is_some());
        assert!(history.messages(&token(3)).is_some());
    }

    #[test]
    fn test_evict_and_mark() {
        let mut history = ShareHistory::new(HistoryParameters::default());
        let now = Instant::now();

        history.record(&token(1), 1, vec![entry()], now);
        let (generation, _) = history.snapshot(&token(1)).unwrap();
        assert!(history.mark_matched(&token(1), generation));
        assert_eq!(history.state(&token(1)), Some(TokenState::Matched));

        assert!(history.evict(&token(1)));
        assert!(!history.evict(&token(1)));
        assert!(history.is_empty());
        assert_eq!(history.state(&token(1)), None);
        assert!(!history.mark_matched(&token(1), generation));
    }

    #[test]
    fn test_mark_ignores_earlier_generation() {
        let mut history = ShareHistory::new(HistoryParameters::default());
        let now = Instant::now();

        history.record(&token(1), 1, vec![entry()], now);
        let (stale, _) = history.snapshot(&token(1)).unwrap();

        // The token is dropped and tracked again from scratch
        history.evict(&token(1));
        history.record(&token(1), 5, vec![entry()], now);
        let (current, messages) = history.snapshot(&token(1)).unwrap();
        assert_ne!(current, stale);
        assert_eq!(messages.len(), 1);

        assert!(!history.mark_matched(&token(1), stale));
        assert_eq!(history.state(&token(1)), Some(TokenState::Pending));
        assert!(history.mark_matched(&token(1), current));
        assert_eq!(history.state(&token(1)), Some(TokenState::Matched));
    }

    #[test]
    fn test_prune_expired() {
        let params = HistoryParameters::new(8, 2, 1, Some(Duration::from_secs(60))).unwrap();
        let mut history = ShareHistory::new(params);
        let start = Instant::now();

        history.record(&token(1), 1, vec![entry()], start);
        history.record(&token(2), 1, vec![entry()], start + Duration::from_secs(30));

        assert_eq!(history.prune_expired(start + Duration::from_secs(60)), 0);
        assert_eq!(history.prune_expired(start + Duration::from_secs(61)), 1);
        assert!(history.messages(&token(1)).is_none());
        assert!(history.messages(&token(2)).is_some());

        // Without a TTL nothing expires
        let mut history = ShareHistory::new(HistoryParameters::new(8, 2, 1, None).unwrap());
        history.record(&token(1), 1, vec![entry()], start);
        assert_eq!(history.prune_expired(start + Duration::from_secs(1_000_000)), 0);
    }
}
