// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

//! Ledger-facing functionality.
//!
//! Committee members read certificate records out of the authentication contract's storage and submit transactions
//! to the ledger. Contract storage follows the usual word-addressed layout: dynamic arrays and mappings at a base slot
//! keep their elements at slots derived with Keccak-256, and dynamic byte fields keep a length word at their own slot
//! and their data in consecutive words starting at the hash of that slot.
//!
//! Access to the ledger itself is abstracted behind [`LedgerStorage`] and [`LedgerSubmitter`].

/// Confirmation call encoding and transaction submission.
pub mod call;
pub use call::{encode_confirm_call, LedgerSubmitter, SubmissionId, SubmitError};
/// Certificate record decoding.
pub mod decoder;
pub use decoder::{DecodeError, LedgerStorage, RecordDecoder, StorageError, UnconfirmedRecord};
/// Storage slot derivation.
pub mod slot;
pub use slot::StorageSlot;
