// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

//! Committee verification of one-time address links to AB addresses.
//!
//! # Overview
//!
//! An account owner registers a persistent identity, the *AB address*: their compressed public key `A` followed by a
//! fixed compressed system key `B`. Later, a one-time address that is otherwise unlinkable to the owner may need to
//! prove that it belongs to that identity. A committee of verifier nodes checks this link with homomorphic secret
//! sharing over secp256k1, so no single member learns the mapping on its own.
//!
//! Each committee member holds a share `t_i` of the system secret `b`, where `B = b*G`. For a verification request,
//! identified by a *scan token* carrying the points `A1` and `S1`, each member broadcasts its public shares `t_i * A`
//! for candidate keys `A`. Any two shares from distinct members interpolate to `b*A`, and the request matches when
//! `H(b*A)*G + S1 = A1`. The requester built `A1` as `H(a*B)*G + S1`, which agrees exactly when `A = a*G`.
//!
//! The crate provides:
//! - [AB address](`crate::address`) derivation and the ledger account address type.
//! - The [public-share message](`crate::message`) wire format.
//! - The [share matching engine](`crate::matcher`), with a bounded per-token [share history](`crate::history`).
//! - A [decoder](`crate::ledger`) for certificate records held in the authentication contract's storage, along with
//!   confirmation call encoding.
//! - The [binding adapter](`crate::binding`), which signs a ledger account into an anonymity set using
//!   [linkable ring signatures](`crate::ring`).
//! - A [committee member](`crate::committee`) that publishes shares and confirmations.
//!
//! Secret sharing and ring signatures sit behind the [`ShareCombiner`] and [`RingScheme`] traits, with default
//! secp256k1 implementations in [`Secp256k1Sharing`] and [`Lsag`]. Ledger access sits behind the [`LedgerStorage`] and
//! [`LedgerSubmitter`] traits; this crate never talks to a node itself.
//!
//! # Implementation notes
//!
//! This implementation makes several opinionated choices:
//! - It uses [secp256k1](https://crates.io/crates/k256) for group operations.
//! - It uses [Merlin](https://merlin.cool/) for Fiat-Shamir transcript operations in ring signatures.
//! - It uses [BLAKE3](https://github.com/BLAKE3-team/BLAKE3) for hashing to scalars and to the curve.
//! - It uses Keccak-256 wherever the ledger does: storage slots, account checksums and binding messages.
//!
//! The core is `no_std` friendly. The share history and matching engine need `std` for locking and time.
//!
//! There are several features available.
//!
//! | Feature | Default? | Description |
//! | :--- | :---: | :--- |
//! | `borsh` | | Adds ring signature serialization and deserialization via [`borsh`](https://crates.io/crates/borsh) |
//! | `rand` | ✓ | Adds signing functionality that supplies a cryptographically-secure random number generator |
//! | `serde` | | Adds serialization and deserialization of addresses, parameters and signatures via [`serde`](https://crates.io/crates/serde) |
//! | `std` | ✓ | Adds the share history and matching engine, and corresponding dependency features |
//!
//! Messages and ring signatures have parsers that are exercised by fuzzers, which can be run using a nightly compiler:
//! `cargo +nightly fuzz run messages` or `cargo +nightly fuzz run signatures`.
//!
//! The library emits [`tracing`](https://crates.io/crates/tracing) events, but never installs a subscriber.
//!
//! # Example
//!
//! Here's how two committee members' shares confirm a requester's scan token; see the documentation for additional
//! functionality.
//!
//! ```
//! # #[cfg(all(feature = "rand", feature = "std"))]
//! # {
//! use ab_committee::*;
//! use k256::{elliptic_curve::Field, NonZeroScalar, ProjectivePoint, PublicKey, Scalar};
//! use rand_core::OsRng;
//!
//! let mut rng = OsRng;
//!
//! // Split a system secret `b` into shares on the line `f(x) = b + c*x`
//! let b = Scalar::random(&mut rng);
//! let c = Scalar::random(&mut rng);
//! let share_key = |id: u64| ShareKey::new(id, &(b + c * Scalar::from(id))).unwrap();
//! let system_key = PublicKey::from_affine((ProjectivePoint::GENERATOR * b).to_affine()).unwrap();
//!
//! // The requester derives a scan token from their owner secret
//! let owner_secret = NonZeroScalar::random(&mut rng);
//! let owner_key = PublicKey::from_secret_scalar(&owner_secret);
//! let sharing = Secp256k1Sharing;
//! let token = ScanToken::from_address(
//!     &sharing
//!         .derive_scan_token(&owner_secret, &system_key, &NonZeroScalar::random(&mut rng))
//!         .unwrap(),
//! );
//!
//! // Two committee members publish their public shares of the owner key
//! let matcher = ShareMatcher::new(sharing, HistoryParameters::default());
//! for id in [1, 2] {
//!     let entries = sharing.generate_pub_shares(&share_key(id), &[owner_key]);
//!     let message = PubShareMessage::new(token.clone(), 7, id, &entries).unwrap();
//!     matcher.ingest(&message.encode()).unwrap();
//! }
//!
//! // Together they confirm the link
//! assert!(matcher.try_match_token(&token));
//! # }
//! ```

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

/// AB addresses and ledger account addresses.
pub mod address;
pub use address::{AbAddress, AddressError, LedgerAddress};
/// Binding ledger accounts to anonymity sets.
pub mod binding;
pub use binding::{BindingAdapter, BindingError, SigningRequest};
/// Committee member actions.
pub mod committee;
pub use committee::{CommitteeError, CommitteeMember};
/// Bounded share history.
#[cfg(feature = "std")]
pub mod history;
#[cfg(feature = "std")]
pub use history::{RecordOutcome, ShareHistory, TokenState};
/// Ledger storage decoding and transaction payloads.
pub mod ledger;
pub use ledger::{DecodeError, LedgerStorage, LedgerSubmitter, RecordDecoder, StorageSlot, UnconfirmedRecord};
/// Share matching.
#[cfg(feature = "std")]
pub mod matcher;
#[cfg(feature = "std")]
pub use matcher::ShareMatcher;
/// The public-share message wire format.
pub mod message;
pub use message::{MessageError, PubShareMessage, ScanToken, ShareEntry};
/// Configuration for the share history and ledger access.
pub mod parameters;
pub use parameters::{HistoryParameters, LedgerParameters, ParameterError, StorageLayout};
/// Linkable ring signatures.
pub mod ring;
pub use ring::{AnonymitySet, LinkableRingSignature, Lsag, RingError, RingScheme};
/// Secret sharing over secp256k1.
pub mod sharing;
pub use sharing::{Secp256k1Sharing, ShareCombiner, ShareKey, SharingError};
/// Various utility functionality.
pub mod util;

/// Domain separators used for hashing operations
pub(crate) mod domains {
    // Version
    pub(crate) const VERSION: u64 = 0;

    // Sharing
    pub(crate) const SCAN_DERIVATION: &str = "AB committee scan derivation";

    // Ring signatures
    pub(crate) const ANONYMITY_SET: &str = "AB committee anonymity set";
    pub(crate) const KEY_IMAGE_BASE: &str = "AB committee key image base";
    pub(crate) const TRANSCRIPT_SIGNATURE: &str = "AB committee ring signature";
}
