// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use k256::PublicKey;
use snafu::prelude::*;
use tracing::{info, warn};

use crate::{
    ledger::{encode_confirm_call, LedgerSubmitter, SubmissionId, SubmitError},
    message::{PubShareMessage, ScanToken},
    parameters::LedgerParameters,
    sharing::{Secp256k1Sharing, ShareKey},
};

/// Errors that can arise acting as a committee member.
#[derive(Debug, Snafu)]
pub enum CommitteeError {
    /// A message could not be built.
    #[snafu(display("Committee message could not be encoded: {reason}"))]
    Encoding {
        /// The reason the message could not be built.
        reason: &'static str,
    },
    /// The ledger did not accept the transaction.
    #[snafu(display("Committee transaction was not submitted"))]
    SubmissionFailed {
        /// The underlying submission error.
        source: SubmitError,
    },
}

/// A committee member holding a secret share of the system key.
///
/// The member publishes its public shares for verification requests to the verifier address, and confirms
/// certificates at the authentication contract.
pub struct CommitteeMember<L> {
    sender_id: u64,
    share_key: ShareKey,
    sharing: Secp256k1Sharing,
    submitter: L,
    params: LedgerParameters,
}

impl<L: LedgerSubmitter> CommitteeMember<L> {
    /// Create a committee member that identifies itself as `sender_id` and submits through `submitter`.
    pub fn new(sender_id: u64, share_key: ShareKey, submitter: L, params: LedgerParameters) -> Self {
        Self {
            sender_id,
            share_key,
            sharing: Secp256k1Sharing,
            submitter,
            params,
        }
    }

    /// Get this member's sender ID.
    pub fn sender_id(&self) -> u64 {
        self.sender_id
    }

    /// Get the ledger parameters.
    pub fn get_params(&self) -> &LedgerParameters {
        &self.params
    }

    /// Build the public-share message for `token` and certificate `cert_id` over the requester's `keys`.
    ///
    /// At least one key is required.
    pub fn pub_shares_message(
        &self,
        token: &ScanToken,
        cert_id: u64,
        keys: &[PublicKey],
    ) -> Result<PubShareMessage, CommitteeError> {
        let entries = self.sharing.generate_pub_shares(&self.share_key, keys);

        PubShareMessage::new(token.clone(), cert_id, self.sender_id, &entries).map_err(|_| CommitteeError::Encoding {
            reason: "no public shares to send",
        })
    }

    /// Publish this member's public shares for `token` to the verifier address.
    pub fn publish_pub_shares(
        &self,
        token: &ScanToken,
        cert_id: u64,
        keys: &[PublicKey],
    ) -> Result<SubmissionId, CommitteeError> {
        let message = self.pub_shares_message(token, cert_id, keys)?;
        let recipient = self.params.get_verifier_address();

        let submission = self
            .submitter
            .submit(recipient, message.encode().as_bytes())
            .inspect_err(|error| warn!(%token, cert_id, %error, "Could not publish public shares"))
            .context(SubmissionFailedSnafu)?;
        info!(%token, cert_id, shares = message.share_count(), %submission, "Published public shares");

        Ok(submission)
    }

    /// Confirm certificate `cert_id` with status code `status` at the authentication contract.
    pub fn submit_confirmation(&self, cert_id: u64, status: u64) -> Result<SubmissionId, CommitteeError> {
        let submission = self
            .submitter
            .submit(
                self.params.get_authentication_contract(),
                &encode_confirm_call(cert_id, status),
            )
            .inspect_err(|error| warn!(cert_id, status, %error, "Could not submit confirmation"))
            .context(SubmissionFailedSnafu)?;
        info!(cert_id, status, %submission, "Submitted confirmation");

        Ok(submission)
    }
}
