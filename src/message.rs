// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::{
    borrow::ToOwned,
    format,
    string::String,
    vec::Vec,
};
use core::fmt;

use snafu::prelude::*;

use crate::address::{AbAddress, AddressError};

/// Width of the leading message tag.
pub const TAG_LENGTH: usize = 2;
/// Width of a scan token.
pub const SCAN_TOKEN_LENGTH: usize = 132;
/// Width of every fixed-width field: decimal numbers, share owner IDs and coordinates.
pub const FIELD_LENGTH: usize = 44;
/// Width of a single share entry: owner ID, `X` and `Y`.
pub const SHARE_ENTRY_LENGTH: usize = 3 * FIELD_LENGTH;
/// Width of the message header preceding the share entries.
pub const HEADER_LENGTH: usize = TAG_LENGTH + SCAN_TOKEN_LENGTH + 3 * FIELD_LENGTH;
/// Shortest acceptable message: a header and one share entry.
pub const MIN_MESSAGE_LENGTH: usize = HEADER_LENGTH + SHARE_ENTRY_LENGTH;
/// Tag written in front of encoded messages.
pub const MESSAGE_TAG: &str = "0x";

const CERT_ID_OFFSET: usize = TAG_LENGTH + SCAN_TOKEN_LENGTH;
const SENDER_ID_OFFSET: usize = CERT_ID_OFFSET + FIELD_LENGTH;
const SHARE_COUNT_OFFSET: usize = SENDER_ID_OFFSET + FIELD_LENGTH;

/// Errors that can arise relating to public-share messages.
#[derive(Debug, Snafu)]
pub enum MessageError {
    /// The message is too short or otherwise unusable.
    #[snafu(display("Malformed public-share message: {reason}"))]
    MalformedMessage {
        /// The reason for the error.
        reason: &'static str,
    },
    /// A fixed-width numeric field was not a non-negative decimal integer.
    #[snafu(display("Could not parse the {field} field"))]
    FieldParseError {
        /// The field that failed to parse.
        field: &'static str,
    },
    /// The declared share count needs more data than the message carries.
    #[snafu(display("Message declares {declared} shares but is only {actual} bytes long"))]
    TruncatedShares {
        /// The declared share count.
        declared: u64,
        /// The actual message length.
        actual: usize,
    },
    /// The message carries data beyond its declared share entries.
    #[snafu(display("Message declares {declared} shares but is {actual} bytes long"))]
    TrailingShareData {
        /// The declared share count.
        declared: u64,
        /// The actual message length.
        actual: usize,
    },
    /// Share data is not a whole number of share entries.
    #[snafu(display("Share data of length {length} is not a multiple of the entry width"))]
    MisalignedShareData {
        /// The share data length.
        length: usize,
    },
    /// A message carries more share entries than allowed.
    #[snafu(display("Message carries {count} shares, more than the limit of {limit}"))]
    TooManyShares {
        /// The number of share entries.
        count: usize,
        /// The configured limit.
        limit: usize,
    },
}

/// Format a number as a zero-left-padded decimal field.
pub fn format_field(value: u64) -> String {
    format!("{value:0>width$}", width = FIELD_LENGTH)
}

// Parse a fixed-width decimal field; signs and padding other than leading zeros are rejected
fn parse_field(text: &str, field: &'static str) -> Result<u64, MessageError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MessageError::FieldParseError { field });
    }

    text.parse::<u64>().map_err(|_| MessageError::FieldParseError { field })
}

/// An opaque scan token identifying a verification request.
///
/// The token is the hex encoding of an [`AbAddress`]-shaped value carrying the identity point `A1` and the
/// scan-auxiliary point `S1`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ScanToken(String);

impl ScanToken {
    /// Wrap token text, which must be exactly [`SCAN_TOKEN_LENGTH`] ASCII characters.
    pub fn new(text: &str) -> Result<Self, MessageError> {
        if text.len() != SCAN_TOKEN_LENGTH || !text.is_ascii() {
            return Err(MessageError::MalformedMessage {
                reason: "scan token must be 132 ASCII characters",
            });
        }

        Ok(Self(text.to_owned()))
    }

    /// Build the token naming a pair of points.
    pub fn from_address(address: &AbAddress) -> Self {
        Self(address.to_hex())
    }

    /// Decode the token into its point pair.
    pub fn to_address(&self) -> Result<AbAddress, AddressError> {
        AbAddress::from_hex(&self.0)
    }

    /// Get the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single public-share entry: the share owner's ID followed by the `X` and `Y` coordinates of its public share.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ShareEntry(String);

impl ShareEntry {
    /// Wrap entry text, which must be exactly [`SHARE_ENTRY_LENGTH`] ASCII characters.
    pub fn new(text: &str) -> Result<Self, MessageError> {
        if text.len() != SHARE_ENTRY_LENGTH || !text.is_ascii() {
            return Err(MessageError::MisalignedShareData { length: text.len() });
        }

        Ok(Self(text.to_owned()))
    }

    /// Build an entry from its three fixed-width fields.
    pub fn from_fields(owner_id: &str, x: &str, y: &str) -> Result<Self, MessageError> {
        if [owner_id, x, y].iter().any(|field| field.len() != FIELD_LENGTH) {
            return Err(MessageError::MalformedMessage {
                reason: "share entry fields must be 44 characters",
            });
        }

        Self::new(&format!("{owner_id}{x}{y}"))
    }

    /// Get the share owner's ID field.
    pub fn owner_id(&self) -> &str {
        &self.0[..FIELD_LENGTH]
    }

    /// Get the `X` coordinate field.
    pub fn x(&self) -> &str {
        &self.0[FIELD_LENGTH..2 * FIELD_LENGTH]
    }

    /// Get the `Y` coordinate field.
    pub fn y(&self) -> &str {
        &self.0[2 * FIELD_LENGTH..]
    }

    /// Get the entry text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Split share data into its fixed-width entries, preserving order.
///
/// If the data is not a whole number of entries, returns [`MessageError::MisalignedShareData`].
pub fn split_share_entries(blob: &str) -> Result<Vec<ShareEntry>, MessageError> {
    if blob.len() % SHARE_ENTRY_LENGTH != 0 || !blob.is_ascii() {
        return Err(MessageError::MisalignedShareData { length: blob.len() });
    }

    blob.as_bytes()
        .chunks(SHARE_ENTRY_LENGTH)
        .map(|chunk| {
            core::str::from_utf8(chunk)
                .map_err(|_| MessageError::MisalignedShareData { length: blob.len() })
                .and_then(ShareEntry::new)
        })
        .collect()
}

/// Encode a committee member's share payload: the entry count followed by the entries.
pub fn encode_share_entries(entries: &[ShareEntry]) -> String {
    let mut out = String::with_capacity(FIELD_LENGTH + entries.len() * SHARE_ENTRY_LENGTH);
    out.push_str(&format_field(entries.len() as u64));
    for entry in entries {
        out.push_str(entry.as_str());
    }
    out
}

/// A public-share message broadcast by a committee member.
///
/// The wire layout is a 2-character tag, the 132-character scan token, the certificate ID, sender ID and share count
/// as 44-character decimal fields, then the share entries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PubShareMessage {
    token: ScanToken,
    cert_id: u64,
    sender_id: u64,
    share_count: u64,
    share_data: String,
}

impl PubShareMessage {
    /// Build a message from its parts.
    ///
    /// At least one share entry is required, since the wire format cannot carry an empty message.
    pub fn new(
        token: ScanToken,
        cert_id: u64,
        sender_id: u64,
        entries: &[ShareEntry],
    ) -> Result<Self, MessageError> {
        if entries.is_empty() {
            return Err(MessageError::MalformedMessage {
                reason: "a message needs at least one share entry",
            });
        }
        let share_data = entries.iter().map(ShareEntry::as_str).collect::<String>();

        Ok(Self {
            token,
            cert_id,
            sender_id,
            share_count: entries.len() as u64,
            share_data,
        })
    }

    /// Decode a message from its wire text.
    ///
    /// Decoding is all-or-nothing: any length or field error rejects the whole message.
    pub fn decode(raw: &str) -> Result<Self, MessageError> {
        if !raw.is_ascii() {
            return Err(MessageError::MalformedMessage {
                reason: "message is not ASCII",
            });
        }
        if raw.len() < MIN_MESSAGE_LENGTH {
            return Err(MessageError::MalformedMessage {
                reason: "message is shorter than a header and one share entry",
            });
        }

        let token = ScanToken::new(&raw[TAG_LENGTH..CERT_ID_OFFSET])?;
        let cert_id = parse_field(&raw[CERT_ID_OFFSET..SENDER_ID_OFFSET], "certificate ID")?;
        let sender_id = parse_field(&raw[SENDER_ID_OFFSET..SHARE_COUNT_OFFSET], "sender ID")?;
        let share_count = parse_field(&raw[SHARE_COUNT_OFFSET..HEADER_LENGTH], "share count")?;

        // A count too large to express a length can never fit
        let expected = usize::try_from(share_count)
            .ok()
            .and_then(|count| count.checked_mul(SHARE_ENTRY_LENGTH))
            .and_then(|length| length.checked_add(HEADER_LENGTH))
            .ok_or(MessageError::TruncatedShares {
                declared: share_count,
                actual: raw.len(),
            })?;
        if raw.len() < expected {
            return Err(MessageError::TruncatedShares {
                declared: share_count,
                actual: raw.len(),
            });
        }
        if raw.len() > expected {
            return Err(MessageError::TrailingShareData {
                declared: share_count,
                actual: raw.len(),
            });
        }

        Ok(Self {
            token,
            cert_id,
            sender_id,
            share_count,
            share_data: raw[HEADER_LENGTH..].to_owned(),
        })
    }

    /// Encode the message to its wire text.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(HEADER_LENGTH + self.share_data.len());
        out.push_str(MESSAGE_TAG);
        out.push_str(self.token.as_str());
        out.push_str(&format_field(self.cert_id));
        out.push_str(&format_field(self.sender_id));
        out.push_str(&format_field(self.share_count));
        out.push_str(&self.share_data);
        out
    }

    /// Split the share data into entries.
    pub fn entries(&self) -> Result<Vec<ShareEntry>, MessageError> {
        split_share_entries(&self.share_data)
    }

    /// Get the scan token.
    pub fn token(&self) -> &ScanToken {
        &self.token
    }

    /// Get the certificate ID.
    pub fn cert_id(&self) -> u64 {
        self.cert_id
    }

    /// Get the sending committee member's ID.
    pub fn sender_id(&self) -> u64 {
        self.sender_id
    }

    /// Get the declared share count.
    pub fn share_count(&self) -> u64 {
        self.share_count
    }

    /// Get the raw share data.
    pub fn share_data(&self) -> &str {
        &self.share_data
    }
}
