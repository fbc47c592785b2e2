// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

use alloc::string::String;
use core::{fmt, str::FromStr};

use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey};
use snafu::prelude::*;

use crate::util::keccak256;

/// Length of a compressed secp256k1 point.
pub const COMPRESSED_POINT_LENGTH: usize = 33;
/// Length of an [`AbAddress`].
pub const AB_ADDRESS_LENGTH: usize = 2 * COMPRESSED_POINT_LENGTH;
/// Length of a [`LedgerAddress`].
pub const LEDGER_ADDRESS_LENGTH: usize = 20;

/// The uncompressed system public key `B`, shared by every AB address.
pub const SYSTEM_PUBLIC_KEY: [u8; 65] = [
    0x04, 0xe5, 0x24, 0xec, 0x82, 0x93, 0x01, 0x78, 0x32, 0xc2, 0xd1, 0xe2, 0x9d, 0xe5, 0xd4, 0xb8, 0x57, 0xd1, 0x50,
    0x87, 0x64, 0x6b, 0x88, 0x84, 0x6f, 0xb9, 0x2f, 0x74, 0x95, 0x51, 0xe1, 0x9f, 0xa1, 0xda, 0x92, 0xbc, 0xb5, 0x44,
    0x07, 0xcf, 0x6a, 0xac, 0x98, 0x67, 0x0d, 0xc2, 0xbb, 0xb4, 0xb4, 0x04, 0x36, 0x41, 0xa4, 0x21, 0xd7, 0x4a, 0x2d,
    0x7e, 0x55, 0x35, 0xcd, 0x6d, 0x53, 0x9f, 0x75,
];

/// The compressed system public key `B`.
pub const SYSTEM_KEY_COMPRESSED: [u8; COMPRESSED_POINT_LENGTH] = compress_uncompressed(&SYSTEM_PUBLIC_KEY);

/// Errors that can arise relating to addresses.
#[derive(Debug, Snafu)]
pub enum AddressError {
    /// A key was not a valid curve point.
    #[snafu(display("Invalid key: {reason}"))]
    InvalidKey {
        /// The reason for the error.
        reason: &'static str,
    },
    /// Address text could not be decoded.
    #[snafu(display("Invalid address encoding: {reason}"))]
    InvalidEncoding {
        /// The reason for the error.
        reason: &'static str,
    },
}

// Compress a raw `04 || X || Y` encoding without validating that it lies on the curve, for the built-in system key
const fn compress_uncompressed(raw: &[u8; 65]) -> [u8; COMPRESSED_POINT_LENGTH] {
    let mut out = [0u8; COMPRESSED_POINT_LENGTH];
    out[0] = 0x02 | (raw[64] & 1);
    let mut i = 0;
    while i < 32 {
        out[i + 1] = raw[i + 1];
        i += 1;
    }
    out
}

/// Compress a public key to 33 bytes.
///
/// The prefix is `0x02` if the `Y` coordinate is even and `0x03` if it is odd, followed by the big-endian `X`
/// coordinate left-padded to 32 bytes.
pub fn compress_point(key: &PublicKey) -> [u8; COMPRESSED_POINT_LENGTH] {
    let mut compressed = [0u8; COMPRESSED_POINT_LENGTH];
    // A public key is never the identity, so its compressed encoding is always full length
    compressed.copy_from_slice(key.to_encoded_point(true).as_bytes());

    compressed
}

/// Parse a SEC1-encoded public key, rejecting anything that is not a valid non-identity curve point.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, AddressError> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| AddressError::InvalidKey {
        reason: "not a valid secp256k1 point",
    })
}

/// A 66-byte AB address: a compressed owner key `A` followed by the compressed system key `B`.
///
/// Scan tokens share this layout, carrying the identity point `A1` and the scan-auxiliary point `S1` instead.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct AbAddress([u8; AB_ADDRESS_LENGTH]);

impl AbAddress {
    /// Derive the AB address for a SEC1-encoded owner key.
    ///
    /// The owner key may be compressed or uncompressed. If it is not a valid curve point, returns an
    /// [`AddressError::InvalidKey`].
    pub fn derive(owner_key: &[u8]) -> Result<Self, AddressError> {
        let owner = parse_public_key(owner_key)?;

        Ok(Self::from_public_key(&owner))
    }

    /// Derive the AB address for an owner key.
    pub fn from_public_key(owner: &PublicKey) -> Self {
        Self::from_parts(&compress_point(owner), &SYSTEM_KEY_COMPRESSED)
    }

    /// Build an address-shaped value from two compressed points.
    pub fn from_parts(first: &[u8; COMPRESSED_POINT_LENGTH], second: &[u8; COMPRESSED_POINT_LENGTH]) -> Self {
        let mut bytes = [0u8; AB_ADDRESS_LENGTH];
        bytes[..COMPRESSED_POINT_LENGTH].copy_from_slice(first);
        bytes[COMPRESSED_POINT_LENGTH..].copy_from_slice(second);

        Self(bytes)
    }

    /// Build an address-shaped value from two public keys.
    pub fn from_keys(first: &PublicKey, second: &PublicKey) -> Self {
        Self::from_parts(&compress_point(first), &compress_point(second))
    }

    /// Parse an address from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let bytes: [u8; AB_ADDRESS_LENGTH] = bytes.try_into().map_err(|_| AddressError::InvalidEncoding {
            reason: "address must be 66 bytes",
        })?;

        Ok(Self(bytes))
    }

    /// Parse an address from hex text, with or without a `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self, AddressError> {
        let text = text.strip_prefix("0x").unwrap_or(text);
        let mut bytes = [0u8; AB_ADDRESS_LENGTH];
        hex::decode_to_slice(text, &mut bytes).map_err(|_| AddressError::InvalidEncoding {
            reason: "address must be 132 hex characters",
        })?;

        Ok(Self(bytes))
    }

    /// Decompress both halves of the address into public keys.
    pub fn decompress(&self) -> Result<(PublicKey, PublicKey), AddressError> {
        Ok((
            parse_public_key(self.owner_key())?,
            parse_public_key(self.system_key())?,
        ))
    }

    /// Get the compressed owner key (or `A1` for a scan token).
    pub fn owner_key(&self) -> &[u8] {
        &self.0[..COMPRESSED_POINT_LENGTH]
    }

    /// Get the compressed system key (or `S1` for a scan token).
    pub fn system_key(&self) -> &[u8] {
        &self.0[COMPRESSED_POINT_LENGTH..]
    }

    /// Get the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; AB_ADDRESS_LENGTH] {
        &self.0
    }

    /// Encode the address as lowercase hex without a prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AbAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AbAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AbAddress({})", self.to_hex())
    }
}

impl FromStr for AbAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AbAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for AbAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// A 20-byte ledger account address.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedgerAddress(pub [u8; LEDGER_ADDRESS_LENGTH]);

impl LedgerAddress {
    /// Parse an address from hex text, with or without a `0x` prefix. Checksum casing is not enforced.
    pub fn from_hex(text: &str) -> Result<Self, AddressError> {
        let text = text.strip_prefix("0x").unwrap_or(text);
        let mut bytes = [0u8; LEDGER_ADDRESS_LENGTH];
        hex::decode_to_slice(text, &mut bytes).map_err(|_| AddressError::InvalidEncoding {
            reason: "ledger address must be 40 hex characters",
        })?;

        Ok(Self(bytes))
    }

    /// Encode the address as `0x`-prefixed, mixed-case checksummed hex (EIP-55).
    pub fn to_checksum_hex(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 { hash[i / 2] >> 4 } else { hash[i / 2] & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum_hex())
    }
}

impl FromStr for LedgerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod test {
    use k256::{ProjectivePoint, Scalar};

    use super::*;

    fn key_from_scalar(value: u64) -> PublicKey {
        PublicKey::from_affine((ProjectivePoint::GENERATOR * Scalar::from(value)).to_affine()).unwrap()
    }

    #[test]
    fn test_system_key_compression() {
        // `B` has an odd `Y` coordinate
        assert_eq!(SYSTEM_KEY_COMPRESSED[0], 0x03);
        assert_eq!(&SYSTEM_KEY_COMPRESSED[1..], &SYSTEM_PUBLIC_KEY[1..33]);

        // The constant is a valid point, and compresses the same way the library does
        let system = parse_public_key(&SYSTEM_PUBLIC_KEY).unwrap();
        assert_eq!(compress_point(&system), SYSTEM_KEY_COMPRESSED);
        assert_eq!(
            &compress_point(&system)[..],
            system.to_encoded_point(true).as_bytes()
        );
    }

    #[test]
    fn test_compress_point() {
        let mut prefixes = [false; 2];
        for value in 1u64..=8 {
            let key = key_from_scalar(value);
            let uncompressed = key.to_encoded_point(false);
            let compressed = compress_point(&key);

            // The prefix carries the parity of `Y`, followed by `X`
            assert_eq!(compressed[0], 0x02 | (uncompressed.as_bytes()[64] & 1));
            assert_eq!(&compressed[1..], &uncompressed.as_bytes()[1..33]);
            assert_eq!(parse_public_key(&compressed).unwrap(), key);

            prefixes[usize::from(compressed[0] & 1)] = true;
        }

        // Both parities were exercised
        assert_eq!(prefixes, [true, true]);
    }

    #[test]
    fn test_derive_is_deterministic() {
        for value in [1u64, 2, 3, 0xdead_beef] {
            let key = key_from_scalar(value);

            let from_compressed = AbAddress::derive(key.to_encoded_point(true).as_bytes()).unwrap();
            let from_uncompressed = AbAddress::derive(key.to_encoded_point(false).as_bytes()).unwrap();
            assert_eq!(from_compressed, from_uncompressed);
            assert_eq!(from_compressed.as_bytes().len(), AB_ADDRESS_LENGTH);

            // The system half never changes
            assert_eq!(from_compressed.system_key(), &SYSTEM_KEY_COMPRESSED[..]);

            // The owner half round-trips
            let (owner, system) = from_compressed.decompress().unwrap();
            assert_eq!(owner, key);
            assert_eq!(compress_point(&system), SYSTEM_KEY_COMPRESSED);
        }
    }

    #[test]
    fn test_derive_rejects_invalid_keys() {
        // Not on the curve
        let mut bogus = [0u8; 33];
        bogus[0] = 0x02;
        bogus[32] = 0x05;
        assert!(matches!(AbAddress::derive(&bogus), Err(AddressError::InvalidKey { .. })));

        // Wrong length and bad prefix
        assert!(AbAddress::derive(&[0x02; 20]).is_err());
        assert!(AbAddress::derive(&[0x07; 33]).is_err());
        assert!(AbAddress::derive(&[]).is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let address = AbAddress::from_public_key(&key_from_scalar(42));
        let text = address.to_hex();
        assert_eq!(text.len(), 132);
        assert_eq!(text.parse::<AbAddress>().unwrap(), address);
        assert_eq!(AbAddress::from_hex(&alloc::format!("0x{text}")).unwrap(), address);

        assert!(AbAddress::from_hex(&text[..130]).is_err());
        assert!(AbAddress::from_slice(&[0u8; 65]).is_err());
    }

    #[test]
    fn test_checksum_address() {
        // Vectors from EIP-55
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let address: LedgerAddress = expected.parse().unwrap();
            assert_eq!(address.to_checksum_hex(), expected);
        }

        assert!(LedgerAddress::from_hex("0x1234").is_err());
    }
}
