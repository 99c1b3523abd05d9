//! Wallet addresses.
//!
//! An address is the last 20 bytes of the Keccak-256 hash of an uncompressed
//! secp256k1 public key (without its `0x04` tag). It is stored and compared
//! in lowercase hex; the mixed-case EIP-55 form is only used for display.

use std::fmt;
use std::str::FromStr;

use secp256k1::PublicKey;
use thiserror::Error;

use super::recover::keccak256;
use crate::config::{WALLET_EMAIL_DOMAIN, WALLET_NAME_PREFIX};

/// Number of bytes in an address.
pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address must start with 0x")]
    MissingPrefix,

    #[error("address must have 40 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("address contains non-hex characters")]
    InvalidHex,
}

/// A 20-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalletAddress([u8; ADDRESS_LEN]);

impl WalletAddress {
    /// Parses `0x` followed by 40 hex digits, in any case.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AddressError::Empty);
        }
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Address controlled by `key`.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let uncompressed = key.serialize_uncompressed();
        let hash = keccak256(&uncompressed[1..]);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash[32 - ADDRESS_LEN..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// `0x` + 40 lowercase hex digits. The storage and comparison form.
    pub fn to_lowercase_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 mixed-case checksum form.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Display name given to a wallet identity that did not choose one.
    pub fn default_name(&self) -> String {
        format!("{}{}", WALLET_NAME_PREFIX, &self.to_lowercase_hex()[..8])
    }

    /// Placeholder e-mail for the credential record.
    pub fn synthetic_email(&self) -> String {
        format!("{}@{}", &self.to_lowercase_hex()[2..10], WALLET_EMAIL_DOMAIN)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lowercase_hex())
    }
}

impl FromStr for WalletAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_case_input_normalizes_to_lowercase() {
        let address = WalletAddress::parse("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(
            address.to_string(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert_eq!(
            address,
            WalletAddress::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap()
        );
    }

    #[test]
    fn eip55_checksum() {
        let address = WalletAddress::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(address.to_checksum(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");

        let address = WalletAddress::parse("0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359").unwrap();
        assert_eq!(address.to_checksum(), "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(WalletAddress::parse(""), Err(AddressError::Empty));
        assert_eq!(
            WalletAddress::parse("abcdef0123456789abcdef0123456789abcdef01"),
            Err(AddressError::MissingPrefix)
        );
        assert_eq!(
            WalletAddress::parse("0xabcdef"),
            Err(AddressError::InvalidLength(6))
        );
        assert_eq!(
            WalletAddress::parse("0xzzcdef0123456789abcdef0123456789abcdef01"),
            Err(AddressError::InvalidHex)
        );
    }

    #[test]
    fn derived_placeholders() {
        let address = WalletAddress::parse("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(address.default_name(), "Oracle-0xabcdef");
        assert_eq!(address.synthetic_email(), "abcdef01@wallet.oraclenet");
    }

    #[test]
    fn address_of_known_key() {
        let secp = secp256k1::Secp256k1::new();
        let mut raw = [0u8; 32];
        raw[31] = 1;
        let secret = secp256k1::SecretKey::from_slice(&raw).unwrap();
        let public = PublicKey::from_secret_key(&secp, &secret);
        assert_eq!(
            WalletAddress::from_public_key(&public).to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }
}
