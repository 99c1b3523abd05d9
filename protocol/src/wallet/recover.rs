//! # Signer Recovery
//!
//! Wallets sign with the personal-message convention: the payload is
//! prefixed with `"\x19Ethereum Signed Message:\n" + len(message)` and the
//! result hashed with Keccak-256. The 65-byte signature is `r || s || v`,
//! where wallets emit `v` as 27/28 and the curve math wants the raw recovery
//! id 0/1.
//!
//! There is no public key to verify against. Recovery yields the key that
//! produced the signature, and the caller compares the derived address with
//! the one it was told to expect.

use std::sync::OnceLock;

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use super::address::WalletAddress;

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LEN: usize = 65;

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Offset wallets add to the recovery id.
const LEGACY_V_OFFSET: u8 = 27;

fn secp() -> &'static Secp256k1<All> {
    static CONTEXT: OnceLock<Secp256k1<All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("invalid signature format: {0}")]
    InvalidHex(String),

    #[error("invalid signature length: got {0}, want 65")]
    InvalidLength(usize),

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("signature recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Keccak-256 of the prefixed message.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

// ---------------------------------------------------------------------------
// WalletSignature
// ---------------------------------------------------------------------------

/// A decoded `r || s || v` signature with `v` normalized to a recovery id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSignature {
    compact: [u8; 64],
    recovery_id: u8,
}

impl WalletSignature {
    /// Decodes hex (with or without `0x`) into a signature.
    pub fn parse(input: &str) -> Result<Self, SignatureError> {
        let input = input.trim();
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);
        let bytes = hex::decode(digits).map_err(|e| SignatureError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(SignatureError::InvalidLength(bytes.len()));
        }
        let mut compact = [0u8; 64];
        compact.copy_from_slice(&bytes[..64]);

        let mut v = bytes[64];
        if v >= LEGACY_V_OFFSET {
            v -= LEGACY_V_OFFSET;
        }
        if v > 3 {
            return Err(SignatureError::InvalidRecoveryId(bytes[64]));
        }
        Ok(Self {
            compact,
            recovery_id: v,
        })
    }

    /// Recovery id in 0..=3.
    pub fn recovery_id(&self) -> u8 {
        self.recovery_id
    }

    /// `0x`-prefixed hex with `v` in wallet form (27/28).
    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(SIGNATURE_LEN);
        bytes.extend_from_slice(&self.compact);
        bytes.push(self.recovery_id + LEGACY_V_OFFSET);
        format!("0x{}", hex::encode(bytes))
    }

    fn to_recoverable(self) -> Result<RecoverableSignature, SignatureError> {
        let id = RecoveryId::from_i32(i32::from(self.recovery_id))
            .map_err(|_| SignatureError::InvalidRecoveryId(self.recovery_id))?;
        RecoverableSignature::from_compact(&self.compact, id)
            .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Recovery & Signing
// ---------------------------------------------------------------------------

/// Public key that signed `message` under the personal-message convention.
pub fn recover_public_key(
    message: &str,
    signature: &WalletSignature,
) -> Result<PublicKey, SignatureError> {
    let digest = Message::from_digest(personal_message_hash(message.as_bytes()));
    let recoverable = signature.to_recoverable()?;
    secp()
        .recover_ecdsa(&digest, &recoverable)
        .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))
}

/// Address that signed `message`.
pub fn recover_signer(
    message: &str,
    signature: &WalletSignature,
) -> Result<WalletAddress, SignatureError> {
    recover_public_key(message, signature).map(|key| WalletAddress::from_public_key(&key))
}

/// Signs `message` the way a wallet would. Returns the signer's address and
/// the `0x`-prefixed signature.
pub fn sign_personal_message(
    secret_key: &[u8],
    message: &str,
) -> Result<(WalletAddress, String), SignatureError> {
    let secret = SecretKey::from_slice(secret_key)
        .map_err(|e| SignatureError::InvalidSecretKey(e.to_string()))?;
    let public = PublicKey::from_secret_key(secp(), &secret);

    let digest = Message::from_digest(personal_message_hash(message.as_bytes()));
    let (id, compact) = secp()
        .sign_ecdsa_recoverable(&digest, &secret)
        .serialize_compact();
    let signature = WalletSignature {
        compact,
        recovery_id: id.to_i32() as u8,
    };
    Ok((WalletAddress::from_public_key(&public), signature.to_hex()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn hardhat_key() -> Vec<u8> {
        hex::decode(HARDHAT_KEY).unwrap()
    }

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn personal_hash_includes_length_prefix() {
        let mut prefixed = b"\x19Ethereum Signed Message:\n5".to_vec();
        prefixed.extend_from_slice(b"hello");
        assert_eq!(personal_message_hash(b"hello"), keccak256(&prefixed));
        assert_ne!(personal_message_hash(b"hello"), keccak256(b"hello"));
    }

    #[test]
    fn sign_then_recover_yields_signer() {
        let (address, signature) = sign_personal_message(&hardhat_key(), "Sign in to OracleNet").unwrap();
        assert_eq!(
            address.to_checksum(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );

        let parsed = WalletSignature::parse(&signature).unwrap();
        assert_eq!(recover_signer("Sign in to OracleNet", &parsed).unwrap(), address);
    }

    #[test]
    fn different_message_recovers_different_address() {
        let (address, signature) = sign_personal_message(&hardhat_key(), "one").unwrap();
        let parsed = WalletSignature::parse(&signature).unwrap();
        // Recovery over the wrong message either fails or yields a stranger.
        if let Ok(recovered) = recover_signer("two", &parsed) {
            assert_ne!(recovered, address);
        }
    }

    #[test]
    fn v_is_normalized_from_wallet_form() {
        let (_, signature) = sign_personal_message(&hardhat_key(), "m").unwrap();
        let mut bytes = hex::decode(signature.trim_start_matches("0x")).unwrap();
        assert!(bytes[64] == 27 || bytes[64] == 28);

        let from_wallet = WalletSignature::from_bytes(&bytes).unwrap();
        bytes[64] -= 27;
        let raw = WalletSignature::from_bytes(&bytes).unwrap();
        assert_eq!(from_wallet, raw);
        assert!(raw.recovery_id() <= 1);
    }

    #[test]
    fn prefix_is_optional() {
        let (_, signature) = sign_personal_message(&hardhat_key(), "m").unwrap();
        let bare = signature.trim_start_matches("0x");
        assert_eq!(
            WalletSignature::parse(&signature).unwrap(),
            WalletSignature::parse(bare).unwrap()
        );
    }

    #[test]
    fn rejects_bad_encodings() {
        assert!(matches!(
            WalletSignature::parse("0xnothex"),
            Err(SignatureError::InvalidHex(_))
        ));
        assert_eq!(
            WalletSignature::parse(&format!("0x{}", "11".repeat(64))),
            Err(SignatureError::InvalidLength(64))
        );
        let mut bytes = vec![0x11u8; 65];
        bytes[64] = 40;
        assert_eq!(
            WalletSignature::from_bytes(&bytes),
            Err(SignatureError::InvalidRecoveryId(40))
        );
    }

    #[test]
    fn zero_signature_does_not_recover() {
        let mut bytes = vec![0u8; 65];
        bytes[64] = 27;
        let signature = WalletSignature::from_bytes(&bytes).unwrap();
        assert!(recover_signer("m", &signature).is_err());
    }

    #[test]
    fn invalid_secret_key_is_reported() {
        assert!(matches!(
            sign_personal_message(&[0u8; 32], "m"),
            Err(SignatureError::InvalidSecretKey(_))
        ));
    }
}
