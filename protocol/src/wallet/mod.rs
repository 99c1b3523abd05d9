//! # Wallet Module
//!
//! Proof of control over a secp256k1 wallet. The server hands out a nonce,
//! the wallet signs a fixed message embedding it, and the server recovers
//! the signer from the signature and compares addresses.

pub mod address;
pub mod flow;
pub mod message;
pub mod recover;

pub use address::{AddressError, WalletAddress};
pub use flow::{NonceGrant, SignatureVerifier, WalletLogin, WalletStatus};
pub use message::{format_timestamp, sign_in_message};
pub use recover::{
    keccak256, personal_message_hash, recover_signer, sign_personal_message, SignatureError,
    WalletSignature,
};
