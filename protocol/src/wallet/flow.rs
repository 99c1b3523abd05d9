//! # Signature Verification Flow
//!
//! ```text
//! nonce(address)              verify(address, signature)
//!   NONE ──issue──> PENDING ──signature recovers address──> VERIFIED
//!                      │
//!                      └──5 minutes──> EXPIRED
//! ```
//!
//! Every failure here is hard: a caller that gets a nonce wrong or signs
//! with the wrong key made a bad request. The nonce is consumed with a
//! compare-and-remove only after the signature checks out, so a replayed
//! signature loses the race and sees "no nonce".

use std::sync::Arc;

use super::address::WalletAddress;
use super::message::{format_timestamp, sign_in_message};
use super::recover::{recover_signer, WalletSignature};
use crate::challenge::ChallengeStore;
use crate::error::AuthError;
use crate::identity::{IdentityResolver, Oracle, TokenIssuer};

/// Response to a nonce request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceGrant {
    pub address: WalletAddress,
    pub nonce: String,
    /// The exact text the wallet must sign.
    pub message: String,
    /// RFC 3339 issuance time embedded in `message`.
    pub timestamp: String,
    /// Nonce lifetime in seconds.
    pub expires_in: u64,
}

/// A successful wallet sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletLogin {
    pub token: String,
    pub created: bool,
    pub oracle: Oracle,
}

/// Registration state of a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletStatus {
    pub address: WalletAddress,
    pub oracle: Option<Oracle>,
}

impl WalletStatus {
    pub fn registered(&self) -> bool {
        self.oracle.is_some()
    }
}

pub struct SignatureVerifier {
    nonces: Arc<dyn ChallengeStore>,
    resolver: Arc<IdentityResolver>,
    tokens: Arc<dyn TokenIssuer>,
}

impl SignatureVerifier {
    pub fn new(
        nonces: Arc<dyn ChallengeStore>,
        resolver: Arc<IdentityResolver>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            nonces,
            resolver,
            tokens,
        }
    }

    pub fn nonces(&self) -> &Arc<dyn ChallengeStore> {
        &self.nonces
    }

    /// Mints a nonce for `address` and returns the message to sign.
    pub fn issue_nonce(&self, address: &str) -> Result<NonceGrant, AuthError> {
        if address.trim().is_empty() {
            return Err(AuthError::MissingField("address is required"));
        }
        let address = WalletAddress::parse(address)?;
        let challenge = self.nonces.issue(&address.to_lowercase_hex())?;
        tracing::debug!(%address, "wallet nonce issued");

        Ok(NonceGrant {
            address,
            message: sign_in_message(&challenge.secret, challenge.issued_at),
            timestamp: format_timestamp(challenge.issued_at),
            nonce: challenge.secret,
            expires_in: self.nonces.ttl().as_secs(),
        })
    }

    /// Checks `signature` over the pending message for `address`, then
    /// resolves the wallet identity and issues a credential.
    pub fn verify(
        &self,
        address: &str,
        signature: &str,
        name: Option<&str>,
    ) -> Result<WalletLogin, AuthError> {
        if address.trim().is_empty() || signature.trim().is_empty() {
            return Err(AuthError::MissingField("address and signature are required"));
        }
        let address = WalletAddress::parse(address)?;
        let subject = address.to_lowercase_hex();

        let challenge = self
            .nonces
            .lookup(&subject)
            .ok_or(AuthError::NonceNotFound)?;
        let message = sign_in_message(&challenge.secret, challenge.issued_at);

        let signature = WalletSignature::parse(signature)?;
        let recovered = recover_signer(&message, &signature)?;
        if recovered != address {
            tracing::warn!(%address, %recovered, "wallet signature from another key");
            return Err(AuthError::AddressMismatch {
                expected: address.to_checksum(),
                recovered: recovered.to_checksum(),
            });
        }

        if !self.nonces.consume(&subject, &challenge.secret) {
            return Err(AuthError::NonceNotFound);
        }

        let resolution = self.resolver.resolve_wallet_pending(&address, name)?;
        let token = self.tokens.issue(&resolution.oracle);
        tracing::info!(
            %address,
            oracle_id = %resolution.oracle.id,
            created = resolution.created,
            "wallet verified"
        );

        Ok(WalletLogin {
            token,
            created: resolution.created,
            oracle: resolution.oracle,
        })
    }

    /// Whether `address` already has an identity. Never creates one.
    pub fn check(&self, address: &str) -> Result<WalletStatus, AuthError> {
        if address.trim().is_empty() {
            return Err(AuthError::MissingField("address query parameter is required"));
        }
        let address = WalletAddress::parse(address)?;
        let oracle = self.resolver.find_wallet(&address)?;
        Ok(WalletStatus { address, oracle })
    }
}
