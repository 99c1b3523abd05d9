//! # Identity Resolver
//!
//! Turns a verified external identifier into an [`Oracle`], creating the
//! record on first sight. There are two strategies and they differ on
//! purpose:
//!
//! - [`IdentityResolver::resolve_github_verified`] approves the identity, on
//!   creation and again on every later verification.
//! - [`IdentityResolver::resolve_wallet_pending`] creates the identity
//!   unapproved and never touches `approved` afterwards. Wallet identities
//!   wait for an administrator.
//!
//! Both are idempotent per identifier. If two verifications for the same
//! identifier race, the store's unique index lets one create and the other
//! falls back to the record that won.

use std::sync::Arc;

use super::oracle::{random_password, NewOracle, Oracle};
use super::store::{OracleStore, StoreError, FIELD_GITHUB_USERNAME, FIELD_WALLET_ADDRESS};
use crate::config::GITHUB_EMAIL_DOMAIN;
use crate::social::IssueRef;
use crate::wallet::WalletAddress;

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub oracle: Oracle,
    /// `true` if this call created the record.
    pub created: bool,
}

pub struct IdentityResolver {
    store: Arc<dyn OracleStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn OracleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn OracleStore> {
        &self.store
    }

    /// Find-or-create by GitHub login and approve.
    ///
    /// A new record is named `extracted_name`, falling back to the login, and
    /// claims `issue` as its birth issue.
    pub fn resolve_github_verified(
        &self,
        login: &str,
        extracted_name: Option<&str>,
        issue: &IssueRef,
    ) -> Result<Resolution, StoreError> {
        if let Some(existing) = self.store.find_by_github(login)? {
            return self.reapprove(existing);
        }

        let name = extracted_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(login);
        let draft = NewOracle {
            name: name.to_string(),
            email: format!("{}@{}", login, GITHUB_EMAIL_DOMAIN),
            github_username: Some(login.to_string()),
            github_repo: Some(issue.record_path()),
            wallet_address: None,
            birth_issue: Some(issue.number),
            approved: true,
            password: random_password(),
        };

        match self.store.create(draft) {
            Ok(oracle) => {
                tracing::info!(oracle_id = %oracle.id, github = login, issue = issue.number, "oracle created from GitHub");
                Ok(Resolution {
                    oracle,
                    created: true,
                })
            }
            Err(err) if err.is_duplicate_of(FIELD_GITHUB_USERNAME) => {
                match self.store.find_by_github(login)? {
                    Some(existing) => self.reapprove(existing),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Find-or-create by wallet address, unapproved on creation.
    ///
    /// A new record is named `name`, falling back to `Oracle-0x` plus the
    /// first six hex digits, and uses the address itself as its password.
    pub fn resolve_wallet_pending(
        &self,
        address: &WalletAddress,
        name: Option<&str>,
    ) -> Result<Resolution, StoreError> {
        let key = address.to_lowercase_hex();
        if let Some(existing) = self.store.find_by_wallet(&key)? {
            return Ok(Resolution {
                oracle: existing,
                created: false,
            });
        }

        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| address.default_name());
        let draft = NewOracle {
            name,
            email: address.synthetic_email(),
            github_username: None,
            github_repo: None,
            wallet_address: Some(key.clone()),
            birth_issue: None,
            approved: false,
            password: key.clone(),
        };

        match self.store.create(draft) {
            Ok(oracle) => {
                tracing::info!(oracle_id = %oracle.id, address = %key, "oracle created from wallet");
                Ok(Resolution {
                    oracle,
                    created: true,
                })
            }
            Err(err) if err.is_duplicate_of(FIELD_WALLET_ADDRESS) => {
                match self.store.find_by_wallet(&key)? {
                    Some(existing) => Ok(Resolution {
                        oracle: existing,
                        created: false,
                    }),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Read-only lookup by wallet address.
    pub fn find_wallet(&self, address: &WalletAddress) -> Result<Option<Oracle>, StoreError> {
        self.store.find_by_wallet(&address.to_lowercase_hex())
    }

    fn reapprove(&self, existing: Oracle) -> Result<Resolution, StoreError> {
        let oracle = self.store.set_approved(&existing.id, true)?;
        tracing::debug!(oracle_id = %oracle.id, "existing oracle re-approved");
        Ok(Resolution {
            oracle,
            created: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryOracleStore;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(Arc::new(MemoryOracleStore::new()))
    }

    fn issue(number: u64) -> IssueRef {
        IssueRef::parse(&format!(
            "https://github.com/Soul-Brews-Studio/oracle-v2/issues/{number}"
        ))
        .unwrap()
    }

    #[test]
    fn github_creation_uses_extracted_name_and_approves() {
        let resolver = resolver();
        let resolution = resolver
            .resolve_github_verified("nat", Some("SHRIMP"), &issue(42))
            .unwrap();
        assert!(resolution.created);
        let oracle = resolution.oracle;
        assert_eq!(oracle.name, "SHRIMP");
        assert_eq!(oracle.email, "nat@github.oracle");
        assert_eq!(oracle.github_repo.as_deref(), Some("oracle-v2/issues/42"));
        assert_eq!(oracle.birth_issue, Some(42));
        assert!(oracle.approved);
        assert_eq!(oracle.karma, 0);
    }

    #[test]
    fn github_name_falls_back_to_login() {
        let resolution = resolver()
            .resolve_github_verified("nat", Some("  "), &issue(1))
            .unwrap();
        assert_eq!(resolution.oracle.name, "nat");
    }

    #[test]
    fn github_resolution_is_idempotent_and_reapproves() {
        let resolver = resolver();
        let first = resolver
            .resolve_github_verified("nat", Some("SHRIMP"), &issue(42))
            .unwrap();
        resolver
            .store()
            .set_approved(&first.oracle.id, false)
            .unwrap();

        let second = resolver
            .resolve_github_verified("nat", None, &issue(77))
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.oracle.id, first.oracle.id);
        assert!(second.oracle.approved);
        assert_eq!(resolver.store().count().unwrap(), 1);
    }

    #[test]
    fn birth_issue_cannot_be_claimed_twice() {
        let resolver = resolver();
        resolver
            .resolve_github_verified("nat", None, &issue(42))
            .unwrap();
        let err = resolver
            .resolve_github_verified("mallory", None, &issue(42))
            .unwrap_err();
        assert!(err.is_duplicate_of("birth_issue"));
    }

    #[test]
    fn wallet_creation_is_pending_and_stable() {
        let resolver = resolver();
        let address = WalletAddress::parse("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();

        let first = resolver.resolve_wallet_pending(&address, None).unwrap();
        assert!(first.created);
        assert_eq!(first.oracle.name, "Oracle-0xabcdef");
        assert_eq!(first.oracle.email, "abcdef01@wallet.oraclenet");
        assert_eq!(
            first.oracle.wallet_address.as_deref(),
            Some("0xabcdef0123456789abcdef0123456789abcdef01")
        );
        assert!(!first.oracle.approved);
        assert!(first
            .oracle
            .verify_password("0xabcdef0123456789abcdef0123456789abcdef01"));

        let second = resolver
            .resolve_wallet_pending(&address, Some("Renamed"))
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.oracle.name, "Oracle-0xabcdef");
        assert!(!second.oracle.approved);
    }

    #[test]
    fn wallet_path_never_reapproves_or_unapproves() {
        let resolver = resolver();
        let address = WalletAddress::parse("0x1111111111111111111111111111111111111111").unwrap();
        let first = resolver.resolve_wallet_pending(&address, Some("Kappa")).unwrap();
        assert_eq!(first.oracle.name, "Kappa");

        resolver.store().set_approved(&first.oracle.id, true).unwrap();
        let again = resolver.resolve_wallet_pending(&address, None).unwrap();
        assert!(again.oracle.approved);
    }

    #[test]
    fn find_wallet_is_read_only() {
        let resolver = resolver();
        let address = WalletAddress::parse("0x1111111111111111111111111111111111111111").unwrap();
        assert_eq!(resolver.find_wallet(&address).unwrap(), None);
        assert_eq!(resolver.store().count().unwrap(), 0);
    }
}
