//! Read-only credential store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::parser::parse_credential_file;
use super::record::{CredentialRecord, SessionToken};
use super::CredentialError;
use crate::config::AccountConfig;

/// Public view of an account, safe to return to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
}

/// Credential records keyed by account id.
///
/// Built once at startup and shared behind an `Arc`; lookups need no locking.
#[derive(Debug, Default)]
pub struct CredentialStore {
    records: HashMap<String, Arc<CredentialRecord>>,
    /// Account ids in configuration order, for listing.
    order: Vec<String>,
}

impl CredentialStore {
    /// Build a store from already constructed records.
    pub fn from_records(records: Vec<CredentialRecord>) -> Result<Self, CredentialError> {
        let mut store = Self::default();
        for record in records {
            if store.records.contains_key(&record.account_id) {
                return Err(CredentialError::DuplicateAccount(record.account_id));
            }
            store.order.push(record.account_id.clone());
            store.records.insert(record.account_id.clone(), Arc::new(record));
        }
        Ok(store)
    }

    /// Load every configured account, reading credential files where given.
    pub fn load(accounts: &[AccountConfig]) -> Result<Self, CredentialError> {
        let mut records = Vec::with_capacity(accounts.len());

        for account in accounts {
            let record = match (&account.cookie, &account.credential_file) {
                (Some(cookie), None) => CredentialRecord {
                    account_id: account.id.clone(),
                    display_name: account.name.clone(),
                    session_token: SessionToken::new(cookie.clone()),
                    user_agent: account.user_agent.clone(),
                    sec_ch_ua: account.sec_ch_ua.clone(),
                },
                (None, Some(path)) => {
                    let captured = parse_credential_file(Path::new(path))?;
                    tracing::debug!(account = %account.id, path = %path, "Loaded credential file");
                    CredentialRecord {
                        account_id: account.id.clone(),
                        display_name: account.name.clone(),
                        session_token: SessionToken::new(captured.cookie),
                        // Explicit config wins over captured values
                        user_agent: account.user_agent.clone().or(Some(captured.user_agent)),
                        sec_ch_ua: account.sec_ch_ua.clone().or(captured.sec_ch_ua),
                    }
                }
                _ => return Err(CredentialError::Source(account.id.clone())),
            };
            records.push(record);
        }

        let store = Self::from_records(records)?;
        tracing::info!(accounts = store.len(), "Credential store loaded");
        Ok(store)
    }

    /// Fail unless the guest account is present.
    pub fn require(&self, guest: &str) -> Result<(), CredentialError> {
        if self.records.contains_key(guest) {
            Ok(())
        } else {
            Err(CredentialError::MissingGuest(guest.to_string()))
        }
    }

    pub fn get(&self, account_id: &str) -> Option<Arc<CredentialRecord>> {
        self.records.get(account_id).cloned()
    }

    /// Accounts in configuration order, without token material.
    pub fn list(&self) -> Vec<AccountSummary> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|r| AccountSummary {
                id: r.account_id.clone(),
                name: r.display_name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(id: &str, cookie: &str) -> AccountConfig {
        AccountConfig {
            id: id.to_string(),
            name: format!("Account {id}"),
            cookie: Some(cookie.to_string()),
            credential_file: None,
            user_agent: None,
            sec_ch_ua: None,
        }
    }

    #[test]
    fn test_load_inline_accounts_preserves_order() {
        let store = CredentialStore::load(&[inline("guest", "g=1"), inline("demo1", "d=1")]).unwrap();
        assert_eq!(store.len(), 2);
        let ids: Vec<_> = store.list().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["guest", "demo1"]);
        assert_eq!(store.get("demo1").unwrap().session_token.expose(), "d=1");
        assert!(store.get("nobody").is_none());
    }

    #[test]
    fn test_load_from_credential_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.txt");
        std::fs::write(&path, "cookie=sid=9\nua=CapturedUA\nsec=\"X\"\n").unwrap();

        let mut account = inline("demo1", "unused");
        account.cookie = None;
        account.credential_file = Some(path.to_string_lossy().into_owned());

        let store = CredentialStore::load(&[account]).unwrap();
        let record = store.get("demo1").unwrap();
        assert_eq!(record.session_token.expose(), "sid=9");
        assert_eq!(record.user_agent.as_deref(), Some("CapturedUA"));
        assert_eq!(record.sec_ch_ua.as_deref(), Some("\"X\""));
    }

    #[test]
    fn test_rejects_duplicates_and_ambiguous_sources() {
        let err = CredentialStore::load(&[inline("a", "1"), inline("a", "2")]).unwrap_err();
        assert!(matches!(err, CredentialError::DuplicateAccount(id) if id == "a"));

        let mut both = inline("b", "1");
        both.credential_file = Some("x.txt".into());
        assert!(matches!(
            CredentialStore::load(&[both]),
            Err(CredentialError::Source(_))
        ));
    }

    #[test]
    fn test_require_guest() {
        let store = CredentialStore::load(&[inline("demo1", "d=1")]).unwrap();
        assert!(matches!(store.require("guest"), Err(CredentialError::MissingGuest(_))));
        assert!(store.require("demo1").is_ok());
    }
}
