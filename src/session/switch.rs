//! Explicit account switching.

use serde::Serialize;

use super::resolver::{ResolvedSession, SessionResolver};
use crate::cache::ResponseStore;
use crate::error::ProxyError;

/// Result of a successful switch.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchOutcome {
    pub account: String,
    pub previous: String,
    /// Cache entries dropped for the previous account.
    pub invalidated: usize,
}

/// Switch a client from its current marker to `target`.
///
/// The target must exist. Entries cached for the previous account are
/// invalidated before the switch is acknowledged; if the store cannot do
/// that, the switch fails and the caller must not update the marker.
pub async fn switch_account(
    resolver: &SessionResolver,
    cache: &dyn ResponseStore,
    current_marker: Option<&str>,
    target: &str,
) -> Result<(ResolvedSession, SwitchOutcome), ProxyError> {
    let next = resolver.resolve(Some(target))?;

    let previous = match current_marker.map(str::trim) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => resolver.guest_account().to_string(),
    };

    let invalidated = if previous == next.account_id {
        0
    } else {
        cache.invalidate_account(&previous).await?
    };

    tracing::info!(
        previous = %previous,
        account = %next.account_id,
        invalidated,
        "Account switched"
    );

    let outcome = SwitchOutcome {
        account: next.account_id.clone(),
        previous,
        invalidated,
    };
    Ok((next, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheError, CacheKey, KeyPredicate, MemoryStore};
    use crate::config::SessionConfig;
    use crate::credentials::{CredentialRecord, CredentialStore, SessionToken};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver() -> SessionResolver {
        let records = ["guest", "a1", "a2"]
            .iter()
            .map(|id| CredentialRecord {
                account_id: id.to_string(),
                display_name: id.to_string(),
                session_token: SessionToken::new("x=1"),
                user_agent: None,
                sec_ch_ua: None,
            })
            .collect();
        let store = CredentialStore::from_records(records).unwrap();
        SessionResolver::new(Arc::new(store), SessionConfig::default())
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new(Duration::from_secs(60));
        for (account, url) in [("a1", "/p"), ("a1", "/q"), ("a2", "/p"), ("guest", "/p")] {
            store
                .put(
                    CacheKey::new(account, url),
                    CacheEntry::new(Bytes::from_static(b"body"), "text/plain"),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_switch_invalidates_previous_account_only() {
        let cache = seeded().await;
        let (session, outcome) = switch_account(&resolver(), &cache, Some("a1"), "a2")
            .await
            .unwrap();

        assert_eq!(session.account_id, "a2");
        assert_eq!(outcome.previous, "a1");
        assert_eq!(outcome.invalidated, 2);
        assert!(cache.get(&CacheKey::new("a1", "/p")).await.unwrap().is_none());
        assert!(cache.get(&CacheKey::new("a2", "/p")).await.unwrap().is_some());
        assert!(cache.get(&CacheKey::new("guest", "/p")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_switch_without_marker_treats_guest_as_previous() {
        let cache = seeded().await;
        let (_, outcome) = switch_account(&resolver(), &cache, None, "a1").await.unwrap();
        assert_eq!(outcome.previous, "guest");
        assert_eq!(outcome.invalidated, 1);
    }

    #[tokio::test]
    async fn test_switch_to_same_account_keeps_cache() {
        let cache = seeded().await;
        let (_, outcome) = switch_account(&resolver(), &cache, Some("a1"), "a1").await.unwrap();
        assert_eq!(outcome.invalidated, 0);
        assert_eq!(cache.len(), 4);
    }

    #[tokio::test]
    async fn test_switch_to_unknown_account_fails_without_invalidating() {
        let cache = seeded().await;
        let err = switch_account(&resolver(), &cache, Some("a1"), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Unauthorized { .. }));
        assert_eq!(cache.len(), 4);
    }

    struct BrokenStore;

    #[async_trait]
    impl ResponseStore for BrokenStore {
        async fn get(&self, _: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn put(&self, _: CacheKey, _: CacheEntry) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn invalidate(&self, _: KeyPredicate<'_>) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn purge_expired(&self) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_switch_fails_when_cache_cannot_invalidate() {
        let err = switch_account(&resolver(), &BrokenStore, Some("a1"), "a2")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Cache(_)));
    }
}
