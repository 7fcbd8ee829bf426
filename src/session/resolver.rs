//! Account resolution from the client marker cookie.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::SessionConfig;
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::error::ProxyError;

/// Credentials selected for one inbound request.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub account_id: String,
    pub credential: Arc<CredentialRecord>,
}

/// Outcome of resolving a request: the session plus a marker cookie the
/// router must set when the request arrived without one.
#[derive(Debug)]
pub struct Resolution {
    pub session: ResolvedSession,
    pub set_marker: Option<Cookie<'static>>,
}

/// Maps client markers to stored credentials.
#[derive(Debug)]
pub struct SessionResolver {
    store: Arc<CredentialStore>,
    config: SessionConfig,
}

impl SessionResolver {
    pub fn new(store: Arc<CredentialStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn guest_account(&self) -> &str {
        &self.config.guest_account
    }

    /// Resolve a marker to a session.
    ///
    /// An absent (or empty) marker selects the guest account. A marker naming
    /// an unknown account fails with `Unauthorized`; there is no fallback.
    pub fn resolve(&self, marker: Option<&str>) -> Result<ResolvedSession, ProxyError> {
        let account_id = match marker.map(str::trim) {
            Some(m) if !m.is_empty() => m,
            _ => self.config.guest_account.as_str(),
        };

        let credential = self
            .store
            .get(account_id)
            .ok_or_else(|| ProxyError::Unauthorized {
                account: account_id.to_string(),
            })?;

        Ok(ResolvedSession {
            account_id: account_id.to_string(),
            credential,
        })
    }

    /// Current marker value carried by the request, if any.
    pub fn marker<'a>(&self, jar: &'a CookieJar) -> Option<&'a str> {
        jar.get(&self.config.cookie_name)
            .map(|c| c.value())
            .filter(|v| !v.trim().is_empty())
    }

    /// Resolve from request cookies, asking for a marker to be set when none exists.
    pub fn resolve_request(&self, jar: &CookieJar) -> Result<Resolution, ProxyError> {
        let marker = self.marker(jar);
        let session = self.resolve(marker)?;
        let set_marker = marker
            .is_none()
            .then(|| self.marker_cookie(&session.account_id));
        Ok(Resolution {
            session,
            set_marker,
        })
    }

    /// Marker cookie pinning the client to `account_id` for the retention window.
    pub fn marker_cookie(&self, account_id: &str) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), account_id.to_string()))
            .http_only(true)
            .secure(self.config.secure_cookie)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::days(self.config.retention_days))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SessionToken;
    use axum::http::{header, HeaderMap, HeaderValue};

    fn record(id: &str) -> CredentialRecord {
        CredentialRecord {
            account_id: id.to_string(),
            display_name: id.to_uppercase(),
            session_token: SessionToken::new(format!("sid={id}")),
            user_agent: None,
            sec_ch_ua: None,
        }
    }

    fn resolver() -> SessionResolver {
        let store = CredentialStore::from_records(vec![record("guest"), record("demo1")]).unwrap();
        SessionResolver::new(Arc::new(store), SessionConfig::default())
    }

    fn jar(cookie: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn test_absent_marker_resolves_guest() {
        let session = resolver().resolve(None).unwrap();
        assert_eq!(session.account_id, "guest");
        assert_eq!(session.credential.session_token.expose(), "sid=guest");

        let session = resolver().resolve(Some("  ")).unwrap();
        assert_eq!(session.account_id, "guest");
    }

    #[test]
    fn test_unknown_marker_is_unauthorized() {
        let err = resolver().resolve(Some("ghost")).unwrap_err();
        assert!(matches!(err, ProxyError::Unauthorized { ref account } if account == "ghost"));
    }

    #[test]
    fn test_request_without_marker_sets_cookie() {
        let resolution = resolver().resolve_request(&CookieJar::new()).unwrap();
        assert_eq!(resolution.session.account_id, "guest");
        let cookie = resolution.set_marker.unwrap();
        assert_eq!(cookie.name(), "proxy_account");
        assert_eq!(cookie.value(), "guest");
        assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));
    }

    #[test]
    fn test_request_with_marker_keeps_cookie() {
        let resolution = resolver()
            .resolve_request(&jar("other=1; proxy_account=demo1"))
            .unwrap();
        assert_eq!(resolution.session.account_id, "demo1");
        assert!(resolution.set_marker.is_none());
    }
}
