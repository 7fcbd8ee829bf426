//! Credential record types.

use std::collections::HashSet;
use std::fmt;

/// Opaque upstream session material (raw cookie header value).
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token value. Only the upstream client should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Cookie header value with block-listed fields removed.
    ///
    /// Field names are compared exactly; pairs without `=` are kept as-is.
    pub fn filtered(&self, blocked: &HashSet<String>) -> String {
        self.0
            .split(';')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let name = pair.split_once('=').map_or(*pair, |(name, _)| name);
                !blocked.contains(name.trim())
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// A named set of upstream credentials.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub account_id: String,
    pub display_name: String,
    pub session_token: SessionToken,
    pub user_agent: Option<String>,
    pub sec_ch_ua: Option<String>,
}
