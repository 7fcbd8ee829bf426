//! Upstream target selection and path canonicalization.

use url::Url;

use crate::config::{normalize_origin, UpstreamConfig};

/// A normalized absolute upstream URL and how to treat it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUrl {
    pub url: Url,
    /// Normalized request path (no query).
    pub path: String,
    /// Attach the account's credentials when fetching.
    pub attach_credentials: bool,
    /// Add cache busters and never store the response.
    pub volatile: bool,
}

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

#[derive(Debug, Clone)]
struct HostRoute {
    prefix: String,
    origin: String,
    attach_credentials: bool,
}

/// Compiled upstream routing: main origin, alternate hosts and path rules.
///
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct UpstreamTargets {
    origin: String,
    api_prefix: Option<String>,
    self_prefixes: Vec<String>,
    volatile_prefixes: Vec<String>,
    host_routes: Vec<HostRoute>,
}

impl UpstreamTargets {
    pub fn new(config: &UpstreamConfig, public_origin: &str) -> Self {
        let origin = origin_or_raw(&config.origin);

        let api_prefix = match config.api_prefix.trim_matches('/') {
            "" => None,
            trimmed => Some(format!("/{trimmed}/")),
        };

        // Paths like "/localhost:8080/x" come from clients that glued the
        // proxy (or upstream) host onto a relative URL.
        let mut self_prefixes = Vec::new();
        for o in [public_origin, config.origin.as_str()] {
            if let Some(authority) = authority_of(o) {
                let prefix = format!("/{authority}");
                if !self_prefixes.contains(&prefix) {
                    self_prefixes.push(prefix);
                }
            }
        }

        // Longest prefix first so "/css2/x" beats "/css/x"
        let mut host_routes: Vec<HostRoute> = config
            .host_routes
            .iter()
            .map(|r| HostRoute {
                prefix: r.prefix.clone(),
                origin: origin_or_raw(&r.origin),
                attach_credentials: r.attach_credentials,
            })
            .collect();
        host_routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Self {
            origin,
            api_prefix,
            self_prefixes,
            volatile_prefixes: config.volatile_prefixes.clone(),
            host_routes,
        }
    }

    /// Main upstream origin.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Normalize an inbound path into the form sent upstream.
    pub fn normalize_path(&self, raw: &str) -> String {
        let mut path = collapse_separators(raw);

        for prefix in &self.self_prefixes {
            if let Some(rest) = strip_segment_prefix(&path, prefix) {
                path = rest;
                break;
            }
        }

        if let Some(api) = &self.api_prefix {
            let doubled = format!("{api}{}", &api[1..]);
            while path.starts_with(&doubled) {
                path.replace_range(..doubled.len(), api);
            }
        }

        path
    }

    /// Build the canonical upstream URL for a path and optional query.
    pub fn canonicalize(
        &self,
        raw_path: &str,
        query: Option<&str>,
    ) -> Result<CanonicalUrl, url::ParseError> {
        let path = self.normalize_path(raw_path);

        let (origin, attach_credentials, volatile) = match self
            .host_routes
            .iter()
            .find(|r| path.starts_with(&r.prefix))
        {
            Some(route) => (route.origin.as_str(), route.attach_credentials, false),
            None => (
                self.origin.as_str(),
                true,
                self.volatile_prefixes.iter().any(|p| path.starts_with(p)),
            ),
        };

        let mut url = Url::parse(origin)?.join(&path)?;
        url.set_query(query.filter(|q| !q.is_empty()));
        url.set_fragment(None);

        Ok(CanonicalUrl {
            path: url.path().to_string(),
            url,
            attach_credentials,
            volatile,
        })
    }
}

fn origin_or_raw(origin: &str) -> String {
    normalize_origin(origin).unwrap_or_else(|| origin.trim_end_matches('/').to_string())
}

fn authority_of(origin: &str) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Collapse runs of '/' and guarantee a leading one.
fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for ch in path.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Strip `prefix` only when it ends on a segment boundary.
fn strip_segment_prefix(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostRouteConfig;

    fn targets() -> UpstreamTargets {
        let mut config = UpstreamConfig {
            origin: "https://app.example.com".to_string(),
            ..UpstreamConfig::default()
        };
        config.host_routes = vec![
            HostRouteConfig {
                prefix: "/css2".to_string(),
                origin: "https://fonts.example.net".to_string(),
                attach_credentials: false,
            },
            HostRouteConfig {
                prefix: "/cdn/".to_string(),
                origin: "https://cdn.example.com".to_string(),
                attach_credentials: true,
            },
        ];
        UpstreamTargets::new(&config, "http://localhost:8080")
    }

    #[test]
    fn test_collapses_duplicate_separators() {
        let t = targets();
        assert_eq!(t.normalize_path("//static///app.js"), "/static/app.js");
        assert_eq!(t.normalize_path(""), "/");
    }

    #[test]
    fn test_strips_self_referential_host() {
        let t = targets();
        assert_eq!(t.normalize_path("/localhost:8080/api/me"), "/api/me");
        assert_eq!(t.normalize_path("/app.example.com/page"), "/page");
        assert_eq!(t.normalize_path("/localhost:8080"), "/");
        // Not on a segment boundary
        assert_eq!(t.normalize_path("/app.example.comics"), "/app.example.comics");
    }

    #[test]
    fn test_collapses_repeated_api_prefix() {
        let t = targets();
        assert_eq!(t.normalize_path("/api/api/user"), "/api/user");
        assert_eq!(t.normalize_path("/api//api/api/user"), "/api/user");
        assert_eq!(t.normalize_path("/api/apiary"), "/api/apiary");
    }

    #[test]
    fn test_canonical_url_for_main_origin() {
        let t = targets();
        let c = t.canonicalize("/resource.js", None).unwrap();
        assert_eq!(c.as_str(), "https://app.example.com/resource.js");
        assert!(c.attach_credentials);
        assert!(!c.volatile);

        let api = t.canonicalize("/api/api/feed", Some("page=2")).unwrap();
        assert_eq!(api.as_str(), "https://app.example.com/api/feed?page=2");
        assert!(api.volatile);
    }

    #[test]
    fn test_empty_query_is_dropped() {
        let t = targets();
        let c = t.canonicalize("/a", Some("")).unwrap();
        assert_eq!(c.as_str(), "https://app.example.com/a");
    }

    #[test]
    fn test_host_routes_pick_origin_and_credential_policy() {
        let t = targets();
        let fonts = t.canonicalize("/css2", Some("family=Inter")).unwrap();
        assert_eq!(fonts.as_str(), "https://fonts.example.net/css2?family=Inter");
        assert!(!fonts.attach_credentials);

        let cdn = t.canonicalize("/cdn/x.png", None).unwrap();
        assert_eq!(cdn.as_str(), "https://cdn.example.com/cdn/x.png");
        assert!(cdn.attach_credentials);
    }
}
