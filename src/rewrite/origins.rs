//! Origin substitution.

use std::borrow::Cow;
use std::collections::HashMap;

use regex::{Captures, Regex};
use url::Url;

use crate::config::{normalize_origin, ProxyConfig};

/// Upstream origins and the public origin they are rewritten to.
#[derive(Debug, Clone)]
pub struct OriginMap {
    upstream: Vec<String>,
    local: String,
}

impl OriginMap {
    pub fn new(upstream: Vec<String>, local: impl Into<String>) -> Self {
        let local = normalize(&local.into());
        let mut normalized: Vec<String> = Vec::new();
        for origin in upstream.iter().map(|o| normalize(o)) {
            if !origin.is_empty() && origin != local && !normalized.contains(&origin) {
                normalized.push(origin);
            }
        }
        normalized.sort_by(|a, b| b.len().cmp(&a.len()));
        Self {
            upstream: normalized,
            local,
        }
    }

    /// Main origin, alternate host origins and configured extras, all mapped
    /// to the listener's public origin.
    pub fn from_config(config: &ProxyConfig) -> Self {
        let upstream = std::iter::once(config.upstream.origin.clone())
            .chain(config.upstream.host_routes.iter().map(|r| r.origin.clone()))
            .chain(config.rewrite.extra_origins.iter().cloned())
            .collect();
        Self::new(upstream, config.listener.public_origin.clone())
    }

    pub fn upstream(&self) -> &[String] {
        &self.upstream
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// `[protocol, host]` pairs as the browser `URL` API reports them.
    pub fn location_pairs(&self) -> Vec<[String; 2]> {
        self.upstream
            .iter()
            .filter_map(|o| {
                let url = Url::parse(o).ok()?;
                let host = url.host_str()?;
                let host = match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
                Some([format!("{}:", url.scheme()), host])
            })
            .collect()
    }
}

fn normalize(origin: &str) -> String {
    normalize_origin(origin).unwrap_or_else(|| origin.trim_end_matches('/').to_string())
}

fn json_escaped(origin: &str) -> String {
    origin.replace('/', "\\/")
}

/// Compiled substitution for every upstream origin, in plain and
/// JSON-escaped (`https:\/\/host`) spelling.
#[derive(Debug, Clone)]
pub struct OriginSubstitution {
    pattern: Option<Regex>,
    replacements: HashMap<String, String>,
}

impl OriginSubstitution {
    pub fn new(origins: OriginMap) -> Result<Self, regex::Error> {
        let mut replacements = HashMap::new();
        let mut alternatives = Vec::new();

        for origin in origins.upstream() {
            for (from, to) in [
                (origin.clone(), origins.local().to_string()),
                (json_escaped(origin), json_escaped(origins.local())),
            ] {
                alternatives.push(regex::escape(&from));
                replacements.insert(from, to);
            }
        }

        if alternatives.is_empty() {
            return Ok(Self {
                pattern: None,
                replacements,
            });
        }

        // The trailing group stops "https://a.com" from matching inside
        // "https://a.com.evil" or "https://a.com:8443".
        let pattern = Regex::new(&format!(
            r"({})([^A-Za-z0-9.\-_:]|$)",
            alternatives.join("|")
        ))?;

        Ok(Self {
            pattern: Some(pattern),
            replacements,
        })
    }

    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let Some(pattern) = &self.pattern else {
            return Cow::Borrowed(text);
        };

        pattern.replace_all(text, |caps: &Captures<'_>| {
            let matched = &caps[1];
            let tail = caps.get(2).map_or("", |m| m.as_str());
            match self.replacements.get(matched) {
                Some(to) => format!("{to}{tail}"),
                None => format!("{matched}{tail}"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substitution() -> OriginSubstitution {
        OriginSubstitution::new(OriginMap::new(
            vec![
                "https://app.example.com/".to_string(),
                "https://cdn.example.com".to_string(),
            ],
            "http://localhost:8080",
        ))
        .unwrap()
    }

    #[test]
    fn test_origin_map_normalizes_and_dedupes() {
        let map = OriginMap::new(
            vec![
                "https://App.Example.com/".to_string(),
                "https://app.example.com".to_string(),
                "http://localhost:8080".to_string(),
            ],
            "http://localhost:8080/",
        );
        assert_eq!(map.upstream(), ["https://app.example.com".to_string()]);
        assert_eq!(map.local(), "http://localhost:8080");
    }

    #[test]
    fn test_location_pairs() {
        let map = OriginMap::new(
            vec!["https://app.example.com:8443".to_string()],
            "http://localhost:8080",
        );
        assert_eq!(
            map.location_pairs(),
            vec![["https:".to_string(), "app.example.com:8443".to_string()]]
        );
    }

    #[test]
    fn test_replaces_all_origins() {
        let out = substitution().apply("a https://app.example.com/x b https://cdn.example.com");
        assert_eq!(out, "a http://localhost:8080/x b http://localhost:8080");
    }

    #[test]
    fn test_respects_host_boundary() {
        let s = substitution();
        let input = "https://app.example.com.evil/ https://app.example.community https://app.example.com:8443/";
        assert_eq!(s.apply(input), input);
    }

    #[test]
    fn test_escaped_form() {
        let out = substitution().apply(r#"{"u":"https:\/\/app.example.com\/feed"}"#);
        assert_eq!(out, r#"{"u":"http:\/\/localhost:8080\/feed"}"#);
    }

    #[test]
    fn test_no_upstream_origins_is_noop() {
        let s = OriginSubstitution::new(OriginMap::new(Vec::new(), "http://localhost:8080")).unwrap();
        assert!(matches!(s.apply("https://x.example"), Cow::Borrowed(_)));
    }
}
