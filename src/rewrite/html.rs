//! HTML-specific transforms: CSP removal and shim injection.

use std::borrow::Cow;

use regex::Regex;

use super::origins::OriginMap;

/// Attribute identifying the injected script.
pub const SHIM_MARKER: &str = "data-proxy-shim";

const SHIM_TEMPLATE: &str = include_str!("shim.js");

#[derive(Debug, Clone)]
pub struct HtmlRewriter {
    csp_meta: Option<Regex>,
    head_open: Regex,
    body_open: Regex,
    shim: Option<String>,
}

impl HtmlRewriter {
    pub fn new(origins: &OriginMap, inject_shim: bool, strip_csp: bool) -> Result<Self, regex::Error> {
        let csp_meta = if strip_csp {
            Some(Regex::new(
                r#"(?is)<meta\b[^>]*http-equiv\s*=\s*["']?content-security-policy(?:-report-only)?["']?[^>]*>"#,
            )?)
        } else {
            None
        };

        Ok(Self {
            csp_meta,
            head_open: Regex::new(r"(?i)<head(?:\s[^>]*)?>")?,
            body_open: Regex::new(r"(?i)<body(?:\s[^>]*)?>")?,
            shim: inject_shim.then(|| render_shim(origins)),
        })
    }

    pub fn apply<'t>(&self, html: &'t str) -> Cow<'t, str> {
        let mut out = Cow::Borrowed(html);

        if let Some(csp) = &self.csp_meta {
            if csp.is_match(&out) {
                out = Cow::Owned(csp.replace_all(&out, "").into_owned());
            }
        }

        if let Some(shim) = &self.shim {
            if !out.contains(SHIM_MARKER) {
                out = Cow::Owned(self.inject(&out, shim));
            }
        }

        out
    }

    /// Insert right after `<head>`, else after `<body>`, else at the very start.
    fn inject(&self, html: &str, shim: &str) -> String {
        let at = self
            .head_open
            .find(html)
            .or_else(|| self.body_open.find(html))
            .map_or(0, |m| m.end());

        let mut out = String::with_capacity(html.len() + shim.len());
        out.push_str(&html[..at]);
        out.push_str(shim);
        out.push_str(&html[at..]);
        out
    }
}

/// The shim never spells out an upstream origin, so a later substitution
/// pass cannot touch it.
fn render_shim(origins: &OriginMap) -> String {
    let pairs = serde_json::to_string(&origins.location_pairs()).unwrap_or_else(|_| "[]".into());
    let local = serde_json::to_string(origins.local()).unwrap_or_else(|_| "\"\"".into());
    let script = SHIM_TEMPLATE
        .replace("__PROXY_ORIGINS__", &pairs)
        .replace("__PROXY_LOCAL__", &local);
    format!("<script {SHIM_MARKER}>{script}</script>")
}
