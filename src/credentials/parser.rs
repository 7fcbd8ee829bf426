//! Parser for captured credential files.
//!
//! The capture tool writes one record per file:
//!
//! ```text
//! cookie=name1=value1; name2=value2
//! ua=Mozilla/5.0 (...)
//! sec="Chromium";v="124", "Not.A/Brand";v="24"
//! ```
//!
//! Only the first `=` splits key from value, so cookie material may contain
//! further `=` characters.

use std::path::Path;

use super::CredentialError;

/// Fields read from a captured credential file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCredential {
    pub cookie: String,
    pub user_agent: String,
    pub sec_ch_ua: Option<String>,
}

/// Parse the contents of a credential file.
pub fn parse_credential(input: &str) -> Result<CapturedCredential, CredentialError> {
    let mut cookie = None;
    let mut user_agent = None;
    let mut sec_ch_ua = None;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| CredentialError::Parse {
            line: line_no,
            reason: "expected `key=value`".to_string(),
        })?;

        let slot = match key.trim() {
            "cookie" => &mut cookie,
            "ua" => &mut user_agent,
            "sec" => &mut sec_ch_ua,
            other => {
                return Err(CredentialError::Parse {
                    line: line_no,
                    reason: format!("unknown key `{other}`"),
                })
            }
        };

        if slot.is_some() {
            return Err(CredentialError::Parse {
                line: line_no,
                reason: format!("duplicate key `{}`", key.trim()),
            });
        }

        let value = value.trim();
        if value.is_empty() {
            return Err(CredentialError::Parse {
                line: line_no,
                reason: format!("empty value for `{}`", key.trim()),
            });
        }
        *slot = Some(value.to_string());
    }

    Ok(CapturedCredential {
        cookie: cookie.ok_or(CredentialError::MissingField("cookie"))?,
        user_agent: user_agent.ok_or(CredentialError::MissingField("ua"))?,
        sec_ch_ua,
    })
}

/// Read and parse a credential file from disk.
pub fn parse_credential_file(path: &Path) -> Result<CapturedCredential, CredentialError> {
    let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_credential(&content).map_err(|e| CredentialError::File {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}
