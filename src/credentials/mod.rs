//! Credential subsystem.
//!
//! # Data Flow
//! ```text
//! [[accounts]] in config
//!     → inline `cookie = ...`            ─┐
//!     → `credential_file = ...`           │
//!         → parser.rs (strict key=value)  │
//!                                         ▼
//!                              record.rs (CredentialRecord)
//!                                         │
//!                                         ▼
//!                     store.rs (CredentialStore, Arc-shared, read-only)
//! ```
//!
//! # Design Decisions
//! - Records are built once at startup and never mutated afterwards
//! - Any malformed source aborts startup; there is no partial store
//! - Session tokens are redacted from `Debug` output

pub mod parser;
pub mod record;
pub mod store;

pub use parser::{parse_credential_file, CapturedCredential};
pub use record::{CredentialRecord, SessionToken};
pub use store::{AccountSummary, CredentialStore};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("credential file {path} is malformed: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<CredentialError>,
    },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("account `{0}` is defined more than once")]
    DuplicateAccount(String),

    #[error("account `{0}` needs exactly one of `cookie` or `credential_file`")]
    Source(String),

    #[error("guest account `{0}` is not configured")]
    MissingGuest(String),
}
