//! Session resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → resolver.rs (marker → account id → CredentialRecord)
//!         absent marker  → guest account + Set-Cookie instruction
//!         unknown marker → Unauthorized (never a guest fallback)
//!     → ResolvedSession (lives for one request)
//!
//! Switch request
//!     → switch.rs (resolve target, invalidate previous account's cache)
//!     → router sets the new marker cookie
//! ```
//!
//! # Design Decisions
//! - The marker cookie holds the account id itself; it is the only per-client state
//! - Resolution is synchronous and lock-free (the credential store is read-only)

pub mod resolver;
pub mod switch;

pub use resolver::{Resolution, ResolvedSession, SessionResolver};
pub use switch::{switch_account, SwitchOutcome};
