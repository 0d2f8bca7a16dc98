//! urlcat Core Library
//!
//! This crate drives an external URL classification engine. The engine is
//! opaque and reached only through the [`Engine`] trait; this crate brings it
//! up into a usable session and runs single-URL rating queries against it.
//!
//! # Architecture
//!
//! A session is bootstrapped once ([`bootstrap`]) and passed explicitly to
//! every caller. Each query acquires its own attribute set, category set and
//! parsed URL, and releases them on every exit path. Query outcomes are
//! reported as a [`Rating`], which keeps parse errors, engine failures and
//! genuinely uncategorized URLs apart.
//!
//! # Modules
//!
//! - `engine`: the engine capability surface
//! - `session`: session bootstrap and lifetime
//! - `query`: the rating query protocol
//! - `error`: error taxonomy
//! - `types`: shared type definitions

pub mod engine;
pub mod error;
mod guard;
pub mod query;
pub mod session;
pub mod types;

#[cfg(test)]
mod stub;

// Re-export commonly used types
pub use engine::{Engine, EngineResult};
pub use error::{BootstrapError, EngineError, QueryError, QueryStep};
pub use query::{CategoryMatch, Rating, DEFAULT_DELIMITER, MAX_CATEGORY_CODES, MAX_RENDERED_LEN};
pub use session::{bootstrap, EngineSession, SessionConfig, DEFAULT_DATABASE};
pub use types::{
    ActivationEndpoint, CategorySetVersion, Credentials, DatabaseAccess, Encoding, Language,
    RateFlags,
};
