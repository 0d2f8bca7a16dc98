//! urlcat Local Database Engine
//!
//! A self-contained [`uc_core::Engine`] that answers ratings from a text
//! category database instead of a remote classification service.
//!
//! # Modules
//!
//! - `database`: database text format and lookups
//! - `engine`: the [`LocalEngine`] implementation
//! - `hash`: domain hashing for map keys
//! - `psl`: public suffix rules and registrable-domain extraction
//! - `url`: URL parsing

pub mod database;
pub mod engine;
pub mod hash;
pub mod psl;
pub mod url;

pub use database::{Category, Database, DatabaseError, Entry};
pub use engine::{LocalAttributes, LocalCategories, LocalEngine, LocalSession, LocalUrl};
pub use url::{parse_url, ParsedUrl, Scheme, UrlError};
