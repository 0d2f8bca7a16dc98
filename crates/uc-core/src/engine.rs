//! Capability surface of a classification engine.
//!
//! The engine is opaque: urlcat only ever reaches it through this trait.
//! Handles are associated types owned by the caller and handed back by value
//! to the matching `destroy_*` method, so a handle cannot be released twice.

use std::path::Path;

use crate::error::EngineError;
use crate::types::{
    ActivationEndpoint, CategorySetVersion, Credentials, DatabaseAccess, Encoding, Language,
    RateFlags,
};

pub type EngineResult<T> = Result<T, EngineError>;

/// A URL classification engine.
pub trait Engine {
    /// Live, licensed connection to the engine.
    type Session;
    /// Reputation and scoring metadata produced by a rating.
    type Attributes;
    /// Category membership produced by a rating.
    type Categories;
    /// Parsed URL.
    type Url;

    /// Process-wide engine initialization.
    fn init(&self) -> EngineResult<()>;

    fn create_session(&self, credentials: &Credentials) -> EngineResult<Self::Session>;

    /// License activation. Callers treat failure as non-fatal.
    fn activate(
        &self,
        session: &mut Self::Session,
        endpoint: &ActivationEndpoint,
    ) -> EngineResult<()>;

    fn load_database(
        &self,
        session: &mut Self::Session,
        path: &Path,
        access: DatabaseAccess,
        version: CategorySetVersion,
    ) -> EngineResult<()>;

    fn destroy_session(&self, session: Self::Session);

    fn create_attributes(&self, session: &Self::Session) -> EngineResult<Self::Attributes>;

    fn destroy_attributes(&self, session: &Self::Session, attributes: Self::Attributes);

    fn create_categories(&self, session: &Self::Session) -> EngineResult<Self::Categories>;

    /// Remove every category from the set.
    fn clear_categories(
        &self,
        session: &Self::Session,
        categories: &mut Self::Categories,
    ) -> EngineResult<()>;

    fn destroy_categories(&self, session: &Self::Session, categories: Self::Categories);

    fn create_url(&self, session: &Self::Session) -> EngineResult<Self::Url>;

    /// Parse `raw` into `url`. `host_header` overrides the host when set.
    fn parse_url(
        &self,
        session: &Self::Session,
        raw: &str,
        host_header: Option<&str>,
        url: &mut Self::Url,
    ) -> EngineResult<()>;

    fn destroy_url(&self, session: &Self::Session, url: Self::Url);

    /// Rate a parsed URL, filling `attributes` and `categories`.
    #[allow(clippy::too_many_arguments)]
    fn rate(
        &self,
        session: &Self::Session,
        url: &Self::Url,
        attributes: &mut Self::Attributes,
        categories: &mut Self::Categories,
        flags: RateFlags,
        version: CategorySetVersion,
        session_id: u32,
        user_agent: Option<&str>,
    ) -> EngineResult<()>;

    fn category_count(
        &self,
        session: &Self::Session,
        categories: &Self::Categories,
    ) -> EngineResult<usize>;

    /// Write category codes into `out`, returning how many were written.
    ///
    /// Fails with [`EngineError::BufferTooSmall`] when `out` cannot hold
    /// every code.
    fn categories_to_array(
        &self,
        session: &Self::Session,
        categories: &Self::Categories,
        out: &mut [u32],
    ) -> EngineResult<usize>;

    /// Render category names joined by `delimiter` into `out`, returning the
    /// number of bytes written.
    fn categories_to_string(
        &self,
        session: &Self::Session,
        categories: &Self::Categories,
        language: Language,
        encoding: Encoding,
        delimiter: &str,
        out: &mut [u8],
    ) -> EngineResult<usize>;

    /// Web reputation score recorded in `attributes` by the last rating.
    fn reputation(
        &self,
        _session: &Self::Session,
        _attributes: &Self::Attributes,
    ) -> EngineResult<i32> {
        Err(EngineError::Unsupported("reputation".to_string()))
    }
}
