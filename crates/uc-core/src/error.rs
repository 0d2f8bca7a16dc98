//! Error taxonomy for bootstrap and rating queries.

use std::fmt;
use std::path::PathBuf;

/// Error reported by an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("engine is not initialized")]
    NotInitialized,
    #[error("no database is loaded")]
    NotLoaded,
    #[error("buffer too small: {required} required")]
    BufferTooSmall { required: usize },
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Failed(String),
}

impl EngineError {
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed(detail.into())
    }
}

/// Fatal failure while bringing a session up.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("engine initialization failed: {0}")]
    Init(#[source] EngineError),
    #[error("session creation failed: {0}")]
    CreateSession(#[source] EngineError),
    #[error("failed to load database '{}': {source}", path.display())]
    LoadDatabase {
        path: PathBuf,
        #[source]
        source: EngineError,
    },
}

/// Step of the rating query at which an engine failure ended the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStep {
    AcquireAttributes,
    AcquireCategories,
    ClearCategories,
    AcquireUrl,
    Rate,
    Render,
}

impl fmt::Display for QueryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AcquireAttributes => "acquire attributes",
            Self::AcquireCategories => "acquire categories",
            Self::ClearCategories => "clear categories",
            Self::AcquireUrl => "acquire url",
            Self::Rate => "rate",
            Self::Render => "render categories",
        };
        f.write_str(name)
    }
}

/// Engine failure that ended a rating query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct QueryError {
    pub step: QueryStep,
    #[source]
    pub source: EngineError,
}

impl QueryError {
    pub fn new(step: QueryStep, source: EngineError) -> Self {
        Self { step, source }
    }

    /// True for failures to set up the per-query resources.
    pub fn is_setup(&self) -> bool {
        matches!(
            self.step,
            QueryStep::AcquireAttributes
                | QueryStep::AcquireCategories
                | QueryStep::ClearCategories
                | QueryStep::AcquireUrl
        )
    }
}
