//! Engine session bootstrap.
//!
//! A session is brought up in four steps: global engine initialization,
//! session handle creation, license activation and local database load.
//! Only activation may fail without aborting the bootstrap.

use std::path::PathBuf;

use log::{info, warn};

use crate::engine::Engine;
use crate::error::{BootstrapError, EngineError};
use crate::types::{ActivationEndpoint, CategorySetVersion, Credentials, DatabaseAccess};

/// Database file used when none is configured.
pub const DEFAULT_DATABASE: &str = "data.db";

/// Everything needed to bring a session up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub credentials: Credentials,
    pub activation: ActivationEndpoint,
    pub database: PathBuf,
    pub access: DatabaseAccess,
    pub version: CategorySetVersion,
}

impl SessionConfig {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(serial),
            activation: ActivationEndpoint::Default,
            database: PathBuf::from(DEFAULT_DATABASE),
            access: DatabaseAccess::Memory,
            version: CategorySetVersion::Latest,
        }
    }

    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }
}

/// An initialized, database-loaded connection to an engine.
///
/// The session handle is destroyed exactly once, when the session is shut
/// down or dropped. Queries borrow the session and never destroy it.
pub struct EngineSession<E: Engine> {
    pub(crate) engine: E,
    /// Present until the session is dropped.
    handle: Option<E::Session>,
    config: SessionConfig,
    activated: bool,
}

/// Bring `engine` from unstarted to query-ready.
///
/// No step is retried; retrying a failed bootstrap is up to the caller.
pub fn bootstrap<E: Engine>(
    engine: E,
    config: SessionConfig,
) -> Result<EngineSession<E>, BootstrapError> {
    engine.init().map_err(BootstrapError::Init)?;

    let mut handle = engine
        .create_session(&config.credentials)
        .map_err(BootstrapError::CreateSession)?;

    let activated = match engine.activate(&mut handle, &config.activation) {
        Ok(()) => {
            info!("engine activated");
            true
        }
        Err(EngineError::Failed(detail)) if detail.is_empty() => {
            warn!("error during activation, continuing with the local database");
            false
        }
        Err(err) => {
            warn!("activation failed: {err}; continuing with the local database");
            false
        }
    };

    if let Err(source) = engine.load_database(
        &mut handle,
        &config.database,
        config.access,
        config.version,
    ) {
        engine.destroy_session(handle);
        return Err(BootstrapError::LoadDatabase {
            path: config.database,
            source,
        });
    }
    info!("local database '{}' loaded", config.database.display());

    Ok(EngineSession {
        engine,
        handle: Some(handle),
        config,
        activated,
    })
}

impl<E: Engine> EngineSession<E> {
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn handle(&self) -> &E::Session {
        self.handle.as_ref().expect("session handle is held until drop")
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether license activation succeeded during bootstrap.
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Destroy the session handle.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<E: Engine> Drop for EngineSession<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.engine.destroy_session(handle);
        }
        info!("engine session closed");
    }
}
