//! Local database engine
//!
//! An [`Engine`] that rates URLs against a category database on disk. There
//! is no remote service behind it: activation only checks the serial format,
//! and every rating is answered from the loaded database.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use uc_core::{
    ActivationEndpoint, CategorySetVersion, Credentials, DatabaseAccess, Encoding, Engine,
    EngineError, EngineResult, Language, RateFlags,
};

use crate::database::Database;
use crate::url::{parse_host, parse_url, ParsedUrl};

/// Engine backed by a local category database.
#[derive(Debug, Default)]
pub struct LocalEngine {
    initialized: AtomicBool,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_initialized(&self) -> EngineResult<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }
}

/// Where a session's database lives.
#[derive(Debug)]
enum LoadedDatabase {
    Memory(Database),
    /// Re-read on every rating.
    File { path: PathBuf, version: u32 },
}

/// Session handle of a [`LocalEngine`].
#[derive(Debug)]
pub struct LocalSession {
    credentials: Credentials,
    activated: bool,
    database: Option<LoadedDatabase>,
}

impl LocalSession {
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Category-set version of the loaded database.
    pub fn database_version(&self) -> Option<u32> {
        match self.database.as_ref()? {
            LoadedDatabase::Memory(db) => Some(db.version()),
            LoadedDatabase::File { version, .. } => Some(*version),
        }
    }
}

#[derive(Debug, Default)]
pub struct LocalAttributes {
    reputation: Option<i32>,
}

#[derive(Debug, Default)]
pub struct LocalCategories {
    codes: Vec<u32>,
}

impl LocalCategories {
    pub fn codes(&self) -> &[u32] {
        &self.codes
    }
}

#[derive(Debug, Default)]
pub struct LocalUrl {
    parsed: Option<ParsedUrl>,
}

impl LocalUrl {
    pub fn parsed(&self) -> Option<&ParsedUrl> {
        self.parsed.as_ref()
    }
}

/// Whether `serial` looks like `XXXX-XXXX-XXXX-XXXX`.
fn is_valid_serial(serial: &str) -> bool {
    let groups: Vec<&str> = serial.split('-').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| g.len() == 4 && g.bytes().all(|b| b.is_ascii_alphanumeric()))
}

fn check_version(requested: CategorySetVersion, loaded: u32) -> EngineResult<()> {
    match requested {
        CategorySetVersion::Exact(v) if v != loaded => Err(EngineError::Failed(format!(
            "category set version {} requested, database has {}",
            v, loaded
        ))),
        _ => Ok(()),
    }
}

fn load(path: &Path) -> EngineResult<Database> {
    Database::from_file(path).map_err(|e| EngineError::Failed(e.to_string()))
}

impl Engine for LocalEngine {
    type Session = LocalSession;
    type Attributes = LocalAttributes;
    type Categories = LocalCategories;
    type Url = LocalUrl;

    fn init(&self) -> EngineResult<()> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn create_session(&self, credentials: &Credentials) -> EngineResult<LocalSession> {
        self.ensure_initialized()?;
        if credentials.serial.trim().is_empty() {
            return Err(EngineError::failed("empty license serial"));
        }
        Ok(LocalSession {
            credentials: credentials.clone(),
            activated: false,
            database: None,
        })
    }

    fn activate(&self, session: &mut LocalSession, endpoint: &ActivationEndpoint) -> EngineResult<()> {
        if let ActivationEndpoint::Custom(url) = endpoint {
            return Err(EngineError::Failed(format!(
                "activation server {} is unreachable",
                url
            )));
        }
        if !is_valid_serial(&session.credentials.serial) {
            return Err(EngineError::failed("serial is not in XXXX-XXXX-XXXX-XXXX form"));
        }
        session.activated = true;
        Ok(())
    }

    fn load_database(
        &self,
        session: &mut LocalSession,
        path: &Path,
        access: DatabaseAccess,
        version: CategorySetVersion,
    ) -> EngineResult<()> {
        let db = load(path)?;
        check_version(version, db.version())?;

        debug!(
            "database v{}: {} categories, {} hosts, {} suffix rules",
            db.version(),
            db.category_count(),
            db.entry_count(),
            db.suffix_count()
        );

        session.database = Some(match access {
            DatabaseAccess::Memory => LoadedDatabase::Memory(db),
            DatabaseAccess::File => LoadedDatabase::File {
                path: path.to_path_buf(),
                version: db.version(),
            },
        });
        Ok(())
    }

    fn destroy_session(&self, session: LocalSession) {
        debug!("destroying session for product {}", session.credentials.product_type);
    }

    fn create_attributes(&self, _session: &LocalSession) -> EngineResult<LocalAttributes> {
        Ok(LocalAttributes::default())
    }

    fn destroy_attributes(&self, _session: &LocalSession, _attributes: LocalAttributes) {}

    fn create_categories(&self, _session: &LocalSession) -> EngineResult<LocalCategories> {
        Ok(LocalCategories::default())
    }

    fn clear_categories(
        &self,
        _session: &LocalSession,
        categories: &mut LocalCategories,
    ) -> EngineResult<()> {
        categories.codes.clear();
        Ok(())
    }

    fn destroy_categories(&self, _session: &LocalSession, _categories: LocalCategories) {}

    fn create_url(&self, _session: &LocalSession) -> EngineResult<LocalUrl> {
        Ok(LocalUrl::default())
    }

    fn parse_url(
        &self,
        _session: &LocalSession,
        raw: &str,
        host_header: Option<&str>,
        url: &mut LocalUrl,
    ) -> EngineResult<()> {
        let mut parsed = parse_url(raw).map_err(|e| EngineError::Failed(e.to_string()))?;
        if let Some(header) = host_header {
            parsed.host = parse_host(header).map_err(|e| EngineError::Failed(e.to_string()))?;
        }
        url.parsed = Some(parsed);
        Ok(())
    }

    fn destroy_url(&self, _session: &LocalSession, _url: LocalUrl) {}

    #[allow(clippy::too_many_arguments)]
    fn rate(
        &self,
        session: &LocalSession,
        url: &LocalUrl,
        attributes: &mut LocalAttributes,
        categories: &mut LocalCategories,
        flags: RateFlags,
        version: CategorySetVersion,
        _session_id: u32,
        _user_agent: Option<&str>,
    ) -> EngineResult<()> {
        let parsed = url
            .parsed
            .as_ref()
            .ok_or_else(|| EngineError::failed("url has not been parsed"))?;
        let loaded = session.database.as_ref().ok_or(EngineError::NotLoaded)?;

        categories.codes.clear();
        attributes.reputation = None;

        if flags.contains(RateFlags::SKIP_DATABASE) {
            return Ok(());
        }

        let reread;
        let db = match loaded {
            LoadedDatabase::Memory(db) => db,
            LoadedDatabase::File { path, .. } => {
                reread = load(path)?;
                &reread
            }
        };
        check_version(version, db.version())?;

        if let Some(entry) = db.lookup(&parsed.host) {
            categories.codes.extend_from_slice(&entry.codes);
            attributes.reputation = entry.reputation;
        }
        Ok(())
    }

    fn category_count(
        &self,
        _session: &LocalSession,
        categories: &LocalCategories,
    ) -> EngineResult<usize> {
        Ok(categories.codes.len())
    }

    fn categories_to_array(
        &self,
        _session: &LocalSession,
        categories: &LocalCategories,
        out: &mut [u32],
    ) -> EngineResult<usize> {
        let codes = &categories.codes;
        if out.len() < codes.len() {
            return Err(EngineError::BufferTooSmall {
                required: codes.len(),
            });
        }
        out[..codes.len()].copy_from_slice(codes);
        Ok(codes.len())
    }

    fn categories_to_string(
        &self,
        session: &LocalSession,
        categories: &LocalCategories,
        language: Language,
        encoding: Encoding,
        delimiter: &str,
        out: &mut [u8],
    ) -> EngineResult<usize> {
        let Encoding::Utf8 = encoding;
        let short = match language {
            Language::English => false,
            Language::EnglishShort => true,
            other => return Err(EngineError::Unsupported(format!("language {:?}", other))),
        };
        if categories.codes.is_empty() {
            return Ok(0);
        }

        let reread;
        let db = match session.database.as_ref().ok_or(EngineError::NotLoaded)? {
            LoadedDatabase::Memory(db) => db,
            LoadedDatabase::File { path, .. } => {
                reread = load(path)?;
                &reread
            }
        };

        let mut names = Vec::with_capacity(categories.codes.len());
        for code in &categories.codes {
            let category = db
                .category(*code)
                .ok_or_else(|| EngineError::Failed(format!("unknown category code {}", code)))?;
            let name = match (&category.short_name, short) {
                (Some(short_name), true) => short_name,
                _ => &category.name,
            };
            names.push(name.as_str());
        }

        let rendered = names.join(delimiter);
        let bytes = rendered.as_bytes();
        if bytes.len() > out.len() {
            return Err(EngineError::BufferTooSmall {
                required: bytes.len(),
            });
        }
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    fn reputation(&self, _session: &LocalSession, attributes: &LocalAttributes) -> EngineResult<i32> {
        attributes
            .reputation
            .ok_or_else(|| EngineError::failed("no reputation recorded"))
    }
}
