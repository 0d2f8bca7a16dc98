//! Shared type definitions for urlcat
//!
//! These types describe the parameters of the engine capability surface:
//! credentials, category-set versions, database access modes, rendering
//! options and rating flags.

use std::fmt;

// =============================================================================
// Credentials
// =============================================================================

/// Opaque credentials presented when creating an engine session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// License serial
    pub serial: String,
    /// Optional client identifier
    pub client_id: Option<String>,
    /// Product identity reported to the engine
    pub product_type: String,
    /// Product version reported to the engine
    pub product_version: String,
}

impl Credentials {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            client_id: None,
            product_type: DEFAULT_PRODUCT_TYPE.to_string(),
            product_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// The serial is a license key; keep it out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("serial", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("product_type", &self.product_type)
            .field("product_version", &self.product_version)
            .finish()
    }
}

/// Product type reported when none is configured.
pub const DEFAULT_PRODUCT_TYPE: &str = "urlcat";

// =============================================================================
// Activation
// =============================================================================

/// Where license activation is performed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivationEndpoint {
    /// The engine's built-in activation server
    #[default]
    Default,
    /// An explicit activation server URL
    Custom(String),
}

impl ActivationEndpoint {
    /// Parse from a configuration string. `"default"` and the empty string
    /// select the built-in endpoint.
    pub fn from_config(s: &str) -> Self {
        match s.trim() {
            "" | "default" => Self::Default,
            other => Self::Custom(other.to_string()),
        }
    }
}

// =============================================================================
// Category Set Versions
// =============================================================================

/// Selects which category-set version an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CategorySetVersion {
    /// Most recent version the engine knows about
    #[default]
    Latest,
    /// Every version
    All,
    /// Whatever version is currently loaded into the session
    Loaded,
    /// A specific version number
    Exact(u32),
}

impl CategorySetVersion {
    const RAW_LATEST: u32 = u32::MAX;
    const RAW_ALL: u32 = u32::MAX - 1;
    const RAW_LOADED: u32 = u32::MAX - 2;

    /// Raw wire value, with the symbolic versions at the top of the range.
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Latest => Self::RAW_LATEST,
            Self::All => Self::RAW_ALL,
            Self::Loaded => Self::RAW_LOADED,
            Self::Exact(v) => v,
        }
    }

    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            Self::RAW_LATEST => Self::Latest,
            Self::RAW_ALL => Self::All,
            Self::RAW_LOADED => Self::Loaded,
            v => Self::Exact(v),
        }
    }

    /// Parse from a configuration string: `latest`, `all`, `loaded` or a number.
    pub fn from_config(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Some(Self::Latest),
            "all" => Some(Self::All),
            "loaded" => Some(Self::Loaded),
            other => other.parse().ok().map(Self::Exact),
        }
    }
}

// =============================================================================
// Database Access
// =============================================================================

/// How the engine accesses its local database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DatabaseAccess {
    /// Load the whole database into memory
    #[default]
    Memory,
    /// Read from the file on demand
    File,
}

impl DatabaseAccess {
    pub fn from_config(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Language used when rendering category names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    /// Abbreviated English category names
    EnglishShort,
    German,
    French,
    Spanish,
    Portuguese,
    Russian,
    Italian,
    Korean,
    Japanese,
    ChineseSimplified,
    ChineseTraditional,
}

/// Text encoding used when rendering category names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Utf8,
}

// =============================================================================
// Rate Flags
// =============================================================================

bitflags::bitflags! {
    /// Sources the engine should skip while rating a URL.
    ///
    /// An empty set asks for a full rating.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RateFlags: u32 {
        const SKIP_CUSTOM_KEYWORDS = 1 << 0;
        const SKIP_CUSTOM_SITES = 1 << 1;
        /// Skip the local database lookup
        const SKIP_DATABASE = 1 << 2;
        const SKIP_DATABASE_KEYWORDS = 1 << 3;
        const SKIP_PATTERNS = 1 << 4;
        const SKIP_CGIS = 1 << 5;
        const SKIP_EMBEDDED_URLS = 1 << 6;
        /// Skip the remote reputation lookup
        const SKIP_REMOTE = 1 << 7;
        const SKIP_DNS = 1 << 8;
        const SKIP_WEBREP_PRESERVE = 1 << 9;
        const SKIP_CACHE = 1 << 10;

        /// Every skip flag
        const SKIP_ALL = 0x7FF;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_set_version_raw_round_trip() {
        for v in [
            CategorySetVersion::Latest,
            CategorySetVersion::All,
            CategorySetVersion::Loaded,
            CategorySetVersion::Exact(7),
        ] {
            assert_eq!(CategorySetVersion::from_raw(v.to_raw()), v);
        }
        assert_eq!(CategorySetVersion::Loaded.to_raw(), u32::MAX - 2);
    }

    #[test]
    fn test_category_set_version_from_config() {
        assert_eq!(CategorySetVersion::from_config("Latest"), Some(CategorySetVersion::Latest));
        assert_eq!(CategorySetVersion::from_config(" loaded "), Some(CategorySetVersion::Loaded));
        assert_eq!(CategorySetVersion::from_config("12"), Some(CategorySetVersion::Exact(12)));
        assert_eq!(CategorySetVersion::from_config("newest"), None);
    }

    #[test]
    fn test_activation_endpoint_from_config() {
        assert_eq!(ActivationEndpoint::from_config("default"), ActivationEndpoint::Default);
        assert_eq!(ActivationEndpoint::from_config(""), ActivationEndpoint::Default);
        assert_eq!(
            ActivationEndpoint::from_config("https://activate.example.net"),
            ActivationEndpoint::Custom("https://activate.example.net".to_string())
        );
    }

    #[test]
    fn test_credentials_debug_redacts_serial() {
        let creds = Credentials::new("SF6S-HH37-G34G-X75H");
        let out = format!("{:?}", creds);
        assert!(!out.contains("SF6S"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn test_rate_flags_default_is_empty() {
        assert!(RateFlags::default().is_empty());
        assert!(RateFlags::SKIP_ALL.contains(RateFlags::SKIP_DATABASE | RateFlags::SKIP_CACHE));
    }
}
