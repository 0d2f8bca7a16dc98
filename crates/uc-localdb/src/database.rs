//! Category database loader
//!
//! The database is a line-oriented text file:
//!
//! ```text
//! # comment
//! @version 3
//! @category 1 News|news
//! @suffix co.uk
//! example.com 1,2
//! www.thesun.co.uk 1 rep=-20
//! ```
//!
//! `@category` defines a code with its English name and an optional short
//! name after `|`. `@suffix` adds a public suffix rule. Every other line is a
//! host entry: a domain, its comma-separated category codes, and an optional
//! web reputation score.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::hash::domain_key;
use crate::psl::{HostSuffixIter, LruCache, SuffixList};

const REGISTRABLE_CACHE_SIZE: usize = 4096;

/// Error type for database loading.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: unknown category code {code}")]
    UnknownCategory { line: usize, code: u32 },
    #[error("line {line}: category code {code} defined twice")]
    DuplicateCategory { line: usize, code: u32 },
}

/// A category in the database vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub code: u32,
    pub name: String,
    pub short_name: Option<String>,
}

/// Ratings recorded for one host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub codes: Vec<u32>,
    pub reputation: Option<i32>,
}

/// A parsed category database.
#[derive(Debug)]
pub struct Database {
    version: u32,
    categories: BTreeMap<u32, Category>,
    entries: HashMap<u64, Entry>,
    suffixes: SuffixList,
    registrable_cache: Mutex<LruCache>,
}

struct PendingEntry {
    line: usize,
    domain: String,
    codes: Vec<u32>,
    reputation: Option<i32>,
}

impl Database {
    /// Read and parse a database file.
    pub fn from_file(path: &Path) -> Result<Self, DatabaseError> {
        let text = fs::read_to_string(path).map_err(|source| DatabaseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse database text.
    pub fn parse(text: &str) -> Result<Self, DatabaseError> {
        let mut version = 1;
        let mut categories = BTreeMap::new();
        let mut suffixes = SuffixList::new();
        let mut pending = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || is_comment_line(line) {
                continue;
            }

            if line.starts_with('@') {
                let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                match keyword {
                    "@version" => {
                        version = rest.trim().parse().map_err(|_| {
                            syntax(line_no, format!("invalid version '{}'", rest.trim()))
                        })?;
                    }
                    "@category" => {
                        let category = parse_category(rest, line_no)?;
                        if categories.contains_key(&category.code) {
                            return Err(DatabaseError::DuplicateCategory {
                                line: line_no,
                                code: category.code,
                            });
                        }
                        categories.insert(category.code, category);
                    }
                    "@suffix" => {
                        if !suffixes.add_rule(rest) {
                            return Err(syntax(line_no, "empty suffix rule".to_string()));
                        }
                    }
                    _ => return Err(syntax(line_no, format!("unknown directive '{}'", keyword))),
                }
                continue;
            }

            pending.push(parse_entry(line, line_no)?);
        }

        // Entries may precede the categories they use.
        let mut entries: HashMap<u64, Entry> = HashMap::new();
        for p in pending {
            if let Some(&code) = p.codes.iter().find(|c| !categories.contains_key(*c)) {
                return Err(DatabaseError::UnknownCategory { line: p.line, code });
            }

            let entry = entries.entry(domain_key(&p.domain)).or_default();
            for code in p.codes {
                if !entry.codes.contains(&code) {
                    entry.codes.push(code);
                }
            }
            if p.reputation.is_some() {
                entry.reputation = p.reputation;
            }
        }

        Ok(Self {
            version,
            categories,
            entries,
            suffixes,
            registrable_cache: Mutex::new(LruCache::new(REGISTRABLE_CACHE_SIZE)),
        })
    }

    /// Category-set version of this database.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn category(&self, code: u32) -> Option<&Category> {
        self.categories.get(&code)
    }

    /// Categories ordered by code.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Number of distinct hosts with an entry.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn suffix_count(&self) -> usize {
        self.suffixes.len()
    }

    /// Entry recorded for exactly `host`.
    pub fn entry(&self, host: &str) -> Option<&Entry> {
        self.entries.get(&domain_key(host))
    }

    /// Most specific entry for `host`, walking parent domains down to the
    /// registrable domain. IP hosts only match exactly.
    pub fn lookup(&self, host: &str) -> Option<&Entry> {
        if host.parse::<IpAddr>().is_ok() {
            return self.entry(host);
        }

        let registrable = self.registrable_domain(host);
        HostSuffixIter::new(host, registrable.len()).find_map(|candidate| self.entry(candidate))
    }

    /// Registrable domain of `host`, cached.
    pub fn registrable_domain(&self, host: &str) -> String {
        let mut cache = self
            .registrable_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = cache.get(host) {
            return cached;
        }
        let result = self.suffixes.registrable_domain(host);
        cache.insert(host.to_string(), result.clone());
        result
    }
}

fn syntax(line: usize, message: String) -> DatabaseError {
    DatabaseError::Syntax { line, message }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('!')
}

fn parse_category(rest: &str, line_no: usize) -> Result<Category, DatabaseError> {
    let rest = rest.trim();
    let (code_text, names) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| syntax(line_no, "expected '@category <code> <name>'".to_string()))?;

    let code = code_text
        .parse()
        .map_err(|_| syntax(line_no, format!("invalid category code '{}'", code_text)))?;

    let (name, short_name) = match names.split_once('|') {
        Some((name, short)) => (name.trim(), Some(short.trim())),
        None => (names.trim(), None),
    };

    // Names end up joined by ',' when rendered.
    if name.is_empty() || name.contains(',') {
        return Err(syntax(line_no, format!("invalid category name '{}'", name)));
    }
    let short_name = match short_name {
        Some(s) if s.is_empty() || s.contains(',') => {
            return Err(syntax(line_no, format!("invalid short name '{}'", s)));
        }
        other => other.map(str::to_string),
    };

    Ok(Category {
        code,
        name: name.to_string(),
        short_name,
    })
}

fn parse_entry(line: &str, line_no: usize) -> Result<PendingEntry, DatabaseError> {
    let mut parts = line.split_whitespace();
    let domain_text = parts.next().unwrap_or_default();
    let codes_text = parts
        .next()
        .ok_or_else(|| syntax(line_no, format!("missing category codes for '{}'", domain_text)))?;

    let domain = normalize_domain(domain_text)
        .ok_or_else(|| syntax(line_no, format!("invalid domain '{}'", domain_text)))?;

    let codes = codes_text
        .split(',')
        .filter(|c| !c.is_empty())
        .map(|c| {
            c.parse::<u32>()
                .map_err(|_| syntax(line_no, format!("invalid category code '{}'", c)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut reputation = None;
    for option in parts {
        match option.strip_prefix("rep=") {
            Some(value) => {
                reputation = Some(value.parse().map_err(|_| {
                    syntax(line_no, format!("invalid reputation '{}'", value))
                })?);
            }
            None => return Err(syntax(line_no, format!("unknown option '{}'", option))),
        }
    }

    Ok(PendingEntry {
        line: line_no,
        domain,
        codes,
        reputation,
    })
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_' || b == b':')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}
