//! Public suffix handling for registrable-domain (eTLD+1) extraction
//!
//! Suffix rules come from `@suffix` lines of the category database. When no
//! rule matches, a heuristic covering the common two-part TLDs is used.
//!
//! # Examples
//!
//! ```
//! use uc_localdb::psl::SuffixList;
//!
//! let list = SuffixList::new();
//! assert_eq!(list.registrable_domain("sub.example.com"), "example.com");
//! assert_eq!(list.registrable_domain("sub.example.co.uk"), "example.co.uk");
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use crate::hash::domain_key;

// =============================================================================
// LRU Cache
// =============================================================================

/// Fixed-size cache of registrable-domain lookups.
#[derive(Debug)]
pub struct LruCache {
    capacity: usize,
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        let value = self.entries.get(key)?.clone();
        // Move to back (most recently used)
        self.order.retain(|k| k != key);
        self.order.push_back(key.to_string());
        Some(value)
    }

    pub fn insert(&mut self, key: String, value: String) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.contains_key(&key) {
            self.order.retain(|k| *k != key);
        } else if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Suffix Rules
// =============================================================================

/// Common two-part TLDs for fallback.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Public suffix rules in PSL syntax.
#[derive(Debug, Default, Clone)]
pub struct SuffixList {
    /// Exact rules (e.g., "com", "co.uk")
    exact: HashSet<u64>,
    /// Wildcard rules ("*.ck" stored as "ck")
    wildcard: HashSet<u64>,
    /// Exception rules ("!www.ck" stored as "www.ck")
    exception: HashSet<u64>,
}

impl SuffixList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule: `co.uk`, `*.ck` or `!www.ck`.
    /// Returns false if the rule is empty.
    pub fn add_rule(&mut self, rule: &str) -> bool {
        let rule = rule.trim().trim_end_matches('.');
        if let Some(rest) = rule.strip_prefix('!') {
            insert_non_empty(&mut self.exception, rest)
        } else if let Some(rest) = rule.strip_prefix("*.") {
            insert_non_empty(&mut self.wildcard, rest)
        } else {
            insert_non_empty(&mut self.exact, rule)
        }
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len() + self.exception.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registrable domain (eTLD+1) of `host`.
    pub fn registrable_domain(&self, host: &str) -> String {
        let host = host.to_ascii_lowercase();
        let host = host.trim_end_matches('.');
        let labels: Vec<&str> = host.split('.').collect();
        let n = labels.len();

        if n <= 1 {
            return host.to_string();
        }

        for i in 0..n - 1 {
            let suffix = labels[i..].join(".");

            // Exception rules override wildcards
            if self.exception.contains(&domain_key(&suffix)) {
                return suffix;
            }

            if self.exact.contains(&domain_key(&suffix)) {
                return if i > 0 {
                    labels[i - 1..].join(".")
                } else {
                    host.to_string()
                };
            }

            // Wildcard rule on the parent makes `suffix` itself public.
            let parent = labels[i + 1..].join(".");
            if self.wildcard.contains(&domain_key(&parent)) {
                return if i > 0 {
                    labels[i - 1..].join(".")
                } else {
                    suffix
                };
            }
        }

        fallback_registrable(&labels)
    }
}

fn insert_non_empty(set: &mut HashSet<u64>, rule: &str) -> bool {
    if rule.is_empty() {
        return false;
    }
    set.insert(domain_key(rule));
    true
}

/// Fallback eTLD+1 heuristic.
fn fallback_registrable(labels: &[&str]) -> String {
    let n = labels.len();
    if n <= 2 {
        return labels.join(".");
    }

    let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
    if COMMON_TWO_PART_TLDS.contains(&last_two.as_str()) {
        return labels[n - 3..].join(".");
    }

    labels[n - 2..].join(".")
}

// =============================================================================
// Suffix Walking
// =============================================================================

/// Strip the leftmost label.
pub fn parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Walks a host from most specific to its registrable domain.
pub struct HostSuffixIter<'a> {
    current: &'a str,
    stop_len: usize,
}

impl<'a> HostSuffixIter<'a> {
    /// `registrable_len` is the length of the host's registrable domain.
    pub fn new(host: &'a str, registrable_len: usize) -> Self {
        Self {
            current: host,
            stop_len: registrable_len,
        }
    }
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_empty() || self.current.len() < self.stop_len {
            return None;
        }

        let result = self.current;
        self.current = match parent_domain(self.current) {
            Some(parent) if parent.len() >= self.stop_len => parent,
            _ => "",
        };

        Some(result)
    }
}
