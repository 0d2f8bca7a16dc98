//! URL parsing for rating
//!
//! Accepts `scheme://[userinfo@]host[:port][/path][?query][#fragment]` and
//! bare `host[/path]` forms, the latter with an implied `http` scheme.

use std::net::IpAddr;

/// Error type for URL parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty url")]
    Empty,
    #[error("invalid character {0:?} in url")]
    InvalidCharacter(char),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("missing host")]
    MissingHost,
    #[error("invalid host: {0}")]
    InvalidHost(String),
    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// URL schemes the engine can rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
    Ws,
    Wss,
    Ftp,
}

impl Scheme {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "ws" => Some(Self::Ws),
            "wss" => Some(Self::Wss),
            "ftp" => Some(Self::Ftp),
            _ => None,
        }
    }
}

/// A parsed URL. The host is lowercased and has no trailing dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: Scheme,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

impl ParsedUrl {
    /// Whether the host is an IP address literal.
    pub fn is_ip(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }
}

/// Parse a raw URL string.
pub fn parse_url(raw: &str) -> Result<ParsedUrl, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }
    if let Some(c) = raw.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(UrlError::InvalidCharacter(c));
    }

    let (scheme, rest) = match get_scheme_end(raw) {
        Some(end) => {
            let name = &raw[..end - 3];
            let scheme =
                Scheme::from_name(name).ok_or_else(|| UrlError::UnsupportedScheme(name.to_string()))?;
            (scheme, &raw[end..])
        }
        None => (Scheme::Http, raw),
    };

    // Authority runs up to the first '/', '?' or '#'
    let authority_end = rest
        .find(|c: char| c == '/' || c == '?' || c == '#')
        .unwrap_or(rest.len());
    let authority = &rest[..authority_end];

    // Skip userinfo
    let host_port = match authority.rfind('@') {
        Some(at) => &authority[at + 1..],
        None => authority,
    };

    let (host, port) = split_host_port(host_port)?;
    let host = normalize_host(host)?;

    Ok(ParsedUrl {
        scheme,
        host,
        port,
        path: extract_path(&rest[authority_end..]).to_string(),
    })
}

/// Parse a bare host, as found in a `Host` header.
pub fn parse_host(raw: &str) -> Result<String, UrlError> {
    let (host, _) = split_host_port(raw.trim())?;
    normalize_host(host)
}

/// Position after "://", if the URL has a scheme.
fn get_scheme_end(url: &str) -> Option<usize> {
    let colon = url.find("://")?;
    let name = &url[..colon];
    if name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
    {
        return None;
    }
    Some(colon + 3)
}

fn split_host_port(host_port: &str) -> Result<(&str, Option<u16>), UrlError> {
    // Bracketed IPv6 literal
    if let Some(rest) = host_port.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| UrlError::InvalidHost(host_port.to_string()))?;
        let host = &rest[..close];
        let port = match &rest[close + 1..] {
            "" => None,
            tail => Some(parse_port(tail.strip_prefix(':').unwrap_or(tail))?),
        };
        return Ok((host, port));
    }

    match host_port.rfind(':') {
        Some(colon) => Ok((&host_port[..colon], Some(parse_port(&host_port[colon + 1..])?))),
        None => Ok((host_port, None)),
    }
}

fn parse_port(port: &str) -> Result<u16, UrlError> {
    port.parse()
        .map_err(|_| UrlError::InvalidPort(port.to_string()))
}

fn normalize_host(host: &str) -> Result<String, UrlError> {
    let trimmed = host.trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(UrlError::MissingHost);
    }

    if trimmed.parse::<IpAddr>().is_ok() {
        return Ok(trimmed.to_ascii_lowercase());
    }

    let valid = trimmed.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    });
    if !valid || trimmed.len() > 253 {
        return Err(UrlError::InvalidHost(host.to_string()));
    }

    Ok(trimmed.to_ascii_lowercase())
}

/// Path portion of everything after the authority.
fn extract_path(after_authority: &str) -> &str {
    if !after_authority.starts_with('/') {
        return "/";
    }
    let end = after_authority
        .find(|c: char| c == '?' || c == '#')
        .unwrap_or(after_authority.len());
    &after_authority[..end]
}
