//! Endpoint address validation.
//!
//! The embedded devices are only ever reached by raw IPv4 address, optionally with a
//! port. Anything else (host names, IPv6, malformed quads) is rejected before a request
//! is built.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error_handling::types::GatewayError;

fn address_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}(:\d+)?$").ok())
        .as_ref()
}

/// Strips an `http://` / `https://` prefix and one trailing slash.
pub fn normalize(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    without_scheme.strip_suffix('/').unwrap_or(without_scheme)
}

/// A validated `host[:port]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    host: Ipv4Addr,
    port: Option<u16>,
}

impl EndpointAddress {
    pub fn new(host: Ipv4Addr, port: Option<u16>) -> Self {
        Self { host, port }
    }

    /// Validates a raw `host[:port]` string, tolerating a scheme prefix and a trailing slash.
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let candidate = normalize(raw);
        if !address_pattern().is_some_and(|pattern| pattern.is_match(candidate)) {
            return Err(GatewayError::InvalidAddress(raw.to_string()));
        }

        let (host, port) = match candidate.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (candidate, None),
        };
        let host: Ipv4Addr = host
            .parse()
            .map_err(|_| GatewayError::InvalidAddress(raw.to_string()))?;
        let port = match port {
            Some(p) => Some(
                p.parse::<u16>()
                    .map_err(|_| GatewayError::InvalidAddress(raw.to_string()))?,
            ),
            None => None,
        };

        Ok(Self { host, port })
    }

    /// Splits a full URL into its validated address and the remaining path (with query).
    ///
    /// `http://192.168.4.1/arm?state=1` yields `192.168.4.1` and `/arm?state=1`.
    pub fn split_url(url: &str) -> Result<(Self, String), GatewayError> {
        let trimmed = url.trim();
        let rest = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .unwrap_or(trimmed);
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let address = Self::parse(authority)
            .map_err(|_| GatewayError::InvalidAddress(url.to_string()))?;
        Ok((address, path.to_string()))
    }

    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `http://host[:port]`, without trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", self)
    }

    /// Joins a device path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url(), path)
        } else {
            format!("{}/{}", self.base_url(), path)
        }
    }

    /// Address of the `offset`-th neighbour in the same /24, on the given port.
    ///
    /// Returns `None` when the last octet would overflow.
    pub fn neighbour(&self, offset: u8, port: u16) -> Option<Self> {
        let [a, b, c, d] = self.host.octets();
        let last = d.checked_add(offset)?;
        Some(Self {
            host: Ipv4Addr::new(a, b, c, last),
            port: Some(port),
        })
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => write!(f, "{}", self.host),
        }
    }
}
