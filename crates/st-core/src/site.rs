//! Normalized hostname keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

/// A normalized hostname (lower-case ASCII, no scheme, no path).
///
/// This is the key for every piece of per-site state. Ordering is plain
/// lexicographic ordering of the hostname, which the metrics tie-break relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteKey(String);

impl SiteKey {
    /// Creates a key from a bare hostname.
    ///
    /// The host goes through the same WHATWG host parser as tab URLs, so
    /// configured names are lower-cased and internationalized names become
    /// punycode (`münchen.de` is stored as `xn--mnchen-3ya.de`).
    pub fn new(host: &str) -> Result<Self, InvalidSiteKey> {
        let host = host.trim();
        if host.is_empty() || host.contains("://") {
            return Err(InvalidSiteKey(host.to_string()));
        }
        match Host::parse(host) {
            Ok(Host::Domain(domain)) => Ok(Self(domain)),
            Ok(Host::Ipv4(addr)) => Ok(Self(addr.to_string())),
            Ok(Host::Ipv6(addr)) => Ok(Self(format!("[{addr}]"))),
            Err(err) => {
                tracing::debug!(host, %err, "rejecting site key");
                Err(InvalidSiteKey(host.to_string()))
            }
        }
    }

    /// Resolves the site for a tab URL.
    ///
    /// Returns `None` for anything that is not an `http`/`https` URL with a host,
    /// including URLs that fail to parse.
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!(url = raw, %err, "ignoring unparseable tab url");
                return None;
            }
        };
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.host_str().and_then(|host| Self::new(host).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SiteKey {
    type Err = InvalidSiteKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for SiteKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SiteKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for strings that are not usable as a hostname key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSiteKey(String);

impl fmt::Display for InvalidSiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid site key: {:?}", self.0)
    }
}

impl std::error::Error for InvalidSiteKey {}
