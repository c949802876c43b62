//! Connection and operation-scoped parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How to reach and authenticate against the shim gateway.
///
/// Immutable once a client has been constructed from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParameters {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Use HTTPS.
    pub ssl: bool,
    /// Skip certificate verification (explicitly insecure).
    pub ssl_trust: bool,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8083,
            user: "scidb".to_string(),
            password: "scidb".to_string(),
            ssl: true,
            ssl_trust: false,
        }
    }
}

impl ConnectionParameters {
    /// Base URL with scheme and port; the scheme is derived from the
    /// TLS flag unless the host already carries one.
    pub fn base_url(&self) -> String {
        let scheme_given =
            self.host.starts_with("http://") || self.host.starts_with("https://");
        if scheme_given {
            format!("{}:{}", self.host, self.port)
        } else if self.ssl {
            format!("https://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// The array kinds a caller may request at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayKind {
    /// Plain array without reference metadata.
    Array,
    /// Spatially referenced array.
    SpatialArray,
    /// Spatially and temporally referenced array.
    SpatioTemporalArray,
    /// Temporal series: repeated writes append along the time axis.
    TemporalSeries,
}

impl ArrayKind {
    /// Whether writing into an existing array of this kind is allowed.
    pub fn is_appendable(&self) -> bool {
        matches!(
            self,
            ArrayKind::Array | ArrayKind::SpatialArray | ArrayKind::TemporalSeries
        )
    }
}

/// Parameters scoped to one create/write operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationParameters {
    pub kind: ArrayKind,
    /// Timestamp to resolve the temporal slice for spatio-temporal
    /// targets when no explicit index is given.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for CreationParameters {
    fn default() -> Self {
        Self {
            kind: ArrayKind::Array,
            timestamp: None,
        }
    }
}

/// Parameters scoped to one read/query operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParameters {
    /// Explicit temporal slice index.
    pub temporal_index: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_scheme() {
        let mut p = ConnectionParameters {
            host: "scidb.example.com".to_string(),
            port: 8083,
            ssl: false,
            ..Default::default()
        };
        assert_eq!(p.base_url(), "http://scidb.example.com:8083");
        p.ssl = true;
        assert_eq!(p.base_url(), "https://scidb.example.com:8083");
        p.host = "http://scidb.example.com".to_string();
        assert_eq!(p.base_url(), "http://scidb.example.com:8083");
    }

    #[test]
    fn test_appendable_kinds() {
        assert!(ArrayKind::Array.is_appendable());
        assert!(ArrayKind::SpatialArray.is_appendable());
        assert!(ArrayKind::TemporalSeries.is_appendable());
        assert!(!ArrayKind::SpatioTemporalArray.is_appendable());
    }
}
