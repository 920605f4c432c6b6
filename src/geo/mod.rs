//! Visitor geolocation
//!
//! Enrichment is best-effort: lookups report failures through [`GeoError`],
//! but [`GeoLocator::resolve`] folds every failure into a degraded
//! [`GeoResult`] so callers never see an error from this module.

pub mod ipapi;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::models::GeoResult;

pub use ipapi::IpApiLocator;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation lookup timed out")]
    Timeout,
    #[error("geolocation request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("geolocation provider returned status {0}")]
    Status(u16),
    #[error("malformed geolocation response: {0}")]
    Malformed(String),
    #[error("geolocation provider rejected lookup: {0}")]
    Provider(String),
    #[error("not an ip address: {0}")]
    InvalidAddress(String),
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Look up a single address, reporting why enrichment failed
    async fn lookup(&self, ip: &str) -> Result<GeoResult, GeoError>;

    /// Resolve an optional address, never failing
    ///
    /// No lookup is attempted without an address. A failed lookup keeps the
    /// address and drops everything else.
    async fn resolve(&self, ip: Option<&str>) -> GeoResult {
        let Some(ip) = ip else {
            return GeoResult::default();
        };

        match self.lookup(ip).await {
            Ok(location) => location,
            Err(err) => {
                debug!(ip, error = %err, "geolocation unavailable, keeping bare ip");
                GeoResult::ip_only(Some(ip))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLocator {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl GeoLocator for CountingLocator {
        async fn lookup(&self, ip: &str) -> Result<GeoResult, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeoError::Status(503));
            }
            Ok(GeoResult {
                ip: Some(ip.to_string()),
                city: Some("Lisbon".to_string()),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_resolve_without_ip_skips_lookup() {
        let locator = CountingLocator {
            calls: AtomicUsize::new(0),
            fail: false,
        };

        let result = locator.resolve(None).await;

        assert_eq!(result, GeoResult::default());
        assert_eq!(locator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_degrades_to_ip_on_failure() {
        let locator = CountingLocator {
            calls: AtomicUsize::new(0),
            fail: true,
        };

        let result = locator.resolve(Some("198.51.100.7")).await;

        assert_eq!(result, GeoResult::ip_only(Some("198.51.100.7")));
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_passes_through_success() {
        let locator = CountingLocator {
            calls: AtomicUsize::new(0),
            fail: false,
        };

        let result = locator.resolve(Some("198.51.100.7")).await;

        assert_eq!(result.city.as_deref(), Some("Lisbon"));
        assert_eq!(result.ip.as_deref(), Some("198.51.100.7"));
    }
}
