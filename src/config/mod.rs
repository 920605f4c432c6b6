use std::time::Duration;

use anyhow::Context;

use crate::geo::ipapi::{DEFAULT_PROVIDER_URL, DEFAULT_TIMEOUT};

/// Log filter used when `RUST_LOG` is unset; includes one line per request
pub const DEFAULT_LOG_FILTER: &str = "tracklink=info,tower_http=info";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Base used when composing tracking URLs. Derived from the request's
    /// Host header when unset.
    pub public_base_url: Option<String>,
    pub geo: GeoConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub provider_url: String,
    pub timeout_ms: u64,
}

impl GeoConfig {
    const fn default_timeout_ms() -> u64 {
        DEFAULT_TIMEOUT.as_millis() as u64
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let provider_url = std::env::var("GEO_PROVIDER_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string());

        // The lookup sits on every redirect, so a zero or garbage value must
        // not turn into an unbounded wait
        let timeout_ms = match std::env::var("GEO_TIMEOUT_MS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    tracing::warn!(
                        "Invalid GEO_TIMEOUT_MS '{raw}', falling back to {}ms",
                        GeoConfig::default_timeout_ms()
                    );
                    GeoConfig::default_timeout_ms()
                }
            },
            Err(_) => GeoConfig::default_timeout_ms(),
        };

        Ok(Config {
            server: ServerConfig { host, port },
            public_base_url,
            geo: GeoConfig {
                provider_url,
                timeout_ms,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_defaults() {
        let geo = GeoConfig::default();
        assert_eq!(geo.provider_url, "https://ipapi.co");
        assert_eq!(geo.timeout(), Duration::from_secs(3));
    }
}
