//! HTTP geolocation against an ipapi.co compatible provider
//!
//! The provider is queried as `GET {base}/{ip}/json/` and is expected to
//! answer with a flat JSON object carrying `city`, `region`, `country_name`,
//! `latitude` and `longitude`.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{GeoError, GeoLocator};
use crate::models::GeoResult;

pub const DEFAULT_PROVIDER_URL: &str = "https://ipapi.co";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// Set by the provider for reserved or unparseable addresses
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

/// Geolocation over HTTP with one shared client and a hard per-request timeout
#[derive(Clone)]
pub struct IpApiLocator {
    client: Client,
    base_url: String,
}

impl IpApiLocator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tracklink/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for geolocation")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn transport_error(err: reqwest::Error) -> GeoError {
    if err.is_timeout() {
        GeoError::Timeout
    } else {
        GeoError::Transport(err)
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn lookup(&self, ip: &str) -> Result<GeoResult, GeoError> {
        // Only well-formed addresses go into the request path
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| GeoError::InvalidAddress(ip.to_string()))?;

        let url = format!("{}/{}/json/", self.base_url, addr);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }

        let body: IpApiResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                GeoError::Timeout
            } else {
                GeoError::Malformed(err.to_string())
            }
        })?;

        if body.error {
            return Err(GeoError::Provider(
                body.reason.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }

        Ok(GeoResult {
            ip: Some(ip.to_string()),
            city: body.city,
            region: body.region,
            country: body.country_name,
            latitude: body.latitude,
            longitude: body.longitude,
        })
    }
}
