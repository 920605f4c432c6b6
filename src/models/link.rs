use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracking link and every visit recorded against it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingLink {
    #[serde(skip)]
    pub id: String,
    pub original_url: String,
    /// Append-only, in the order visits were recorded
    pub visits: Vec<Visit>,
}

impl TrackingLink {
    pub fn new(id: String, original_url: String) -> Self {
        Self {
            id,
            original_url,
            visits: Vec::new(),
        }
    }
}

/// One redirect-through event
#[derive(Debug, Clone, Serialize)]
pub struct Visit {
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub location: GeoResult,
}

/// Best-effort location for a visitor
///
/// `ip` is kept whenever it is known, even if the lookup failed. Every other
/// field is absent when the provider did not supply it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl GeoResult {
    /// Degraded result carrying only the address
    pub fn ip_only(ip: Option<&str>) -> Self {
        Self {
            ip: ip.map(str::to_string),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkResponse {
    pub tracking_url: String,
}

/// RFC 3339 with millisecond precision and a `Z` suffix
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}
