//! In-memory registry of tracking links
//!
//! Links live for the lifetime of the process. The map is a `DashMap`, so
//! inserts, lookups and visit appends on different links proceed in
//! parallel, while appends to the same link are serialized by its shard lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geo::GeoLocator;
use crate::models::{GeoResult, TrackingLink, Visit};

/// Redraws allowed when a fresh id is already taken
const MAX_ID_ATTEMPTS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),
    #[error("tracking link {0} not found")]
    NotFound(String),
    #[error("could not allocate a unique link id")]
    IdExhausted,
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// 8 random bytes from the thread-local CSPRNG as 16 hex characters
pub fn generate_link_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

pub struct LinkRegistry {
    links: DashMap<String, TrackingLink>,
    geo: Arc<dyn GeoLocator>,
    lookup_timeout: Duration,
}

impl LinkRegistry {
    /// `lookup_timeout` bounds each geolocation call made by [`record_visit`].
    ///
    /// [`record_visit`]: LinkRegistry::record_visit
    pub fn new(geo: Arc<dyn GeoLocator>, lookup_timeout: Duration) -> Self {
        Self {
            links: DashMap::new(),
            geo,
            lookup_timeout,
        }
    }

    /// Register a new link and return its id
    pub fn create(&self, original_url: Option<&str>) -> RegistryResult<String> {
        let original_url = match original_url {
            Some(url) if !url.is_empty() => url,
            _ => return Err(RegistryError::Validation("URL is required".to_string())),
        };

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_link_id();
            match self.links.entry(id.clone()) {
                Entry::Occupied(_) => {
                    warn!(id = %id, "generated link id collided, drawing again");
                }
                Entry::Vacant(slot) => {
                    slot.insert(TrackingLink::new(id.clone(), original_url.to_string()));
                    info!(id = %id, url = %original_url, "created tracking link");
                    return Ok(id);
                }
            }
        }

        // Repeated collisions in a 64-bit space mean the generator is broken
        Err(RegistryError::IdExhausted)
    }

    /// Record a visit and return the URL to redirect to
    ///
    /// Geolocation failures never fail the visit; the location degrades to
    /// the bare address instead.
    pub async fn record_visit(&self, id: &str, client_ip: Option<&str>) -> RegistryResult<String> {
        let original_url = self
            .links
            .get(id)
            .map(|link| link.original_url.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        // No map guard may be held across this await
        let location = match tokio::time::timeout(self.lookup_timeout, self.geo.resolve(client_ip))
            .await
        {
            Ok(location) => location,
            Err(_) => {
                debug!(id, ip = ?client_ip, "geolocation exceeded its deadline");
                GeoResult::ip_only(client_ip)
            }
        };

        let visit = Visit {
            timestamp: Utc::now(),
            location,
        };

        // Links are never removed, so the entry is still present
        let mut link = self
            .links
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        link.visits.push(visit);
        info!(id, ip = ?client_ip, visits = link.visits.len(), "recorded visit");

        Ok(original_url)
    }

    /// Snapshot of a link and all of its visits
    pub fn get(&self, id: &str) -> RegistryResult<TrackingLink> {
        self.links
            .get(id)
            .map(|link| link.value().clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
