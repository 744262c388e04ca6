//! Startup location resolution.
//!
//! Priority chain, each tier tried only when the previous one yields nothing:
//! persisted selection, device position, most recent saved location, built-in
//! default. Geolocation failures never reach the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc, time::Duration};

use crate::{
    config::GeolocationConfig,
    error::LocationError,
    model::{Coordinates, Location},
    saved::SavedLocations,
};

/// Name given to a device position; no reverse geocoding is done.
pub const CURRENT_POSITION_NAME: &str = "Current Location";

pub const DEFAULT_IP_ENDPOINT: &str = "http://ip-api.com/json/?fields=status,message,lat,lon";

/// Source of the device's current position.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    fn is_available(&self) -> bool;

    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// No positioning capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

#[async_trait]
impl LocationProvider for Disabled {
    fn is_available(&self) -> bool {
        false
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable("geolocation disabled".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Approximate position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpLocationProvider {
    endpoint: String,
    http: Client,
}

impl IpLocationProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }
}

#[async_trait]
impl LocationProvider for IpLocationProvider {
    fn is_available(&self) -> bool {
        true
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let response = self.http.get(&self.endpoint).send().await.map_err(|e| {
            if e.is_timeout() {
                LocationError::Timeout
            } else {
                LocationError::Unavailable(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "IP location lookup refused");
            return Err(LocationError::Denied);
        }

        let body: IpLookupResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LocationError::Timeout
            } else {
                LocationError::Unavailable(format!("unexpected response: {e}"))
            }
        })?;

        if body.status != "success" {
            tracing::debug!(message = ?body.message, "IP location lookup failed");
            return Err(LocationError::Denied);
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon)
                .map_err(|e| LocationError::Unavailable(e.to_string())),
            _ => Err(LocationError::Unavailable("response missing coordinates".to_string())),
        }
    }
}

/// Build the position provider described by config.
pub fn location_provider_from_config(config: &GeolocationConfig) -> Arc<dyn LocationProvider> {
    if !config.enabled {
        return Arc::new(Disabled);
    }

    match IpLocationProvider::new(config.endpoint.clone(), Duration::from_secs(config.timeout_secs)) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            tracing::warn!("Failed to create geolocation client: {}", e);
            Arc::new(Disabled)
        }
    }
}

/// Which tier of the chain produced a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrom {
    Selected,
    DevicePosition,
    Saved,
    Default,
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    geolocation: Arc<dyn LocationProvider>,
    saved: SavedLocations,
    default_location: Location,
}

impl LocationResolver {
    pub fn new(
        geolocation: Arc<dyn LocationProvider>,
        saved: SavedLocations,
        default_location: Location,
    ) -> Self {
        Self {
            geolocation,
            saved,
            default_location,
        }
    }

    pub async fn resolve(&self) -> Location {
        self.resolve_with_source().await.0
    }

    pub async fn resolve_with_source(&self) -> (Location, ResolvedFrom) {
        if let Some(selected) = self.saved.selected() {
            tracing::debug!(name = %selected.name, "Using persisted selection");
            return (selected, ResolvedFrom::Selected);
        }

        if self.geolocation.is_available() {
            match self.geolocation.current_position().await {
                Ok(coords) => {
                    tracing::debug!(%coords, "Using device position");
                    return (
                        Location::new(CURRENT_POSITION_NAME, coords.lat, coords.lon),
                        ResolvedFrom::DevicePosition,
                    );
                }
                Err(e) => tracing::warn!("Geolocation denied or failed: {}", e),
            }
        }

        if let Some(recent) = self.saved.most_recent() {
            tracing::debug!(name = %recent.name, "Using most recent saved location");
            return (recent, ResolvedFrom::Saved);
        }

        tracing::debug!(name = %self.default_location.name, "Using default location");
        (self.default_location.clone(), ResolvedFrom::Default)
    }
}
