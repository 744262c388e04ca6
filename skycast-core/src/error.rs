//! Error types shared across the core crate.

use thiserror::Error;

/// Failures that abort a weather operation and are surfaced to the caller.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Latitude or longitude is not a finite number. Detected before any network call.
    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: String, lon: String },

    /// Transport error or non-success response from one of the endpoints.
    #[error("{endpoint} request failed: {reason}")]
    NetworkFailure {
        endpoint: &'static str,
        reason: String,
    },

    /// Geocoding returned no results.
    #[error("City not found: {0}")]
    CityNotFound(String),

    /// Response body did not match the expected shape.
    #[error("Unexpected {endpoint} response: {reason}")]
    InvalidPayload {
        endpoint: &'static str,
        reason: String,
    },
}

impl WeatherError {
    pub fn network(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::NetworkFailure {
            endpoint,
            reason: reason.into(),
        }
    }

    pub fn payload(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            endpoint,
            reason: reason.into(),
        }
    }
}

/// Storage failures. Never abort an operation; callers log and continue.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to read cache entry '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("Failed to write cache entry '{key}': {reason}")]
    Write { key: String, reason: String },
}

/// Device geolocation failures. Resolved silently by falling through to the next tier.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    Denied,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location service unavailable: {0}")]
    Unavailable(String),
}
