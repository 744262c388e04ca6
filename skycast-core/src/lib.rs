//! Core library for the `skycast` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather transport (current conditions, forecast list, geocoding)
//! - Daily aggregation of the forecast list
//! - Snapshot cache and saved-location persistence
//! - Startup location resolution and the stale-then-fresh orchestrator
//!
//! It is used by `skycast-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod payload;
pub mod provider;
pub mod saved;
pub mod service;

pub use aggregate::{aggregate_daily, aggregate_daily_in};
pub use cache::{CacheEntry, CacheKey, CacheStore, FileStore, MemoryStore, SnapshotCache};
pub use config::{Config, GeolocationConfig};
pub use error::{CacheError, LocationError, WeatherError};
pub use location::{
    CURRENT_POSITION_NAME, Disabled, IpLocationProvider, LocationProvider, LocationResolver,
    ResolvedFrom, location_provider_from_config,
};
pub use model::{Condition, Coordinates, DailyAggregate, Location, Units, WeatherSample, WeatherSnapshot};
pub use provider::{WeatherProvider, lookup_city, openweather::OpenWeatherProvider, provider_from_config};
pub use saved::SavedLocations;
pub use service::{CityWeather, Displayed, Freshness, Loaded, WeatherService};
