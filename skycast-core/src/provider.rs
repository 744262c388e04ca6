use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config,
    error::WeatherError,
    model::{Location, Units},
    payload::{CurrentPayload, ForecastPayload, GeocodeResult},
    provider::openweather::OpenWeatherProvider,
};

pub mod openweather;

/// Network transport for the three weather endpoints.
///
/// Implementations validate coordinates before touching the network and map
/// non-success responses to [`WeatherError::NetworkFailure`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_current(&self, lat: f64, lon: f64, units: Units) -> Result<CurrentPayload, WeatherError>;

    async fn fetch_forecast(&self, lat: f64, lon: f64, units: Units) -> Result<ForecastPayload, WeatherError>;

    /// Free-text place search. Results are in relevance order.
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeResult>, WeatherError>;
}

/// Resolve a place name to its best match. Only the first result is used.
pub async fn lookup_city(provider: &dyn WeatherProvider, name: &str) -> Result<Location, WeatherError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WeatherError::CityNotFound(String::new()));
    }

    let first = provider
        .geocode(name)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::CityNotFound(name.to_string()))?;

    tracing::debug!(query = name, found = %first.name, lat = first.lat, lon = first.lon, "Geocoded city");
    Ok(Location::from(first))
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No OpenWeather API key configured.\n\
             Hint: run `skycast configure` or set OPENWEATHER_API_KEY."
        )
    })?;

    let provider = OpenWeatherProvider::with_base_url(api_key, config.base_url.clone())?;
    Ok(Arc::new(provider))
}
