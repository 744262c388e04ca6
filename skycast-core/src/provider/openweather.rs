use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::{
    error::WeatherError,
    model::{Coordinates, Units},
    payload::{CurrentPayload, ForecastPayload, GeocodeResult},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const CURRENT_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";
const GEOCODE_PATH: &str = "/geo/1.0/direct";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| WeatherError::network(endpoint, e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| WeatherError::network(endpoint, format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(WeatherError::network(
                endpoint,
                format!("status {}: {}", status, truncate_body(&body)),
            ));
        }

        serde_json::from_str(&body).map_err(|e| WeatherError::payload(endpoint, e.to_string()))
    }

    fn coordinate_query(lat: f64, lon: f64, units: Units) -> Result<Vec<(&'static str, String)>, WeatherError> {
        let coords = Coordinates::new(lat, lon)?;
        Ok(vec![
            ("lat", coords.lat.to_string()),
            ("lon", coords.lon.to_string()),
            ("units", units.as_str().to_string()),
        ])
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch_current(&self, lat: f64, lon: f64, units: Units) -> Result<CurrentPayload, WeatherError> {
        let query = Self::coordinate_query(lat, lon, units)?;
        self.get_json("current weather", CURRENT_PATH, &query).await
    }

    async fn fetch_forecast(&self, lat: f64, lon: f64, units: Units) -> Result<ForecastPayload, WeatherError> {
        let query = Self::coordinate_query(lat, lon, units)?;
        self.get_json("forecast", FORECAST_PATH, &query).await
    }

    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeResult>, WeatherError> {
        let params = [("q", query.to_string()), ("limit", "1".to_string())];
        self.get_json("geocoding", GEOCODE_PATH, &params).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
