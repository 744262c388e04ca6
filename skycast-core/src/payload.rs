//! Typed shapes of the raw OpenWeather responses.
//!
//! Required fields are enforced by serde at the deserialization boundary;
//! optional ones are defaulted here so nothing untyped leaks downstream.

use chrono::Utc;
use serde::Deserialize;

use crate::model::{Condition, Location, WeatherSample};

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionPayload {
    pub id: i64,
    pub main: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

impl From<ConditionPayload> for Condition {
    fn from(value: ConditionPayload) -> Self {
        Condition {
            id: value.id,
            main: value.main,
            description: value.description,
            icon: value.icon,
        }
    }
}

fn first_condition(weather: Vec<ConditionPayload>) -> Condition {
    weather
        .into_iter()
        .next()
        .map(Condition::from)
        .unwrap_or_else(Condition::unknown)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentMain {
    pub temp: f64,
    pub humidity: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

/// `GET /data/2.5/weather`
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentPayload {
    #[serde(default)]
    pub dt: Option<i64>,
    pub main: CurrentMain,
    pub wind: Wind,
    #[serde(default)]
    pub weather: Vec<ConditionPayload>,
    #[serde(default)]
    pub alerts: Option<Vec<serde_json::Value>>,
}

impl CurrentPayload {
    /// Split into the current sample and any opaque alert records.
    pub fn into_parts(self) -> (WeatherSample, Option<Vec<serde_json::Value>>) {
        let sample = WeatherSample {
            timestamp: self.dt.unwrap_or_else(|| Utc::now().timestamp()),
            temperature: self.main.temp,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            condition: first_condition(self.weather),
        };
        (sample, self.alerts)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastMain {
    pub temp: f64,
    #[serde(default)]
    pub humidity: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastEntry {
    pub dt: i64,
    pub main: ForecastMain,
    #[serde(default)]
    pub wind: Option<Wind>,
    #[serde(default)]
    pub weather: Vec<ConditionPayload>,
}

impl From<ForecastEntry> for WeatherSample {
    fn from(entry: ForecastEntry) -> Self {
        WeatherSample {
            timestamp: entry.dt,
            temperature: entry.main.temp,
            humidity: entry.main.humidity,
            wind_speed: entry.wind.map(|w| w.speed).unwrap_or_default(),
            condition: first_condition(entry.weather),
        }
    }
}

/// `GET /data/2.5/forecast`
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastPayload {
    pub list: Vec<ForecastEntry>,
}

impl ForecastPayload {
    /// Samples in the order returned by the API.
    pub fn into_samples(self) -> Vec<WeatherSample> {
        self.list.into_iter().map(WeatherSample::from).collect()
    }
}

/// One element of `GET /geo/1.0/direct`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResult {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl From<GeocodeResult> for Location {
    fn from(value: GeocodeResult) -> Self {
        Location::new(value.name, value.lat, value.lon)
    }
}
