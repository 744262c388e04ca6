use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

use crate::error::WeatherError;

/// Unit system used both for the API query and for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial]
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        match lower.as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial."
            )),
        }
    }
}

/// A validated latitude/longitude pair. Both values are always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, WeatherError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(WeatherError::InvalidCoordinates {
                lat: lat.to_string(),
                lon: lon.to_string(),
            });
        }
        Ok(Self { lat, lon })
    }

    /// Parse coordinates from free text, e.g. command-line arguments.
    pub fn parse(lat: &str, lon: &str) -> Result<Self, WeatherError> {
        let invalid = || WeatherError::InvalidCoordinates {
            lat: lat.to_string(),
            lon: lon.to_string(),
        };

        let lat_value: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lon_value: f64 = lon.trim().parse().map_err(|_| invalid())?;

        Self::new(lat_value, lon_value).map_err(|_| invalid())
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// A user-facing named point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self { name: name.into(), lat, lon }
    }

    pub fn coordinates(&self) -> Result<Coordinates, WeatherError> {
        Coordinates::new(self.lat, self.lon)
    }

    /// Saved-location identity: names compared case-insensitively.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Weather condition as reported by the API (`weather[0]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: i64,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Condition {
    pub fn unknown() -> Self {
        Self {
            id: 0,
            main: "Unknown".to_string(),
            description: "unknown".to_string(),
            icon: String::new(),
        }
    }
}

/// One timestamped observation or forecast entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    /// Epoch seconds.
    pub timestamp: i64,
    pub temperature: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition: Condition,
}

/// Summary of all forecast samples sharing a local calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    /// Epoch seconds of the first sample seen for the day.
    pub timestamp: i64,
    /// Highest temperature in the bucket.
    pub day_high: f64,
    /// Lowest temperature in the bucket. Not a true night-time reading.
    pub night_low: f64,
    pub condition: Condition,
}

/// Current + hourly + daily weather for one location/units pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: WeatherSample,
    pub hourly: Vec<WeatherSample>,
    pub daily: Vec<DailyAggregate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<serde_json::Value>>,
}
