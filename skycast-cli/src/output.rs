//! Plain-text rendering of snapshots.

use chrono::{DateTime, Duration, Local, Utc};
use skycast_core::{DailyAggregate, Location, Units, WeatherSample, WeatherSnapshot};
use std::fmt::Write;

const HOURLY_LIMIT: usize = 24;
const DAILY_LIMIT: usize = 7;

fn local_time(timestamp: i64) -> Option<DateTime<Local>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|t| t.with_timezone(&Local))
}

pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if minutes < 48 * 60 {
        format!("{} h ago", age.num_hours())
    } else {
        format!("{} days ago", age.num_days())
    }
}

fn temp(value: f64, units: Units) -> String {
    format!("{}{}", value.round() as i64, units.temperature_suffix())
}

fn current_block(out: &mut String, current: &WeatherSample, units: Units) {
    let _ = writeln!(out, "  {}  {}", temp(current.temperature, units), current.condition.description);
    let _ = writeln!(out, "  Humidity: {}%", current.humidity);
    let _ = writeln!(out, "  Wind: {} {}", current.wind_speed, units.speed_suffix());
}

fn hourly_block(out: &mut String, hourly: &[WeatherSample], units: Units) {
    if hourly.is_empty() {
        return;
    }
    let _ = writeln!(out, "\nHourly");
    for sample in hourly.iter().take(HOURLY_LIMIT) {
        let hour = local_time(sample.timestamp)
            .map(|t| t.format("%a %H:%M").to_string())
            .unwrap_or_else(|| "--".to_string());
        let _ = writeln!(
            out,
            "  {hour}  {:>6}  {}",
            temp(sample.temperature, units),
            sample.condition.description
        );
    }
}

fn daily_block(out: &mut String, daily: &[DailyAggregate]) {
    if daily.is_empty() {
        return;
    }
    let _ = writeln!(out, "\nDaily");
    for day in daily.iter().take(DAILY_LIMIT) {
        let date = local_time(day.timestamp)
            .map(|t| t.format("%a, %b %-d").to_string())
            .unwrap_or_else(|| "--".to_string());
        let _ = writeln!(
            out,
            "  {date:<12}  Day: {}°  Night: {}°  {}",
            day.day_high.round() as i64,
            day.night_low.round() as i64,
            day.condition.description
        );
    }
}

pub fn render_snapshot(title: &str, status: &str, snapshot: &WeatherSnapshot, units: Units) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title} ({status})");
    current_block(&mut out, &snapshot.current, units);
    hourly_block(&mut out, &snapshot.hourly, units);
    daily_block(&mut out, &snapshot.daily);

    if let Some(alerts) = snapshot.alerts.as_ref().filter(|a| !a.is_empty()) {
        let _ = writeln!(out, "\nWeather Alerts");
        for alert in alerts {
            let text = serde_json::to_string_pretty(alert).unwrap_or_default();
            let _ = writeln!(out, "{text}");
        }
    }

    out
}

pub fn render_saved(saved: &[Location], selected: Option<&Location>) -> String {
    if saved.is_empty() {
        return "No saved locations. Use `skycast search <CITY>` to add one.\n".to_string();
    }

    let mut out = String::new();
    for (i, location) in saved.iter().enumerate() {
        let marker = if selected.is_some_and(|s| s.has_name(&location.name)) { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {:>2}. {}  ({:.4}, {:.4})",
            i + 1,
            location.name,
            location.lat,
            location.lon
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::Condition;

    fn sample(temperature: f64) -> WeatherSample {
        WeatherSample {
            timestamp: 1_709_280_000,
            temperature,
            humidity: 64,
            wind_speed: 3.4,
            condition: Condition {
                id: 803,
                main: "Clouds".into(),
                description: "broken clouds".into(),
                icon: "04d".into(),
            },
        }
    }

    #[test]
    fn age_labels() {
        assert_eq!(format_age(Duration::seconds(20)), "just now");
        assert_eq!(format_age(Duration::minutes(12)), "12 min ago");
        assert_eq!(format_age(Duration::hours(5)), "5 h ago");
        assert_eq!(format_age(Duration::days(3)), "3 days ago");
    }

    #[test]
    fn snapshot_uses_unit_suffixes() {
        let snapshot = WeatherSnapshot {
            current: sample(21.6),
            hourly: vec![sample(20.0)],
            daily: vec![DailyAggregate {
                timestamp: 1_709_280_000,
                day_high: 22.4,
                night_low: 11.5,
                condition: sample(0.0).condition,
            }],
            alerts: None,
        };

        let metric = render_snapshot("London", "live", &snapshot, Units::Metric);
        assert!(metric.starts_with("London (live)"));
        assert!(metric.contains("22°C  broken clouds"));
        assert!(metric.contains("Humidity: 64%"));
        assert!(metric.contains("Wind: 3.4 m/s"));
        assert!(metric.contains("Day: 22°  Night: 12°"));
        assert!(!metric.contains("Weather Alerts"));

        let imperial = render_snapshot("London", "live", &snapshot, Units::Imperial);
        assert!(imperial.contains("°F"));
        assert!(imperial.contains("mph"));
    }

    #[test]
    fn hourly_is_capped_at_a_day() {
        let snapshot = WeatherSnapshot {
            current: sample(1.0),
            hourly: (0..40).map(|_| sample(5.0)).collect(),
            daily: Vec::new(),
            alerts: None,
        };

        let text = render_snapshot("X", "live", &snapshot, Units::Metric);
        let hourly_lines = text.lines().filter(|l| l.contains("5°C")).count();
        assert_eq!(hourly_lines, HOURLY_LIMIT);
    }

    #[test]
    fn alerts_are_listed() {
        let snapshot = WeatherSnapshot {
            current: sample(1.0),
            hourly: Vec::new(),
            daily: Vec::new(),
            alerts: Some(vec![serde_json::json!({ "event": "Flood Watch" })]),
        };

        let text = render_snapshot("X", "live", &snapshot, Units::Metric);
        assert!(text.contains("Weather Alerts"));
        assert!(text.contains("Flood Watch"));
    }

    #[test]
    fn saved_list_marks_selection() {
        let saved = vec![Location::new("Cairo", 30.0, 31.2), Location::new("Lagos", 6.5, 3.4)];
        let selected = Location::new("lagos", 6.5, 3.4);

        let text = render_saved(&saved, Some(&selected));
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("   1. Cairo"));
        assert!(lines[1].starts_with("*  2. Lagos"));

        assert!(render_saved(&[], None).contains("No saved locations"));
    }
}
