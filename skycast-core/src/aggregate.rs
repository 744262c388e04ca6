//! Daily summaries built from the 3-hour forecast list.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use crate::model::{DailyAggregate, WeatherSample};

/// Group samples by local calendar date (the machine's time zone).
pub fn aggregate_daily(samples: &[WeatherSample]) -> Vec<DailyAggregate> {
    aggregate_daily_in(samples, &Local)
}

/// Group samples by calendar date in `tz`.
///
/// Buckets keep the order in which their first sample appears. The high and
/// low are the max and min temperature of the bucket; condition and timestamp
/// come from the bucket's first sample.
pub fn aggregate_daily_in<Tz: TimeZone>(samples: &[WeatherSample], tz: &Tz) -> Vec<DailyAggregate> {
    let mut days: Vec<(NaiveDate, DailyAggregate)> = Vec::new();

    for sample in samples {
        let Some(utc) = DateTime::<Utc>::from_timestamp(sample.timestamp, 0) else {
            tracing::warn!(timestamp = sample.timestamp, "Skipping forecast sample with out-of-range timestamp");
            continue;
        };
        let date = utc.with_timezone(tz).date_naive();

        match days.iter_mut().find(|(day, _)| *day == date) {
            Some((_, agg)) => {
                agg.day_high = agg.day_high.max(sample.temperature);
                agg.night_low = agg.night_low.min(sample.temperature);
            }
            None => days.push((
                date,
                DailyAggregate {
                    timestamp: sample.timestamp,
                    day_high: sample.temperature,
                    night_low: sample.temperature,
                    condition: sample.condition.clone(),
                },
            )),
        }
    }

    days.into_iter().map(|(_, agg)| agg).collect()
}
