//! Orchestration of lookup, fetch, aggregation and caching.
//!
//! Every load is stamped with a generation number. Results (cached or live)
//! only reach the displayed channel while their generation is still the
//! latest issued, so an older request finishing late cannot overwrite a newer
//! one. Cache writes are keyed by location and units and always happen.

use chrono::{DateTime, Utc};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::watch;

use crate::{
    aggregate::aggregate_daily,
    cache::{CacheEntry, CacheKey, CacheStore, SnapshotCache},
    error::WeatherError,
    location::{LocationProvider, LocationResolver},
    model::{Coordinates, Location, Units, WeatherSnapshot},
    provider::{WeatherProvider, lookup_city},
    saved::SavedLocations,
};

/// Whether the displayed snapshot came from the cache or a live fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Cached { fetched_at: i64 },
    Live,
}

/// What the user is currently looking at.
#[derive(Debug, Clone, PartialEq)]
pub struct Displayed {
    pub generation: u64,
    pub coords: Coordinates,
    pub units: Units,
    pub snapshot: WeatherSnapshot,
    pub freshness: Freshness,
}

/// Result of one load.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub generation: u64,
    pub coords: Coordinates,
    pub units: Units,
    /// Cache entry available before the live fetch started.
    pub stale: Option<CacheEntry>,
    pub fresh: WeatherSnapshot,
    /// False when a newer request was issued while this one was in flight.
    pub applied: bool,
}

#[derive(Debug, Clone)]
pub struct CityWeather {
    pub location: Location,
    pub loaded: Loaded,
}

#[derive(Debug)]
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    cache: SnapshotCache,
    saved: SavedLocations,
    resolver: LocationResolver,
    generation: AtomicU64,
    displayed: watch::Sender<Option<Displayed>>,
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn CacheStore>,
        geolocation: Arc<dyn LocationProvider>,
        default_location: Location,
    ) -> Self {
        let saved = SavedLocations::new(store.clone());
        let resolver = LocationResolver::new(geolocation, saved.clone(), default_location);
        let (displayed, _) = watch::channel(None);

        Self {
            provider,
            cache: SnapshotCache::new(store),
            saved,
            resolver,
            generation: AtomicU64::new(0),
            displayed,
        }
    }

    /// Receives the cached snapshot first (when there is one), then the live one.
    pub fn subscribe(&self) -> watch::Receiver<Option<Displayed>> {
        self.displayed.subscribe()
    }

    pub fn displayed(&self) -> Option<Displayed> {
        self.displayed.borrow().clone()
    }

    pub fn saved(&self) -> &SavedLocations {
        &self.saved
    }

    pub fn saved_locations(&self) -> Vec<Location> {
        self.saved.list()
    }

    /// Immediate cache peek, no network.
    pub fn cached(&self, lat: f64, lon: f64, units: Units) -> Option<CacheEntry> {
        let coords = Coordinates::new(lat, lon).ok()?;
        self.cache.get(&CacheKey::new(coords, units))
    }

    pub async fn resolve_location(&self) -> Location {
        self.resolver.resolve().await
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publishes `displayed` unless a newer request has been issued. The
    /// generation check runs under the channel lock.
    fn show(&self, displayed: Displayed) -> bool {
        let generation = displayed.generation;
        let applied = self.displayed.send_if_modified(|slot| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *slot = Some(displayed);
            true
        });

        if !applied {
            tracing::debug!(
                generation,
                latest = self.generation.load(Ordering::SeqCst),
                "Discarding superseded result"
            );
        }
        applied
    }

    /// Stale-then-fresh load for a coordinate pair.
    pub async fn load_by_coordinates(&self, lat: f64, lon: f64, units: Units) -> Result<Loaded, WeatherError> {
        let coords = Coordinates::new(lat, lon)?;
        let generation = self.next_generation();
        let key = CacheKey::new(coords, units);

        let stale = self.cache.get(&key);
        if let Some(entry) = &stale {
            self.show(Displayed {
                generation,
                coords,
                units,
                snapshot: entry.data.clone(),
                freshness: Freshness::Cached {
                    fetched_at: entry.fetched_at,
                },
            });
        }

        let fresh = self.fetch_snapshot(coords, units).await?;

        if let Err(e) = self.cache.set(&key, &CacheEntry::new(fresh.clone())) {
            tracing::warn!("{}", e);
        }

        let applied = self.show(Displayed {
            generation,
            coords,
            units,
            snapshot: fresh.clone(),
            freshness: Freshness::Live,
        });

        Ok(Loaded {
            generation,
            coords,
            units,
            stale,
            fresh,
            applied,
        })
    }

    async fn fetch_snapshot(&self, coords: Coordinates, units: Units) -> Result<WeatherSnapshot, WeatherError> {
        let (current, forecast) = tokio::try_join!(
            self.provider.fetch_current(coords.lat, coords.lon, units),
            self.provider.fetch_forecast(coords.lat, coords.lon, units),
        )?;

        let (current, alerts) = current.into_parts();
        let hourly = forecast.into_samples();
        let daily = aggregate_daily(&hourly);

        tracing::info!(%coords, %units, samples = hourly.len(), days = daily.len(), "Fetched weather");

        Ok(WeatherSnapshot {
            current,
            hourly,
            daily,
            alerts,
        })
    }

    pub async fn load_by_city_name(&self, city: &str, units: Units) -> Result<CityWeather, WeatherError> {
        let location = lookup_city(self.provider.as_ref(), city).await?;
        let loaded = self.load_by_coordinates(location.lat, location.lon, units).await?;
        Ok(CityWeather { location, loaded })
    }

    /// Resolve the startup location, remember it as selected, and load it.
    pub async fn start(&self, units: Units) -> Result<(Location, Loaded), WeatherError> {
        let location = self.resolver.resolve().await;
        let loaded = self.load_location(&location, units).await?;
        Ok((location, loaded))
    }

    /// Make `location` the selection and load it.
    pub async fn load_location(&self, location: &Location, units: Units) -> Result<Loaded, WeatherError> {
        self.remember_selection(location);
        self.load_by_coordinates(location.lat, location.lon, units).await
    }

    /// Search by name, then select the match and add it to the saved list.
    /// The saved entry keeps the name as typed, with the geocoded position.
    pub async fn search(&self, city: &str, units: Units) -> Result<CityWeather, WeatherError> {
        let mut found = self.load_by_city_name(city, units).await?;
        found.location.name = city.trim().to_string();

        self.remember_selection(&found.location);
        match self.saved.save(found.location.clone()) {
            Ok(true) => tracing::debug!(name = %found.location.name, "Saved location"),
            Ok(false) => {}
            Err(e) => tracing::warn!("{}", e),
        }

        Ok(found)
    }

    /// Load a saved location by index and make it the selection.
    pub async fn select_saved(&self, index: usize, units: Units) -> Result<Option<(Location, Loaded)>, WeatherError> {
        let Some(location) = self.saved.get(index) else {
            return Ok(None);
        };

        let loaded = self.load_location(&location, units).await?;
        Ok(Some((location, loaded)))
    }

    pub fn remove_saved(&self, index: usize) -> Option<Location> {
        self.saved.remove(index).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            None
        })
    }

    /// Re-fetch the selected location, e.g. after a units change.
    pub async fn reload(&self, units: Units) -> Result<Option<(Location, Loaded)>, WeatherError> {
        let Some(location) = self.saved.selected() else {
            return Ok(None);
        };
        let loaded = self.load_by_coordinates(location.lat, location.lon, units).await?;
        Ok(Some((location, loaded)))
    }

    fn remember_selection(&self, location: &Location) {
        if let Err(e) = self.saved.set_selected(location) {
            tracing::warn!("{}", e);
        }
    }
}

impl Displayed {
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        match self.freshness {
            Freshness::Cached { fetched_at } => DateTime::from_timestamp_millis(fetched_at),
            Freshness::Live => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryStore,
        error::CacheError,
        location::Disabled,
        model::{Condition, WeatherSample},
        payload::{CurrentPayload, ForecastPayload, GeocodeResult},
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct FakeProvider {
        geocode_results: Vec<GeocodeResult>,
        fail_forecast: bool,
        current_calls: AtomicUsize,
        forecast_calls: AtomicUsize,
        /// When set, the first forecast call parks until notified.
        gate: Option<Arc<Notify>>,
        gated_once: Mutex<bool>,
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn fetch_current(&self, lat: f64, _: f64, units: Units) -> Result<CurrentPayload, WeatherError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            let temp = if units == Units::Imperial { 68.0 } else { 20.0 } + lat.abs() / 100.0;
            Ok(serde_json::from_value(json!({
                "dt": 1_709_251_200,
                "main": { "temp": temp, "humidity": 55 },
                "wind": { "speed": 3.0 },
                "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }]
            }))
            .unwrap())
        }

        async fn fetch_forecast(&self, _: f64, _: f64, _: Units) -> Result<ForecastPayload, WeatherError> {
            self.forecast_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let first = {
                    let mut gated = self.gated_once.lock();
                    !std::mem::replace(&mut *gated, true)
                };
                if first {
                    gate.notified().await;
                }
            }
            if self.fail_forecast {
                return Err(WeatherError::network("forecast", "status 500 Internal Server Error"));
            }
            Ok(serde_json::from_value(json!({
                "list": [
                    { "dt": 1_709_251_200, "main": { "temp": 10.0 }, "weather": [] },
                    { "dt": 1_709_262_000, "main": { "temp": 16.0 }, "weather": [] }
                ]
            }))
            .unwrap())
        }

        async fn geocode(&self, _: &str) -> Result<Vec<GeocodeResult>, WeatherError> {
            Ok(self.geocode_results.clone())
        }
    }

    fn service_with(provider: FakeProvider) -> (WeatherService, Arc<FakeProvider>, Arc<MemoryStore>) {
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryStore::new());
        let service = WeatherService::new(
            provider.clone(),
            store.clone(),
            Arc::new(Disabled),
            Location::new("Johannesburg", -26.2041, 28.0473),
        );
        (service, provider, store)
    }

    fn cached_snapshot() -> WeatherSnapshot {
        let sample = WeatherSample {
            timestamp: 1,
            temperature: -5.0,
            humidity: 90,
            wind_speed: 9.0,
            condition: Condition::unknown(),
        };
        WeatherSnapshot {
            current: sample,
            hourly: Vec::new(),
            daily: Vec::new(),
            alerts: None,
        }
    }

    #[tokio::test]
    async fn load_fetches_aggregates_and_caches() {
        let (service, provider, _) = service_with(FakeProvider::default());

        let loaded = service.load_by_coordinates(51.5, -0.12, Units::Metric).await.unwrap();

        assert!(loaded.stale.is_none());
        assert!(loaded.applied);
        assert_eq!(loaded.fresh.hourly.len(), 2);
        assert!(!loaded.fresh.daily.is_empty());
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.forecast_calls.load(Ordering::SeqCst), 1);

        let cached = service.cached(51.5, -0.12, Units::Metric).expect("fresh result is cached");
        assert_eq!(cached.data, loaded.fresh);
        assert!(service.cached(51.5, -0.12, Units::Imperial).is_none());

        let shown = service.displayed().unwrap();
        assert_eq!(shown.freshness, Freshness::Live);
        assert_eq!(shown.snapshot, loaded.fresh);
    }

    #[tokio::test]
    async fn stale_entry_is_returned_then_replaced() {
        let (service, _, _) = service_with(FakeProvider::default());
        let coords = Coordinates::new(51.5, -0.12).unwrap();
        let old = CacheEntry {
            fetched_at: 42,
            data: cached_snapshot(),
        };
        service.cache.set(&CacheKey::new(coords, Units::Metric), &old).unwrap();

        let mut rx = service.subscribe();
        let loaded = service.load_by_coordinates(51.5, -0.12, Units::Metric).await.unwrap();

        assert_eq!(loaded.stale, Some(old));
        assert_ne!(loaded.fresh, cached_snapshot());
        assert_eq!(service.cached(51.5, -0.12, Units::Metric).unwrap().data, loaded.fresh);

        let latest = rx.borrow_and_update().clone().unwrap();
        assert_eq!(latest.freshness, Freshness::Live);
    }

    #[tokio::test]
    async fn invalid_coordinates_fail_without_fetching() {
        let (service, provider, _) = service_with(FakeProvider::default());

        let err = service.load_by_coordinates(f64::NAN, 28.0, Units::Metric).await.unwrap_err();

        assert!(matches!(err, WeatherError::InvalidCoordinates { .. }));
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.forecast_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_and_keeps_cache() {
        let (service, _, _) = service_with(FakeProvider {
            fail_forecast: true,
            ..Default::default()
        });

        let err = service.load_by_coordinates(10.0, 10.0, Units::Metric).await.unwrap_err();

        assert!(err.to_string().contains("forecast request failed"));
        assert!(service.cached(10.0, 10.0, Units::Metric).is_none());
        assert!(service.displayed().is_none());
    }

    #[tokio::test]
    async fn unknown_city_stops_before_weather_fetch() {
        let (service, provider, _) = service_with(FakeProvider::default());

        let err = service.load_by_city_name("Nowhereville", Units::Metric).await.unwrap_err();

        assert!(matches!(err, WeatherError::CityNotFound(_)));
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.forecast_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_saves_typed_name_at_geocoded_position() {
        let (service, _, _) = service_with(FakeProvider {
            geocode_results: vec![GeocodeResult {
                name: "Cairo".into(),
                lat: 30.0,
                lon: 31.2,
                country: Some("EG".into()),
                state: None,
            }],
            ..Default::default()
        });

        let found = service.search("  cairo ", Units::Metric).await.unwrap();
        let again = service.search("CAIRO", Units::Metric).await.unwrap();

        assert_eq!(found.location, Location::new("cairo", 30.0, 31.2));
        assert_eq!(service.saved_locations(), vec![Location::new("cairo", 30.0, 31.2)]);
        assert_eq!(service.saved().selected(), Some(again.location));
    }

    /// Store whose reads and writes always fail.
    #[derive(Debug)]
    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Read {
                key: key.to_string(),
                reason: "disk unavailable".into(),
            })
        }

        fn set_raw(&self, key: &str, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Write {
                key: key.to_string(),
                reason: "disk full".into(),
            })
        }
    }

    #[tokio::test]
    async fn storage_failures_do_not_abort_loads() {
        let service = WeatherService::new(
            Arc::new(FakeProvider {
                geocode_results: vec![GeocodeResult {
                    name: "Lagos".into(),
                    lat: 6.5,
                    lon: 3.4,
                    country: None,
                    state: None,
                }],
                ..Default::default()
            }),
            Arc::new(BrokenStore),
            Arc::new(Disabled),
            Location::new("Johannesburg", -26.2041, 28.0473),
        );

        let loaded = service.load_by_coordinates(51.5, -0.12, Units::Metric).await.unwrap();
        assert!(loaded.stale.is_none());
        assert!(loaded.applied);
        assert!(service.cached(51.5, -0.12, Units::Metric).is_none());

        let (location, _) = service.start(Units::Metric).await.unwrap();
        assert_eq!(location.name, "Johannesburg");

        let found = service.search("Lagos", Units::Metric).await.unwrap();
        assert_eq!(found.location.name, "Lagos");
        assert!(service.saved_locations().is_empty());
        assert_eq!(service.displayed().unwrap().snapshot, found.loaded.fresh);
    }

    #[tokio::test]
    async fn start_uses_default_and_persists_selection() {
        let (service, _, _) = service_with(FakeProvider::default());

        let (location, loaded) = service.start(Units::Metric).await.unwrap();

        assert_eq!(location.name, "Johannesburg");
        assert_eq!(loaded.coords, Coordinates::new(-26.2041, 28.0473).unwrap());
        assert_eq!(service.saved().selected(), Some(location));
    }

    #[tokio::test]
    async fn reload_refetches_selection_in_new_units() {
        let (service, _, _) = service_with(FakeProvider::default());
        assert!(service.reload(Units::Metric).await.unwrap().is_none());

        service.start(Units::Metric).await.unwrap();
        let (_, loaded) = service.reload(Units::Imperial).await.unwrap().unwrap();

        assert_eq!(loaded.units, Units::Imperial);
        assert!(service.cached(-26.2041, 28.0473, Units::Imperial).is_some());
        assert!(service.cached(-26.2041, 28.0473, Units::Metric).is_some());
    }

    #[tokio::test]
    async fn select_and_remove_saved() {
        let (service, _, _) = service_with(FakeProvider::default());
        service.saved().save(Location::new("Cairo", 30.0, 31.2)).unwrap();

        assert!(service.select_saved(3, Units::Metric).await.unwrap().is_none());

        let (location, _) = service.select_saved(0, Units::Metric).await.unwrap().unwrap();
        assert_eq!(location.name, "Cairo");
        assert_eq!(service.saved().selected(), Some(location));

        assert_eq!(service.remove_saved(0).map(|l| l.name).as_deref(), Some("Cairo"));
        assert!(service.remove_saved(0).is_none());
    }

    #[tokio::test]
    async fn last_issued_request_wins() {
        let gate = Arc::new(Notify::new());
        let (service, provider, _) = service_with(FakeProvider {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let service = Arc::new(service);

        // First request parks inside its forecast call.
        let slow = tokio::spawn({
            let service = service.clone();
            async move { service.load_by_coordinates(10.0, 10.0, Units::Metric).await }
        });
        while !*provider.gated_once.lock() {
            tokio::task::yield_now().await;
        }

        let newer = service.load_by_coordinates(10.0, 10.0, Units::Imperial).await.unwrap();
        assert!(newer.applied);

        gate.notify_one();
        let older = slow.await.unwrap().unwrap();

        assert!(!older.applied);
        assert!(older.generation < newer.generation);
        let shown = service.displayed().unwrap();
        assert_eq!(shown.units, Units::Imperial);
        assert_eq!(shown.generation, newer.generation);
        // The late result is still cached under its own key.
        assert!(service.cached(10.0, 10.0, Units::Metric).is_some());
    }
}
