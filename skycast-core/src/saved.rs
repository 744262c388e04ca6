//! Persisted selection and saved-location list.

use std::sync::Arc;

use crate::{
    cache::{CacheStore, read_json, write_json},
    error::CacheError,
    model::Location,
};

pub const SAVED_LOCATIONS_KEY: &str = "saved-locations";
pub const SELECTED_LOCATION_KEY: &str = "selected-location";
pub const MAX_SAVED_LOCATIONS: usize = 10;

/// Most-recently-added first, capped at [`MAX_SAVED_LOCATIONS`], unique by
/// case-insensitive name.
#[derive(Debug, Clone)]
pub struct SavedLocations {
    store: Arc<dyn CacheStore>,
}

impl SavedLocations {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<Location> {
        read_json(self.store.as_ref(), SAVED_LOCATIONS_KEY).unwrap_or_default()
    }

    /// Head of the list.
    pub fn most_recent(&self) -> Option<Location> {
        self.list().into_iter().next()
    }

    /// Returns `Ok(false)` when a location with the same name is already saved.
    pub fn save(&self, location: Location) -> Result<bool, CacheError> {
        let mut saved = self.list();
        if saved.iter().any(|s| s.has_name(&location.name)) {
            return Ok(false);
        }

        saved.insert(0, location);
        saved.truncate(MAX_SAVED_LOCATIONS);
        write_json(self.store.as_ref(), SAVED_LOCATIONS_KEY, &saved)?;
        Ok(true)
    }

    /// Out-of-range indices are a no-op.
    pub fn remove(&self, index: usize) -> Result<Option<Location>, CacheError> {
        let mut saved = self.list();
        if index >= saved.len() {
            return Ok(None);
        }

        let removed = saved.remove(index);
        write_json(self.store.as_ref(), SAVED_LOCATIONS_KEY, &saved)?;
        Ok(Some(removed))
    }

    pub fn get(&self, index: usize) -> Option<Location> {
        self.list().into_iter().nth(index)
    }

    pub fn selected(&self) -> Option<Location> {
        read_json(self.store.as_ref(), SELECTED_LOCATION_KEY)
    }

    pub fn set_selected(&self, location: &Location) -> Result<(), CacheError> {
        write_json(self.store.as_ref(), SELECTED_LOCATION_KEY, location)
    }
}
