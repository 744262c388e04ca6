use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use skycast_core::{
    Config, Coordinates, FileStore, Loaded, Location, Units, WeatherError, WeatherService,
    location_provider_from_config, provider_from_config,
};
use std::{future::Future, sync::Arc};

use crate::output::{format_age, render_saved, render_snapshot};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Current weather and forecast with an offline cache")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the OpenWeather API key and default units.
    Configure,

    /// Show weather for explicit coordinates, or for the startup location.
    Show {
        /// Latitude in decimal degrees.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<String>,

        /// Longitude in decimal degrees.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<String>,

        /// "metric" or "imperial"; defaults to the configured units.
        #[arg(long)]
        units: Option<String>,
    },

    /// Look up a city, show its weather, and add it to the saved list.
    Search {
        city: String,

        #[arg(long)]
        units: Option<String>,
    },

    /// Manage saved locations.
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum SavedAction {
    /// List saved locations, most recent first.
    List,
    /// Show weather for the N-th saved location and make it the selection.
    Select {
        index: usize,
        #[arg(long)]
        units: Option<String>,
    },
    /// Forget the N-th saved location.
    Remove { index: usize },
}

fn resolve_units(flag: Option<&str>, config: &Config) -> Result<Units> {
    match flag {
        Some(value) => Units::try_from(value),
        None => Ok(config.units),
    }
}

/// Convert a 1-based list position into an index.
fn list_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("Saved locations are numbered from 1."))
}

fn build_service(config: &Config) -> Result<WeatherService> {
    let provider = provider_from_config(config)?;

    let store = match &config.cache_dir {
        Some(dir) => FileStore::with_dir(dir.clone()),
        None => FileStore::new().context("Failed to set up the weather cache")?,
    };
    tracing::debug!(dir = %store.dir().display(), "Using cache directory");

    Ok(WeatherService::new(
        provider,
        Arc::new(store),
        location_provider_from_config(&config.geolocation),
        config.default_location.clone(),
    ))
}

/// Drive `load` to completion, printing any cached snapshot as soon as it is available.
async fn with_stale_preview<T>(
    service: &WeatherService,
    title: &str,
    load: impl Future<Output = Result<T, WeatherError>>,
) -> Result<T, WeatherError> {
    let mut updates = service.subscribe();
    tokio::pin!(load);

    loop {
        tokio::select! {
            result = &mut load => return result,
            changed = updates.changed() => {
                if changed.is_err() {
                    return load.await;
                }
                let displayed = updates.borrow_and_update().clone();
                if let Some(displayed) = displayed
                    && let Some(fetched_at) = displayed.fetched_at()
                {
                    let status = format!("cached {}, refreshing", format_age(Utc::now() - fetched_at));
                    println!("{}", render_snapshot(title, &status, &displayed.snapshot, displayed.units));
                }
            }
        }
    }
}

fn print_loaded(title: &str, loaded: &Loaded) {
    if loaded.applied {
        println!("{}", render_snapshot(title, "live", &loaded.fresh, loaded.units));
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { lat, lon, units } => {
                let config = Config::load()?;
                let units = resolve_units(units.as_deref(), &config)?;
                let service = build_service(&config)?;

                match (lat, lon) {
                    (Some(lat), Some(lon)) => {
                        let coords = Coordinates::parse(&lat, &lon)?;
                        let title = coords.to_string();
                        let loaded = with_stale_preview(
                            &service,
                            &title,
                            service.load_by_coordinates(coords.lat, coords.lon, units),
                        )
                        .await?;
                        print_loaded(&title, &loaded);
                    }
                    _ => {
                        let location = service.resolve_location().await;
                        let loaded = with_stale_preview(
                            &service,
                            &location.name,
                            service.load_location(&location, units),
                        )
                        .await?;
                        print_loaded(&location.name, &loaded);
                    }
                }
                Ok(())
            }
            Command::Search { city, units } => {
                let config = Config::load()?;
                let units = resolve_units(units.as_deref(), &config)?;
                let service = build_service(&config)?;

                let found = with_stale_preview(&service, city.trim(), service.search(&city, units)).await?;
                print_loaded(&found.location.name, &found.loaded);
                Ok(())
            }
            Command::Saved { action } => saved(action).await,
        }
    }
}

async fn saved(action: SavedAction) -> Result<()> {
    let config = Config::load()?;
    let service = build_service(&config)?;

    match action {
        SavedAction::List => {
            let selected: Option<Location> = service.saved().selected();
            print!("{}", render_saved(&service.saved_locations(), selected.as_ref()));
        }
        SavedAction::Select { index, units } => {
            let units = resolve_units(units.as_deref(), &config)?;
            let index = list_index(index)?;
            let name = service
                .saved()
                .get(index)
                .map(|l| l.name)
                .ok_or_else(|| anyhow::anyhow!("No saved location at position {}.", index + 1))?;

            if let Some((location, loaded)) =
                with_stale_preview(&service, &name, service.select_saved(index, units)).await?
            {
                print_loaded(&location.name, &loaded);
            }
        }
        SavedAction::Remove { index } => {
            let index = list_index(index)?;
            match service.remove_saved(index) {
                Some(location) => println!("Removed {}.", location.name),
                None => println!("No saved location at position {}.", index + 1),
            }
        }
    }

    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let current = config.units;
    let options = Units::all().to_vec();
    let start = options.iter().position(|u| *u == current).unwrap_or(0);
    let units = inquire::Select::new("Default units:", options)
        .with_starting_cursor(start)
        .prompt()
        .context("Failed to read units")?;

    config.set_api_key(api_key);
    config.units = units;
    let path = config.save()?;

    println!("Configuration saved to {}", path.display());
    Ok(())
}
