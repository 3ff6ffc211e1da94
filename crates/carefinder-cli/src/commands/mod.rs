// Subcommand handlers. main.rs parses arguments and dispatches here; each
// module owns one subcommand.

pub mod catalog;
pub mod nearby;
pub mod notifications;
pub mod route;

use std::path::Path;

use anyhow::{Context, Result};

use carefinder_lib::{
    http_client_with_timeout, AnyCatalogProvider, CarefinderConfig, Coordinate, OsrmRouteProvider,
};

pub fn load_config(path: Option<&Path>) -> Result<CarefinderConfig> {
    CarefinderConfig::load(path).context("failed to load carefinder configuration")
}

pub fn catalog_provider(config: &CarefinderConfig) -> Result<AnyCatalogProvider> {
    AnyCatalogProvider::from_source(&config.catalog)
        .context("failed to prepare the service catalog source")
}

pub fn route_provider(config: &CarefinderConfig) -> Result<OsrmRouteProvider> {
    let client = http_client_with_timeout(config.routing.timeout())
        .context("failed to build the routing HTTP client")?;
    Ok(OsrmRouteProvider::with_client(
        client,
        config.routing.base_url.clone(),
        config.routing.profile.clone(),
    ))
}

pub fn origin(latitude: f64, longitude: f64) -> Result<Coordinate> {
    Coordinate::new(latitude, longitude).context("invalid origin")
}
