//! Carefinder library entry points.
//!
//! This crate resolves the nearest emergency and healthcare services around a
//! location, annotates a chosen service with a driving route and delivers push
//! notifications over a reconnecting channel. Front ends (the CLI, or any
//! other shell) should only depend on the items exported here instead of
//! reimplementing behavior.

use std::time::Duration;

use reqwest::Client;

pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod notify;
pub mod resolver;
pub mod route;
pub mod sequence;
pub mod session;

pub use catalog::{
    AnyCatalogProvider, CatalogProvider, FixtureCatalogProvider, HttpCatalogProvider,
    ServiceCatalog, ServiceCategory, ServiceRecord,
};
pub use config::{CarefinderConfig, CatalogSource};
pub use error::{Error, Result};
pub use geo::{distance_km, external_maps_link, Coordinate, GeolocationFix};
pub use notify::{
    ChannelState, NotificationChannel, NotificationEvent, NotificationInbox, NotificationKind,
    ReconnectPolicy, Subscription, WebSocketConnector,
};
pub use resolver::{resolve, ResolveOptions, ResolvedService, DEFAULT_RADIUS_KM};
pub use route::{OsrmRouteProvider, RouteAnnotator, RouteProvider, RouteResult, RouteStep};
pub use sequence::{RequestSequencer, RequestTicket};
pub use session::{NearbySession, NearbyView, RouteView};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client shared by the catalog and routing providers.
pub fn http_client() -> Result<Client> {
    http_client_with_timeout(DEFAULT_HTTP_TIMEOUT)
}

pub fn http_client_with_timeout(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent())
        .build()
        .map_err(Error::Http)
}

fn user_agent() -> String {
    format!("carefinder-lib/{version}", version = env!("CARGO_PKG_VERSION"))
}
