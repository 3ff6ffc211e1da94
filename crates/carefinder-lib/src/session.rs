//! Nearby-services session: the boundary where lookup failures turn into
//! view states.
//!
//! A session owns a catalog provider, a route annotator, the latest catalog
//! snapshot and the current selection. Overlapping searches and route
//! requests are sequenced so only the newest one is reported; older ones come
//! back as `Superseded`.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{CatalogProvider, ServiceCatalog, ServiceRecord};
use crate::error::{Error, Result};
use crate::geo::{external_maps_link, Coordinate};
use crate::notify::{SubscriberRegistry, Subscription};
use crate::resolver::{resolve, ResolveOptions, ResolvedService};
use crate::route::{RouteAnnotator, RouteProvider, RouteResult};
use crate::sequence::RequestSequencer;

/// Outcome of a nearby search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NearbyView {
    /// At least one service matched, nearest first.
    Found { services: Vec<ResolvedService> },
    /// The catalog loaded but nothing matched. Informational, not an error.
    NoResults { radius_km: f64 },
    /// The catalog could not be loaded, so nothing was checked.
    FetchFailed { reason: String },
    /// A newer search replaced this one.
    Superseded,
}

/// Outcome of a route request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteView {
    Ready {
        service: ServiceRecord,
        route: RouteResult,
    },
    /// No route could be computed; `fallback_link` opens an external maps
    /// application with the same origin and destination.
    Unavailable {
        service: ServiceRecord,
        reason: String,
        fallback_link: String,
    },
    Superseded,
}

pub struct NearbySession<P, R> {
    provider: P,
    annotator: RouteAnnotator<R>,
    catalog: Mutex<Option<ServiceCatalog>>,
    selected: Mutex<Option<String>>,
    selection_listeners: SubscriberRegistry<ServiceRecord>,
    searches: RequestSequencer,
    routes: RequestSequencer,
}

impl<P: CatalogProvider, R: RouteProvider> NearbySession<P, R> {
    pub fn new(provider: P, routes: R) -> Self {
        Self {
            provider,
            annotator: RouteAnnotator::new(routes),
            catalog: Mutex::new(None),
            selected: Mutex::new(None),
            selection_listeners: SubscriberRegistry::new(),
            searches: RequestSequencer::new(),
            routes: RequestSequencer::new(),
        }
    }

    /// Refresh the catalog and resolve services around `origin`.
    pub async fn search(&self, origin: Coordinate, opts: &ResolveOptions) -> NearbyView {
        let ticket = self.searches.issue();
        let refreshed = ServiceCatalog::refresh(&self.provider, ticket.cancel_token()).await;
        let Some(refreshed) = self.searches.accept(&ticket, refreshed) else {
            return NearbyView::Superseded;
        };

        let catalog = match refreshed {
            Ok(catalog) => catalog,
            Err(Error::Cancelled) => return NearbyView::Superseded,
            Err(err) => {
                return NearbyView::FetchFailed {
                    reason: err.to_string(),
                }
            }
        };

        let services = resolve(catalog.list(), origin, opts);
        self.install(catalog);

        if services.is_empty() {
            info!(radius_km = opts.radius_km, "no services found nearby");
            NearbyView::NoResults {
                radius_km: opts.radius_km,
            }
        } else {
            NearbyView::Found { services }
        }
    }

    /// Refresh the catalog without resolving. Returns the number of services.
    pub async fn refresh(&self) -> Result<usize> {
        let ticket = self.searches.issue();
        let catalog = ServiceCatalog::refresh(&self.provider, ticket.cancel_token()).await?;
        let count = catalog.len();
        if self.searches.accept(&ticket, ()).is_some() {
            self.install(catalog);
        }
        Ok(count)
    }

    /// Latest catalog snapshot, if one has loaded.
    pub fn catalog(&self) -> Option<ServiceCatalog> {
        lock(&self.catalog).clone()
    }

    /// Select a service by id or name in the current snapshot and notify
    /// selection listeners.
    pub fn select(&self, query: &str) -> Result<ServiceRecord> {
        let record = self.lookup(query)?;
        *lock(&self.selected) = Some(record.id.clone());
        self.selection_listeners.deliver(&record);
        Ok(record)
    }

    /// Currently selected service, as it appears in the latest snapshot.
    pub fn selected(&self) -> Option<ServiceRecord> {
        let id = lock(&self.selected).clone()?;
        lock(&self.catalog)
            .as_ref()
            .and_then(|catalog| catalog.get(&id).cloned())
    }

    pub fn clear_selection(&self) {
        lock(&self.selected).take();
    }

    /// Listen for selections made through [`NearbySession::select`].
    pub fn on_select<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ServiceRecord) + Send + Sync + 'static,
    {
        self.selection_listeners.subscribe(callback)
    }

    /// Route from `origin` to the service matching `query`.
    ///
    /// Fails only when `query` names no service in the current snapshot;
    /// routing failures are reported as [`RouteView::Unavailable`].
    pub async fn route_to(&self, origin: Coordinate, query: &str) -> Result<RouteView> {
        let service = self.lookup(query)?;
        let ticket = self.routes.issue();
        let outcome = self
            .annotator
            .get_route(origin, service.location, ticket.cancel_token())
            .await;
        let Some(outcome) = self.routes.accept(&ticket, outcome) else {
            return Ok(RouteView::Superseded);
        };

        Ok(match outcome {
            Ok(route) => RouteView::Ready { service, route },
            Err(Error::Cancelled) => RouteView::Superseded,
            Err(err) => {
                let reason = match err {
                    Error::RouteUnavailable { reason } => reason,
                    other => other.to_string(),
                };
                let fallback_link = external_maps_link(origin, service.location);
                RouteView::Unavailable {
                    service,
                    reason,
                    fallback_link,
                }
            }
        })
    }

    /// Abandon any in-flight search or route request.
    pub fn cancel_pending(&self) {
        self.searches.cancel_in_flight();
        self.routes.cancel_in_flight();
    }

    fn lookup(&self, query: &str) -> Result<ServiceRecord> {
        match lock(&self.catalog).as_ref() {
            Some(catalog) => catalog.find(query).cloned(),
            None => Err(Error::UnknownService {
                query: query.to_string(),
                suggestions: Vec::new(),
            }),
        }
    }

    fn install(&self, catalog: ServiceCatalog) {
        let mut selected = lock(&self.selected);
        if let Some(id) = selected.as_deref() {
            if catalog.get(id).is_none() {
                debug!(id, "selected service left the catalog; clearing selection");
                *selected = None;
            }
        }
        *lock(&self.catalog) = Some(catalog);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
