//! Driving routes to a selected service.
//!
//! [`RouteAnnotator`] is a pass-through over a [`RouteProvider`]. Its only
//! obligation is the failure contract: whatever goes wrong (network, provider
//! error code, undecodable body, no route) surfaces as
//! [`Error::RouteUnavailable`] with a readable reason.

use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geo::Coordinate;

/// Public OSRM demo server.
pub const DEFAULT_OSRM_BASE_URL: &str = "https://router.project-osrm.org";

/// Routing profile used when none is configured.
pub const DEFAULT_PROFILE: &str = "driving";

/// A drivable route normalised from the provider's format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub distance_km: f64,
    pub duration_minutes: f64,
    /// Polyline from origin to destination.
    pub geometry: Vec<Coordinate>,
    /// Turn-by-turn instructions, possibly empty.
    pub steps: Vec<RouteStep>,
}

/// One manoeuvre along a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub instruction: String,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub location: Coordinate,
}

/// Third-party routing backend.
pub trait RouteProvider: Send + Sync {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<RouteResult>> + Send;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Fetches routes for the UI and enforces the single-failure contract.
#[derive(Debug, Clone)]
pub struct RouteAnnotator<R> {
    provider: R,
}

impl<R: RouteProvider> RouteAnnotator<R> {
    pub fn new(provider: R) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &R {
        &self.provider
    }

    /// Request a route from `origin` to `destination`.
    ///
    /// Cancelling `cancel` abandons the request and yields
    /// [`Error::Cancelled`]; every other failure is
    /// [`Error::RouteUnavailable`].
    pub async fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        cancel: &CancellationToken,
    ) -> Result<RouteResult> {
        for endpoint in [origin, destination] {
            if !endpoint.is_valid() {
                return Err(Error::RouteUnavailable {
                    reason: format!("invalid coordinate {endpoint}"),
                });
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.provider.route(origin, destination) => result,
        };

        match outcome {
            Ok(route) => {
                debug!(
                    provider = self.provider.name(),
                    distance_km = route.distance_km,
                    duration_minutes = route.duration_minutes,
                    "route computed"
                );
                Ok(route)
            }
            Err(err) => {
                warn!(provider = self.provider.name(), error = %err, "route unavailable");
                Err(into_route_unavailable(err))
            }
        }
    }
}

fn into_route_unavailable(err: Error) -> Error {
    match err {
        Error::RouteUnavailable { .. } => err,
        other => Error::RouteUnavailable {
            reason: other.to_string(),
        },
    }
}

/// Client for an OSRM-compatible HTTP routing API.
#[derive(Debug, Clone)]
pub struct OsrmRouteProvider {
    client: Client,
    base_url: String,
    profile: String,
}

impl OsrmRouteProvider {
    pub fn new(base_url: impl Into<String>, profile: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(crate::http_client()?, base_url, profile))
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            profile: profile.into(),
        }
    }

    fn route_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}",
            self.base_url.trim_end_matches('/'),
            self.profile,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude
        )
    }
}

impl RouteProvider for OsrmRouteProvider {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteResult> {
        let url = self.route_url(origin, destination);
        debug!(url = %url, "requesting route");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("overview", "full"),
                ("geometries", "geojson"),
                ("steps", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<OsrmResponse>(&body) {
            Ok(parsed) => parsed.into_route(),
            Err(_) if !status.is_success() => Err(Error::RouteUnavailable {
                reason: format!("routing provider returned HTTP {status}"),
            }),
            Err(err) => Err(Error::RouteUnavailable {
                reason: format!("unreadable routing response: {err}"),
            }),
        }
    }

    fn name(&self) -> &str {
        "osrm"
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Metres.
    distance: f64,
    /// Seconds.
    duration: f64,
    geometry: OsrmGeometry,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// `[longitude, latitude]` pairs.
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
    location: [f64; 2],
}

impl OsrmResponse {
    fn into_route(self) -> Result<RouteResult> {
        if self.code != "Ok" {
            let detail = self.message.unwrap_or_else(|| self.code.clone());
            let reason = if self.code == "NoRoute" {
                format!("no drivable route found ({detail})")
            } else {
                format!("routing provider error {}: {}", self.code, detail)
            };
            return Err(Error::RouteUnavailable { reason });
        }

        let route = self
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| Error::RouteUnavailable {
                reason: "no drivable route found".to_string(),
            })?;

        let steps = route
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .map(|step| RouteStep {
                instruction: describe_maneuver(&step),
                distance_km: step.distance / 1000.0,
                duration_minutes: step.duration / 60.0,
                location: lon_lat(step.maneuver.location),
            })
            .collect();

        Ok(RouteResult {
            distance_km: route.distance / 1000.0,
            duration_minutes: route.duration / 60.0,
            geometry: route.geometry.coordinates.into_iter().map(lon_lat).collect(),
            steps,
        })
    }
}

fn lon_lat(pair: [f64; 2]) -> Coordinate {
    Coordinate::new_unchecked(pair[1], pair[0])
}

fn describe_maneuver(step: &OsrmStep) -> String {
    let maneuver = &step.maneuver;
    let road = if step.name.is_empty() {
        String::new()
    } else {
        format!(" onto {}", step.name)
    };
    let modifier = maneuver
        .modifier
        .as_deref()
        .map(|m| format!(" {m}"))
        .unwrap_or_default();

    match maneuver.kind.as_str() {
        "depart" => {
            if step.name.is_empty() {
                "Depart".to_string()
            } else {
                format!("Head out on {}", step.name)
            }
        }
        "arrive" => "Arrive at destination".to_string(),
        "turn" | "end of road" => format!("Turn{modifier}{road}"),
        "roundabout" | "rotary" => format!("Enter the roundabout{road}"),
        other => {
            let mut text = other.to_string();
            if let Some(first) = text.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            format!("{text}{modifier}{road}")
        }
    }
}
