//! Nearby-service resolution.
//!
//! [`resolve`] turns a raw list of records and a search origin into a ranked,
//! distance-annotated result set. An empty result is a normal outcome and is
//! never reported as an error.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::catalog::{ServiceCategory, ServiceRecord};
use crate::geo::{distance_km, round_km, Coordinate};

/// Search radius applied when none is given.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Options controlling a nearby search.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// Maximum distance from the origin, inclusive.
    pub radius_km: f64,
    /// Categories to keep. `None` or an empty set keeps every category.
    pub categories: Option<HashSet<ServiceCategory>>,
    /// Maximum number of results to return.
    pub limit: Option<usize>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_RADIUS_KM,
            categories: None,
            limit: None,
        }
    }
}

impl ResolveOptions {
    pub fn within(radius_km: f64) -> Self {
        Self {
            radius_km,
            ..Self::default()
        }
    }

    /// No distance bound.
    pub fn unbounded() -> Self {
        Self::within(f64::INFINITY)
    }

    pub fn with_categories<I>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = ServiceCategory>,
    {
        self.categories = Some(categories.into_iter().collect());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn admits(&self, category: ServiceCategory) -> bool {
        match &self.categories {
            Some(set) if !set.is_empty() => set.contains(&category),
            _ => true,
        }
    }
}

/// A service record annotated with its distance from a query origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedService {
    #[serde(flatten)]
    pub service: ServiceRecord,
    /// Full-precision distance in kilometres.
    pub distance_km: f64,
}

impl ResolvedService {
    /// Distance rounded to one decimal place.
    pub fn display_distance_km(&self) -> f64 {
        round_km(self.distance_km)
    }
}

/// Rank the records of `catalog` around `origin`.
///
/// Records farther than `opts.radius_km` or outside `opts.categories` are
/// dropped. The rest are ordered available-first, then by ascending distance,
/// with equal keys kept in catalog order. Duplicate ids are passed through.
pub fn resolve(
    catalog: &[ServiceRecord],
    origin: Coordinate,
    opts: &ResolveOptions,
) -> Vec<ResolvedService> {
    let mut results: Vec<ResolvedService> = catalog
        .iter()
        .filter(|record| opts.admits(record.category))
        .filter_map(|record| {
            let distance = distance_km(origin, record.location);
            // NaN distances fail this comparison and are dropped.
            if distance <= opts.radius_km {
                Some(ResolvedService {
                    service: record.clone(),
                    distance_km: distance,
                })
            } else {
                None
            }
        })
        .collect();

    // `sort_by` is stable, so equal keys keep catalog order.
    results.sort_by(compare_ranked);

    if let Some(limit) = opts.limit {
        results.truncate(limit);
    }

    debug!(
        candidates = catalog.len(),
        matched = results.len(),
        radius_km = opts.radius_km,
        "resolved nearby services"
    );
    results
}

fn compare_ranked(a: &ResolvedService, b: &ResolvedService) -> Ordering {
    b.service
        .is_available()
        .cmp(&a.service.is_available())
        .then_with(|| a.distance_km.total_cmp(&b.distance_km))
}
