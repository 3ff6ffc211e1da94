//! Emergency and healthcare service catalog.
//!
//! A [`ServiceCatalog`] is a validated snapshot of [`ServiceRecord`]s. Snapshots
//! are produced by a [`CatalogProvider`]; the in-memory fixture provider and
//! the HTTP provider are interchangeable and selected from configuration via
//! [`AnyCatalogProvider`].

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CatalogSource;
use crate::error::{Error, Result};
use crate::geo::Coordinate;

/// Catalog bundled with the library, used by the builtin provider.
const BUILTIN_FIXTURE: &str = include_str!("../fixtures/services.json");

/// Minimum Jaro-Winkler similarity for a name to be offered as a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Maximum number of suggestions attached to an unknown-service error.
const MAX_SUGGESTIONS: usize = 3;

/// Kind of provider a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    Hospital,
    Clinic,
    Pharmacy,
    Ambulance,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 4] = [
        ServiceCategory::Hospital,
        ServiceCategory::Clinic,
        ServiceCategory::Pharmacy,
        ServiceCategory::Ambulance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::Hospital => "hospital",
            ServiceCategory::Clinic => "clinic",
            ServiceCategory::Pharmacy => "pharmacy",
            ServiceCategory::Ambulance => "ambulance",
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        ServiceCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| Error::UnknownCategory {
                value: s.to_string(),
            })
    }
}

/// One emergency or healthcare provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// Identifier, stable across catalog refreshes.
    pub id: String,
    pub name: String,
    pub category: ServiceCategory,
    pub location: Coordinate,
    #[serde(default)]
    pub address: String,
    /// Free text, not validated.
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_open_24_hours: bool,
    /// Rating in [0, 5].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub services_offered: Vec<String>,
    /// Live availability, reported for dispatchable services such as
    /// ambulances. `None` means the source does not track it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl ServiceRecord {
    /// A record is treated as available unless the source says otherwise.
    pub fn is_available(&self) -> bool {
        self.available != Some(false)
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidServiceRecord {
                id: self.id.clone(),
                message: "id must not be empty".to_string(),
            });
        }
        if !self.location.is_valid() {
            return Err(Error::InvalidServiceRecord {
                id: self.id.clone(),
                message: format!("location {} is out of range", self.location),
            });
        }
        if let Some(rating) = self.rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(Error::InvalidServiceRecord {
                    id: self.id.clone(),
                    message: format!("rating {rating} is outside 0-5"),
                });
            }
        }
        Ok(())
    }
}

/// Validated snapshot of service records.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    records: Vec<ServiceRecord>,
}

impl ServiceCatalog {
    /// Build a snapshot, enforcing unique ids and valid records.
    pub fn from_records(records: Vec<ServiceRecord>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            record.validate()?;
            if !seen.insert(record.id.as_str()) {
                return Err(Error::DuplicateServiceId {
                    id: record.id.clone(),
                });
            }
        }
        Ok(Self { records })
    }

    /// Parse a JSON array of records from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let records: Vec<ServiceRecord> = serde_json::from_reader(reader)?;
        Self::from_records(records)
    }

    /// Load a JSON catalog fixture from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// The catalog bundled with the library.
    pub fn builtin() -> Result<Self> {
        Self::from_reader(BUILTIN_FIXTURE.as_bytes())
    }

    /// Fetch a fresh snapshot from `provider`.
    ///
    /// Any provider, network or validation failure becomes
    /// [`Error::CatalogFetchFailed`]. Cancelling `cancel` abandons the
    /// in-flight fetch and yields [`Error::Cancelled`].
    pub async fn refresh<P: CatalogProvider>(
        provider: &P,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(provider = provider.name(), "catalog refresh cancelled");
                return Err(Error::Cancelled);
            }
            result = provider.fetch() => result,
        };

        let catalog = fetched.and_then(Self::from_records).map_err(|err| {
            warn!(provider = provider.name(), error = %err, "catalog refresh failed");
            into_fetch_failure(err)
        })?;

        info!(
            provider = provider.name(),
            services = catalog.len(),
            "refreshed service catalog"
        );
        Ok(catalog)
    }

    pub fn list(&self) -> &[ServiceRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ServiceRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ServiceRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Look a service up by id, then by case-insensitive name.
    pub fn find(&self, query: &str) -> Result<&ServiceRecord> {
        if let Some(record) = self.get(query) {
            return Ok(record);
        }
        if let Some(record) = self
            .records
            .iter()
            .find(|record| record.name.eq_ignore_ascii_case(query))
        {
            return Ok(record);
        }
        Err(Error::UnknownService {
            query: query.to_string(),
            suggestions: self.fuzzy_matches(query, MAX_SUGGESTIONS),
        })
    }

    /// Names similar to `query`, best match first.
    pub fn fuzzy_matches(&self, query: &str, limit: usize) -> Vec<String> {
        let needle = query.to_lowercase();
        let mut scored: Vec<(f64, &str)> = self
            .records
            .iter()
            .map(|record| {
                let score = strsim::jaro_winkler(&needle, &record.name.to_lowercase());
                (score, record.name.as_str())
            })
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, name)| name.to_string())
            .collect()
    }
}

fn into_fetch_failure(err: Error) -> Error {
    match err {
        Error::CatalogFetchFailed { .. } => err,
        other => Error::CatalogFetchFailed {
            reason: other.to_string(),
        },
    }
}

/// Source of catalog records.
pub trait CatalogProvider: Send + Sync {
    /// Fetch the current set of records.
    fn fetch(&self) -> impl Future<Output = Result<Vec<ServiceRecord>>> + Send;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Where a [`FixtureCatalogProvider`] gets its records.
#[derive(Debug, Clone)]
enum FixtureSource {
    Records(Vec<ServiceRecord>),
    /// Re-read on every fetch, so edits show up on the next refresh.
    File(PathBuf),
}

impl Default for FixtureSource {
    fn default() -> Self {
        FixtureSource::Records(Vec::new())
    }
}

/// Provider backed by in-memory records or a JSON fixture file.
#[derive(Debug, Clone, Default)]
pub struct FixtureCatalogProvider {
    source: FixtureSource,
    latency: Option<Duration>,
}

impl FixtureCatalogProvider {
    pub fn new(records: Vec<ServiceRecord>) -> Self {
        Self {
            source: FixtureSource::Records(records),
            latency: None,
        }
    }

    /// Provider over the bundled catalog.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(ServiceCatalog::builtin()?.into_records()))
    }

    /// Provider over a JSON fixture file. The file is not opened until the
    /// first fetch.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: FixtureSource::File(path.into()),
            latency: None,
        }
    }

    /// Delay every fetch by `latency`, simulating a slow backend.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

impl CatalogProvider for FixtureCatalogProvider {
    async fn fetch(&self) -> Result<Vec<ServiceRecord>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.source {
            FixtureSource::Records(records) => Ok(records.clone()),
            FixtureSource::File(path) => {
                debug!(path = %path.display(), "reading service catalog fixture");
                let contents = tokio::fs::read(path).await?;
                Ok(serde_json::from_slice(&contents)?)
            }
        }
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Provider that GETs a JSON array of records from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpCatalogProvider {
    client: Client,
    url: String,
}

impl HttpCatalogProvider {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(crate::http_client()?, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CatalogProvider for HttpCatalogProvider {
    async fn fetch(&self) -> Result<Vec<ServiceRecord>> {
        debug!(url = %self.url, "fetching service catalog");
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Vec<ServiceRecord>>().await?)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Provider chosen from configuration.
#[derive(Debug, Clone)]
pub enum AnyCatalogProvider {
    Fixture(FixtureCatalogProvider),
    Http(HttpCatalogProvider),
}

impl AnyCatalogProvider {
    pub fn from_source(source: &CatalogSource) -> Result<Self> {
        match source {
            CatalogSource::Builtin => Ok(Self::Fixture(FixtureCatalogProvider::builtin()?)),
            CatalogSource::Fixture { path } => {
                Ok(Self::Fixture(FixtureCatalogProvider::from_path(path.clone())))
            }
            CatalogSource::Http { url } => Ok(Self::Http(HttpCatalogProvider::new(url.clone())?)),
        }
    }
}

impl CatalogProvider for AnyCatalogProvider {
    async fn fetch(&self) -> Result<Vec<ServiceRecord>> {
        match self {
            AnyCatalogProvider::Fixture(provider) => provider.fetch().await,
            AnyCatalogProvider::Http(provider) => provider.fetch().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            AnyCatalogProvider::Fixture(provider) => provider.name(),
            AnyCatalogProvider::Http(provider) => provider.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str) -> ServiceRecord {
        ServiceRecord {
            id: id.to_string(),
            name: name.to_string(),
            category: ServiceCategory::Clinic,
            location: Coordinate::new_unchecked(28.6, 77.2),
            address: String::new(),
            phone: String::new(),
            is_open_24_hours: false,
            rating: None,
            services_offered: Vec::new(),
            available: None,
        }
    }

    struct FailingProvider;

    impl CatalogProvider for FailingProvider {
        async fn fetch(&self) -> Result<Vec<ServiceRecord>> {
            Err(Error::Transport {
                message: "connection refused".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn builtin_catalog_loads() {
        let catalog = ServiceCatalog::builtin().expect("bundled fixture parses");
        assert_eq!(catalog.len(), 9);
        let record = catalog.get("amb-rapid-response").expect("present");
        assert_eq!(record.category, ServiceCategory::Ambulance);
        assert_eq!(record.available, Some(false));
        assert!(!record.is_available());
    }

    #[test]
    fn camel_case_fields_round_trip_from_json() {
        let json = r#"{
            "id": "x1",
            "name": "Night Pharmacy",
            "category": "pharmacy",
            "location": {"latitude": 1.0, "longitude": 2.0},
            "isOpen24Hours": true,
            "servicesOffered": ["Prescriptions"]
        }"#;
        let record: ServiceRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_open_24_hours);
        assert_eq!(record.services_offered, vec!["Prescriptions".to_string()]);
        assert!(record.rating.is_none());
        assert!(record.is_available());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ServiceCatalog::from_records(vec![record("a", "One"), record("a", "Two")])
            .expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateServiceId { id } if id == "a"));
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        let mut bad = record("a", "One");
        bad.rating = Some(5.5);
        let err = ServiceCatalog::from_records(vec![bad]).expect_err("rating");
        assert!(matches!(err, Error::InvalidServiceRecord { .. }));
    }

    #[test]
    fn invalid_location_is_rejected() {
        let mut bad = record("a", "One");
        bad.location = Coordinate::new_unchecked(95.0, 0.0);
        assert!(ServiceCatalog::from_records(vec![bad]).is_err());
    }

    #[test]
    fn find_by_id_or_name_and_suggest_on_miss() {
        let catalog = ServiceCatalog::from_records(vec![
            record("c1", "CareFirst Family Clinic"),
            record("c2", "Sunrise Diagnostic Clinic"),
        ])
        .unwrap();

        assert_eq!(catalog.find("c2").unwrap().id, "c2");
        assert_eq!(catalog.find("carefirst family clinic").unwrap().id, "c1");

        let err = catalog.find("CareFirst Family Clinc").expect_err("typo");
        match err {
            Error::UnknownService { suggestions, .. } => {
                assert_eq!(suggestions.first().map(String::as_str), Some("CareFirst Family Clinic"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!(
            "Hospital".parse::<ServiceCategory>().unwrap(),
            ServiceCategory::Hospital
        );
        assert_eq!(
            " AMBULANCE ".parse::<ServiceCategory>().unwrap(),
            ServiceCategory::Ambulance
        );
        let err = "dentist".parse::<ServiceCategory>().expect_err("not a category");
        assert!(matches!(&err, Error::UnknownCategory { value } if value == "dentist"));
        assert!(err.to_string().contains("expected one of hospital"));
    }

    #[tokio::test]
    async fn refresh_maps_provider_errors_to_fetch_failure() {
        let err = ServiceCatalog::refresh(&FailingProvider, &CancellationToken::new())
            .await
            .expect_err("provider fails");
        match err {
            Error::CatalogFetchFailed { reason } => assert!(reason.contains("connection refused")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_maps_duplicate_ids_to_fetch_failure() {
        let provider = FixtureCatalogProvider::new(vec![record("a", "One"), record("a", "Two")]);
        let err = ServiceCatalog::refresh(&provider, &CancellationToken::new())
            .await
            .expect_err("duplicates");
        assert!(matches!(err, Error::CatalogFetchFailed { .. }));
    }

    #[tokio::test]
    async fn refresh_keeps_ids_stable() {
        let provider = FixtureCatalogProvider::builtin().unwrap();
        let cancel = CancellationToken::new();
        let first = ServiceCatalog::refresh(&provider, &cancel).await.unwrap();
        let second = ServiceCatalog::refresh(&provider, &cancel).await.unwrap();
        let ids = |c: &ServiceCatalog| c.list().iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_refresh_returns_cancelled() {
        let provider =
            FixtureCatalogProvider::new(vec![record("a", "One")]).with_latency(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let handle = tokio::spawn(async move { ServiceCatalog::refresh(&provider, &child).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
