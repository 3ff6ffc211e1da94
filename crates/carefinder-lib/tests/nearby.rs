mod common;

use std::fs;

use carefinder_lib::{
    resolve, AnyCatalogProvider, CatalogProvider, CatalogSource, Coordinate, Error,
    FixtureCatalogProvider, NearbySession, NearbyView, ResolveOptions, RouteProvider, RouteResult,
    ServiceCatalog, ServiceCategory,
};

const CONNAUGHT_PLACE: Coordinate = Coordinate::new_unchecked(28.6139, 77.2090);

fn fixture_catalog() -> ServiceCatalog {
    ServiceCatalog::from_path(&common::services_fixture()).expect("fixture loads")
}

fn ids(services: &[carefinder_lib::ResolvedService]) -> Vec<&str> {
    services.iter().map(|s| s.service.id.as_str()).collect()
}

#[test]
fn fixture_matches_builtin_catalog() {
    let builtin = ServiceCatalog::builtin().expect("builtin loads");
    assert_eq!(fixture_catalog().list(), builtin.list());
}

#[test]
fn default_radius_ranks_available_services_by_distance() {
    let catalog = fixture_catalog();
    let results = resolve(catalog.list(), CONNAUGHT_PLACE, &ResolveOptions::default());
    assert_eq!(
        ids(&results),
        vec![
            "pharm-wellness",
            "hosp-city-general",
            "clinic-carefirst",
            "pharm-medplus",
            "clinic-sunrise",
            "amb-lifeguard",
            "hosp-lifeline",
            "amb-rapid-response",
        ]
    );
}

#[test]
fn unbounded_search_includes_distant_hospital() {
    let catalog = fixture_catalog();
    let hospitals = resolve(
        catalog.list(),
        CONNAUGHT_PLACE,
        &ResolveOptions::unbounded().with_categories([ServiceCategory::Hospital]),
    );
    assert_eq!(
        ids(&hospitals),
        vec!["hosp-city-general", "hosp-lifeline", "hosp-northern-regional"]
    );
}

#[test]
fn resolution_is_deterministic() {
    let catalog = fixture_catalog();
    let opts = ResolveOptions::within(5.0);
    let first = resolve(catalog.list(), CONNAUGHT_PLACE, &opts);
    let second = resolve(catalog.list(), CONNAUGHT_PLACE, &opts);
    assert_eq!(first, second);
}

#[test]
fn unknown_service_includes_suggestions() {
    let catalog = fixture_catalog();
    let err = catalog.find("Wellnes Pharmacy").expect_err("typo");
    let message = err.to_string();
    assert!(message.contains("unknown service"));
    assert!(message.contains("Did you mean"));
    assert!(message.contains("Wellness Pharmacy"));
    assert!(matches!(err, Error::UnknownService { .. }));
}

struct NeverRoutes;

impl RouteProvider for NeverRoutes {
    async fn route(&self, _: Coordinate, _: Coordinate) -> carefinder_lib::Result<RouteResult> {
        Err(Error::RouteUnavailable {
            reason: "offline".to_string(),
        })
    }

    fn name(&self) -> &str {
        "never"
    }
}

#[tokio::test]
async fn session_over_fixture_file_reports_no_results_far_away() {
    let provider = FixtureCatalogProvider::from_path(common::services_fixture());
    assert_eq!(provider.name(), "fixture");
    let session = NearbySession::new(provider, NeverRoutes);

    // Mumbai is well outside any Delhi service's radius.
    let mumbai = Coordinate::new(19.0760, 72.8777).unwrap();
    assert_eq!(
        session.search(mumbai, &ResolveOptions::default()).await,
        NearbyView::NoResults { radius_km: 10.0 }
    );
    assert_eq!(session.catalog().map(|c| c.len()), Some(9));
}

#[tokio::test]
async fn fixture_file_is_reread_on_refresh() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("services.json");
    fs::copy(common::services_fixture(), &path).expect("copy fixture");

    let session = NearbySession::new(FixtureCatalogProvider::from_path(&path), NeverRoutes);
    assert_eq!(session.refresh().await.expect("first refresh"), 9);

    fs::write(
        &path,
        r#"[{"id": "clinic-1", "name": "Harbour Clinic", "category": "clinic",
             "location": {"latitude": 28.61, "longitude": 77.21}}]"#,
    )
    .expect("rewrite fixture");
    assert_eq!(session.refresh().await.expect("second refresh"), 1);
}

#[tokio::test]
async fn deleted_fixture_file_is_a_fetch_failure() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("services.json");
    fs::copy(common::services_fixture(), &path).expect("copy fixture");
    let session = NearbySession::new(FixtureCatalogProvider::from_path(&path), NeverRoutes);
    fs::remove_file(&path).expect("delete fixture");

    let view = session.search(CONNAUGHT_PLACE, &ResolveOptions::default()).await;
    assert!(
        matches!(view, NearbyView::FetchFailed { .. }),
        "unexpected view {view:?}"
    );
}

#[tokio::test]
async fn missing_or_malformed_fixture_source_fails_at_fetch_time() {
    let dir = tempfile::tempdir().expect("temp dir");
    let malformed = dir.path().join("broken.json");
    fs::write(&malformed, "{ not json").expect("write fixture");

    for path in [dir.path().join("absent.json"), malformed] {
        let provider = AnyCatalogProvider::from_source(&CatalogSource::Fixture { path })
            .expect("fixture source is prepared lazily");
        let err = ServiceCatalog::refresh(&provider, &Default::default())
            .await
            .expect_err("fixture cannot be read");
        assert!(matches!(err, Error::CatalogFetchFailed { .. }), "unexpected {err:?}");
    }
}
