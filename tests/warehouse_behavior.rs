//! Behavior-driven tests for the DuckDB-backed store
//!
//! These tests run the repository, ledger and full refresh contracts against
//! a real warehouse file, focusing on what survives between runs.

use std::sync::Arc;

use countrywatch_core::source::SourceFuture;
use countrywatch_core::{
    CountryFilters, CountryPatch, CountryRepository, CountryService, CountrySource,
    CurrencyDescriptor, JsonSummaryPublisher, NewCountry, RateSource, RateTable, RawCountry,
    RefreshConfig, RefreshLedger, RefreshPipeline, RepositoryError, SortKey, UtcDateTime,
    Warehouse, WarehouseConfig,
};
use tempfile::tempdir;

// =============================================================================
// Fixtures
// =============================================================================

struct FixedSources {
    countries: Vec<RawCountry>,
    rates: RateTable,
}

impl CountrySource for FixedSources {
    fn fetch(&self) -> SourceFuture<'_, Vec<RawCountry>> {
        let countries = self.countries.clone();
        Box::pin(async move { Ok(countries) })
    }
}

impl RateSource for FixedSources {
    fn fetch(&self) -> SourceFuture<'_, RateTable> {
        let rates = self.rates.clone();
        Box::pin(async move { Ok(rates) })
    }
}

fn open_warehouse(home: &std::path::Path) -> Arc<Warehouse> {
    let config = WarehouseConfig {
        home: home.to_path_buf(),
        db_path: home.join("countries.duckdb"),
        max_pool_size: 2,
    };
    Arc::new(Warehouse::open(config).expect("warehouse open"))
}

fn candidate(name: &str, region: &str, population: u64, gdp: Option<f64>) -> NewCountry {
    NewCountry {
        name: name.to_owned(),
        capital: None,
        region: Some(region.to_owned()),
        population,
        currency_code: gdp.map(|_| String::from("EUR")),
        exchange_rate: gdp.map(|_| 0.92),
        estimated_gdp: gdp,
        flag_url: None,
        last_refreshed_at: UtcDateTime::now(),
    }
}

fn raw(name: &str, population: u64, code: &str) -> RawCountry {
    RawCountry {
        name: Some(name.to_owned()),
        capital: None,
        region: Some(String::from("Europe")),
        population: Some(population),
        flag: None,
        currencies: vec![CurrencyDescriptor {
            code: Some(code.to_owned()),
            name: None,
            symbol: None,
        }],
    }
}

fn euro_sources() -> Arc<FixedSources> {
    let mut rates = RateTable::default();
    rates.rates.insert(String::from("EUR"), 0.92);
    Arc::new(FixedSources {
        countries: vec![
            raw("France", 67_391_582, "EUR"),
            raw("Germany", 83_240_525, "EUR"),
            raw("Switzerland", 8_654_622, "CHF"),
        ],
        rates,
    })
}

// =============================================================================
// Warehouse: Repository Contract
// =============================================================================

#[tokio::test]
async fn when_a_country_is_created_it_is_found_by_any_casing() {
    // Given: A fresh warehouse
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());

    // When: A country is created
    let created = warehouse
        .create(candidate("Portugal", "Europe", 10_196_709, Some(1.0)))
        .await
        .expect("create");

    // Then: Lookups ignore case and surrounding whitespace
    let found = warehouse
        .find_by_name("  PORTUGAL ")
        .await
        .expect("lookup")
        .expect("stored");
    assert_eq!(found.id, created.id);
    assert_eq!(found.name, "Portugal");
}

#[tokio::test]
async fn when_a_duplicate_name_is_created_it_is_rejected() {
    // Given: A warehouse holding Spain
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());
    warehouse
        .create(candidate("Spain", "Europe", 47_351_567, None))
        .await
        .expect("create");

    // When: Spain is created again with different casing
    let error = warehouse
        .create(candidate("spain", "Europe", 1, None))
        .await
        .expect_err("duplicate should fail");

    // Then: The repository reports a duplicate key and keeps one record
    assert!(matches!(error, RepositoryError::DuplicateKey { .. }));
    assert_eq!(warehouse.count().await.expect("count"), 1);
}

#[tokio::test]
async fn partial_updates_touch_only_the_given_fields() {
    // Given: A stored country with a rate and GDP
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());
    let created = warehouse
        .create(candidate("Italy", "Europe", 59_554_023, Some(99.0)))
        .await
        .expect("create");

    // When: Only the population changes and the GDP is cleared
    let patch = CountryPatch {
        population: Some(59_000_000),
        estimated_gdp: Some(None),
        ..CountryPatch::default()
    };
    let updated = warehouse
        .update_by_name("italy", patch)
        .await
        .expect("update")
        .expect("matched");

    // Then: Other fields are untouched and updated_at moves forward
    assert_eq!(updated.population, 59_000_000);
    assert_eq!(updated.estimated_gdp, None);
    assert_eq!(updated.exchange_rate, Some(0.92));
    assert_eq!(updated.region.as_deref(), Some("Europe"));
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
}

#[tokio::test]
async fn listing_filters_sorts_and_paginates() {
    // Given: Countries across two regions, one without GDP
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());
    for record in [
        candidate("Austria", "Europe", 9_006_398, Some(30.0)),
        candidate("Belgium", "Europe", 11_589_623, None),
        candidate("Croatia", "Europe", 4_105_267, Some(10.0)),
        candidate("Japan", "Asia", 125_836_021, Some(500.0)),
    ] {
        warehouse.create(record).await.expect("create");
    }

    // When: Europe is listed by GDP descending
    let filters = CountryFilters::default()
        .with_region("Europe")
        .with_sort(SortKey::GdpDesc);
    let listed = warehouse.find_all(&filters).await.expect("list");

    // Then: Countries without GDP come last
    let names: Vec<&str> = listed.iter().map(|record| record.name.as_str()).collect();
    assert_eq!(names, vec!["Austria", "Croatia", "Belgium"]);

    // And: Pagination slices the same ordering
    let page = warehouse
        .find_all(&filters.clone().with_limit(1).with_offset(1))
        .await
        .expect("page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "Croatia");
}

#[tokio::test]
async fn deleting_reports_whether_a_country_existed() {
    // Given: A stored country
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());
    warehouse
        .create(candidate("Malta", "Europe", 525_285, None))
        .await
        .expect("create");

    // When / Then: The first delete removes it, the second finds nothing
    assert!(warehouse.delete_by_name("MALTA").await.expect("delete"));
    assert!(!warehouse.delete_by_name("Malta").await.expect("delete"));
    assert_eq!(warehouse.count().await.expect("count"), 0);
}

#[tokio::test]
async fn ledger_returns_the_most_recent_entry() {
    // Given: An empty ledger
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());
    assert!(warehouse.last_entry().await.expect("empty").is_none());

    // When: Two runs are appended
    let first_at = UtcDateTime::parse("2026-10-18T08:00:00Z").expect("ts");
    let second_at = UtcDateTime::parse("2026-10-18T09:00:00Z").expect("ts");
    let first = warehouse.append(10, first_at).await.expect("append");
    let second = warehouse.append(12, second_at).await.expect("append");

    // Then: The latest one is reported with its own run id
    let latest = warehouse.last_entry().await.expect("latest").expect("entry");
    assert_eq!(latest, second);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(latest.total_countries, 12);
}

// =============================================================================
// Warehouse: Full Refresh
// =============================================================================

#[tokio::test]
async fn refreshed_data_survives_reopening_the_warehouse() {
    // Given: A refresh against a file-backed warehouse
    let temp = tempdir().expect("tempdir");
    let summary_path = temp.path().join("cache").join("summary.json");
    {
        let warehouse = open_warehouse(temp.path());
        let sources = euro_sources();
        let pipeline = RefreshPipeline::new(
            sources.clone(),
            sources,
            warehouse.clone(),
            warehouse.clone(),
            Arc::new(JsonSummaryPublisher::new(&summary_path)),
            &RefreshConfig::default(),
        )
        .with_multiplier(Arc::new(|| 1_000.0));

        // When: The refresh completes and the warehouse is dropped
        let result = pipeline.run().await.expect("refresh");
        assert_eq!(result.inserted, 3);
        assert!(result.summary_error.is_none());
    }

    // Then: A new handle sees the records, the ledger and the summary
    let warehouse = open_warehouse(temp.path());
    let service = CountryService::new(
        warehouse.clone(),
        warehouse.clone(),
        RefreshPipeline::new(
            euro_sources(),
            euro_sources(),
            warehouse.clone(),
            warehouse.clone(),
            Arc::new(JsonSummaryPublisher::new(&summary_path)),
            &RefreshConfig::default(),
        ),
    );

    let status = service.get_status().await.expect("status");
    assert_eq!(status.total_countries, 3);
    assert!(status.last_refreshed_at.is_some());

    let switzerland = service
        .get_country_by_name("switzerland")
        .await
        .expect("lookup")
        .expect("stored");
    assert_eq!(switzerland.currency_code.as_deref(), Some("CHF"));
    assert_eq!(switzerland.estimated_gdp, None);

    let summary = JsonSummaryPublisher::new(&summary_path)
        .load()
        .await
        .expect("load")
        .expect("summary written");
    assert_eq!(summary.total_countries, 3);
    assert_eq!(summary.top_countries_by_gdp[0].name, "Germany");
}

#[tokio::test]
async fn a_second_refresh_updates_instead_of_duplicating() {
    // Given: A warehouse refreshed once
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());
    let sources = euro_sources();
    let pipeline = RefreshPipeline::new(
        sources.clone(),
        sources,
        warehouse.clone(),
        warehouse.clone(),
        Arc::new(countrywatch_core::NoopSummaryPublisher),
        &RefreshConfig::default(),
    );
    pipeline.run().await.expect("first refresh");

    // When: The same sources are refreshed again
    let second = pipeline.run().await.expect("second refresh");

    // Then: Every country is updated and none are inserted
    assert_eq!(second.processed, 3);
    assert_eq!(second.updated, 3);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.total_countries, 3);
}
