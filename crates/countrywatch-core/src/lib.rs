//! # Countrywatch Core
//!
//! Country and exchange-rate ingestion for countrywatch.
//!
//! ## Overview
//!
//! - **Sources** fetch the raw country list and a currency rate table over an
//!   [`HttpClient`] transport, bounded by a timeout
//! - **Estimator** derives a currency code and an estimated GDP per country
//! - **Reconciler** upserts every country by case-insensitive name with
//!   per-item error isolation and bounded concurrency
//! - **Pipeline** composes fetch, reconciliation, the refresh ledger, a
//!   bounded snapshot and the summary publisher
//! - **Service** exposes the refresh trigger and the read operations
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Source URLs, timeout, concurrency and snapshot settings |
//! | [`domain`] | Country, rate table, ledger and filter types |
//! | [`error`] | Validation errors |
//! | [`estimator`] | Currency extraction and GDP estimation |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`pipeline`] | Refresh orchestration and its result/error types |
//! | [`publisher`] | Summary publishers |
//! | [`reconcile`] | Insert-or-update reconciliation |
//! | [`repository`] | Country repository and refresh ledger contracts |
//! | [`service`] | Trigger and query operations |
//! | [`source`] | Country and rate sources |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use countrywatch_core::{
//!     JsonSummaryPublisher, RefreshConfig, RefreshPipeline, ReqwestHttpClient, Warehouse,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Arc::new(Warehouse::open_default()?);
//!     let config = RefreshConfig::from_env();
//!     let publisher = JsonSummaryPublisher::new(warehouse.config().summary_path());
//!
//!     let pipeline = RefreshPipeline::over_http(
//!         Arc::new(ReqwestHttpClient::new(&config.source.user_agent)),
//!         warehouse.clone(),
//!         warehouse,
//!         Arc::new(publisher),
//!         &config,
//!     );
//!
//!     let result = pipeline.run().await?;
//!     println!("{} countries, {} new", result.total_countries, result.inserted);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌───────────────┐
//! │ CountrySource │   │  RateSource   │   fetched concurrently
//! └───────┬───────┘   └───────┬───────┘
//!         └─────────┬─────────┘
//!                   ▼
//!          ┌─────────────────┐     ┌───────────────────┐
//!          │   Reconciler    │────▶│ CountryRepository │
//!          └────────┬────────┘     └───────────────────┘
//!                   ▼
//!          ┌─────────────────┐     ┌───────────────────┐
//!          │  RefreshLedger  │     │ SummaryPublisher  │
//!          └─────────────────┘     └───────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use countrywatch_core::{FailureClass, RefreshError};
//!
//! fn exit_code(error: &RefreshError) -> u8 {
//!     match error.failure_class() {
//!         FailureClass::ServiceUnavailable => 3,
//!         FailureClass::Internal => 11,
//!     }
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod estimator;
pub mod http_client;
pub mod pipeline;
pub mod publisher;
pub mod reconcile;
pub mod repository;
pub mod service;
pub mod source;

pub use config::{RefreshConfig, SourceConfig};

pub use domain::{
    CountryFilters, CountryPatch, CountryRecord, CurrencyDescriptor, NewCountry, RateTable,
    RawCountry, RefreshLedgerEntry, SortKey, UtcDateTime,
};

pub use error::ValidationError;

pub use estimator::{calculate_estimated_gdp, extract_currency_code, generate_random_multiplier};

// Warehouse (re-exported from countrywatch-warehouse)
pub use countrywatch_warehouse::{normalize_name, Warehouse, WarehouseConfig, WarehouseError};

pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use pipeline::{
    ErrorBody, FailureClass, PipelineStage, RefreshError, RefreshPipeline, RefreshResult,
};

pub use publisher::{
    JsonSummaryPublisher, NoopSummaryPublisher, PublishError, RefreshSummary, SummaryPublisher,
};

pub use reconcile::{ItemAction, MultiplierFn, Reconciler, RefreshCounters};

pub use repository::{CountryRepository, InMemoryCountryStore, RefreshLedger, RepositoryError};

pub use service::{CountryService, RefreshStatus, ServiceError};

pub use source::{
    CountrySource, HttpCountrySource, HttpRateSource, RateSource, SourceError, SourceErrorKind,
};
