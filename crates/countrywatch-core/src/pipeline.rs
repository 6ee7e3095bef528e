//! Refresh orchestration.
//!
//! One run moves through `Fetching → Reconciling → Logging → Snapshotting →
//! Publishing`. A fetch failure ends the run before anything is written.
//! Errors after reconciliation still report the reconciliation counters.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::RefreshConfig;
use crate::http_client::HttpClient;
use crate::publisher::SummaryPublisher;
use crate::reconcile::{MultiplierFn, Reconciler, RefreshCounters};
use crate::repository::{CountryRepository, RefreshLedger, RepositoryError};
use crate::source::{CountrySource, HttpCountrySource, HttpRateSource, RateSource, SourceError};
use crate::{CountryFilters, UtcDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Fetching,
    Reconciling,
    Logging,
    Snapshotting,
    Publishing,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Reconciling => "reconciling",
            Self::Logging => "logging",
            Self::Snapshotting => "snapshotting",
            Self::Publishing => "publishing",
        }
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResult {
    pub processed: u64,
    pub updated: u64,
    pub inserted: u64,
    pub total_countries: u64,
    pub last_refreshed_at: UtcDateTime,
    /// Set when the summary could not be published; the refresh itself
    /// still succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
}

/// Caller-facing failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ServiceUnavailable,
    Internal,
}

impl FailureClass {
    pub const fn message(self) -> &'static str {
        match self {
            Self::ServiceUnavailable => "External data source unavailable",
            Self::Internal => "Internal server error",
        }
    }
}

/// JSON error body for failed runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
    /// Present when reconciliation ran before the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<RefreshCounters>,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("could not fetch data from upstream: {0}")]
    Source(#[from] SourceError),

    #[error("refresh failed while {stage} after reconciliation: {source}")]
    Bookkeeping {
        stage: PipelineStage,
        counters: RefreshCounters,
        #[source]
        source: RepositoryError,
    },
}

impl RefreshError {
    pub const fn failure_class(&self) -> FailureClass {
        match self {
            Self::Source(_) => FailureClass::ServiceUnavailable,
            Self::Bookkeeping { .. } => FailureClass::Internal,
        }
    }

    /// Counters of a run that reconciled before failing.
    pub const fn counters(&self) -> Option<RefreshCounters> {
        match self {
            Self::Source(_) => None,
            Self::Bookkeeping { counters, .. } => Some(*counters),
        }
    }

    pub fn error_body(&self) -> ErrorBody {
        let details = match self {
            Self::Source(error) => error.message().to_owned(),
            Self::Bookkeeping { source, .. } => source.to_string(),
        };
        ErrorBody {
            error: self.failure_class().message().to_owned(),
            details,
            counters: self.counters(),
        }
    }
}

pub struct RefreshPipeline {
    countries: Arc<dyn CountrySource>,
    rates: Arc<dyn RateSource>,
    repository: Arc<dyn CountryRepository>,
    ledger: Arc<dyn RefreshLedger>,
    publisher: Arc<dyn SummaryPublisher>,
    reconciler: Reconciler,
    snapshot_limit: usize,
}

impl RefreshPipeline {
    pub fn new(
        countries: Arc<dyn CountrySource>,
        rates: Arc<dyn RateSource>,
        repository: Arc<dyn CountryRepository>,
        ledger: Arc<dyn RefreshLedger>,
        publisher: Arc<dyn SummaryPublisher>,
        config: &RefreshConfig,
    ) -> Self {
        Self {
            countries,
            rates,
            reconciler: Reconciler::new(Arc::clone(&repository), config.concurrency),
            repository,
            ledger,
            publisher,
            snapshot_limit: config.snapshot_limit.max(1),
        }
    }

    /// Pipeline fetching both sources over `http_client`.
    pub fn over_http(
        http_client: Arc<dyn HttpClient>,
        repository: Arc<dyn CountryRepository>,
        ledger: Arc<dyn RefreshLedger>,
        publisher: Arc<dyn SummaryPublisher>,
        config: &RefreshConfig,
    ) -> Self {
        let countries = Arc::new(HttpCountrySource::new(
            Arc::clone(&http_client),
            &config.source,
        ));
        let rates = Arc::new(HttpRateSource::new(http_client, &config.source));
        Self::new(countries, rates, repository, ledger, publisher, config)
    }

    pub fn with_multiplier(mut self, multiplier: MultiplierFn) -> Self {
        self.reconciler = self.reconciler.with_multiplier(multiplier);
        self
    }

    pub async fn run(&self) -> Result<RefreshResult, RefreshError> {
        debug!(stage = %PipelineStage::Fetching, "refresh stage");
        let (countries, rates) = match tokio::try_join!(self.countries.fetch(), self.rates.fetch())
        {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(code = e.code(), error = %e, "refresh aborted, upstream fetch failed");
                return Err(e.into());
            }
        };

        debug!(stage = %PipelineStage::Reconciling, "refresh stage");
        let counters = self.reconciler.reconcile(countries, Arc::new(rates)).await;

        let bookkeeping = move |stage: PipelineStage| {
            move |source: RepositoryError| {
                error!(%stage, error = %source, "refresh bookkeeping failed");
                RefreshError::Bookkeeping {
                    stage,
                    counters,
                    source,
                }
            }
        };

        debug!(stage = %PipelineStage::Logging, "refresh stage");
        let total_countries = self
            .repository
            .count()
            .await
            .map_err(bookkeeping(PipelineStage::Logging))?;
        let entry = self
            .ledger
            .append(total_countries, UtcDateTime::now())
            .await
            .map_err(bookkeeping(PipelineStage::Logging))?;

        debug!(stage = %PipelineStage::Snapshotting, "refresh stage");
        let snapshot_filters = CountryFilters::default().with_limit(self.snapshot_limit);
        let snapshot = self
            .repository
            .find_all(&snapshot_filters)
            .await
            .map_err(bookkeeping(PipelineStage::Snapshotting))?;

        debug!(stage = %PipelineStage::Publishing, "refresh stage");
        let summary_error = match self
            .publisher
            .publish(&snapshot, total_countries, entry.refreshed_at)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "summary publish failed, refresh result kept");
                Some(e.to_string())
            }
        };

        info!(
            run_id = %entry.run_id,
            processed = counters.processed,
            inserted = counters.inserted,
            updated = counters.updated,
            errors = counters.errors,
            total_countries,
            "refresh completed"
        );
        debug!(stage = %PipelineStage::Idle, "refresh stage");

        Ok(RefreshResult {
            processed: counters.processed,
            updated: counters.updated,
            inserted: counters.inserted,
            total_countries,
            last_refreshed_at: entry.refreshed_at,
            summary_error,
        })
    }
}
