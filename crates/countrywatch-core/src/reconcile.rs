//! Insert-or-update reconciliation of fetched countries.
//!
//! Every country is reconciled as its own task. A semaphore of width
//! `concurrency` bounds how many are in flight; all tasks are settled before
//! counters are returned, and a failing item never cancels its siblings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::estimator::{calculate_estimated_gdp, extract_currency_code, generate_random_multiplier};
use crate::repository::{CountryRepository, RepositoryError};
use crate::{CountryPatch, NewCountry, RateTable, RawCountry, UtcDateTime, ValidationError};

/// Source of the per-country GDP scale factor.
pub type MultiplierFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Outcome of reconciling one country.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Inserted,
    Updated,
    Error,
}

/// Aggregate counters for one run. `processed` counts every item, so
/// `processed == updated + inserted + errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshCounters {
    pub processed: u64,
    pub updated: u64,
    pub inserted: u64,
    pub errors: u64,
}

impl RefreshCounters {
    pub fn record(&mut self, action: ItemAction) {
        self.processed += 1;
        match action {
            ItemAction::Inserted => self.inserted += 1,
            ItemAction::Updated => self.updated += 1,
            ItemAction::Error => self.errors += 1,
        }
    }
}

#[derive(Debug, Error)]
enum ItemError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("country '{name}' disappeared before it could be updated")]
    Vanished { name: String },
}

pub struct Reconciler {
    repository: Arc<dyn CountryRepository>,
    concurrency: usize,
    multiplier: MultiplierFn,
}

impl Reconciler {
    pub fn new(repository: Arc<dyn CountryRepository>, concurrency: usize) -> Self {
        Self {
            repository,
            concurrency: concurrency.max(1),
            multiplier: Arc::new(generate_random_multiplier),
        }
    }

    /// Replace the random GDP scale factor, e.g. with a constant in tests.
    pub fn with_multiplier(mut self, multiplier: MultiplierFn) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub async fn reconcile(
        &self,
        countries: Vec<RawCountry>,
        rates: Arc<RateTable>,
    ) -> RefreshCounters {
        let total = countries.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut counters = RefreshCounters::default();

        info!(
            countries = total,
            rates = rates.len(),
            concurrency = self.concurrency,
            "reconciling countries"
        );

        for country in countries {
            // Waiting here keeps at most `concurrency` items in flight.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "reconciliation semaphore closed");
                    counters.record(ItemAction::Error);
                    continue;
                }
            };
            let repository = Arc::clone(&self.repository);
            let rates = Arc::clone(&rates);
            let multiplier = (self.multiplier)();

            tasks.spawn(async move {
                let _permit = permit;
                let label = country.display_name().to_owned();
                match reconcile_one(repository.as_ref(), &country, &rates, multiplier).await {
                    Ok(action) => action,
                    Err(e) => {
                        error!(country = %label, error = %e, "failed to reconcile country");
                        ItemAction::Error
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let action = joined.unwrap_or_else(|e| {
                error!(error = %e, "reconciliation task panicked");
                ItemAction::Error
            });
            counters.record(action);

            if counters.processed % self.concurrency as u64 == 0 {
                debug!(processed = counters.processed, total, "reconciliation progress");
            }
        }

        info!(
            processed = counters.processed,
            inserted = counters.inserted,
            updated = counters.updated,
            errors = counters.errors,
            "reconciliation finished"
        );
        counters
    }
}

/// Build the candidate record for one fetched country.
pub fn build_candidate(
    country: &RawCountry,
    rates: &RateTable,
    multiplier: f64,
    refreshed_at: UtcDateTime,
) -> Result<NewCountry, ValidationError> {
    let name = country
        .name
        .clone()
        .ok_or(ValidationError::MissingField { field: "name" })?;
    let population = country
        .population
        .ok_or(ValidationError::MissingField {
            field: "population",
        })?;

    let currency_code = extract_currency_code(country);
    let exchange_rate = currency_code
        .as_deref()
        .and_then(|code| rates.rate_for(code))
        .filter(|rate| *rate > 0.0);
    let estimated_gdp = calculate_estimated_gdp(population, exchange_rate, multiplier);

    Ok(NewCountry {
        name,
        capital: country.capital.clone(),
        region: country.region.clone(),
        population,
        currency_code,
        exchange_rate,
        estimated_gdp,
        flag_url: country.flag.clone(),
        last_refreshed_at: refreshed_at,
    })
}

async fn reconcile_one(
    repository: &dyn CountryRepository,
    country: &RawCountry,
    rates: &RateTable,
    multiplier: f64,
) -> Result<ItemAction, ItemError> {
    let candidate = build_candidate(country, rates, multiplier, UtcDateTime::now())?;

    if repository.find_by_name(&candidate.name).await?.is_some() {
        let patch = CountryPatch::overwrite_with(&candidate);
        return match repository.update_by_name(&candidate.name, patch).await? {
            Some(_) => Ok(ItemAction::Updated),
            None => Err(ItemError::Vanished {
                name: candidate.name,
            }),
        };
    }

    repository.create(candidate).await?;
    Ok(ItemAction::Inserted)
}
