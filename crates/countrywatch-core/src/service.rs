//! Trigger and read operations over injected collaborators.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{RefreshError, RefreshPipeline, RefreshResult};
use crate::repository::{CountryRepository, RefreshLedger, RepositoryError};
use crate::{CountryFilters, CountryRecord, UtcDateTime, ValidationError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Store size and the time of the most recent refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub total_countries: u64,
    /// `None` until the first refresh completes.
    pub last_refreshed_at: Option<UtcDateTime>,
}

pub struct CountryService {
    repository: Arc<dyn CountryRepository>,
    ledger: Arc<dyn RefreshLedger>,
    pipeline: RefreshPipeline,
}

impl CountryService {
    pub fn new(
        repository: Arc<dyn CountryRepository>,
        ledger: Arc<dyn RefreshLedger>,
        pipeline: RefreshPipeline,
    ) -> Self {
        Self {
            repository,
            ledger,
            pipeline,
        }
    }

    pub async fn refresh_countries(&self) -> Result<RefreshResult, RefreshError> {
        self.pipeline.run().await
    }

    pub async fn list_countries(
        &self,
        filters: &CountryFilters,
    ) -> Result<Vec<CountryRecord>, ServiceError> {
        filters.validate()?;
        Ok(self.repository.find_all(filters).await?)
    }

    pub async fn get_country_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CountryRecord>, ServiceError> {
        let name = required_name(name)?;
        Ok(self.repository.find_by_name(name).await?)
    }

    pub async fn delete_country_by_name(&self, name: &str) -> Result<bool, ServiceError> {
        let name = required_name(name)?;
        Ok(self.repository.delete_by_name(name).await?)
    }

    pub async fn get_status(&self) -> Result<RefreshStatus, ServiceError> {
        let (total_countries, last_entry) =
            tokio::try_join!(self.repository.count(), self.ledger.last_entry())?;
        Ok(RefreshStatus {
            total_countries,
            last_refreshed_at: last_entry.map(|entry| entry.refreshed_at),
        })
    }
}

fn required_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyCountryName);
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefreshConfig;
    use crate::publisher::NoopSummaryPublisher;
    use crate::repository::InMemoryCountryStore;
    use crate::source::{CountrySource, RateSource, SourceFuture};
    use crate::{NewCountry, RateTable, RawCountry, SortKey};

    struct EmptySources;

    impl CountrySource for EmptySources {
        fn fetch(&self) -> SourceFuture<'_, Vec<RawCountry>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    impl RateSource for EmptySources {
        fn fetch(&self) -> SourceFuture<'_, RateTable> {
            Box::pin(async { Ok(RateTable::default()) })
        }
    }

    fn service(store: Arc<InMemoryCountryStore>) -> CountryService {
        let sources = Arc::new(EmptySources);
        let pipeline = RefreshPipeline::new(
            sources.clone(),
            sources,
            store.clone(),
            store.clone(),
            Arc::new(NoopSummaryPublisher),
            &RefreshConfig::default(),
        );
        CountryService::new(store.clone(), store, pipeline)
    }

    fn country(name: &str, population: u64) -> NewCountry {
        NewCountry {
            name: name.to_owned(),
            capital: None,
            region: None,
            population,
            currency_code: None,
            exchange_rate: None,
            estimated_gdp: None,
            flag_url: None,
            last_refreshed_at: UtcDateTime::now(),
        }
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let service = service(Arc::new(InMemoryCountryStore::new()));

        let err = service
            .get_country_by_name("   ")
            .await
            .expect_err("blank name");
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::EmptyCountryName)
        ));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_record_existed() {
        let store = Arc::new(InMemoryCountryStore::new());
        store.create(country("Togo", 8)).await.expect("insert");
        let service = service(store);

        assert!(service.delete_country_by_name("togo").await.expect("delete"));
        assert!(!service.delete_country_by_name("Togo").await.expect("delete"));
    }

    #[tokio::test]
    async fn status_before_and_after_refresh() {
        let store = Arc::new(InMemoryCountryStore::new());
        store.create(country("Mali", 20)).await.expect("insert");
        let service = service(store);

        let before = service.get_status().await.expect("status");
        assert_eq!(before.total_countries, 1);
        assert_eq!(before.last_refreshed_at, None);

        let result = service.refresh_countries().await.expect("refresh");
        let after = service.get_status().await.expect("status");
        assert_eq!(after.last_refreshed_at, Some(result.last_refreshed_at));
    }

    #[tokio::test]
    async fn listing_rejects_zero_limit_and_sorts_by_population() {
        let store = Arc::new(InMemoryCountryStore::new());
        store.create(country("Niger", 24)).await.expect("insert");
        store.create(country("Chad", 16)).await.expect("insert");
        let service = service(store);

        let err = service
            .list_countries(&CountryFilters::default().with_limit(0))
            .await
            .expect_err("zero limit");
        assert!(matches!(err, ServiceError::Validation(ValidationError::InvalidLimit)));

        let listed = service
            .list_countries(&CountryFilters::default().with_sort(SortKey::PopulationDesc))
            .await
            .expect("list");
        assert_eq!(listed[0].name, "Niger");
    }
}
