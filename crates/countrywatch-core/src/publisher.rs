//! Downstream consumers of the post-refresh snapshot.

use std::cmp::Ordering;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{CountryRecord, UtcDateTime};

/// Number of countries listed in the summary.
pub const TOP_COUNTRIES: usize = 5;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("summary i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("summary serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("summary publisher failed: {message}")]
    Failed { message: String },
}

pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>>;

/// Receives the bounded snapshot produced at the end of a refresh.
pub trait SummaryPublisher: Send + Sync {
    fn publish<'a>(
        &'a self,
        records: &'a [CountryRecord],
        total_countries: u64,
        as_of: UtcDateTime,
    ) -> PublishFuture<'a>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSummaryPublisher;

impl SummaryPublisher for NoopSummaryPublisher {
    fn publish<'a>(
        &'a self,
        _records: &'a [CountryRecord],
        _total_countries: u64,
        _as_of: UtcDateTime,
    ) -> PublishFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCountry {
    pub name: String,
    pub estimated_gdp: f64,
}

/// Persisted refresh summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub total_countries: u64,
    pub last_refreshed_at: UtcDateTime,
    pub top_countries_by_gdp: Vec<RankedCountry>,
}

impl RefreshSummary {
    /// Countries without an estimate are left out of the ranking.
    pub fn from_snapshot(
        records: &[CountryRecord],
        total_countries: u64,
        as_of: UtcDateTime,
    ) -> Self {
        let mut ranked: Vec<RankedCountry> = records
            .iter()
            .filter_map(|record| {
                record.estimated_gdp.map(|estimated_gdp| RankedCountry {
                    name: record.name.clone(),
                    estimated_gdp,
                })
            })
            .collect();
        ranked.sort_by(|left, right| {
            right
                .estimated_gdp
                .partial_cmp(&left.estimated_gdp)
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(TOP_COUNTRIES);

        Self {
            total_countries,
            last_refreshed_at: as_of,
            top_countries_by_gdp: ranked,
        }
    }
}

/// Writes [`RefreshSummary`] as pretty JSON to a file.
#[derive(Debug, Clone)]
pub struct JsonSummaryPublisher {
    path: PathBuf,
}

impl JsonSummaryPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last published summary, `None` before the first refresh.
    pub async fn load(&self) -> Result<Option<RefreshSummary>, PublishError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SummaryPublisher for JsonSummaryPublisher {
    fn publish<'a>(
        &'a self,
        records: &'a [CountryRecord],
        total_countries: u64,
        as_of: UtcDateTime,
    ) -> PublishFuture<'a> {
        Box::pin(async move {
            let summary = RefreshSummary::from_snapshot(records, total_countries, as_of);
            let body = serde_json::to_vec_pretty(&summary)?;

            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // Write then rename so readers never see a partial file.
            let staging = self.path.with_extension("json.tmp");
            tokio::fs::write(&staging, body).await?;
            tokio::fs::rename(&staging, &self.path).await?;

            info!(path = %self.path.display(), total_countries, "published refresh summary");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, gdp: Option<f64>) -> CountryRecord {
        let now = UtcDateTime::now();
        CountryRecord {
            id: 0,
            name: name.to_owned(),
            capital: None,
            region: None,
            population: 1,
            currency_code: None,
            exchange_rate: gdp.map(|_| 1.0),
            estimated_gdp: gdp,
            flag_url: None,
            last_refreshed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn summary_ranks_top_five_with_estimates() {
        let records: Vec<CountryRecord> = (1..=7)
            .map(|i| record(&format!("C{i}"), Some(f64::from(i))))
            .chain(std::iter::once(record("Unknown", None)))
            .collect();

        let summary = RefreshSummary::from_snapshot(&records, 8, UtcDateTime::now());

        let names: Vec<&str> = summary
            .top_countries_by_gdp
            .iter()
            .map(|ranked| ranked.name.as_str())
            .collect();
        assert_eq!(names, vec!["C7", "C6", "C5", "C4", "C3"]);
        assert_eq!(summary.total_countries, 8);
    }

    #[tokio::test]
    async fn json_publisher_creates_directories_and_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let publisher = JsonSummaryPublisher::new(temp.path().join("cache").join("summary.json"));
        assert!(publisher.load().await.expect("load").is_none());

        let as_of = UtcDateTime::parse("2026-10-18T12:00:00Z").expect("ts");
        publisher
            .publish(&[record("Nigeria", Some(10.0))], 1, as_of)
            .await
            .expect("publish");

        let summary = publisher.load().await.expect("load").expect("summary");
        assert_eq!(summary.last_refreshed_at, as_of);
        assert_eq!(summary.top_countries_by_gdp.len(), 1);
    }
}
