//! Storage contracts for reconciled countries and the refresh ledger.
//!
//! Name lookups are case-insensitive: implementations key records on
//! [`normalize_name`](crate::normalize_name).

mod memory;
mod warehouse;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::{
    CountryFilters, CountryPatch, CountryRecord, NewCountry, RefreshLedgerEntry, UtcDateTime,
    WarehouseError,
};

pub use memory::InMemoryCountryStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("country '{name}' already exists")]
    DuplicateKey { name: String },

    #[error("stored record is invalid: {message}")]
    InvalidRecord { message: String },

    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

impl RepositoryError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }
}

pub type RepositoryFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Persistent store of reconciled countries.
pub trait CountryRepository: Send + Sync {
    fn find_by_name<'a>(&'a self, name: &'a str) -> RepositoryFuture<'a, Option<CountryRecord>>;

    /// Fails with [`RepositoryError::DuplicateKey`] when the normalised name
    /// is already stored.
    fn create(&self, candidate: NewCountry) -> RepositoryFuture<'_, CountryRecord>;

    /// Apply `patch`; always bumps `updated_at`. `None` when no record
    /// matches.
    fn update_by_name<'a>(
        &'a self,
        name: &'a str,
        patch: CountryPatch,
    ) -> RepositoryFuture<'a, Option<CountryRecord>>;

    fn find_all<'a>(&'a self, filters: &'a CountryFilters)
    -> RepositoryFuture<'a, Vec<CountryRecord>>;

    fn count(&self) -> RepositoryFuture<'_, u64>;

    /// `true` when a record was removed.
    fn delete_by_name<'a>(&'a self, name: &'a str) -> RepositoryFuture<'a, bool>;
}

/// Append-only log of refresh runs.
pub trait RefreshLedger: Send + Sync {
    fn append(
        &self,
        total_countries: u64,
        refreshed_at: UtcDateTime,
    ) -> RepositoryFuture<'_, RefreshLedgerEntry>;

    /// Most recently appended entry.
    fn last_entry(&self) -> RepositoryFuture<'_, Option<RefreshLedgerEntry>>;
}
