//! # Domain Models
//!
//! Canonical country types for countrywatch.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RawCountry`] | Country entry as published by the external source |
//! | [`RateTable`] | Currency → rate table for one reference currency |
//! | [`CountryRecord`] | Reconciled, persisted country |
//! | [`NewCountry`] | Candidate record for insertion |
//! | [`CountryPatch`] | Partial update of a stored country |
//! | [`RefreshLedgerEntry`] | One refresh run in the append-only ledger |
//! | [`CountryFilters`] | Listing filters, sort and pagination |
//! | [`UtcDateTime`] | UTC timestamp |

mod country;
mod filters;
mod timestamp;

pub use country::{
    CountryPatch, CountryRecord, CurrencyDescriptor, NewCountry, RateTable, RawCountry,
    RefreshLedgerEntry,
};
pub use filters::{CountryFilters, SortKey};
pub use timestamp::UtcDateTime;
