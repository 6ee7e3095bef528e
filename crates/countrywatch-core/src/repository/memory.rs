use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CountryRepository, RefreshLedger, RepositoryError, RepositoryFuture};
use crate::{
    normalize_name, CountryFilters, CountryPatch, CountryRecord, NewCountry, RefreshLedgerEntry,
    SortKey, UtcDateTime,
};

#[derive(Debug, Default)]
struct StoreState {
    countries: BTreeMap<String, CountryRecord>,
    next_id: i64,
    ledger: Vec<RefreshLedgerEntry>,
}

/// Process-local store implementing both contracts. Used by tests and
/// dry runs.
#[derive(Debug, Default)]
pub struct InMemoryCountryStore {
    state: Mutex<StoreState>,
}

impl InMemoryCountryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every appended ledger entry, oldest first.
    pub fn ledger_history(&self) -> Vec<RefreshLedgerEntry> {
        self.lock().ledger.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CountryRepository for InMemoryCountryStore {
    fn find_by_name<'a>(&'a self, name: &'a str) -> RepositoryFuture<'a, Option<CountryRecord>> {
        Box::pin(async move { Ok(self.lock().countries.get(&normalize_name(name)).cloned()) })
    }

    fn create(&self, candidate: NewCountry) -> RepositoryFuture<'_, CountryRecord> {
        Box::pin(async move {
            let key = normalize_name(&candidate.name);
            let mut state = self.lock();
            if state.countries.contains_key(&key) {
                return Err(RepositoryError::DuplicateKey {
                    name: candidate.name,
                });
            }

            state.next_id += 1;
            let now = UtcDateTime::now();
            let record = CountryRecord {
                id: state.next_id,
                name: candidate.name,
                capital: candidate.capital,
                region: candidate.region,
                population: candidate.population,
                currency_code: candidate.currency_code,
                exchange_rate: candidate.exchange_rate,
                estimated_gdp: candidate.estimated_gdp,
                flag_url: candidate.flag_url,
                last_refreshed_at: candidate.last_refreshed_at,
                created_at: now,
                updated_at: now,
            };
            state.countries.insert(key, record.clone());
            Ok(record)
        })
    }

    fn update_by_name<'a>(
        &'a self,
        name: &'a str,
        patch: CountryPatch,
    ) -> RepositoryFuture<'a, Option<CountryRecord>> {
        Box::pin(async move {
            let mut state = self.lock();
            let Some(record) = state.countries.get_mut(&normalize_name(name)) else {
                return Ok(None);
            };
            patch.apply_to(record);
            record.updated_at = UtcDateTime::now();
            Ok(Some(record.clone()))
        })
    }

    fn find_all<'a>(
        &'a self,
        filters: &'a CountryFilters,
    ) -> RepositoryFuture<'a, Vec<CountryRecord>> {
        Box::pin(async move {
            let state = self.lock();
            let mut matches: Vec<&CountryRecord> = state
                .countries
                .values()
                .filter(|record| {
                    filters
                        .region
                        .as_deref()
                        .is_none_or(|region| record.region.as_deref() == Some(region))
                })
                .filter(|record| {
                    filters
                        .currency
                        .as_deref()
                        .is_none_or(|code| record.currency_code.as_deref() == Some(code))
                })
                .collect();

            matches.sort_by(|left, right| compare(filters.sort, left, right));

            Ok(matches
                .into_iter()
                .skip(filters.offset)
                .take(filters.limit)
                .cloned()
                .collect())
        })
    }

    fn count(&self) -> RepositoryFuture<'_, u64> {
        Box::pin(async move { Ok(self.lock().countries.len() as u64) })
    }

    fn delete_by_name<'a>(&'a self, name: &'a str) -> RepositoryFuture<'a, bool> {
        Box::pin(async move {
            Ok(self
                .lock()
                .countries
                .remove(&normalize_name(name))
                .is_some())
        })
    }
}

impl RefreshLedger for InMemoryCountryStore {
    fn append(
        &self,
        total_countries: u64,
        refreshed_at: UtcDateTime,
    ) -> RepositoryFuture<'_, RefreshLedgerEntry> {
        Box::pin(async move {
            let entry = RefreshLedgerEntry::new(refreshed_at, total_countries);
            self.lock().ledger.push(entry.clone());
            Ok(entry)
        })
    }

    fn last_entry(&self) -> RepositoryFuture<'_, Option<RefreshLedgerEntry>> {
        Box::pin(async move { Ok(self.lock().ledger.last().cloned()) })
    }
}

// Mirrors the warehouse ordering: missing GDP last, ties by normalised name.
fn compare(sort: SortKey, left: &CountryRecord, right: &CountryRecord) -> Ordering {
    let by_name = || normalize_name(&left.name).cmp(&normalize_name(&right.name));
    match sort {
        SortKey::GdpDesc => {
            nulls_last(left.estimated_gdp, right.estimated_gdp, |l, r| r.total_cmp(&l))
                .then_with(by_name)
        }
        SortKey::GdpAsc => {
            nulls_last(left.estimated_gdp, right.estimated_gdp, |l, r| l.total_cmp(&r))
                .then_with(by_name)
        }
        SortKey::PopulationDesc => right.population.cmp(&left.population).then_with(by_name),
        SortKey::PopulationAsc => left.population.cmp(&right.population).then_with(by_name),
        SortKey::NameAsc => by_name(),
        SortKey::NameDesc => by_name().reverse(),
    }
}

fn nulls_last(
    left: Option<f64>,
    right: Option<f64>,
    present: impl Fn(f64, f64) -> Ordering,
) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => present(l, r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
