use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UtcDateTime;

/// One currency listed for a country, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDescriptor {
    pub code: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// Country entry as published by the country source.
///
/// The source is untrusted, so `name` and `population` may be missing here;
/// reconciliation rejects such entries one at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCountry {
    pub name: Option<String>,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: Option<u64>,
    pub flag: Option<String>,
    pub currencies: Vec<CurrencyDescriptor>,
}

impl RawCountry {
    /// Name used in logs, including for entries that lack one.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Exchange rates for one reference currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// Reference currency code (e.g. "USD").
    pub base: Option<String>,
    /// As-of date as reported by the provider.
    pub date: Option<String>,
    /// Units of local currency per one unit of `base`. Only positive, finite
    /// rates are kept.
    pub rates: BTreeMap<String, f64>,
}

impl RateTable {
    /// Exact-code lookup.
    pub fn rate_for(&self, currency_code: &str) -> Option<f64> {
        self.rates.get(currency_code).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Reconciled country as stored in the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub id: i64,
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: u64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: UtcDateTime,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// Candidate record built from a [`RawCountry`]; identity and store
/// timestamps are assigned by the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCountry {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: u64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: UtcDateTime,
}

/// Partial update of a stored country.
///
/// `None` leaves a field untouched; for nullable fields `Some(None)` clears
/// the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryPatch {
    pub capital: Option<Option<String>>,
    pub region: Option<Option<String>>,
    pub population: Option<u64>,
    pub currency_code: Option<Option<String>>,
    pub exchange_rate: Option<Option<f64>>,
    pub estimated_gdp: Option<Option<f64>>,
    pub flag_url: Option<Option<String>>,
    pub last_refreshed_at: Option<UtcDateTime>,
}

impl CountryPatch {
    /// Patch that overwrites every derivable field with the candidate's
    /// values, including clearing ones the candidate no longer has.
    pub fn overwrite_with(candidate: &NewCountry) -> Self {
        Self {
            capital: Some(candidate.capital.clone()),
            region: Some(candidate.region.clone()),
            population: Some(candidate.population),
            currency_code: Some(candidate.currency_code.clone()),
            exchange_rate: Some(candidate.exchange_rate),
            estimated_gdp: Some(candidate.estimated_gdp),
            flag_url: Some(candidate.flag_url.clone()),
            last_refreshed_at: Some(candidate.last_refreshed_at),
        }
    }

    /// Apply the patch to an in-memory record. Store timestamps are left to
    /// the caller.
    pub fn apply_to(&self, record: &mut CountryRecord) {
        if let Some(capital) = &self.capital {
            record.capital = capital.clone();
        }
        if let Some(region) = &self.region {
            record.region = region.clone();
        }
        if let Some(population) = self.population {
            record.population = population;
        }
        if let Some(currency_code) = &self.currency_code {
            record.currency_code = currency_code.clone();
        }
        if let Some(exchange_rate) = self.exchange_rate {
            record.exchange_rate = exchange_rate;
        }
        if let Some(estimated_gdp) = self.estimated_gdp {
            record.estimated_gdp = estimated_gdp;
        }
        if let Some(flag_url) = &self.flag_url {
            record.flag_url = flag_url.clone();
        }
        if let Some(last_refreshed_at) = self.last_refreshed_at {
            record.last_refreshed_at = last_refreshed_at;
        }
    }
}

/// One refresh run in the append-only ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshLedgerEntry {
    pub run_id: Uuid,
    pub refreshed_at: UtcDateTime,
    pub total_countries: u64,
}

impl RefreshLedgerEntry {
    pub fn new(refreshed_at: UtcDateTime, total_countries: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            refreshed_at,
            total_countries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> NewCountry {
        NewCountry {
            name: String::from("Ghana"),
            capital: Some(String::from("Accra")),
            region: Some(String::from("Africa")),
            population: 31_072_940,
            currency_code: Some(String::from("GHS")),
            exchange_rate: None,
            estimated_gdp: None,
            flag_url: None,
            last_refreshed_at: UtcDateTime::parse("2026-10-18T09:00:00Z").expect("ts"),
        }
    }

    #[test]
    fn overwrite_patch_clears_rate_and_gdp_the_candidate_lacks() {
        let created = UtcDateTime::parse("2026-01-01T00:00:00Z").expect("ts");
        let mut record = CountryRecord {
            id: 1,
            name: String::from("Ghana"),
            capital: Some(String::from("Accra")),
            region: Some(String::from("Africa")),
            population: 30_000_000,
            currency_code: Some(String::from("GHS")),
            exchange_rate: Some(15.2),
            estimated_gdp: Some(2_500_000_000.0),
            flag_url: Some(String::from("https://flagcdn.com/gh.svg")),
            last_refreshed_at: created,
            created_at: created,
            updated_at: created,
        };

        CountryPatch::overwrite_with(&candidate()).apply_to(&mut record);

        assert_eq!(record.population, 31_072_940);
        assert_eq!(record.exchange_rate, None);
        assert_eq!(record.estimated_gdp, None);
        assert_eq!(record.flag_url, None);
        assert_eq!(record.created_at, created);
    }

    #[test]
    fn rate_lookup_is_an_exact_code_match() {
        let mut table = RateTable::default();
        table.rates.insert(String::from("NGN"), 1600.5);

        assert_eq!(table.rate_for("NGN"), Some(1600.5));
        assert_eq!(table.rate_for("ngn"), None);
    }
}
