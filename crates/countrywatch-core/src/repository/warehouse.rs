use countrywatch_warehouse::{
    CountryOrder, CountryQuery, CountryRow, CountryRowPatch, NewCountryRow, RefreshLogRow,
    Warehouse, WarehouseError,
};
use uuid::Uuid;

use super::{CountryRepository, RefreshLedger, RepositoryError, RepositoryFuture};
use crate::{
    CountryFilters, CountryPatch, CountryRecord, NewCountry, RefreshLedgerEntry, SortKey,
    UtcDateTime,
};

// DuckDB calls block, so they run on the blocking pool against a cloned
// handle that shares the connection pool.
async fn blocking<T, F>(warehouse: &Warehouse, operation: F) -> Result<T, RepositoryError>
where
    T: Send + 'static,
    F: FnOnce(Warehouse) -> Result<T, RepositoryError> + Send + 'static,
{
    let warehouse = warehouse.clone();
    tokio::task::spawn_blocking(move || operation(warehouse))
        .await
        .map_err(|e| RepositoryError::unavailable(format!("warehouse task failed: {e}")))?
}

impl CountryRepository for Warehouse {
    fn find_by_name<'a>(&'a self, name: &'a str) -> RepositoryFuture<'a, Option<CountryRecord>> {
        let name = name.to_owned();
        Box::pin(async move {
            let row = blocking(self, move |warehouse| Ok(warehouse.find_country(&name)?)).await?;
            row.map(country_from_row).transpose()
        })
    }

    fn create(&self, candidate: NewCountry) -> RepositoryFuture<'_, CountryRecord> {
        Box::pin(async move {
            let row = new_row(&candidate)?;
            let stored = blocking(self, move |warehouse| {
                warehouse.insert_country(&row).map_err(|error| match error {
                    WarehouseError::DuplicateName { name } => {
                        RepositoryError::DuplicateKey { name }
                    }
                    other => RepositoryError::from(other),
                })
            })
            .await?;
            country_from_row(stored)
        })
    }

    fn update_by_name<'a>(
        &'a self,
        name: &'a str,
        patch: CountryPatch,
    ) -> RepositoryFuture<'a, Option<CountryRecord>> {
        let name = name.to_owned();
        Box::pin(async move {
            let patch = row_patch(patch)?;
            let row = blocking(self, move |warehouse| {
                Ok(warehouse.update_country(&name, &patch)?)
            })
            .await?;
            row.map(country_from_row).transpose()
        })
    }

    fn find_all<'a>(
        &'a self,
        filters: &'a CountryFilters,
    ) -> RepositoryFuture<'a, Vec<CountryRecord>> {
        let query = CountryQuery {
            region: filters.region.clone(),
            currency_code: filters.currency.clone(),
            order: order_for(filters.sort),
            limit: filters.limit,
            offset: filters.offset,
        };
        Box::pin(async move {
            let rows =
                blocking(self, move |warehouse| Ok(warehouse.query_countries(&query)?)).await?;
            rows.into_iter().map(country_from_row).collect()
        })
    }

    fn count(&self) -> RepositoryFuture<'_, u64> {
        Box::pin(async move {
            let count = blocking(self, |warehouse| Ok(warehouse.count_countries()?)).await?;
            u64::try_from(count)
                .map_err(|_| RepositoryError::invalid_record(format!("negative count {count}")))
        })
    }

    fn delete_by_name<'a>(&'a self, name: &'a str) -> RepositoryFuture<'a, bool> {
        let name = name.to_owned();
        Box::pin(async move {
            blocking(self, move |warehouse| Ok(warehouse.delete_country(&name)?)).await
        })
    }
}

impl RefreshLedger for Warehouse {
    fn append(
        &self,
        total_countries: u64,
        refreshed_at: UtcDateTime,
    ) -> RepositoryFuture<'_, RefreshLedgerEntry> {
        Box::pin(async move {
            let total = to_i64("total_countries", total_countries)?;
            let run_id = Uuid::new_v4().to_string();
            let refreshed_at = refreshed_at.format_rfc3339();
            let row = blocking(self, move |warehouse| {
                Ok(warehouse.append_refresh_log(&run_id, &refreshed_at, total)?)
            })
            .await?;
            ledger_entry_from_row(row)
        })
    }

    fn last_entry(&self) -> RepositoryFuture<'_, Option<RefreshLedgerEntry>> {
        Box::pin(async move {
            let row = blocking(self, |warehouse| Ok(warehouse.last_refresh_log()?)).await?;
            row.map(ledger_entry_from_row).transpose()
        })
    }
}

fn order_for(sort: SortKey) -> CountryOrder {
    match sort {
        SortKey::GdpDesc => CountryOrder::GdpDesc,
        SortKey::GdpAsc => CountryOrder::GdpAsc,
        SortKey::PopulationDesc => CountryOrder::PopulationDesc,
        SortKey::PopulationAsc => CountryOrder::PopulationAsc,
        SortKey::NameAsc => CountryOrder::NameAsc,
        SortKey::NameDesc => CountryOrder::NameDesc,
    }
}

fn to_i64(field: &str, value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value)
        .map_err(|_| RepositoryError::invalid_record(format!("{field} {value} is out of range")))
}

fn parse_timestamp(field: &str, value: &str) -> Result<UtcDateTime, RepositoryError> {
    UtcDateTime::parse(value)
        .map_err(|e| RepositoryError::invalid_record(format!("{field}: {e}")))
}

fn new_row(candidate: &NewCountry) -> Result<NewCountryRow, RepositoryError> {
    Ok(NewCountryRow {
        name: candidate.name.clone(),
        capital: candidate.capital.clone(),
        region: candidate.region.clone(),
        population: to_i64("population", candidate.population)?,
        currency_code: candidate.currency_code.clone(),
        exchange_rate: candidate.exchange_rate,
        estimated_gdp: candidate.estimated_gdp,
        flag_url: candidate.flag_url.clone(),
        last_refreshed_at: candidate.last_refreshed_at.format_rfc3339(),
    })
}

fn row_patch(patch: CountryPatch) -> Result<CountryRowPatch, RepositoryError> {
    Ok(CountryRowPatch {
        capital: patch.capital,
        region: patch.region,
        population: patch
            .population
            .map(|population| to_i64("population", population))
            .transpose()?,
        currency_code: patch.currency_code,
        exchange_rate: patch.exchange_rate,
        estimated_gdp: patch.estimated_gdp,
        flag_url: patch.flag_url,
        last_refreshed_at: patch.last_refreshed_at.map(UtcDateTime::format_rfc3339),
    })
}

fn country_from_row(row: CountryRow) -> Result<CountryRecord, RepositoryError> {
    let population = u64::try_from(row.population).map_err(|_| {
        RepositoryError::invalid_record(format!(
            "country '{}' has negative population {}",
            row.name, row.population
        ))
    })?;

    Ok(CountryRecord {
        id: row.id,
        population,
        last_refreshed_at: parse_timestamp("last_refreshed_at", &row.last_refreshed_at)?,
        created_at: parse_timestamp("created_at", &row.created_at)?,
        updated_at: parse_timestamp("updated_at", &row.updated_at)?,
        name: row.name,
        capital: row.capital,
        region: row.region,
        currency_code: row.currency_code,
        exchange_rate: row.exchange_rate,
        estimated_gdp: row.estimated_gdp,
        flag_url: row.flag_url,
    })
}

fn ledger_entry_from_row(row: RefreshLogRow) -> Result<RefreshLedgerEntry, RepositoryError> {
    let run_id = Uuid::parse_str(&row.run_id)
        .map_err(|e| RepositoryError::invalid_record(format!("run_id: {e}")))?;
    let total_countries = u64::try_from(row.total_countries).map_err(|_| {
        RepositoryError::invalid_record(format!("negative total {}", row.total_countries))
    })?;

    Ok(RefreshLedgerEntry {
        run_id,
        refreshed_at: parse_timestamp("refreshed_at", &row.refreshed_at)?,
        total_countries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sort_key_has_a_warehouse_order() {
        assert_eq!(order_for(SortKey::default()), CountryOrder::default());
        assert_eq!(order_for(SortKey::GdpDesc), CountryOrder::GdpDesc);
        assert_eq!(order_for(SortKey::PopulationAsc), CountryOrder::PopulationAsc);
    }

    #[test]
    fn negative_population_row_is_rejected() {
        let row = CountryRow {
            id: 1,
            name: String::from("Broken"),
            capital: None,
            region: None,
            population: -1,
            currency_code: None,
            exchange_rate: None,
            estimated_gdp: None,
            flag_url: None,
            last_refreshed_at: String::from("2026-10-18T00:00:00Z"),
            created_at: String::from("2026-10-18T00:00:00Z"),
            updated_at: String::from("2026-10-18T00:00:00Z"),
        };

        let err = country_from_row(row).expect_err("must reject");
        assert!(matches!(err, RepositoryError::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn in_memory_warehouse_round_trips_a_country() {
        let warehouse = Warehouse::open_in_memory().expect("warehouse");
        let candidate = NewCountry {
            name: String::from("Kenya"),
            capital: Some(String::from("Nairobi")),
            region: Some(String::from("Africa")),
            population: 53_771_300,
            currency_code: Some(String::from("KES")),
            exchange_rate: Some(129.0),
            estimated_gdp: Some(625_000_000.0),
            flag_url: None,
            last_refreshed_at: UtcDateTime::parse("2026-10-18T10:00:00Z").expect("ts"),
        };

        let created = warehouse.create(candidate.clone()).await.expect("create");
        let found = warehouse.find_by_name("kenya").await.expect("find");

        assert_eq!(found.as_ref(), Some(&created));
        assert_eq!(created.last_refreshed_at, candidate.last_refreshed_at);

        let duplicate = warehouse.create(candidate).await.expect_err("duplicate");
        assert!(matches!(duplicate, RepositoryError::DuplicateKey { .. }));
    }
}
