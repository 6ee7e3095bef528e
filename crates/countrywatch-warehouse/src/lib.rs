//! # Countrywatch Warehouse
//!
//! DuckDB-based storage for reconciled country records.
//!
//! ## Overview
//!
//! The warehouse owns two tables:
//!
//! | Table | Description |
//! |-------|-------------|
//! | `countries` | One row per country, unique on the normalised name |
//! | `refresh_log` | Append-only log of refresh runs and the resulting row count |
//!
//! Every call is synchronous; async callers are expected to hop onto a
//! blocking thread. All user-provided values are bound as query parameters.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use countrywatch_warehouse::{CountryQuery, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let rows = warehouse.query_countries(&CountryQuery::default())?;
//!     println!("{} countries stored", rows.len());
//!     Ok(())
//! }
//! ```

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ::duckdb::{Connection, Row, ToSql};
use serde::Serialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A country with the same normalised name already exists.
    #[error("country '{name}' already exists")]
    DuplicateName { name: String },

    /// The current time could not be rendered as RFC3339.
    #[error("timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for countrywatch data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    /// Build a configuration rooted at `home` using the standard file layout.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let db_path = home.join("data").join("countries.duckdb");
        Self {
            home,
            db_path,
            max_pool_size: 8,
        }
    }

    /// Location of the published summary artifact.
    pub fn summary_path(&self) -> PathBuf {
        self.home.join("cache").join("summary.json")
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::with_home(resolve_countrywatch_home())
    }
}

/// A stored country row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRow {
    pub id: i64,
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    /// RFC3339 UTC.
    pub last_refreshed_at: String,
    /// RFC3339 UTC.
    pub created_at: String,
    /// RFC3339 UTC.
    pub updated_at: String,
}

/// Values for a new country row. Identity and store timestamps are assigned
/// by the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCountryRow {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: String,
}

/// Partial update of a country row.
///
/// `None` leaves a column untouched; for nullable columns `Some(None)` writes
/// NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryRowPatch {
    pub capital: Option<Option<String>>,
    pub region: Option<Option<String>>,
    pub population: Option<i64>,
    pub currency_code: Option<Option<String>>,
    pub exchange_rate: Option<Option<f64>>,
    pub estimated_gdp: Option<Option<f64>>,
    pub flag_url: Option<Option<String>>,
    pub last_refreshed_at: Option<String>,
}

/// Row ordering for country listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountryOrder {
    GdpDesc,
    GdpAsc,
    PopulationDesc,
    PopulationAsc,
    #[default]
    NameAsc,
    NameDesc,
}

impl CountryOrder {
    // NULL GDP values sort last in both directions; ties fall back to name.
    fn order_by_sql(self) -> &'static str {
        match self {
            Self::GdpDesc => "estimated_gdp DESC NULLS LAST, name_key ASC",
            Self::GdpAsc => "estimated_gdp ASC NULLS LAST, name_key ASC",
            Self::PopulationDesc => "population DESC, name_key ASC",
            Self::PopulationAsc => "population ASC, name_key ASC",
            Self::NameAsc => "name_key ASC",
            Self::NameDesc => "name_key DESC",
        }
    }
}

/// Filter, ordering and pagination for [`Warehouse::query_countries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryQuery {
    /// Exact match on `region`.
    pub region: Option<String>,
    /// Exact match on `currency_code`.
    pub currency_code: Option<String>,
    pub order: CountryOrder,
    pub limit: usize,
    pub offset: usize,
}

impl Default for CountryQuery {
    fn default() -> Self {
        Self {
            region: None,
            currency_code: None,
            order: CountryOrder::NameAsc,
            limit: 1_000,
            offset: 0,
        }
    }
}

/// One refresh log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshLogRow {
    pub id: i64,
    pub run_id: String,
    /// RFC3339 UTC.
    pub refreshed_at: String,
    pub total_countries: i64,
}

/// Normalised lookup key for a country name: trimmed and lowercased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

const COUNTRY_COLUMNS: &str = "id, name, capital, region, population, currency_code, \
     exchange_rate, estimated_gdp, flag_url, last_refreshed_at, created_at, updated_at";

/// The main warehouse interface for country storage.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
    write_lock: Arc<Mutex<()>>,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        Self::with_manager(config, manager)
    }

    /// Open a throwaway in-memory warehouse. Nothing is written to disk.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let config = WarehouseConfig::with_home(env::temp_dir().join("countrywatch-memory"));
        let manager = DuckDbConnectionManager::open_in_memory(config.max_pool_size)?;
        Self::with_manager(config, manager)
    }

    fn with_manager(
        config: WarehouseConfig,
        manager: DuckDbConnectionManager,
    ) -> Result<Self, WarehouseError> {
        let warehouse = Self {
            config,
            manager,
            write_lock: Arc::new(Mutex::new(())),
        };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Get the path to the database file, `None` for in-memory warehouses.
    pub fn db_path(&self) -> Option<&Path> {
        self.manager.db_path()
    }

    /// Case-insensitive point lookup.
    pub fn find_country(&self, name: &str) -> Result<Option<CountryRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        select_country_by_key(&connection, &normalize_name(name))
    }

    /// Insert a new country. Fails with [`WarehouseError::DuplicateName`]
    /// when the normalised name is already present.
    pub fn insert_country(&self, row: &NewCountryRow) -> Result<CountryRow, WarehouseError> {
        let name_key = normalize_name(&row.name);
        let now = now_rfc3339()?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = self.manager.acquire()?;

        if select_country_by_key(&connection, &name_key)?.is_some() {
            return Err(WarehouseError::DuplicateName {
                name: row.name.clone(),
            });
        }

        let params: [&dyn ToSql; 12] = [
            &row.name,
            &name_key,
            &row.capital,
            &row.region,
            &row.population,
            &row.currency_code,
            &row.exchange_rate,
            &row.estimated_gdp,
            &row.flag_url,
            &row.last_refreshed_at,
            &now,
            &now,
        ];
        connection.execute(
            "INSERT INTO countries \
             (name, name_key, capital, region, population, currency_code, exchange_rate, \
              estimated_gdp, flag_url, last_refreshed_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params.as_slice(),
        )?;

        select_country_by_key(&connection, &name_key)?.ok_or_else(|| {
            WarehouseError::DuckDb(::duckdb::Error::QueryReturnedNoRows)
        })
    }

    /// Apply a partial update. Returns `None` when no row matches `name`.
    /// `updated_at` is bumped on every successful call.
    pub fn update_country(
        &self,
        name: &str,
        patch: &CountryRowPatch,
    ) -> Result<Option<CountryRow>, WarehouseError> {
        let name_key = normalize_name(name);
        let now = now_rfc3339()?;

        let mut assignments: Vec<&'static str> = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();

        if let Some(capital) = &patch.capital {
            assignments.push("capital = ?");
            params.push(capital);
        }
        if let Some(region) = &patch.region {
            assignments.push("region = ?");
            params.push(region);
        }
        if let Some(population) = &patch.population {
            assignments.push("population = ?");
            params.push(population);
        }
        if let Some(currency_code) = &patch.currency_code {
            assignments.push("currency_code = ?");
            params.push(currency_code);
        }
        if let Some(exchange_rate) = &patch.exchange_rate {
            assignments.push("exchange_rate = ?");
            params.push(exchange_rate);
        }
        if let Some(estimated_gdp) = &patch.estimated_gdp {
            assignments.push("estimated_gdp = ?");
            params.push(estimated_gdp);
        }
        if let Some(flag_url) = &patch.flag_url {
            assignments.push("flag_url = ?");
            params.push(flag_url);
        }
        if let Some(last_refreshed_at) = &patch.last_refreshed_at {
            assignments.push("last_refreshed_at = ?");
            params.push(last_refreshed_at);
        }
        assignments.push("updated_at = ?");
        params.push(&now);
        params.push(&name_key);

        let sql = format!(
            "UPDATE countries SET {} WHERE name_key = ?",
            assignments.join(", ")
        );

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = self.manager.acquire()?;
        let affected = connection.execute(sql.as_str(), params.as_slice())?;
        if affected == 0 {
            return Ok(None);
        }

        select_country_by_key(&connection, &name_key)
    }

    /// Filtered, ordered and paginated listing.
    pub fn query_countries(&self, query: &CountryQuery) -> Result<Vec<CountryRow>, WarehouseError> {
        let mut sql = format!("SELECT {COUNTRY_COLUMNS} FROM countries WHERE 1=1");
        let mut params: Vec<&dyn ToSql> = Vec::new();

        if let Some(region) = &query.region {
            sql.push_str(" AND region = ?");
            params.push(region);
        }
        if let Some(currency_code) = &query.currency_code {
            sql.push_str(" AND currency_code = ?");
            params.push(currency_code);
        }

        // limit/offset are integers, never caller-controlled text
        sql.push_str(&format!(
            " ORDER BY {} LIMIT {} OFFSET {}",
            query.order.order_by_sql(),
            query.limit,
            query.offset
        ));

        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement.query_map(params.as_slice(), read_country_row)?;
        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_countries(&self) -> Result<i64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count = connection.query_row("SELECT COUNT(*) FROM countries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete by name. Returns `true` when a row was removed.
    pub fn delete_country(&self, name: &str) -> Result<bool, WarehouseError> {
        let name_key = normalize_name(name);

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 1] = [&name_key];
        let affected =
            connection.execute("DELETE FROM countries WHERE name_key = ?", params.as_slice())?;
        Ok(affected > 0)
    }

    /// Append a refresh log entry.
    pub fn append_refresh_log(
        &self,
        run_id: &str,
        refreshed_at: &str,
        total_countries: i64,
    ) -> Result<RefreshLogRow, WarehouseError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = self.manager.acquire()?;

        let params: [&dyn ToSql; 3] = [&run_id, &refreshed_at, &total_countries];
        connection.execute(
            "INSERT INTO refresh_log (run_id, refreshed_at, total_countries) VALUES (?, ?, ?)",
            params.as_slice(),
        )?;

        latest_refresh_log(&connection)?
            .ok_or_else(|| WarehouseError::DuckDb(::duckdb::Error::QueryReturnedNoRows))
    }

    /// Most recently appended refresh log entry.
    pub fn last_refresh_log(&self) -> Result<Option<RefreshLogRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        latest_refresh_log(&connection)
    }

    /// Full refresh history, newest first.
    pub fn refresh_log_history(&self, limit: usize) -> Result<Vec<RefreshLogRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT id, run_id, refreshed_at, total_countries FROM refresh_log \
             ORDER BY id DESC LIMIT {limit}"
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement.query_map([], read_refresh_log_row)?;
        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn select_country_by_key(
    connection: &Connection,
    name_key: &str,
) -> Result<Option<CountryRow>, WarehouseError> {
    let sql = format!("SELECT {COUNTRY_COLUMNS} FROM countries WHERE name_key = ?");
    let mut statement = connection.prepare(sql.as_str())?;
    let params: [&dyn ToSql; 1] = [&name_key];
    let mut rows = statement.query(params.as_slice())?;
    let country = match rows.next()? {
        Some(row) => Some(read_country_row(row)?),
        None => None,
    };
    Ok(country)
}

fn latest_refresh_log(connection: &Connection) -> Result<Option<RefreshLogRow>, WarehouseError> {
    let mut statement = connection.prepare(
        "SELECT id, run_id, refreshed_at, total_countries FROM refresh_log \
         ORDER BY id DESC LIMIT 1",
    )?;
    let mut rows = statement.query([])?;
    let entry = match rows.next()? {
        Some(row) => Some(read_refresh_log_row(row)?),
        None => None,
    };
    Ok(entry)
}

fn read_country_row(row: &Row<'_>) -> Result<CountryRow, ::duckdb::Error> {
    Ok(CountryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        capital: row.get(2)?,
        region: row.get(3)?,
        population: row.get(4)?,
        currency_code: row.get(5)?,
        exchange_rate: row.get(6)?,
        estimated_gdp: row.get(7)?,
        flag_url: row.get(8)?,
        last_refreshed_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn read_refresh_log_row(row: &Row<'_>) -> Result<RefreshLogRow, ::duckdb::Error> {
    Ok(RefreshLogRow {
        id: row.get(0)?,
        run_id: row.get(1)?,
        refreshed_at: row.get(2)?,
        total_countries: row.get(3)?,
    })
}

fn now_rfc3339() -> Result<String, WarehouseError> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

/// Resolve the countrywatch home directory from environment or default.
fn resolve_countrywatch_home() -> PathBuf {
    if let Some(path) = env::var_os("COUNTRYWATCH_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".countrywatch");
    }

    PathBuf::from(".countrywatch")
}
