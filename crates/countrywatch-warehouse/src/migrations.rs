//! Versioned schema migrations, applied once per database file.

use ::duckdb::{Connection, ToSql};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

// Timestamps are stored as RFC3339 UTC text so they round-trip without
// depending on the session time zone.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_countries",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS countries_id_seq START 1;

CREATE TABLE IF NOT EXISTS countries (
    id BIGINT PRIMARY KEY DEFAULT nextval('countries_id_seq'),
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    capital TEXT,
    region TEXT,
    population BIGINT NOT NULL,
    currency_code TEXT,
    exchange_rate DOUBLE,
    estimated_gdp DOUBLE,
    flag_url TEXT,
    last_refreshed_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
    },
    Migration {
        version: "0002_refresh_log",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS refresh_log_id_seq START 1;

CREATE TABLE IF NOT EXISTS refresh_log (
    id BIGINT PRIMARY KEY DEFAULT nextval('refresh_log_id_seq'),
    run_id TEXT NOT NULL,
    refreshed_at TEXT NOT NULL,
    total_countries BIGINT NOT NULL
);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let params: [&dyn ToSql; 1] = [&migration.version];
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params.as_slice(),
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let connection = Connection::open_in_memory().expect("in-memory db");

        apply_migrations(&connection).expect("first pass");
        apply_migrations(&connection).expect("second pass");

        let applied: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }
}
