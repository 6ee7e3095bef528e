use std::env;

use tracing::warn;

use crate::ValidationError;

pub const DEFAULT_COUNTRIES_URL: &str =
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies";
pub const DEFAULT_RATES_URL: &str = "https://open.er-api.com/v6/latest/USD";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 1_000;
pub const DEFAULT_USER_AGENT: &str = "countrywatch/0.1.0";

/// Where and how the upstream sources are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub countries_url: String,
    pub rates_url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            countries_url: String::from(DEFAULT_COUNTRIES_URL),
            rates_url: String::from(DEFAULT_RATES_URL),
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            user_agent: String::from(DEFAULT_USER_AGENT),
        }
    }
}

/// Settings for one refresh run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    pub source: SourceConfig,
    /// Maximum number of countries reconciled at once.
    pub concurrency: usize,
    /// Maximum number of records handed to the summary publisher.
    pub snapshot_limit: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }
}

impl RefreshConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) =
            non_blank("COUNTRYWATCH_COUNTRY_SOURCE_URL").or_else(|| non_blank("COUNTRY_DATA"))
        {
            config.source.countries_url = url;
        }
        if let Some(url) =
            non_blank("COUNTRYWATCH_RATE_SOURCE_URL").or_else(|| non_blank("EXCHANGE_RATE"))
        {
            config.source.rates_url = url;
        }
        if let Some(timeout_ms) = parse_number(
            "COUNTRYWATCH_FETCH_TIMEOUT_MS",
            non_blank("COUNTRYWATCH_FETCH_TIMEOUT_MS"),
        ) {
            config.source.timeout_ms = timeout_ms;
        }
        if let Some(concurrency) = parse_number(
            "COUNTRYWATCH_REFRESH_CONCURRENCY",
            non_blank("COUNTRYWATCH_REFRESH_CONCURRENCY"),
        ) {
            config.concurrency = concurrency;
        }

        config
    }

    pub fn with_countries_url(mut self, url: impl Into<String>) -> Self {
        self.source.countries_url = url.into();
        self
    }

    pub fn with_rates_url(mut self, url: impl Into<String>) -> Self {
        self.source.rates_url = url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.source.timeout_ms = timeout_ms;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_snapshot_limit(mut self, snapshot_limit: usize) -> Self {
        self.snapshot_limit = snapshot_limit;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source.timeout_ms == 0 {
            return Err(ValidationError::ZeroConfigValue {
                field: "timeout_ms",
            });
        }
        if self.concurrency == 0 {
            return Err(ValidationError::ZeroConfigValue {
                field: "concurrency",
            });
        }
        if self.snapshot_limit == 0 {
            return Err(ValidationError::ZeroConfigValue {
                field: "snapshot_limit",
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring non-numeric configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_public_providers() {
        let config = RefreshConfig::default();

        assert_eq!(config.source.countries_url, DEFAULT_COUNTRIES_URL);
        assert_eq!(config.source.rates_url, DEFAULT_RATES_URL);
        assert_eq!(config.source.timeout_ms, 10_000);
        assert_eq!(config.concurrency, 50);
        assert_eq!(config.snapshot_limit, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn legacy_variable_names_are_used_as_fallback() {
        let config = RefreshConfig::from_lookup(lookup_from(&[
            ("COUNTRY_DATA", "http://legacy.test/countries"),
            ("COUNTRYWATCH_RATE_SOURCE_URL", "http://new.test/rates"),
            ("EXCHANGE_RATE", "http://legacy.test/rates"),
        ]));

        assert_eq!(config.source.countries_url, "http://legacy.test/countries");
        assert_eq!(config.source.rates_url, "http://new.test/rates");
    }

    #[test]
    fn invalid_numbers_keep_defaults() {
        let config = RefreshConfig::from_lookup(lookup_from(&[
            ("COUNTRYWATCH_FETCH_TIMEOUT_MS", "soon"),
            ("COUNTRYWATCH_REFRESH_CONCURRENCY", "8"),
        ]));

        assert_eq!(config.source.timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = RefreshConfig::default().with_concurrency(0);
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroConfigValue {
                field: "concurrency"
            })
        );
    }
}
