use thiserror::Error;

/// Validation and contract errors exposed by `countrywatch-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("country name is required")]
    EmptyCountryName,
    #[error("country record is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error(
        "invalid sort '{value}', expected one of gdp_desc, gdp_asc, population_desc, \
         population_asc, name_asc, name_desc"
    )]
    InvalidSortKey { value: String },
    #[error("limit must be greater than zero")]
    InvalidLimit,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("configuration value '{field}' must be greater than zero")]
    ZeroConfigValue { field: &'static str },
}
