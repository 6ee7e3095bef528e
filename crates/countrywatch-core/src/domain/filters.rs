use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    GdpDesc,
    GdpAsc,
    PopulationDesc,
    PopulationAsc,
    #[default]
    NameAsc,
    NameDesc,
}

impl SortKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GdpDesc => "gdp_desc",
            Self::GdpAsc => "gdp_asc",
            Self::PopulationDesc => "population_desc",
            Self::PopulationAsc => "population_asc",
            Self::NameAsc => "name_asc",
            Self::NameDesc => "name_desc",
        }
    }
}

impl FromStr for SortKey {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gdp_desc" => Ok(Self::GdpDesc),
            "gdp_asc" => Ok(Self::GdpAsc),
            "population_desc" => Ok(Self::PopulationDesc),
            "population_asc" => Ok(Self::PopulationAsc),
            "name_asc" => Ok(Self::NameAsc),
            "name_desc" => Ok(Self::NameDesc),
            _ => Err(ValidationError::InvalidSortKey {
                value: value.to_owned(),
            }),
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters, ordering and pagination for country listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryFilters {
    /// Exact match on region.
    pub region: Option<String>,
    /// Exact match on currency code.
    pub currency: Option<String>,
    pub sort: SortKey,
    pub limit: usize,
    pub offset: usize,
}

impl CountryFilters {
    pub const DEFAULT_LIMIT: usize = 1_000;

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::InvalidLimit);
        }
        Ok(())
    }
}

impl Default for CountryFilters {
    fn default() -> Self {
        Self {
            region: None,
            currency: None,
            sort: SortKey::NameAsc,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_documented_sort_key() {
        for key in [
            SortKey::GdpDesc,
            SortKey::GdpAsc,
            SortKey::PopulationDesc,
            SortKey::PopulationAsc,
            SortKey::NameAsc,
            SortKey::NameDesc,
        ] {
            assert_eq!(key.as_str().parse::<SortKey>(), Ok(key));
        }
    }

    #[test]
    fn unknown_sort_key_is_rejected() {
        let err = "gdp".parse::<SortKey>().expect_err("must fail");
        assert_eq!(
            err,
            ValidationError::InvalidSortKey {
                value: String::from("gdp")
            }
        );
    }

    #[test]
    fn zero_limit_fails_validation() {
        let filters = CountryFilters::default().with_limit(0);
        assert_eq!(filters.validate(), Err(ValidationError::InvalidLimit));
    }
}
