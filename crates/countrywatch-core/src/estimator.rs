use crate::RawCountry;

/// Lower bound of the GDP scale factor.
pub const MULTIPLIER_MIN: f64 = 1_000.0;
/// Exclusive upper bound of the GDP scale factor.
pub const MULTIPLIER_MAX: f64 = 2_000.0;

/// First non-empty currency code in source order.
pub fn extract_currency_code(country: &RawCountry) -> Option<String> {
    country
        .currencies
        .first()
        .and_then(|currency| currency.code.as_deref())
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_owned)
}

/// Uniform sample in `[1000, 2000)`. Drawn per country per run, so estimates
/// change on every refresh.
pub fn generate_random_multiplier() -> f64 {
    MULTIPLIER_MIN + fastrand::f64() * (MULTIPLIER_MAX - MULTIPLIER_MIN)
}

/// `population * multiplier / exchange_rate`, or `None` without a positive
/// rate.
pub fn calculate_estimated_gdp(
    population: u64,
    exchange_rate: Option<f64>,
    multiplier: f64,
) -> Option<f64> {
    let rate = exchange_rate.filter(|rate| rate.is_finite() && *rate > 0.0)?;
    Some(population as f64 * multiplier / rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CurrencyDescriptor;

    fn with_codes(codes: &[Option<&str>]) -> RawCountry {
        RawCountry {
            currencies: codes
                .iter()
                .map(|code| CurrencyDescriptor {
                    code: code.map(str::to_owned),
                    ..CurrencyDescriptor::default()
                })
                .collect(),
            ..RawCountry::default()
        }
    }

    #[test]
    fn first_listed_currency_wins() {
        let country = with_codes(&[Some("ZAR"), Some("NAD")]);
        assert_eq!(extract_currency_code(&country).as_deref(), Some("ZAR"));
    }

    #[test]
    fn no_currencies_means_no_code() {
        assert_eq!(extract_currency_code(&with_codes(&[])), None);
        assert_eq!(extract_currency_code(&with_codes(&[None, Some("USD")])), None);
    }

    #[test]
    fn multiplier_stays_in_range() {
        for _ in 0..1_000 {
            let multiplier = generate_random_multiplier();
            assert!((MULTIPLIER_MIN..MULTIPLIER_MAX).contains(&multiplier));
        }
    }

    #[test]
    fn gdp_requires_a_positive_rate() {
        assert_eq!(calculate_estimated_gdp(1_000, None, 1_500.0), None);
        assert_eq!(calculate_estimated_gdp(1_000, Some(0.0), 1_500.0), None);
        assert_eq!(calculate_estimated_gdp(1_000, Some(-3.0), 1_500.0), None);
        assert_eq!(
            calculate_estimated_gdp(1_000, Some(2.0), 1_500.0),
            Some(750_000.0)
        );
    }
}
