use countrywatch_core::RefreshConfig;
use serde_json::Value;

use crate::cli::RefreshArgs;
use crate::error::CliError;

use super::Context;

pub async fn run(args: &RefreshArgs, context: &Context) -> Result<Value, CliError> {
    let config = refresh_config(args);
    config.validate()?;

    let result = context.service(&config).refresh_countries().await?;
    Ok(serde_json::to_value(result)?)
}

/// Environment configuration with command-line overrides applied.
fn refresh_config(args: &RefreshArgs) -> RefreshConfig {
    let mut config = RefreshConfig::from_env();
    if let Some(timeout_ms) = args.timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(url) = &args.countries_url {
        config = config.with_countries_url(url.clone());
    }
    if let Some(url) = &args.rates_url {
        config = config.with_rates_url(url.clone());
    }
    config
}
