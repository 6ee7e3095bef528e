use countrywatch_core::{CountryFilters, RefreshConfig, SortKey};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{ListArgs, NameArgs};
use crate::error::CliError;

use super::Context;

#[derive(Debug, Serialize)]
struct DeleteResponse<'a> {
    name: &'a str,
    deleted: bool,
}

pub async fn list(args: &ListArgs, context: &Context) -> Result<Value, CliError> {
    let filters = filters(args)?;
    let countries = context
        .service(&RefreshConfig::default())
        .list_countries(&filters)
        .await?;
    Ok(serde_json::to_value(countries)?)
}

pub async fn get(args: &NameArgs, context: &Context) -> Result<Value, CliError> {
    let country = context
        .service(&RefreshConfig::default())
        .get_country_by_name(&args.name)
        .await?
        .ok_or_else(|| CliError::NotFound {
            name: args.name.clone(),
        })?;
    Ok(serde_json::to_value(country)?)
}

pub async fn delete(args: &NameArgs, context: &Context) -> Result<Value, CliError> {
    let deleted = context
        .service(&RefreshConfig::default())
        .delete_country_by_name(&args.name)
        .await?;
    if !deleted {
        return Err(CliError::NotFound {
            name: args.name.clone(),
        });
    }
    Ok(serde_json::to_value(DeleteResponse {
        name: &args.name,
        deleted,
    })?)
}

pub async fn status(context: &Context) -> Result<Value, CliError> {
    let status = context
        .service(&RefreshConfig::default())
        .get_status()
        .await?;
    Ok(serde_json::to_value(status)?)
}

fn filters(args: &ListArgs) -> Result<CountryFilters, CliError> {
    let sort: SortKey = args.sort.parse()?;
    let mut filters = CountryFilters::default()
        .with_sort(sort)
        .with_limit(args.limit)
        .with_offset(args.offset);
    if let Some(region) = &args.region {
        filters = filters.with_region(region.clone());
    }
    if let Some(currency) = &args.currency {
        filters = filters.with_currency(currency.clone());
    }
    Ok(filters)
}
