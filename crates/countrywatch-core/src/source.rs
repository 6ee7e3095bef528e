//! Upstream country and exchange-rate sources.
//!
//! Both sources issue one GET per fetch, bounded by a timeout. Payloads are
//! decoded defensively: the providers are untrusted, so shape problems in a
//! single country entry never fail the whole fetch.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::http_client::{HttpClient, HttpRequest};
use crate::{CurrencyDescriptor, RateTable, RawCountry};

/// Fetch failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Timeout,
    Unavailable,
    InvalidPayload,
}

/// Structured source error; every kind aborts the refresh run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidPayload,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::InvalidPayload => "source.invalid_payload",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Provider of the raw country list.
pub trait CountrySource: Send + Sync {
    fn fetch(&self) -> SourceFuture<'_, Vec<RawCountry>>;
}

/// Provider of the currency rate table.
pub trait RateSource: Send + Sync {
    fn fetch(&self) -> SourceFuture<'_, RateTable>;
}

/// Country source backed by a REST Countries style endpoint.
#[derive(Clone)]
pub struct HttpCountrySource {
    http_client: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
    user_agent: String,
}

impl HttpCountrySource {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &SourceConfig) -> Self {
        Self {
            http_client,
            url: config.countries_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl CountrySource for HttpCountrySource {
    fn fetch(&self) -> SourceFuture<'_, Vec<RawCountry>> {
        Box::pin(async move {
            let body = fetch_json(
                self.http_client.as_ref(),
                "countries",
                &self.url,
                self.timeout,
                &self.user_agent,
            )
            .await?;
            let countries = decode_countries(&body)?;
            info!(count = countries.len(), "fetched countries");
            Ok(countries)
        })
    }
}

/// Rate source backed by an open exchange-rate style endpoint.
#[derive(Clone)]
pub struct HttpRateSource {
    http_client: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
    user_agent: String,
}

impl HttpRateSource {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &SourceConfig) -> Self {
        Self {
            http_client,
            url: config.rates_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl RateSource for HttpRateSource {
    fn fetch(&self) -> SourceFuture<'_, RateTable> {
        Box::pin(async move {
            let body = fetch_json(
                self.http_client.as_ref(),
                "rates",
                &self.url,
                self.timeout,
                &self.user_agent,
            )
            .await?;
            let table = decode_rates(&body)?;
            info!(
                count = table.len(),
                base = table.base.as_deref().unwrap_or("?"),
                "fetched exchange rates"
            );
            Ok(table)
        })
    }
}

async fn fetch_json(
    http_client: &dyn HttpClient,
    source: &'static str,
    url: &str,
    timeout: Duration,
    user_agent: &str,
) -> Result<Value, SourceError> {
    let request = HttpRequest::get(url)
        .with_header("accept", "application/json")
        .with_header("user-agent", user_agent)
        .with_timeout_ms(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));

    debug!(source, url, "fetching upstream source");
    let started = Instant::now();

    // Dropping the in-flight future on elapse abandons the request.
    let response = match tokio::time::timeout(timeout, http_client.execute(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(error)) if error.timed_out() => {
            return Err(SourceError::timeout(format!(
                "{source} request timed out: {error}"
            )));
        }
        Ok(Err(error)) => {
            return Err(SourceError::unavailable(format!(
                "{source} request failed: {error}"
            )));
        }
        Err(_) => {
            return Err(SourceError::timeout(format!(
                "{source} request exceeded {}ms",
                timeout.as_millis()
            )));
        }
    };

    if !response.is_success() {
        return Err(SourceError::unavailable(format!(
            "{source} endpoint returned status {}",
            response.status
        )));
    }

    debug!(
        source,
        status = response.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "upstream source responded"
    );

    serde_json::from_str(&response.body).map_err(|e| {
        SourceError::invalid_payload(format!("failed to parse {source} response: {e}"))
    })
}

/// Decode a countries payload. The top level must be an array; elements that
/// are not objects are skipped.
pub fn decode_countries(body: &Value) -> Result<Vec<RawCountry>, SourceError> {
    let items = body.as_array().ok_or_else(|| {
        SourceError::invalid_payload("countries payload is not a JSON array")
    })?;

    let mut countries = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item.as_object() {
            Some(object) => countries.push(decode_country(object)),
            None => warn!(index, "skipping non-object country entry"),
        }
    }
    Ok(countries)
}

fn decode_country(object: &Map<String, Value>) -> RawCountry {
    let name = match object.get("name") {
        // Newer provider versions nest the name.
        Some(Value::Object(nested)) => nested.get("common").and_then(text),
        other => other.and_then(text),
    };

    let currencies = object
        .get("currencies")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .map(|entry| CurrencyDescriptor {
                    code: entry.get("code").and_then(text),
                    name: entry.get("name").and_then(text),
                    symbol: entry.get("symbol").and_then(text),
                })
                .collect()
        })
        .unwrap_or_default();

    RawCountry {
        name,
        capital: object.get("capital").and_then(text),
        region: object.get("region").and_then(text),
        population: object.get("population").and_then(Value::as_u64),
        flag: object.get("flag").and_then(text),
        currencies,
    }
}

/// Decode a rates payload. Only positive, finite numeric rates are kept.
pub fn decode_rates(body: &Value) -> Result<RateTable, SourceError> {
    let object = body
        .as_object()
        .ok_or_else(|| SourceError::invalid_payload("rates payload is not a JSON object"))?;
    let raw_rates = object
        .get("rates")
        .and_then(Value::as_object)
        .ok_or_else(|| SourceError::invalid_payload("rates payload has no 'rates' object"))?;

    let mut rates = BTreeMap::new();
    for (code, value) in raw_rates {
        match value.as_f64() {
            Some(rate) if rate.is_finite() && rate > 0.0 => {
                rates.insert(code.clone(), rate);
            }
            _ => debug!(code = %code, "dropping unusable exchange rate"),
        }
    }

    Ok(RateTable {
        base: object
            .get("base")
            .or_else(|| object.get("base_code"))
            .and_then(text),
        date: object
            .get("date")
            .or_else(|| object.get("time_last_update_utc"))
            .and_then(text),
        rates,
    })
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
