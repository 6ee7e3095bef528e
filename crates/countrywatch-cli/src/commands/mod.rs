mod countries;
mod refresh;
mod summary;

use std::sync::Arc;

use countrywatch_core::{
    CountryService, JsonSummaryPublisher, RefreshConfig, RefreshPipeline, ReqwestHttpClient,
    Warehouse, WarehouseConfig,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Shared handles for one CLI invocation.
pub struct Context {
    pub warehouse: Arc<Warehouse>,
    pub publisher: Arc<JsonSummaryPublisher>,
}

impl Context {
    pub fn open(cli: &Cli) -> Result<Self, CliError> {
        let config = match &cli.home {
            Some(home) => WarehouseConfig::with_home(home),
            None => WarehouseConfig::default(),
        };
        debug!(home = %config.home.display(), "opening warehouse");

        let publisher = Arc::new(JsonSummaryPublisher::new(config.summary_path()));
        let warehouse = Arc::new(Warehouse::open(config)?);
        Ok(Self {
            warehouse,
            publisher,
        })
    }

    /// Service wired to the local warehouse and the HTTP sources.
    pub fn service(&self, config: &RefreshConfig) -> CountryService {
        let http_client = Arc::new(ReqwestHttpClient::new(&config.source.user_agent));
        let pipeline = RefreshPipeline::over_http(
            http_client,
            self.warehouse.clone(),
            self.warehouse.clone(),
            self.publisher.clone(),
            config,
        );
        CountryService::new(self.warehouse.clone(), self.warehouse.clone(), pipeline)
    }
}

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let context = Context::open(cli)?;

    match &cli.command {
        Command::Refresh(args) => refresh::run(args, &context).await,
        Command::List(args) => countries::list(args, &context).await,
        Command::Get(args) => countries::get(args, &context).await,
        Command::Delete(args) => countries::delete(args, &context).await,
        Command::Status => countries::status(&context).await,
        Command::Summary => summary::run(&context).await,
    }
}
