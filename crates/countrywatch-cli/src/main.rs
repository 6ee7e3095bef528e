mod cli;
mod commands;
mod error;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use countrywatch_core::RefreshError;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if let CliError::Refresh(refresh_error) = &error {
                let mut stdout = std::io::stdout().lock();
                let written = write_error_body(&mut stdout, refresh_error, cli.pretty);
                if let Err(render_error) = written {
                    warn!(error = %render_error, "failed to write refresh error body");
                }
            }
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let output = commands::run(cli).await?;
    let mut stdout = std::io::stdout().lock();
    write_json(&mut stdout, &output, cli.pretty)
}

// Logs go to stderr; stdout carries only JSON.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_error_body(
    out: &mut impl Write,
    error: &RefreshError,
    pretty: bool,
) -> Result<(), CliError> {
    let body = serde_json::to_value(error.error_body())?;
    write_json(out, &body, pretty)
}

fn write_json(out: &mut impl Write, value: &Value, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(out, "{rendered}")?;
    Ok(())
}
