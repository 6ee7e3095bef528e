use serde_json::Value;

use crate::error::CliError;

use super::Context;

pub async fn run(context: &Context) -> Result<Value, CliError> {
    let summary = context.publisher.load().await?;
    Ok(serde_json::to_value(summary)?)
}
