use anyhow::Result;
use docgate::cli::{self, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    let result = action.execute().await;

    telemetry::shutdown_tracer();

    result
}
