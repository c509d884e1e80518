use clap::Parser;
use open_car_diagnostics::{
    CliArgs, LoggingConfig, ServerConfig, init_logging, run_server, shutdown_telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging(LoggingConfig::from_env())?;

    let config = ServerConfig::from_args(CliArgs::parse())?;
    config.validate()?;

    let result = run_server(config).await;

    // flush spans before exit
    shutdown_telemetry();

    result
}
