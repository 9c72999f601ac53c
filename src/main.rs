use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use anydb::cli::Args;
use anydb::config::Settings;
use anydb::db::Registry;
use anydb::output::format_error;

/// Environment variable holding the log filter directive.
const LOG_ENV_VAR: &str = "ANYDB_LOG";

fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_logging();

    let args = Args::parse();
    let settings = Settings::from_environment(args.overrides())?;

    let registry = Registry::new();
    match registry.run(&settings.uri, &args.query, &settings.options).await {
        Ok(records) => {
            println!("{}", args.format.format(&records));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", format_error(&settings.uri, &err));
            Ok(ExitCode::FAILURE)
        }
    }
}
