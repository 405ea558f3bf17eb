use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod app;

/// Conversational agent orchestrator host process.
#[derive(Parser, Debug)]
#[command(name = "corvid", about = "Conversational agent orchestrator")]
struct Cli {
    /// Enable debug-level logging.
    #[arg(long, env = "CORVID_DEBUG")]
    debug: bool,

    /// Path to the persona JSON file, overriding config.
    #[arg(long = "character", env = "CORVID_CHARACTER")]
    character: Option<String>,

    /// Drop and recreate all memory collections on startup.
    #[arg(long = "freshStart", env = "CORVID_FRESH_START")]
    fresh_start: bool,

    /// Path to corvid.toml, overriding the default `~/.corvid/corvid.toml`.
    #[arg(long, env = "CORVID_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "corvid=debug" } else { "corvid=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match app::run(cli.config.as_deref(), cli.character.as_deref(), cli.fresh_start).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal initialization error");
            ExitCode::FAILURE
        }
    }
}
