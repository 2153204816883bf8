//! Autofix CLI
//!
//! Every subcommand maps to one code assistant operation. Results are
//! printed to stdout as pretty JSON (`show` prints raw source); logs go to
//! stderr.
//!
//! Exit codes: 0 on success, 1 when the program still fails (exhausted
//! budget, non-zero exit), 2 when the operation itself failed.

use anyhow::Context;
use autofix_core::{AutofixConfig, AutofixError, CodeAssistant};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    match run(cli).await {
        Ok(outcome) => {
            println!("{}", outcome.body);
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            let kind = err
                .downcast_ref::<AutofixError>()
                .map_or("Internal", AutofixError::kind);
            tracing::error!(kind, error = %format!("{err:#}"), "Operation failed");
            let body = serde_json::json!({ "error": kind, "message": format!("{err:#}") });
            println!("{body:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<commands::Outcome> {
    let config = AutofixConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let assistant = CodeAssistant::builder(config).build()?;
    tracing::debug!(?assistant, "Assistant ready");
    commands::execute(cli.command, &assistant).await
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
