// ABOUTME: CLI entry point for cassandra-shift-cli
// ABOUTME: Sets up logging, runs the bootstrap pipeline, and maps the outcome to an exit code

use cassandra_shift_cli::bootstrap;
use cassandra_shift_cli::cli::CliArgs;
use cassandra_shift_cli::engine::ProcessEngine;
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging - default to INFO level if RUST_LOG not set.
    // Logs go to stderr; stdout carries progress lines only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let mut stdout = std::io::stdout();

    let result = bootstrap::run(
        &args,
        |name| std::env::var(name).ok(),
        |pool, options, config| ProcessEngine::new(config.engine_program.clone(), pool, options),
        &mut stdout,
    )
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
