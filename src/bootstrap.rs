// ABOUTME: End-to-end pipeline from parsed arguments to a dispatched engine command
// ABOUTME: Reads config sources, resolves them, builds the client pool, and dispatches once

use crate::cli::CliArgs;
use crate::cluster::ClientPool;
use crate::commands::{Command, Dispatcher};
use crate::config::{self, sources, ConfigFragment, EffectiveConfig};
use crate::engine::{EngineOptions, MigrationEngine};
use crate::error::Result;
use std::io::Write;

/// Run one command.
///
/// The stages run strictly in order and the first failure stops the
/// pipeline, so a broken config file means no client is ever built and an
/// invalid pool means the engine is never constructed.
///
/// # Arguments
///
/// * `args` - Parsed command line
/// * `env` - Environment lookup, normally `|name| std::env::var(name).ok()`
/// * `make_engine` - Builds the engine from the pool and engine options; the
///   resolved config is passed along for engine-level settings such as the
///   executable to run
/// * `out` - Destination for operator-facing progress lines
pub async fn run<Env, Make, E, W>(args: &CliArgs, env: Env, make_engine: Make, out: &mut W) -> Result<()>
where
    Env: Fn(&str) -> Option<String>,
    Make: FnOnce(ClientPool, EngineOptions, &EffectiveConfig) -> E,
    E: MigrationEngine,
    W: Write,
{
    let command = Command::from_arg(&args.command);

    let file_fragment = match &args.config {
        Some(path) => sources::load_file(path)?,
        None => ConfigFragment::default(),
    };
    let env_fragment = sources::from_env(env)?;
    let cli_fragment = args.to_fragment();

    let resolved = config::resolve(
        ConfigFragment::defaults(),
        file_fragment,
        env_fragment,
        cli_fragment,
    )?;

    tracing::debug!("Resolved configuration: {:?}", resolved);

    let pool = ClientPool::create(&resolved.connection_config(), resolved.client_count)?;
    tracing::debug!("Client pool ready with {} client(s)", pool.len());

    let engine = make_engine(pool, resolved.engine_options(), &resolved);
    let mut dispatcher = Dispatcher::new(engine).with_timeout(resolved.timeout);
    dispatcher.dispatch(command, out).await
}
