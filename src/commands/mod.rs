// ABOUTME: Command selection and dispatch to the migration engine
// ABOUTME: Renders lifecycle events in order and maps the outcome to success or failure

use crate::engine::{LifecycleEvent, MigrationEngine};
use crate::error::{Result, ShiftError};
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// The operation selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Migrate,
    Clean,
    Info,
    Validate,
    Invalid(String),
}

impl Command {
    /// Map the positional argument to a command. Anything unrecognized
    /// becomes [`Command::Invalid`] rather than an error, so the dispatcher
    /// can report it.
    pub fn from_arg(arg: &str) -> Self {
        match arg {
            "migrate" => Command::Migrate,
            "clean" => Command::Clean,
            "info" => Command::Info,
            "validate" => Command::Validate,
            other => Command::Invalid(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Migrate => write!(f, "migrate"),
            Command::Clean => write!(f, "clean"),
            Command::Info => write!(f, "info"),
            Command::Validate => write!(f, "validate"),
            Command::Invalid(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatching,
    Succeeded,
    Failed,
}

/// Runs exactly one command against an engine.
///
/// Lifecycle events are written to the output one line each while the
/// engine call is in flight. Per-migration events are only shown for
/// `migrate`.
pub struct Dispatcher<E> {
    engine: E,
    state: DispatchState,
    timeout: Option<Duration>,
}

impl<E: MigrationEngine> Dispatcher<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: DispatchState::Idle,
            timeout: None,
        }
    }

    /// Fail the engine call if it has not finished within `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Dispatch `command` to the engine and wait for it to finish.
    ///
    /// # Errors
    ///
    /// - [`ShiftError::InvalidCommand`] for an unrecognized command; the
    ///   engine is not called
    /// - [`ShiftError::EngineOperation`] if the engine fails or times out
    /// - [`ShiftError::AlreadyDispatched`] if this dispatcher already ran
    pub async fn dispatch<W: Write>(&mut self, command: Command, out: &mut W) -> Result<()> {
        if self.state != DispatchState::Idle {
            return Err(ShiftError::AlreadyDispatched);
        }

        if let Command::Invalid(raw) = command {
            self.transition(DispatchState::Failed);
            emit(out, "Invalid command");
            return Err(ShiftError::InvalidCommand(raw));
        }

        self.transition(DispatchState::Dispatching);

        let show_applied = command == Command::Migrate;
        let label = command.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = {
            let engine = &mut self.engine;
            let timeout = self.timeout;
            let call = async move {
                let operation = async {
                    match command {
                        Command::Migrate => engine.migrate(tx).await,
                        Command::Clean => engine.clean(tx).await,
                        Command::Info => engine.info(tx).await,
                        Command::Validate => engine.validate(tx).await,
                        Command::Invalid(raw) => Err(anyhow::anyhow!("invalid command '{}'", raw)),
                    }
                };
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, operation)
                        .await
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("timed out after {:?}", limit))),
                    None => operation.await,
                }
            };
            tokio::pin!(call);

            loop {
                tokio::select! {
                    biased;
                    Some(event) = rx.recv() => render(out, &event, show_applied),
                    result = &mut call => break result,
                }
            }
        };

        // Events sent right before the engine returned
        while let Ok(event) = rx.try_recv() {
            render(out, &event, show_applied);
        }

        match outcome {
            Ok(()) => {
                self.transition(DispatchState::Succeeded);
                Ok(())
            }
            Err(e) => {
                self.transition(DispatchState::Failed);
                Err(ShiftError::EngineOperation {
                    command: label,
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    fn transition(&mut self, next: DispatchState) {
        tracing::debug!("Dispatcher {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn render<W: Write>(out: &mut W, event: &LifecycleEvent, show_applied: bool) {
    if !show_applied && matches!(event, LifecycleEvent::AppliedMigration { .. }) {
        return;
    }
    emit(out, &event.to_string());
}

fn emit<W: Write>(out: &mut W, line: &str) {
    if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
        tracing::warn!("Failed to write progress output: {}", e);
    }
}
