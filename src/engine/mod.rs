// ABOUTME: Contract between the CLI and the external schema migration engine
// ABOUTME: Defines engine operations, engine options, and typed lifecycle events

pub mod process;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;

pub use process::ProcessEngine;

/// Sending half of the lifecycle event channel. Send failures mean nobody is
/// listening any more and can be ignored.
pub type EventSink = mpsc::UnboundedSender<LifecycleEvent>;

/// Behavior options for the engine. Connection details travel in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineOptions {
    pub ensure_keyspace: bool,
    pub migrations_dir: PathBuf,
}

/// Progress notifications emitted by the engine while it works
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LifecycleEvent {
    EnsuredKeyspace,
    UsingKeyspace,
    EnsuredMigrationTable,
    CheckedAppliedMigrations,
    AppliedMigration {
        version: String,
        name: String,
        #[serde(rename = "type")]
        kind: String,
    },
    /// Free-form engine output such as an `info` report
    Output { line: String },
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::EnsuredKeyspace => write!(f, "Ensured keyspace"),
            LifecycleEvent::UsingKeyspace => write!(f, "Using keyspace"),
            LifecycleEvent::EnsuredMigrationTable => write!(f, "Ensured migration table"),
            LifecycleEvent::CheckedAppliedMigrations => write!(f, "Checked applied migrations"),
            LifecycleEvent::AppliedMigration {
                version,
                name,
                kind,
            } => write!(f, "Applied migration {} \"{}\" ({})", version, name, kind),
            LifecycleEvent::Output { line } => write!(f, "{}", line),
        }
    }
}

/// The migration engine driven by the dispatcher.
///
/// An engine is built from a [`ClientPool`](crate::cluster::ClientPool) and
/// [`EngineOptions`]. Each operation reports progress through `events` and
/// resolves once the work is finished.
#[allow(async_fn_in_trait)]
pub trait MigrationEngine {
    /// Apply all pending migrations
    async fn migrate(&mut self, events: EventSink) -> Result<()>;

    /// Drop every object in the keyspace
    async fn clean(&mut self, events: EventSink) -> Result<()>;

    /// Print details about applied and pending migrations
    async fn info(&mut self, events: EventSink) -> Result<()>;

    /// Check applied migrations against the available ones
    async fn validate(&mut self, events: EventSink) -> Result<()>;
}
