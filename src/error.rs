// ABOUTME: Error taxonomy for configuration, client bootstrap, and command dispatch
// ABOUTME: Every variant is terminal and maps to a non-zero process exit status

use crate::commands::Command;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShiftError {
    /// The config file could not be read or parsed, or a configuration value
    /// could not be coerced to its type.
    #[error("Unable to load configuration from {origin}: {reason}")]
    ConfigLoad { origin: String, reason: String },

    #[error("Unable to read {field} from {}: {source}", path.display())]
    SecretRead {
        field: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error configuring Cassandra client #{index}: {reason}")]
    ClientConstruction { index: usize, reason: String },

    #[error("Invalid command '{0}' (expected one of: migrate, clean, info, validate)")]
    InvalidCommand(String),

    #[error("Error executing command '{command}': {reason}")]
    EngineOperation { command: Command, reason: String },

    #[error("A command has already been dispatched")]
    AlreadyDispatched,
}

impl ShiftError {
    pub(crate) fn config(origin: impl Into<String>, reason: impl ToString) -> Self {
        ShiftError::ConfigLoad {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = ShiftError> = std::result::Result<T, E>;
