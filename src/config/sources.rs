// ABOUTME: Readers that turn a config file or the process environment into fragments
// ABOUTME: Each reader only fills the fields its source actually provides

use super::ConfigFragment;
use crate::error::{Result, ShiftError};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_NUMBER_OF_CLIENTS: &str = "NUMBER_OF_CLIENTS";
pub const ENV_CONTACT_POINTS: &str = "CONTACT_POINTS";
pub const ENV_LOCAL_DATA_CENTER: &str = "LOCAL_DATA_CENTER";
pub const ENV_KEYSPACE: &str = "KEYSPACE";
pub const ENV_SSL_CA: &str = "SSL_CA";
pub const ENV_SSL_CERT: &str = "SSL_CERT";
pub const ENV_SSL_KEY: &str = "SSL_KEY";
pub const ENV_USERNAME: &str = "USERNAME";
pub const ENV_PASSWORD: &str = "PASSWORD";
pub const ENV_ENSURE_KEYSPACE: &str = "ENSURE_KEYSPACE";
pub const ENV_MIGRATIONS_DIRECTORY: &str = "MIGRATIONS_DIRECTORY";
pub const ENV_MIGRATION_ENGINE: &str = "MIGRATION_ENGINE";
pub const ENV_ENGINE_TIMEOUT: &str = "ENGINE_TIMEOUT";

/// Load a config file as a fragment.
///
/// The format is picked from the extension: `.toml` or `.json`. Any subset
/// of fields may be present; unknown keys are ignored.
///
/// # Errors
///
/// Returns [`ShiftError::ConfigLoad`] if the file cannot be read, has an
/// unsupported extension, or does not parse.
///
/// # Examples
///
/// ```no_run
/// # use cassandra_shift_cli::config::sources::load_file;
/// let fragment = load_file("shift.toml".as_ref()).unwrap();
/// println!("{:?}", fragment.cluster.contact_points);
/// ```
pub fn load_file(path: &Path) -> Result<ConfigFragment> {
    let origin = path.display().to_string();
    let raw = fs::read_to_string(path)
        .map_err(|e| ShiftError::config(&origin, format!("failed to read file: {}", e)))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let fragment = match ext.as_str() {
        "toml" => toml::from_str(&raw)
            .map_err(|e| ShiftError::config(&origin, format!("invalid TOML: {}", e)))?,
        "json" => serde_json::from_str(&raw)
            .map_err(|e| ShiftError::config(&origin, format!("invalid JSON: {}", e)))?,
        other => {
            return Err(ShiftError::config(
                &origin,
                format!("unsupported config extension '.{}' (use .toml or .json)", other),
            ))
        }
    };

    tracing::debug!("Loaded config file {}", origin);
    Ok(fragment)
}

/// Build a fragment from environment variables.
///
/// `lookup` abstracts `std::env::var` so the reader can be driven by a fixed
/// map in tests. Empty values count as unset.
///
/// # Errors
///
/// Returns [`ShiftError::ConfigLoad`] when a numeric or boolean variable holds
/// a value that cannot be coerced.
pub fn from_env<F>(lookup: F) -> Result<ConfigFragment>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
    let path = |name: &str| var(name).map(PathBuf::from);

    let mut fragment = ConfigFragment {
        number_of_clients: parse_var(ENV_NUMBER_OF_CLIENTS, var(ENV_NUMBER_OF_CLIENTS))?,
        ensure_keyspace: var(ENV_ENSURE_KEYSPACE)
            .map(|value| parse_bool(ENV_ENSURE_KEYSPACE, &value))
            .transpose()?,
        migrations_directory: path(ENV_MIGRATIONS_DIRECTORY),
        engine_program: var(ENV_MIGRATION_ENGINE),
        timeout_secs: parse_var(ENV_ENGINE_TIMEOUT, var(ENV_ENGINE_TIMEOUT))?,
        ..ConfigFragment::default()
    };

    let cluster = &mut fragment.cluster;
    cluster.contact_points = var(ENV_CONTACT_POINTS).map(|value| split_list(&value));
    cluster.local_data_center = var(ENV_LOCAL_DATA_CENTER);
    cluster.keyspace = var(ENV_KEYSPACE);
    cluster.tls.ca = path(ENV_SSL_CA);
    cluster.tls.cert = path(ENV_SSL_CERT);
    cluster.tls.key = path(ENV_SSL_KEY);
    cluster.auth.username = var(ENV_USERNAME);
    cluster.auth.password = var(ENV_PASSWORD);

    Ok(fragment)
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                ShiftError::config(
                    format!("environment variable {}", name),
                    format!("'{}' is not a valid number: {}", raw, e),
                )
            })
        })
        .transpose()
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ShiftError::config(
            format!("environment variable {}", name),
            format!("'{}' is not a boolean (use true or false)", other),
        )),
    }
}
