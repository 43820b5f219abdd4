// ABOUTME: Layered configuration model and precedence-based resolution
// ABOUTME: Merges defaults, file, environment, and CLI fragments into an EffectiveConfig

pub mod secrets;
pub mod sources;

use crate::cluster::auth::{self, Credentials};
use crate::cluster::ConnectionConfig;
use crate::engine::EngineOptions;
use crate::error::{Result, ShiftError};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub use secrets::TlsMaterial;

pub const DEFAULT_NUMBER_OF_CLIENTS: usize = 1;
pub const MAX_NUMBER_OF_CLIENTS: usize = 1024;
pub const DEFAULT_MIGRATIONS_DIRECTORY: &str = "migrations";
pub const DEFAULT_ENGINE_PROGRAM: &str = "cassandra-shift";

/// A partial configuration as produced by one source.
///
/// Every field is optional: `None` means "this source did not say", which lets
/// a lower-precedence source show through during [`resolve`]. The camelCase
/// aliases accept the key layout of existing cassandra-shift config files.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigFragment {
    #[serde(alias = "numberOfClients")]
    pub number_of_clients: Option<i64>,
    #[serde(alias = "cassandra")]
    pub cluster: ClusterFragment,
    #[serde(alias = "ensureKeyspace")]
    pub ensure_keyspace: Option<bool>,
    #[serde(alias = "dir", alias = "migrationsDirectory")]
    pub migrations_directory: Option<PathBuf>,
    #[serde(alias = "engine")]
    pub engine_program: Option<String>,
    #[serde(alias = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusterFragment {
    #[serde(alias = "contactPoints")]
    pub contact_points: Option<Vec<String>>,
    #[serde(alias = "localDataCenter")]
    pub local_data_center: Option<String>,
    pub keyspace: Option<String>,
    #[serde(alias = "sslOptions")]
    pub tls: TlsFragment,
    pub auth: AuthFragment,
}

/// TLS file locations. These are paths until [`resolve`] swaps them for bytes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TlsFragment {
    pub ca: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthFragment {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for AuthFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFragment")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConfigFragment {
    /// Built-in defaults, the lowest-precedence layer
    pub fn defaults() -> Self {
        Self {
            number_of_clients: Some(DEFAULT_NUMBER_OF_CLIENTS as i64),
            ensure_keyspace: Some(false),
            migrations_directory: Some(PathBuf::from(DEFAULT_MIGRATIONS_DIRECTORY)),
            engine_program: Some(DEFAULT_ENGINE_PROGRAM.to_string()),
            ..Self::default()
        }
    }

    /// Layers `over` on top of `self`, field by field.
    ///
    /// Fields set in `over` win; fields it leaves unset keep the value from
    /// `self`. Nested records are merged recursively rather than replaced.
    pub fn merge(self, over: ConfigFragment) -> ConfigFragment {
        ConfigFragment {
            number_of_clients: over.number_of_clients.or(self.number_of_clients),
            cluster: self.cluster.merge(over.cluster),
            ensure_keyspace: over.ensure_keyspace.or(self.ensure_keyspace),
            migrations_directory: over.migrations_directory.or(self.migrations_directory),
            engine_program: over.engine_program.or(self.engine_program),
            timeout_secs: over.timeout_secs.or(self.timeout_secs),
        }
    }
}

impl ClusterFragment {
    fn merge(self, over: ClusterFragment) -> ClusterFragment {
        ClusterFragment {
            contact_points: over.contact_points.or(self.contact_points),
            local_data_center: over.local_data_center.or(self.local_data_center),
            keyspace: over.keyspace.or(self.keyspace),
            tls: TlsFragment {
                ca: over.tls.ca.or(self.tls.ca),
                cert: over.tls.cert.or(self.tls.cert),
                key: over.tls.key.or(self.tls.key),
            },
            auth: AuthFragment {
                username: over.auth.username.or(self.auth.username),
                password: over.auth.password.or(self.auth.password),
            },
        }
    }
}

/// Connection target after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub contact_points: Vec<String>,
    pub local_data_center: Option<String>,
    pub keyspace: Option<String>,
}

/// The single resolved configuration.
///
/// Built once by [`resolve`] and only read afterwards; each later stage
/// borrows the parts it needs.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub client_count: usize,
    pub cluster: ClusterConfig,
    pub tls: Option<TlsMaterial>,
    pub credentials: Credentials,
    pub ensure_keyspace: bool,
    pub migrations_dir: PathBuf,
    pub engine_program: String,
    pub timeout: Option<Duration>,
}

impl EffectiveConfig {
    /// Connection parameters shared by every client in the pool
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            contact_points: self.cluster.contact_points.clone(),
            local_data_center: self.cluster.local_data_center.clone(),
            keyspace: self.cluster.keyspace.clone(),
            tls: self.tls.clone(),
            auth_provider: auth::build(&self.credentials),
        }
    }

    /// Options handed to the migration engine. Connection details and the
    /// client count are not part of it; the engine reaches the cluster
    /// through the pool.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            ensure_keyspace: self.ensure_keyspace,
            migrations_dir: self.migrations_dir.clone(),
        }
    }
}

/// Merge configuration fragments and materialize TLS secrets.
///
/// Precedence, lowest to highest: `defaults` < `file` < `env` < `cli`.
///
/// # Errors
///
/// Returns [`ShiftError::SecretRead`] if a configured CA, certificate, or key
/// file cannot be read, and [`ShiftError::ConfigLoad`] if the number of clients
/// exceeds [`MAX_NUMBER_OF_CLIENTS`].
///
/// # Examples
///
/// ```
/// # use cassandra_shift_cli::config::{resolve, ConfigFragment};
/// let mut cli = ConfigFragment::default();
/// cli.number_of_clients = Some(3);
///
/// let config = resolve(
///     ConfigFragment::defaults(),
///     ConfigFragment::default(),
///     ConfigFragment::default(),
///     cli,
/// )
/// .unwrap();
/// assert_eq!(config.client_count, 3);
/// ```
pub fn resolve(
    defaults: ConfigFragment,
    file: ConfigFragment,
    env: ConfigFragment,
    cli: ConfigFragment,
) -> Result<EffectiveConfig> {
    let merged = [file, env, cli]
        .into_iter()
        .fold(defaults, ConfigFragment::merge);

    let client_count = coerce_client_count(merged.number_of_clients)?;
    let tls = secrets::load_tls(&merged.cluster.tls)?;

    Ok(EffectiveConfig {
        client_count,
        cluster: ClusterConfig {
            contact_points: merged.cluster.contact_points.unwrap_or_default(),
            local_data_center: merged.cluster.local_data_center,
            keyspace: merged.cluster.keyspace,
        },
        tls,
        credentials: Credentials {
            username: merged.cluster.auth.username,
            password: merged.cluster.auth.password,
        },
        ensure_keyspace: merged.ensure_keyspace.unwrap_or(false),
        migrations_dir: merged
            .migrations_directory
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIRECTORY)),
        engine_program: merged
            .engine_program
            .unwrap_or_else(|| DEFAULT_ENGINE_PROGRAM.to_string()),
        timeout: merged.timeout_secs.map(Duration::from_secs),
    })
}

fn coerce_client_count(requested: Option<i64>) -> Result<usize> {
    match requested {
        None => Ok(DEFAULT_NUMBER_OF_CLIENTS),
        Some(n) if n < 1 => {
            tracing::warn!(
                "Number of clients must be at least 1 (got {}), using {}",
                n,
                DEFAULT_NUMBER_OF_CLIENTS
            );
            Ok(DEFAULT_NUMBER_OF_CLIENTS)
        }
        Some(n) => match usize::try_from(n) {
            Ok(count) if count <= MAX_NUMBER_OF_CLIENTS => Ok(count),
            _ => Err(ShiftError::config(
                "number of clients",
                format!("{} exceeds the maximum of {}", n, MAX_NUMBER_OF_CLIENTS),
            )),
        },
    }
}
