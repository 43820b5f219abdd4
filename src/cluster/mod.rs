// ABOUTME: Cluster client bootstrap: authentication, client handles, and the client pool
// ABOUTME: Turns resolved connection settings into handles the migration engine can use

pub mod auth;
pub mod client;
pub mod pool;

use crate::config::TlsMaterial;
use auth::PlainTextAuthProvider;

pub use client::{ClusterClient, ContactPoint, DEFAULT_PORT};
pub use pool::ClientPool;

/// Connection parameters shared by every client in a pool
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    pub contact_points: Vec<String>,
    pub local_data_center: Option<String>,
    pub keyspace: Option<String>,
    pub tls: Option<TlsMaterial>,
    pub auth_provider: Option<PlainTextAuthProvider>,
}
