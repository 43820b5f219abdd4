// ABOUTME: Fixed-size pool of independently constructed cluster clients
// ABOUTME: Construction is all-or-nothing; a single failure abandons the whole pool

use super::{ClusterClient, ConnectionConfig};
use crate::config::MAX_NUMBER_OF_CLIENTS;
use crate::error::{Result, ShiftError};

/// Ordered client handles sharing one set of connection parameters.
///
/// The clients spread load on the client side; they are not shards. A pool
/// is handed to the engine once and dropped when the process exits.
#[derive(Debug, Clone)]
pub struct ClientPool {
    clients: Vec<ClusterClient>,
}

impl ClientPool {
    /// Build `count` clients from `config`.
    ///
    /// Clients are constructed sequentially. The first failure aborts
    /// construction and no partially filled pool is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftError::ClientConstruction`] carrying the index of the
    /// client that failed and the reason.
    pub fn create(config: &ConnectionConfig, count: usize) -> Result<Self> {
        let mut clients = Vec::with_capacity(count.min(MAX_NUMBER_OF_CLIENTS));

        for index in 0..count {
            let client =
                ClusterClient::new(config).map_err(|e| ShiftError::ClientConstruction {
                    index,
                    reason: format!("{:#}", e),
                })?;
            clients.push(client);
        }

        tracing::debug!(
            "Configured {} Cassandra client(s) for {}",
            clients.len(),
            config.contact_points.join(", ")
        );

        Ok(Self { clients })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clients(&self) -> &[ClusterClient] {
        &self.clients
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClusterClient> {
        self.clients.iter()
    }
}

impl<'a> IntoIterator for &'a ClientPool {
    type Item = &'a ClusterClient;
    type IntoIter = std::slice::Iter<'a, ClusterClient>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
