// ABOUTME: Materializes TLS certificate and key files into in-memory bytes
// ABOUTME: Runs after merging so resolved configs never carry secret paths

use super::TlsFragment;
use crate::error::{Result, ShiftError};
use std::fs;
use std::path::Path;

/// TLS material read from disk
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca: Option<Vec<u8>>,
    pub cert: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let describe = |bytes: &Option<Vec<u8>>| bytes.as_ref().map(|b| format!("<{} bytes>", b.len()));
        f.debug_struct("TlsMaterial")
            .field("ca", &describe(&self.ca))
            .field("cert", &describe(&self.cert))
            .field("key", &describe(&self.key))
            .finish()
    }
}

/// Read every configured TLS file.
///
/// Returns `Ok(None)` when no TLS path is configured at all. Fields whose
/// path is absent stay absent; that is not an error.
///
/// # Errors
///
/// Returns [`ShiftError::SecretRead`] naming the field and path of the first
/// file that cannot be read.
pub fn load_tls(paths: &TlsFragment) -> Result<Option<TlsMaterial>> {
    if paths.ca.is_none() && paths.cert.is_none() && paths.key.is_none() {
        return Ok(None);
    }

    let material = TlsMaterial {
        ca: read_optional("ssl CA", paths.ca.as_deref())?,
        cert: read_optional("ssl certificate", paths.cert.as_deref())?,
        key: read_optional("ssl key", paths.key.as_deref())?,
    };

    Ok(Some(material))
}

fn read_optional(field: &'static str, path: Option<&Path>) -> Result<Option<Vec<u8>>> {
    let Some(path) = path else {
        return Ok(None);
    };

    tracing::debug!("Reading {} from {}", field, path.display());
    fs::read(path)
        .map(Some)
        .map_err(|source| ShiftError::SecretRead {
            field,
            path: path.to_path_buf(),
            source,
        })
}
