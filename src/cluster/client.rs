// ABOUTME: A single cluster client handle built from shared connection settings
// ABOUTME: Validates contact points, keyspace name, and TLS material at construction

use super::auth::PlainTextAuthProvider;
use super::ConnectionConfig;
use crate::config::TlsMaterial;
use anyhow::{bail, Context, Result};
use native_tls::{Certificate, Identity, TlsConnector};
use std::fmt;
use std::str::FromStr;

/// Native protocol port used when a contact point does not name one
pub const DEFAULT_PORT: u16 = 9042;

const MAX_KEYSPACE_LENGTH: usize = 48;

/// A `host[:port]` entry from the contact point list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactPoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for ContactPoint {
    type Err = anyhow::Error;

    /// Accepts `host`, `host:port`, `[v6addr]`, `[v6addr]:port`, or a bare
    /// IPv6 address (which then uses [`DEFAULT_PORT`]).
    fn from_str(raw: &str) -> Result<Self> {
        let s = raw.trim();
        if s.is_empty() {
            bail!("Contact point cannot be empty");
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .with_context(|| format!("Contact point '{}' has an unterminated '['", s))?;
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => {
                    let port = tail.strip_prefix(':').with_context(|| {
                        format!("Contact point '{}' has unexpected text after ']'", s)
                    })?;
                    parse_port(port, s)?
                }
            };
            (host, port)
        } else if s.matches(':').count() > 1 {
            (s, DEFAULT_PORT)
        } else {
            match s.split_once(':') {
                Some((host, port)) => (host, parse_port(port, s)?),
                None => (s, DEFAULT_PORT),
            }
        };

        if host.is_empty() {
            bail!("Contact point '{}' is missing a host", s);
        }
        if host.chars().any(char::is_whitespace) {
            bail!("Contact point '{}' contains whitespace", s);
        }

        Ok(ContactPoint {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ContactPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(port: &str, contact_point: &str) -> Result<u16> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => bail!(
            "Contact point '{}' has an invalid port '{}'",
            contact_point,
            port
        ),
        Ok(port) => Ok(port),
    }
}

/// Validate a keyspace name: 1-48 characters, letters, digits, and underscores.
///
/// # Examples
///
/// ```
/// # use cassandra_shift_cli::cluster::client::validate_keyspace_name;
/// assert!(validate_keyspace_name("app_prod").is_ok());
/// assert!(validate_keyspace_name("app-prod").is_err());
/// assert!(validate_keyspace_name("ks\"; DROP KEYSPACE system; --").is_err());
/// ```
pub fn validate_keyspace_name(keyspace: &str) -> Result<()> {
    if keyspace.is_empty() {
        bail!("Keyspace name cannot be empty");
    }

    if keyspace.len() > MAX_KEYSPACE_LENGTH {
        bail!(
            "Keyspace name exceeds maximum length of {} characters (got {})",
            MAX_KEYSPACE_LENGTH,
            keyspace.len()
        );
    }

    if let Some(c) = keyspace
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_')
    {
        bail!(
            "Keyspace name '{}' contains invalid character '{}'. \
             Only letters, digits, and underscores are allowed",
            keyspace.escape_debug(),
            c.escape_debug()
        );
    }

    Ok(())
}

/// A client handle for the cluster.
///
/// Construction validates everything that can be checked offline and builds
/// the handle's own TLS connector; sessions are opened lazily by the engine
/// that drives the client.
#[derive(Clone)]
pub struct ClusterClient {
    contact_points: Vec<ContactPoint>,
    local_data_center: String,
    keyspace: Option<String>,
    tls: Option<TlsMaterial>,
    tls_connector: Option<TlsConnector>,
    auth_provider: Option<PlainTextAuthProvider>,
}

impl ClusterClient {
    /// Build a client handle from connection settings.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - No contact point is configured, or one is malformed
    /// - No local data center is configured
    /// - The keyspace name is invalid
    /// - The CA is not a PEM certificate, or the certificate/key pair is
    ///   incomplete or unreadable
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        if config.contact_points.is_empty() {
            bail!("At least one contact point is required (use --contact-points or CONTACT_POINTS)");
        }

        let contact_points = config
            .contact_points
            .iter()
            .map(|raw| raw.parse::<ContactPoint>())
            .collect::<Result<Vec<_>>>()?;

        let local_data_center = match config.local_data_center.as_deref().map(str::trim) {
            Some(dc) if !dc.is_empty() => dc.to_string(),
            _ => bail!(
                "A local data center is required when contact points are set \
                 (use --local-data-center or LOCAL_DATA_CENTER)"
            ),
        };

        if let Some(keyspace) = config.keyspace.as_deref() {
            validate_keyspace_name(keyspace)?;
        }

        let tls_connector = config
            .tls
            .as_ref()
            .map(build_tls_connector)
            .transpose()?;

        Ok(Self {
            contact_points,
            local_data_center,
            keyspace: config.keyspace.clone(),
            tls: config.tls.clone(),
            tls_connector,
            auth_provider: config.auth_provider.clone(),
        })
    }

    pub fn contact_points(&self) -> &[ContactPoint] {
        &self.contact_points
    }

    pub fn local_data_center(&self) -> &str {
        &self.local_data_center
    }

    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    pub fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }

    pub fn tls_connector(&self) -> Option<&TlsConnector> {
        self.tls_connector.as_ref()
    }

    pub fn auth_provider(&self) -> Option<&PlainTextAuthProvider> {
        self.auth_provider.as_ref()
    }
}

impl fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterClient")
            .field("contact_points", &self.contact_points)
            .field("local_data_center", &self.local_data_center)
            .field("keyspace", &self.keyspace)
            .field("tls", &self.tls_connector.is_some())
            .field("auth_provider", &self.auth_provider)
            .finish()
    }
}

fn build_tls_connector(material: &TlsMaterial) -> Result<TlsConnector> {
    let mut builder = TlsConnector::builder();

    if let Some(ca) = &material.ca {
        let certificate = Certificate::from_pem(ca)
            .context("Invalid SSL CA: expected a PEM-encoded certificate")?;
        builder.add_root_certificate(certificate);
    }

    match (&material.cert, &material.key) {
        (Some(cert), Some(key)) => {
            let identity = Identity::from_pkcs8(cert, key).context(
                "Invalid SSL certificate/key pair: expected a PEM certificate and a PKCS#8 PEM key",
            )?;
            builder.identity(identity);
        }
        (None, None) => {}
        (Some(_), None) => bail!("SSL certificate was provided without an SSL key"),
        (None, Some(_)) => bail!("SSL key was provided without an SSL certificate"),
    }

    builder.build().context("Failed to build TLS connector")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(contact_points: &[&str], dc: Option<&str>) -> ConnectionConfig {
        ConnectionConfig {
            contact_points: contact_points.iter().map(|s| s.to_string()).collect(),
            local_data_center: dc.map(str::to_string),
            ..ConnectionConfig::default()
        }
    }

    #[test]
    fn parse_contact_point_forms() {
        let cases = [
            ("10.0.0.1", "10.0.0.1", DEFAULT_PORT),
            ("cassandra.internal:9043", "cassandra.internal", 9043),
            ("[::1]:9142", "::1", 9142),
            ("[fe80::1]", "fe80::1", DEFAULT_PORT),
            ("fe80::1", "fe80::1", DEFAULT_PORT),
            ("  node1  ", "node1", DEFAULT_PORT),
        ];

        for (raw, host, port) in cases {
            let parsed: ContactPoint = raw.parse().unwrap();
            assert_eq!(parsed.host, host, "host for {}", raw);
            assert_eq!(parsed.port, port, "port for {}", raw);
        }
    }

    #[test]
    fn reject_malformed_contact_points() {
        for raw in ["", ":9042", "host:", "host:notaport", "host:70000", "host:0", "[::1", "[::1]x", "bad host"] {
            assert!(raw.parse::<ContactPoint>().is_err(), "should reject '{}'", raw);
        }
    }

    #[test]
    fn contact_point_display_brackets_ipv6() {
        let v4: ContactPoint = "10.0.0.1".parse().unwrap();
        let v6: ContactPoint = "[::1]:9043".parse().unwrap();
        assert_eq!(v4.to_string(), "10.0.0.1:9042");
        assert_eq!(v6.to_string(), "[::1]:9043");
    }

    #[test]
    fn keyspace_validation() {
        assert!(validate_keyspace_name("app").is_ok());
        assert!(validate_keyspace_name("App_2024").is_ok());
        assert!(validate_keyspace_name("").is_err());
        assert!(validate_keyspace_name("my-keyspace").is_err());
        assert!(validate_keyspace_name(&"k".repeat(49)).is_err());
    }

    #[test]
    fn build_client_without_tls() {
        let mut config = connection(&["127.0.0.1", "127.0.0.2:9043"], Some("dc1"));
        config.keyspace = Some("app".to_string());
        config.auth_provider = Some(PlainTextAuthProvider::new("cassandra", "cassandra"));

        let client = ClusterClient::new(&config).unwrap();
        assert_eq!(client.contact_points().len(), 2);
        assert_eq!(client.contact_points()[1].port, 9043);
        assert_eq!(client.local_data_center(), "dc1");
        assert_eq!(client.keyspace(), Some("app"));
        assert!(client.tls_connector().is_none());
        assert_eq!(client.auth_provider().unwrap().username(), "cassandra");
    }

    #[test]
    fn client_requires_contact_points() {
        let err = ClusterClient::new(&connection(&[], Some("dc1"))).unwrap_err();
        assert!(err.to_string().contains("contact point"));
    }

    #[test]
    fn client_requires_local_data_center() {
        assert!(ClusterClient::new(&connection(&["127.0.0.1"], None)).is_err());
        assert!(ClusterClient::new(&connection(&["127.0.0.1"], Some("  "))).is_err());
    }

    #[test]
    fn client_rejects_invalid_ca() {
        let mut config = connection(&["127.0.0.1"], Some("dc1"));
        config.tls = Some(TlsMaterial {
            ca: Some(b"not a certificate".to_vec()),
            ..TlsMaterial::default()
        });

        let err = ClusterClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("SSL CA"));
    }

    #[test]
    fn client_rejects_cert_without_key() {
        let mut config = connection(&["127.0.0.1"], Some("dc1"));
        config.tls = Some(TlsMaterial {
            cert: Some(b"cert".to_vec()),
            ..TlsMaterial::default()
        });

        let err = ClusterClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("without an SSL key"));
    }
}
