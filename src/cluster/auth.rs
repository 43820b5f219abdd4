// ABOUTME: Plaintext credential provider construction for cluster authentication
// ABOUTME: Only builds a provider when both username and password are configured

/// Username and password as resolved from configuration; either may be missing
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// SASL PLAIN style authenticator handed to every client in the pool
#[derive(Clone, PartialEq, Eq)]
pub struct PlainTextAuthProvider {
    username: String,
    password: String,
}

impl PlainTextAuthProvider {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for PlainTextAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainTextAuthProvider")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Build an auth provider from resolved credentials.
///
/// Presence is judged on the resolved values: both username and password
/// must be set and non-empty. Anything less yields `None` and the cluster is
/// contacted without authentication.
pub fn build(credentials: &Credentials) -> Option<PlainTextAuthProvider> {
    let username = credentials.username.as_deref().filter(|u| !u.is_empty());
    let password = credentials.password.as_deref().filter(|p| !p.is_empty());

    match (username, password) {
        (Some(username), Some(password)) => {
            tracing::debug!("Using plaintext authentication as '{}'", username);
            Some(PlainTextAuthProvider::new(username, password))
        }
        (None, None) => None,
        (Some(_), None) => {
            tracing::warn!("Username is set but password is missing; connecting without authentication");
            None
        }
        (None, Some(_)) => {
            tracing::warn!("Password is set but username is missing; connecting without authentication");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(username: Option<&str>, password: Option<&str>) -> Credentials {
        Credentials {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn builds_provider_when_both_present() {
        let provider = build(&creds(Some("cassandra"), Some("secret"))).unwrap();
        assert_eq!(provider.username(), "cassandra");
        assert_eq!(provider.password(), "secret");
    }

    #[test]
    fn no_provider_when_either_is_missing_or_empty() {
        assert!(build(&creds(None, None)).is_none());
        assert!(build(&creds(Some("cassandra"), None)).is_none());
        assert!(build(&creds(None, Some("secret"))).is_none());
        assert!(build(&creds(Some(""), Some("secret"))).is_none());
        assert!(build(&creds(Some("cassandra"), Some(""))).is_none());
    }

    #[test]
    fn debug_output_redacts_password() {
        let provider = PlainTextAuthProvider::new("cassandra", "secret");
        assert!(!format!("{:?}", provider).contains("secret"));
        assert!(!format!("{:?}", creds(Some("u"), Some("secret"))).contains("secret"));
    }
}
