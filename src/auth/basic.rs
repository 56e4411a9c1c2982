use super::{AuthOptions, AuthProvider, AuthRequest, Credential, Principal};
use crate::config::BasicAuthConfig;
use anyhow::{anyhow, Result};
use base64::Engine as _;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct UserEntry {
    password: String,
    roles: Vec<String>,
}

/// Basic authentication against a static user table.
///
/// Every rejection reads `bad credentials`. The message is deliberately
/// identical for an unknown login and a wrong password so the response does
/// not reveal which logins exist.
///
/// ```
/// use switchboard::auth::BasicAuthProvider;
///
/// let provider = BasicAuthProvider::new()
///     .user("henry781", "hyz-Dvr-4et-ryK", ["admin"]);
/// ```
pub struct BasicAuthProvider {
    name: String,
    users: HashMap<String, UserEntry>,
}

impl BasicAuthProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "basic".to_string(),
            users: HashMap::new(),
        }
    }

    /// Override the registry name, default `basic`.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add one user to the table. Re-adding a login replaces it.
    #[must_use]
    pub fn user<I, S>(mut self, login: impl Into<String>, password: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.insert(
            login.into(),
            UserEntry {
                password: password.into(),
                roles: roles.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Build the provider from its configuration file section.
    #[must_use]
    pub fn from_config(config: &BasicAuthConfig) -> Self {
        let mut provider = Self::new();
        for (login, user) in &config.users {
            provider = provider.user(login, &user.password, user.roles.clone());
        }
        provider
    }

    fn reject() -> anyhow::Error {
        anyhow!("bad credentials")
    }
}

impl Default for BasicAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for BasicAuthProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheme(&self) -> &str {
        "basic"
    }

    fn authenticate(
        &self,
        _request: &AuthRequest<'_>,
        credential: Option<&Credential>,
        _options: &AuthOptions,
    ) -> Result<Principal> {
        let credential = credential.ok_or_else(|| anyhow!("Authorization header is missing"))?;
        if !credential.has_scheme("basic") {
            return Err(anyhow!("Authorization scheme should be 'basic'"));
        }
        let encoded = credential.token().ok_or_else(Self::reject)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| Self::reject())?;
        let decoded = String::from_utf8(decoded).map_err(|_| Self::reject())?;
        let (login, password) = decoded.split_once(':').ok_or_else(Self::reject)?;

        let entry = self.users.get(login).ok_or_else(|| {
            debug!(login, "basic auth rejected: unknown login");
            Self::reject()
        })?;
        if entry.password != password {
            debug!(login, "basic auth rejected: password mismatch");
            return Err(Self::reject());
        }

        Ok(Principal::new(login)
            .roles(entry.roles.clone())
            .token(credential.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::parse_authorization;
    use crate::dispatcher::HeaderVec;

    fn provider() -> BasicAuthProvider {
        BasicAuthProvider::new().user("user1", "hyz-Dvr-4et-ryK", ["admin", "reader"])
    }

    fn authenticate(credential: Option<&Credential>) -> Result<Principal> {
        let headers = HeaderVec::new();
        let request = AuthRequest::new(&headers);
        provider().authenticate(&request, credential, &AuthOptions::default())
    }

    fn basic_credential(raw: &str) -> Credential {
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        parse_authorization(&format!("Basic {encoded}")).unwrap()
    }

    #[test]
    fn accepts_known_user() {
        let cred = basic_credential("user1:hyz-Dvr-4et-ryK");
        let principal = authenticate(Some(&cred)).unwrap();
        assert_eq!(principal.login_name(), "user1");
        assert!(principal.has_role("admin"));
        assert!(principal.credential().is_some());
    }

    #[test]
    fn wrong_password_reads_bad_credentials() {
        let cred = basic_credential("user1:wrongpassword");
        let err = authenticate(Some(&cred)).unwrap_err();
        assert_eq!(err.to_string(), "bad credentials");
    }

    #[test]
    fn unknown_login_reads_bad_credentials() {
        let cred = basic_credential("nobody:whatever");
        let err = authenticate(Some(&cred)).unwrap_err();
        assert_eq!(err.to_string(), "bad credentials");
    }

    #[test]
    fn scheme_mismatch_is_rejected_before_lookup() {
        let cred = parse_authorization("Bearer sometoken").unwrap();
        let err = authenticate(Some(&cred)).unwrap_err();
        assert_eq!(err.to_string(), "Authorization scheme should be 'basic'");
    }

    #[test]
    fn missing_credential_is_rejected() {
        let err = authenticate(None).unwrap_err();
        assert_eq!(err.to_string(), "Authorization header is missing");
    }

    #[test]
    fn token_without_colon_reads_bad_credentials() {
        // "aGVsbG8" decodes to "hello", no login:password separator
        let cred = parse_authorization("Basic aGVsbG8").unwrap();
        let err = authenticate(Some(&cred)).unwrap_err();
        assert_eq!(err.to_string(), "bad credentials");
    }
}
