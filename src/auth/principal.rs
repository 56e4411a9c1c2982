use super::Credential;
use base64::Engine as _;
use std::collections::HashMap;

/// Authenticated caller identity.
///
/// Built by a provider on successful authentication and attached to the
/// request for the rest of its lifecycle. Handlers receive it through a
/// principal binding; the engine itself only consults [`Principal::has_any_role`]
/// for role constraints.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    login: String,
    email: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    roles: Vec<String>,
    token: Option<Credential>,
    /// Extra headers a handler should forward on calls made on behalf of
    /// this caller.
    client_headers: HashMap<String, String>,
}

impl Principal {
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            ..Self::default()
        }
    }

    /// Principal for a login/password pair, carrying the equivalent Basic
    /// credential so it can be replayed downstream.
    #[must_use]
    pub fn with_password(login: impl Into<String>, password: &str) -> Self {
        let login = login.into();
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{login}:{password}"));
        let mut principal = Self::new(login);
        principal.token = Some(Credential::basic_token(encoded));
        principal
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn firstname(mut self, firstname: impl Into<String>) -> Self {
        self.firstname = Some(firstname.into());
        self
    }

    #[must_use]
    pub fn lastname(mut self, lastname: impl Into<String>) -> Self {
        self.lastname = Some(lastname.into());
        self
    }

    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn token(mut self, token: Credential) -> Self {
        self.token = Some(token);
        self
    }

    #[must_use]
    pub fn client_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.client_headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn login_name(&self) -> &str {
        &self.login
    }

    #[must_use]
    pub fn email_addr(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.firstname.as_deref()
    }

    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.lastname.as_deref()
    }

    #[must_use]
    pub fn role_names(&self) -> &[String] {
        &self.roles
    }

    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn forwarded_headers(&self) -> &HashMap<String, String> {
        &self.client_headers
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// True when the principal holds at least one of `roles`.
    #[must_use]
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn developer() -> Principal {
        Principal::new("15aa15")
            .email("test@a.fr")
            .firstname("Bobby")
            .lastname("Bob")
            .roles(["Developer", "ProductOwner"])
    }

    #[test]
    fn has_role_is_exact_match() {
        let principal = developer();
        assert!(principal.has_role("Developer"));
        assert!(!principal.has_role("admin"));
        assert!(!principal.has_role("developer"));
    }

    #[test]
    fn has_any_role_needs_one_of_many() {
        let principal = developer();
        assert!(!principal.has_any_role(&["admin", "admin-form"]));
        assert!(principal.has_any_role(&["admin", "Developer"]));
        assert!(!principal.has_any_role::<&str>(&[]));
    }

    #[test]
    fn with_password_builds_basic_credential() {
        let principal = Principal::with_password("myLogin", "myPassword");
        let token = principal.credential().unwrap();
        assert!(token.has_scheme("basic"));
        assert_eq!(token.token(), Some("bXlMb2dpbjpteVBhc3N3b3Jk"));
    }
}
