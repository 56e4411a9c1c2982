/// Constraint options attached to one provider entry of an [`AuthSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    roles: Vec<String>,
}

impl AuthOptions {
    /// Require a single role.
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            roles: vec![role.into()],
        }
    }

    /// Require any one of the given roles.
    #[must_use]
    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn required_roles(&self) -> &[String] {
        &self.roles
    }

    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Authentication requirement declared on an endpoint.
///
/// Normalized from the three declaration surfaces into one ordered list of
/// `(provider name, options)` entries. Order matters: the resolver tries
/// providers in exactly this order and the first success wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSpec {
    entries: Vec<(String, AuthOptions)>,
}

impl AuthSpec {
    /// Single unconstrained provider.
    #[must_use]
    pub fn provider(name: impl Into<String>) -> Self {
        Self {
            entries: vec![(name.into(), AuthOptions::default())],
        }
    }

    /// Ordered list of unconstrained providers.
    #[must_use]
    pub fn providers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: names
                .into_iter()
                .map(|name| (name.into(), AuthOptions::default()))
                .collect(),
        }
    }

    /// Ordered providers with per-provider constraint options.
    #[must_use]
    pub fn constrained<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, AuthOptions)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, options)| (name.into(), options))
                .collect(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, AuthOptions)] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
