//! # Authentication
//!
//! Multi-provider authentication for protected endpoints.
//!
//! ## Overview
//!
//! An endpoint declares its requirement as an [`AuthSpec`]: one provider
//! name, an ordered list of names, or names with per-provider role
//! constraints. At mount time the requirement is resolved against the
//! [`AuthProviders`] registry into an [`EndpointAuth`] chain; at request
//! time the chain is run by the dispatcher before anything else.
//!
//! ## Resolution flow
//!
//! 1. No declared requirement → PASSTHROUGH, no provider runs.
//! 2. The `Authorization` header is parsed once into a [`Credential`]
//!    (RFC 7235). An absent or unparsable header is not immediately fatal;
//!    each provider decides whether it can work without one.
//! 3. Providers run in declaration order. The first success wins; each
//!    failure is recorded under the provider's name.
//! 4. No success → 401 with the whole failure map as the `reason`.
//! 5. Success but a required role is missing → 401 with a role-mismatch
//!    reason, hard halt.
//! 6. Otherwise the [`Principal`] is attached to the request.
//!
//! ## Providers
//!
//! Two providers ship with the engine:
//!
//! - [`BasicAuthProvider`] - base64 `login:password` against a static user
//!   table; every rejection reads `bad credentials`.
//! - [`JwtAuthProvider`] - bearer tokens verified against an RSA public key
//!   PEM, an HMAC secret, or a remote JWKS document (TTL-cached, refresh
//!   debounced, HTTPS enforced except for localhost). Keycloak-style claims
//!   map onto the principal.
//!
//! Custom providers implement [`AuthProvider`]:
//!
//! ```
//! use switchboard::auth::{AuthOptions, AuthProvider, AuthRequest, Credential, Principal};
//!
//! struct ApiKeyProvider { key: String }
//!
//! impl AuthProvider for ApiKeyProvider {
//!     fn name(&self) -> &str { "api-key" }
//!     fn scheme(&self) -> &str { "apikey" }
//!
//!     fn authenticate(
//!         &self,
//!         request: &AuthRequest<'_>,
//!         _credential: Option<&Credential>,
//!         _options: &AuthOptions,
//!     ) -> anyhow::Result<Principal> {
//!         match request.header("x-api-key") {
//!             Some(key) if key == self.key => Ok(Principal::new("api-client")),
//!             _ => Err(anyhow::anyhow!("bad api key")),
//!         }
//!     }
//! }
//! ```
//!
//! ## Declaring requirements
//!
//! ```
//! use switchboard::auth::{AuthOptions, AuthSpec};
//!
//! // any of two providers, in order
//! let either = AuthSpec::providers(["jwt", "basic"]);
//!
//! // jwt only, and the caller needs the admin role
//! let admin_only = AuthSpec::constrained([("jwt", AuthOptions::role("admin"))]);
//! ```

use crate::dispatcher::HeaderVec;
use crate::error::MountError;
use std::sync::Arc;

mod basic;
mod credential;
mod jwt;
mod principal;
mod requirement;
mod resolver;

pub use basic::BasicAuthProvider;
pub use credential::{parse_authorization, Credential};
pub use jwt::{JwtAuthProvider, JwtAuthProviderBuilder};
pub use principal::Principal;
pub use requirement::{AuthOptions, AuthSpec};
pub use resolver::{authenticate, AuthOutcome, EndpointAuth};

/// Read-only request view handed to providers.
///
/// Borrows the buffered header list; providers that need more than the
/// parsed credential (extra headers, api keys) read them here.
pub struct AuthRequest<'a> {
    headers: &'a HeaderVec,
}

impl<'a> AuthRequest<'a> {
    #[must_use]
    pub fn new(headers: &'a HeaderVec) -> Self {
        Self { headers }
    }

    /// Header lookup, ASCII case-insensitive.
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the `Authorization` header, if present and well formed.
    #[must_use]
    pub fn authorization(&self) -> Option<Credential> {
        self.header("authorization").and_then(parse_authorization)
    }
}

/// Trait implemented by every authentication provider.
pub trait AuthProvider: Send + Sync {
    /// Registry name endpoints refer to in their [`AuthSpec`].
    fn name(&self) -> &str;

    /// RFC 7235 scheme this provider consumes, lowercase.
    ///
    /// Providers must reject credentials carrying any other scheme before
    /// doing cryptographic or lookup work.
    fn scheme(&self) -> &str;

    /// Validate the credential and produce the caller's principal.
    ///
    /// The error message becomes this provider's entry in the 401 failure
    /// map, so it should say why the credential was rejected without
    /// leaking secrets.
    fn authenticate(
        &self,
        request: &AuthRequest<'_>,
        credential: Option<&Credential>,
        options: &AuthOptions,
    ) -> anyhow::Result<Principal>;
}

/// Registry of named providers, shared by all endpoints of a server.
#[derive(Default)]
pub struct AuthProviders {
    providers: Vec<Arc<dyn AuthProvider>>,
}

impl AuthProviders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its [`AuthProvider::name`].
    pub fn register(&mut self, provider: Arc<dyn AuthProvider>) -> Result<(), MountError> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(MountError::DuplicateAuthProvider(
                provider.name().to_string(),
            ));
        }
        self.providers.push(provider);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AuthProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolve a declared requirement into a runnable provider chain.
    ///
    /// Fails when the spec names a provider nobody registered, which makes
    /// a typo a mount-time error instead of a permanent 401.
    pub fn resolve(&self, spec: &AuthSpec) -> Result<EndpointAuth, MountError> {
        let mut entries = Vec::with_capacity(spec.entries().len());
        for (name, options) in spec.entries() {
            let provider = self
                .get(name)
                .ok_or_else(|| MountError::UnknownAuthProvider(name.clone()))?;
            entries.push((name.clone(), Arc::clone(provider), options.clone()));
        }
        Ok(EndpointAuth::new(entries))
    }
}
