use super::{AuthOptions, AuthProvider, AuthRequest, Principal};
use crate::error::AuthFailure;
use std::sync::Arc;
use tracing::debug;

/// Terminal state of the per-request authentication pass.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The endpoint declares no auth requirement; no provider was invoked
    /// and no principal is attached.
    Passthrough,
    Success(Principal),
    Unauthorized(AuthFailure),
}

/// The resolved provider chain for one endpoint.
///
/// Built once at mount time from the endpoint's [`AuthSpec`](super::AuthSpec)
/// by [`AuthProviders::resolve`](super::AuthProviders::resolve); provider
/// names have already been checked against the registry, so a request can
/// never hit an unregistered provider.
pub struct EndpointAuth {
    providers: Vec<(String, Arc<dyn AuthProvider>, AuthOptions)>,
}

impl EndpointAuth {
    pub(super) fn new(providers: Vec<(String, Arc<dyn AuthProvider>, AuthOptions)>) -> Self {
        Self { providers }
    }

    /// Try every provider in declaration order; first success wins.
    ///
    /// A provider failure is recorded under its name and the next provider
    /// gets its turn. A success followed by a failed role constraint halts
    /// hard with a role-mismatch reason, without consulting the remaining
    /// providers.
    pub fn authenticate(&self, request: &AuthRequest<'_>) -> AuthOutcome {
        let credential = request.authorization();
        let mut failures = Vec::new();
        for (name, provider, options) in &self.providers {
            match provider.authenticate(request, credential.as_ref(), options) {
                Ok(principal) => {
                    let required = options.required_roles();
                    if !required.is_empty() && !principal.has_any_role(required) {
                        debug!(
                            provider = %name,
                            login = %principal.login_name(),
                            "authentication rejected, principal lacks required role"
                        );
                        return AuthOutcome::Unauthorized(AuthFailure::RoleDenied {
                            provider: name.clone(),
                            login: principal.login_name().to_string(),
                            required: required.to_vec(),
                        });
                    }
                    debug!(provider = %name, login = %principal.login_name(), "authenticated");
                    return AuthOutcome::Success(principal);
                }
                Err(err) => {
                    debug!(provider = %name, error = %err, "provider rejected credential");
                    failures.push((name.clone(), err.to_string()));
                }
            }
        }
        AuthOutcome::Unauthorized(AuthFailure::Rejected(failures))
    }
}

/// Run the resolver for an endpoint that may not declare auth at all.
pub fn authenticate(auth: Option<&EndpointAuth>, request: &AuthRequest<'_>) -> AuthOutcome {
    match auth {
        None => AuthOutcome::Passthrough,
        Some(auth) => auth.authenticate(request),
    }
}
