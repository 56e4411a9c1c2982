use super::{AuthOptions, AuthProvider, AuthRequest, Credential, Principal};
use crate::config::JwtAuthConfig;
use anyhow::{anyhow, bail, Context as _, Result};
use base64::Engine as _;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use lru::LruCache;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;

const RSA_ALGORITHMS: &[Algorithm] = &[Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];
const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
const JWKS_ALGORITHMS: &[Algorithm] = &[
    Algorithm::HS256,
    Algorithm::HS384,
    Algorithm::HS512,
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
];

const DEFAULT_LEEWAY_SECS: u64 = 30;
const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(300);
const DEFAULT_CLAIMS_CACHE_SIZE: usize = 1000;

#[derive(Debug)]
enum KeyMaterial {
    /// Fixed key: RSA public key from PEM or an HMAC secret.
    Fixed {
        key: DecodingKey,
        algorithms: &'static [Algorithm],
    },
    Jwks(JwksKeys),
}

/// Bearer JWT provider mapping Keycloak-style claims onto a [`Principal`].
///
/// Verifies the token against one of three key sources, in builder
/// precedence order:
/// 1. a remote JWKS document fetched by URI, cached with a TTL,
/// 2. an RSA public key PEM,
/// 3. an HMAC shared secret.
///
/// Successful validations land in a per-token LRU claims cache so repeated
/// calls with the same token skip signature work until the token expires or
/// its signing key leaves the JWKS.
///
/// ```no_run
/// use switchboard::auth::JwtAuthProvider;
///
/// let provider = JwtAuthProvider::builder("inventory-api")
///     .jwks_uri("https://keycloak.example.com/realms/main/protocol/openid-connect/certs")
///     .issuer("https://keycloak.example.com/realms/main")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct JwtAuthProvider {
    name: String,
    application: String,
    keys: KeyMaterial,
    iss: Option<String>,
    aud: Option<String>,
    leeway_secs: u64,
    // token|kid -> (exp with leeway, validated claims)
    claims_cache: RwLock<LruCache<Arc<str>, (i64, Value)>>,
}

impl JwtAuthProvider {
    /// Start configuring a provider. `application` selects the
    /// `resource_access.<application>.roles` claim to read roles from.
    #[must_use]
    pub fn builder(application: impl Into<String>) -> JwtAuthProviderBuilder {
        JwtAuthProviderBuilder {
            name: "jwt".to_string(),
            application: application.into(),
            certificate: None,
            secret: None,
            jwks_uri: None,
            issuer: None,
            audience: None,
            leeway_secs: DEFAULT_LEEWAY_SECS,
            jwks_ttl: DEFAULT_JWKS_TTL,
            claims_cache_size: DEFAULT_CLAIMS_CACHE_SIZE,
        }
    }

    /// Build the provider from its configuration file section.
    pub fn from_config(config: &JwtAuthConfig) -> Result<Self> {
        let mut builder = Self::builder(&config.application);
        if let Some(pem) = &config.certificate {
            builder = builder.certificate(pem);
        }
        if let Some(secret) = &config.secret {
            builder = builder.secret(secret);
        }
        if let Some(uri) = &config.jwks_uri {
            builder = builder.jwks_uri(uri);
        }
        if let Some(iss) = &config.issuer {
            builder = builder.issuer(iss);
        }
        if let Some(aud) = &config.audience {
            builder = builder.audience(aud);
        }
        builder.build()
    }

    fn cached_claims(&self, cache_key: &Arc<str>, kid: &str) -> Option<Value> {
        let cached = {
            let mut guard = self.claims_cache.write().ok()?;
            guard.get(cache_key).cloned()
        };
        let (exp_with_leeway, claims) = cached?;
        // JWKS keys rotate; a cached token whose key is gone must re-validate.
        if let KeyMaterial::Jwks(jwks) = &self.keys {
            if jwks.key_for(kid).is_none() {
                debug!(kid, "cached claims dropped, signing key left the JWKS");
                self.evict(cache_key);
                return None;
            }
        }
        if unix_now() < exp_with_leeway {
            Some(claims)
        } else {
            self.evict(cache_key);
            None
        }
    }

    fn cache_claims(&self, cache_key: Arc<str>, claims: &Value) {
        let Some(exp) = claims.get("exp").and_then(Value::as_i64) else {
            return;
        };
        let exp_with_leeway = exp + self.leeway_secs as i64;
        if unix_now() >= exp_with_leeway {
            return;
        }
        if let Ok(mut guard) = self.claims_cache.write() {
            guard.put(cache_key, (exp_with_leeway, claims.clone()));
        }
    }

    fn evict(&self, cache_key: &Arc<str>) {
        if let Ok(mut guard) = self.claims_cache.write() {
            guard.pop(cache_key);
        }
    }

    fn key_for(&self, header: &jsonwebtoken::Header) -> Result<(DecodingKey, Algorithm)> {
        match &self.keys {
            KeyMaterial::Fixed { key, algorithms } => {
                if !algorithms.contains(&header.alg) {
                    bail!("unsupported algorithm {:?}", header.alg);
                }
                Ok((key.clone(), header.alg))
            }
            KeyMaterial::Jwks(jwks) => {
                if !JWKS_ALGORITHMS.contains(&header.alg) {
                    bail!("unsupported algorithm {:?}", header.alg);
                }
                let kid = header
                    .kid
                    .as_deref()
                    .ok_or_else(|| anyhow!("token header has no key id"))?;
                let key = jwks
                    .key_for(kid)
                    .ok_or_else(|| anyhow!("key <{kid}> not found in JWKS"))?;
                Ok((key, header.alg))
            }
        }
    }

    /// Map validated claims onto a principal, Keycloak style.
    fn provide_user(&self, claims: &Value, credential: &Credential) -> Principal {
        let login = claims
            .get("preferred_username")
            .and_then(Value::as_str)
            .or_else(|| claims.get("sub").and_then(Value::as_str))
            .unwrap_or_default();
        let mut principal = Principal::new(login).token(credential.clone());
        if let Some(email) = claims.get("email").and_then(Value::as_str) {
            principal = principal.email(email);
        }
        if let Some(given) = claims.get("given_name").and_then(Value::as_str) {
            principal = principal.firstname(given);
        }
        if let Some(family) = claims.get("family_name").and_then(Value::as_str) {
            principal = principal.lastname(family);
        }
        let roles = claims
            .get("resource_access")
            .and_then(|v| v.get(&self.application))
            .and_then(|v| v.get("roles"))
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        principal.roles(roles)
    }
}

impl AuthProvider for JwtAuthProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheme(&self) -> &str {
        "bearer"
    }

    fn authenticate(
        &self,
        _request: &AuthRequest<'_>,
        credential: Option<&Credential>,
        _options: &AuthOptions,
    ) -> Result<Principal> {
        let credential = credential.ok_or_else(|| anyhow!("Authorization header is missing"))?;
        if !credential.has_scheme("bearer") {
            return Err(anyhow!("Authorization scheme should be 'bearer'"));
        }
        let token = credential
            .token()
            .ok_or_else(|| anyhow!("bearer token is missing"))?;

        let header = jsonwebtoken::decode_header(token)
            .map_err(|err| anyhow!("invalid token header: {err}"))?;
        let kid = header.kid.clone().unwrap_or_default();
        let cache_key: Arc<str> = Arc::from(format!("{token}|{kid}"));

        if let Some(claims) = self.cached_claims(&cache_key, &kid) {
            return Ok(self.provide_user(&claims, credential));
        }

        let (key, algorithm) = self.key_for(&header)?;
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = self.leeway_secs;
        if let Some(iss) = &self.iss {
            validation.set_issuer(&[iss]);
        }
        if let Some(aud) = &self.aud {
            validation.set_audience(&[aud]);
        }

        let data =
            jsonwebtoken::decode::<Value>(token, &key, &validation).map_err(describe_error)?;
        self.cache_claims(cache_key, &data.claims);
        Ok(self.provide_user(&data.claims, credential))
    }
}

fn describe_error(err: jsonwebtoken::errors::Error) -> anyhow::Error {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => anyhow!("token expired"),
        ErrorKind::InvalidSignature => anyhow!("invalid signature"),
        ErrorKind::InvalidIssuer => anyhow!("invalid issuer"),
        ErrorKind::InvalidAudience => anyhow!("invalid audience"),
        ErrorKind::MissingRequiredClaim(claim) => anyhow!("missing required claim <{claim}>"),
        _ => anyhow!("token verification failed: {err}"),
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Builder for [`JwtAuthProvider`]. Key source precedence when several are
/// set: JWKS URI, then certificate, then secret.
pub struct JwtAuthProviderBuilder {
    name: String,
    application: String,
    certificate: Option<String>,
    secret: Option<String>,
    jwks_uri: Option<String>,
    issuer: Option<String>,
    audience: Option<String>,
    leeway_secs: u64,
    jwks_ttl: Duration,
    claims_cache_size: usize,
}

impl JwtAuthProviderBuilder {
    /// Override the registry name, default `jwt`.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// RSA public key in PEM form.
    #[must_use]
    pub fn certificate(mut self, pem: impl Into<String>) -> Self {
        self.certificate = Some(pem.into());
        self
    }

    /// HMAC shared secret.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Remote JWKS document URI. Must be `https`, except for
    /// `localhost`/`127.0.0.1` which may use plain `http`.
    #[must_use]
    pub fn jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Expected `iss` claim.
    #[must_use]
    pub fn issuer(mut self, iss: impl Into<String>) -> Self {
        self.issuer = Some(iss.into());
        self
    }

    /// Expected `aud` claim.
    #[must_use]
    pub fn audience(mut self, aud: impl Into<String>) -> Self {
        self.audience = Some(aud.into());
        self
    }

    /// Clock skew tolerance for time-based claims, default 30s.
    #[must_use]
    pub fn leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// How long fetched JWKS keys stay fresh, default 300s.
    #[must_use]
    pub fn jwks_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_ttl = ttl;
        self
    }

    /// Capacity of the validated-claims LRU cache, default 1000.
    #[must_use]
    pub fn claims_cache_size(mut self, size: usize) -> Self {
        self.claims_cache_size = size;
        self
    }

    pub fn build(self) -> Result<JwtAuthProvider> {
        let keys = if let Some(uri) = self.jwks_uri {
            KeyMaterial::Jwks(JwksKeys::new(uri, self.jwks_ttl)?)
        } else if let Some(pem) = self.certificate {
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .context("certificate is not a valid RSA public key PEM")?;
            KeyMaterial::Fixed {
                key,
                algorithms: RSA_ALGORITHMS,
            }
        } else if let Some(secret) = self.secret {
            KeyMaterial::Fixed {
                key: DecodingKey::from_secret(secret.as_bytes()),
                algorithms: HMAC_ALGORITHMS,
            }
        } else {
            bail!("No jwks nor certificate options are defined");
        };
        let capacity = NonZeroUsize::new(self.claims_cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(JwtAuthProvider {
            name: self.name,
            application: self.application,
            keys,
            iss: self.issuer,
            aud: self.audience,
            leeway_secs: self.leeway_secs,
            claims_cache: RwLock::new(LruCache::new(capacity)),
        })
    }
}

/// Remote JWKS key set with TTL refresh, shared by every request.
#[derive(Debug)]
struct JwksKeys {
    url: String,
    ttl: Duration,
    // kid -> decoding key, plus the instant of the last successful fetch
    keys: Mutex<(Option<Instant>, HashMap<String, DecodingKey>)>,
    refresh_in_progress: AtomicBool,
}

impl JwksKeys {
    fn new(url: String, ttl: Duration) -> Result<Self> {
        let parsed = Url::parse(&url).with_context(|| format!("invalid JWKS URI <{url}>"))?;
        match parsed.scheme() {
            "https" => {}
            "http" => {
                // Exact-host check, subdomains like localhost.evil.test stay rejected.
                let host = parsed.host_str().unwrap_or_default();
                if host != "localhost" && host != "127.0.0.1" {
                    bail!("JWKS URI must use https, got <{url}>");
                }
            }
            _ => bail!("JWKS URI must use https, got <{url}>"),
        }
        Ok(Self {
            url,
            ttl,
            keys: Mutex::new((None, HashMap::new())),
            refresh_in_progress: AtomicBool::new(false),
        })
    }

    fn key_for(&self, kid: &str) -> Option<DecodingKey> {
        self.refresh_if_stale();
        let guard = self.keys.lock().ok()?;
        guard.1.get(kid).cloned()
    }

    fn refresh_if_stale(&self) {
        {
            let Ok(guard) = self.keys.lock() else { return };
            let (last, map) = &*guard;
            if let Some(last) = last {
                if last.elapsed() < self.ttl && !map.is_empty() {
                    return;
                }
            }
        }
        // One refresher at a time; the rest wait briefly and read whatever
        // the winner fetched.
        if self
            .refresh_in_progress
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            let start = Instant::now();
            let mut wait_ms = 10;
            while self.refresh_in_progress.load(Ordering::Acquire) {
                if start.elapsed() >= Duration::from_secs(2) {
                    warn!("JWKS refresh timed out, continuing with stale keys");
                    return;
                }
                std::thread::sleep(Duration::from_millis(wait_ms));
                wait_ms = (wait_ms * 2).min(100);
            }
            return;
        }
        if let Some(new_keys) = self.fetch_keys() {
            if let Ok(mut guard) = self.keys.lock() {
                *guard = (Some(Instant::now()), new_keys);
            }
        }
        self.refresh_in_progress.store(false, Ordering::Release);
    }

    /// Fetch and parse the JWKS document. Short timeout with a few retries;
    /// a failed fetch keeps the previous keys.
    fn fetch_keys(&self) -> Option<HashMap<String, DecodingKey>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .ok()?;
        let mut body = None;
        for _ in 0..3 {
            if let Ok(response) = client.get(&self.url).send() {
                if let Ok(text) = response.text() {
                    body = Some(text);
                    break;
                }
            }
        }
        let parsed: Value = serde_json::from_str(&body?).ok()?;
        let mut keys = HashMap::new();
        for entry in parsed
            .get("keys")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let kid = entry.get("kid").and_then(Value::as_str).unwrap_or_default();
            let kty = entry.get("kty").and_then(Value::as_str).unwrap_or_default();
            let alg = entry
                .get("alg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_ascii_uppercase();
            if kty.eq_ignore_ascii_case("oct")
                && matches!(alg.as_str(), "HS256" | "HS384" | "HS512")
            {
                if let Some(k) = entry.get("k").and_then(Value::as_str) {
                    if let Ok(secret) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(k)
                    {
                        keys.insert(kid.to_string(), DecodingKey::from_secret(&secret));
                    }
                }
                continue;
            }
            if kty.eq_ignore_ascii_case("rsa")
                && matches!(alg.as_str(), "RS256" | "RS384" | "RS512")
            {
                let (Some(n), Some(e)) = (
                    entry.get("n").and_then(Value::as_str),
                    entry.get("e").and_then(Value::as_str),
                ) else {
                    continue;
                };
                if let Ok(key) = DecodingKey::from_rsa_components(n, e) {
                    keys.insert(kid.to_string(), key);
                }
            }
            // other kty/alg combinations are skipped
        }
        Some(keys)
    }
}
