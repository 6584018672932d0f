//! Microsoft Entra ID authentication backend.
//!
//! Validates access tokens issued by Entra ID for the dashboard application
//! against the tenant's signing keys.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{AuthBackend, AuthContext, AuthError, KeySet};

/// Default Entra ID authority host.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Configuration for the Entra ID backend.
#[derive(Debug, Clone)]
pub struct EntraIdConfig {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Application (client) id; the expected audience.
    pub client_id: String,
    /// Authority host, e.g. `https://login.microsoftonline.com`.
    pub authority: String,
}

impl EntraIdConfig {
    /// Creates a config for the public Entra ID cloud.
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }

    fn authority(&self) -> &str {
        self.authority.trim_end_matches('/')
    }

    /// Expected `iss` claim of v2.0 access tokens.
    pub fn issuer(&self) -> String {
        format!("{}/{}/v2.0", self.authority(), self.tenant_id)
    }

    /// Key discovery endpoint for the tenant.
    pub fn jwks_url(&self) -> String {
        format!("{}/{}/discovery/v2.0/keys", self.authority(), self.tenant_id)
    }
}

/// JWT claims from Entra ID access tokens.
///
/// Audience is checked by [`Validation`] and not kept here.
#[derive(Debug, Serialize, Deserialize)]
struct EntraClaims {
    /// Subject (pairwise per application).
    #[serde(default)]
    sub: Option<String>,
    /// Object id of the account in the directory.
    #[serde(default)]
    oid: Option<String>,
    /// Tenant id.
    #[serde(default)]
    tid: Option<String>,
    /// Display name.
    #[serde(default)]
    name: Option<String>,
    /// Sign-in name (usually the UPN or email).
    #[serde(default)]
    preferred_username: Option<String>,
    /// Email address (optional claim).
    #[serde(default)]
    email: Option<String>,
    /// Expiration (Unix timestamp).
    exp: u64,
    /// Issuer.
    iss: String,
}

/// Authentication backend for Entra ID access tokens.
///
/// Only RS256 is accepted. The key set is supplied at construction and is
/// never refreshed on a lookup miss; a key rotated after startup fails until
/// [`EntraIdBackend::replace_keys`] installs a newer set.
pub struct EntraIdBackend {
    keys: RwLock<Arc<KeySet>>,
    validation: Validation,
}

impl EntraIdBackend {
    /// Creates a new Entra ID backend over an already fetched key set.
    pub fn new(config: &EntraIdConfig, keys: KeySet) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[config.issuer()]);
        validation.set_audience(&[&config.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        Self {
            keys: RwLock::new(Arc::new(keys)),
            validation,
        }
    }

    /// Installs a new key set for subsequent validations.
    pub async fn replace_keys(&self, keys: KeySet) {
        *self.keys.write().await = Arc::new(keys);
    }

    /// Returns the key set currently in use.
    pub async fn keys(&self) -> Arc<KeySet> {
        self.keys.read().await.clone()
    }

    /// Spawns a task that re-fetches the key set every `interval`.
    ///
    /// A failed fetch keeps the current key set.
    pub fn spawn_key_refresh(
        self: Arc<Self>,
        http: reqwest::Client,
        jwks_url: String,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; the startup fetch covers it.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match KeySet::fetch(&http, &jwks_url).await {
                    Ok(keys) => {
                        info!(keys_count = keys.len(), "JWKS refreshed");
                        self.replace_keys(keys).await;
                    },
                    Err(e) => {
                        warn!(error = %e, "JWKS refresh failed, keeping current keys");
                    },
                }
            }
        })
    }
}

#[async_trait]
impl AuthBackend for EntraIdBackend {
    async fn validate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode JWT header");
            AuthError::MalformedToken
        })?;

        if header.alg != Algorithm::RS256 {
            debug!(algorithm = ?header.alg, "JWT algorithm rejected");
            return Err(AuthError::UnsupportedAlgorithm);
        }

        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let keys = self.keys().await;
        let key = keys.get(&kid).ok_or_else(|| {
            warn!(kid = %kid, "Key ID not found in JWKS");
            AuthError::UnknownKey
        })?;

        let token_data = decode::<EntraClaims>(token, key, &self.validation).map_err(|e| {
            debug!(error = %e, kid = %kid, "JWT validation failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::MalformedToken,
                _ => AuthError::InvalidCredentials,
            }
        })?;

        let claims = token_data.claims;
        let account_id = claims
            .oid
            .or(claims.sub)
            .ok_or(AuthError::InvalidCredentials)?;

        debug!(issuer = %claims.iss, account_id = %account_id, "JWT validated");

        Ok(AuthContext {
            account_id,
            email: claims.preferred_username.or(claims.email),
            display_name: claims.name,
            tenant_id: claims.tid,
            expires_at: claims.exp,
        })
    }

    fn name(&self) -> &'static str {
        "entra-id"
    }
}
