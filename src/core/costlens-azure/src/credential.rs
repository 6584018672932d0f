//! Access tokens for Azure Resource Manager.
//!
//! [`ArmCredential`] walks an ordered chain of `azure_identity` credentials
//! and reuses the token it gets until five minutes before expiry.

use std::sync::Arc;
use std::time::Duration;

use azure_core::credentials::{Secret, TokenCredential};
use azure_identity::{
    AzureCliCredential, ClientSecretCredential, ManagedIdentityCredential,
    ManagedIdentityCredentialOptions, UserAssignedId,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::AzureError;

/// OAuth2 scope for ARM.
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Upper bound on a single source's token request.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedToken {
    token: Arc<str>,
    /// Expiry with the refresh buffer already subtracted.
    refresh_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() < self.refresh_at
    }
}

/// One link of the chain.
#[derive(Clone)]
pub struct NamedCredential {
    name: &'static str,
    credential: Arc<dyn TokenCredential>,
}

impl NamedCredential {
    /// Wraps `credential` under a name used in logs and errors.
    pub fn new(name: &'static str, credential: Arc<dyn TokenCredential>) -> Self {
        Self { name, credential }
    }
}

enum Source {
    Fixed(Arc<str>),
    Chain(Vec<NamedCredential>),
}

/// Source of ARM bearer tokens, shared by every outbound request.
pub struct ArmCredential {
    source: Source,
    cached: RwLock<Option<CachedToken>>,
    acquire_timeout: Duration,
}

impl std::fmt::Debug for ArmCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmCredential")
            .field("sources", &self.source_names())
            .finish()
    }
}

impl ArmCredential {
    /// A token that is used as-is and never refreshed.
    pub fn fixed(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self::with_source(Source::Fixed(token.into()))
    }

    /// Tries `sources` in order until one yields a token.
    pub fn chain(sources: Vec<NamedCredential>) -> Self {
        Self::with_source(Source::Chain(sources))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Overrides how long one source may take to answer.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Builds the ambient chain.
    ///
    /// `AZURE_ACCESS_TOKEN` short-circuits everything. Otherwise the chain is
    /// a client secret (`AZURE_TENANT_ID`, `AZURE_CLIENT_ID`,
    /// `AZURE_CLIENT_SECRET`) when all three are set, then managed identity
    /// (user-assigned when only `AZURE_CLIENT_ID` is set), then Azure CLI.
    pub fn from_env() -> Result<Self, AzureError> {
        if let Some(token) = non_empty_env("AZURE_ACCESS_TOKEN") {
            info!("Using fixed ARM token from AZURE_ACCESS_TOKEN");
            return Ok(Self::fixed(token));
        }

        let tenant_id = non_empty_env("AZURE_TENANT_ID");
        let client_id = non_empty_env("AZURE_CLIENT_ID");
        let client_secret = non_empty_env("AZURE_CLIENT_SECRET");

        let mut sources = Vec::new();

        let managed_identity_id = match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(secret)) => {
                let credential =
                    ClientSecretCredential::new(&tenant_id, client_id, Secret::new(secret), None)
                        .map_err(|e| {
                            AzureError::Credential(format!(
                                "failed to create client secret credential: {}",
                                e
                            ))
                        })?;
                sources.push(NamedCredential::new("client-secret", credential));
                None
            },
            (_, client_id, _) => client_id,
        };

        let options = managed_identity_id.map(|id| {
            info!(client_id = %id, "Using user-assigned managed identity");
            ManagedIdentityCredentialOptions {
                user_assigned_id: Some(UserAssignedId::ClientId(id)),
                ..Default::default()
            }
        });
        let managed_identity = ManagedIdentityCredential::new(options).map_err(|e| {
            AzureError::Credential(format!("failed to create managed identity credential: {}", e))
        })?;
        sources.push(NamedCredential::new("managed-identity", managed_identity));

        let cli = AzureCliCredential::new(None).map_err(|e| {
            AzureError::Credential(format!("failed to create Azure CLI credential: {}", e))
        })?;
        sources.push(NamedCredential::new("azure-cli", cli));

        let credential = Self::chain(sources);
        info!(sources = ?credential.source_names(), "Azure credential chain configured");

        Ok(credential)
    }

    fn source_names(&self) -> Vec<&'static str> {
        match &self.source {
            Source::Fixed(_) => vec!["fixed"],
            Source::Chain(sources) => sources.iter().map(|s| s.name).collect(),
        }
    }

    /// Returns a bearer token for ARM.
    pub async fn token(&self) -> Result<Arc<str>, AzureError> {
        let sources = match &self.source {
            Source::Fixed(token) => return Ok(token.clone()),
            Source::Chain(sources) => sources,
        };

        {
            let cache = self.cached.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh()) {
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh()) {
            return Ok(cached.token.clone());
        }

        let mut failures = Vec::with_capacity(sources.len());
        for source in sources {
            let request = source.credential.get_token(&[ARM_SCOPE], None);
            match tokio::time::timeout(self.acquire_timeout, request).await {
                Ok(Ok(access_token)) => {
                    let expires_on =
                        DateTime::from_timestamp(access_token.expires_on.unix_timestamp(), 0)
                            .unwrap_or_else(Utc::now);
                    let token: Arc<str> = access_token.token.secret().into();

                    debug!(source = source.name, expires_on = %expires_on, "Acquired ARM token");
                    *cache = Some(CachedToken {
                        token: token.clone(),
                        refresh_at: expires_on
                            - chrono::Duration::seconds(TOKEN_REFRESH_BUFFER_SECS),
                    });
                    return Ok(token);
                },
                Ok(Err(e)) => {
                    debug!(source = source.name, error = %e, "Credential source failed");
                    failures.push(format!("{}: {}", source.name, e));
                },
                Err(_) => {
                    debug!(source = source.name, "Credential source timed out");
                    failures.push(format!(
                        "{}: timed out after {}s",
                        source.name,
                        self.acquire_timeout.as_secs()
                    ));
                },
            }
        }

        Err(AzureError::Credential(format!(
            "no credential source produced an ARM token ({})",
            failures.join("; ")
        )))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
