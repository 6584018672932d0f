//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;
use costlens_auth::{entra_id::DEFAULT_AUTHORITY, EntraIdConfig};
use costlens_azure::{AzureClientConfig, RetryPolicy, DEFAULT_ARM_ENDPOINT};

#[derive(Debug, Parser)]
#[command(name = "costlens-server")]
#[command(about = "Costlens - Azure cost dashboard backend")]
#[command(version)]
pub struct Cli {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8000", env = "COSTLENS_BIND_ADDRESS")]
    pub bind: String,

    /// Entra ID tenant that issues dashboard tokens
    #[arg(long, env = "COSTLENS_TENANT_ID")]
    pub tenant_id: String,

    /// Application (client) id tokens must be issued for
    #[arg(long, env = "COSTLENS_CLIENT_ID")]
    pub client_id: String,

    /// Dashboard origin allowed by CORS
    #[arg(long, default_value = "http://localhost:3000", env = "FRONTEND_URL")]
    pub frontend_url: String,

    /// Entra ID authority host
    #[arg(long, default_value = DEFAULT_AUTHORITY, env = "COSTLENS_AUTHORITY")]
    pub authority: String,

    /// Azure Resource Manager endpoint
    #[arg(long, default_value = DEFAULT_ARM_ENDPOINT, env = "COSTLENS_ARM_ENDPOINT")]
    pub arm_endpoint: String,

    /// Signing key refresh interval in seconds (0 disables refresh)
    #[arg(long, default_value_t = 0, env = "COSTLENS_JWKS_REFRESH_SECS")]
    pub jwks_refresh_secs: u64,

    /// Attempts per cost query when Azure rate limits
    #[arg(
        long,
        default_value_t = 3,
        env = "COSTLENS_RETRY_MAX_ATTEMPTS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub retry_max_attempts: u32,

    /// Delay before the first retry, in seconds
    #[arg(long, default_value_t = 2, env = "COSTLENS_RETRY_BASE_DELAY_SECS")]
    pub retry_base_delay_secs: u64,

    /// Upper bound on any retry delay, in seconds
    #[arg(long, default_value_t = 10, env = "COSTLENS_RETRY_MAX_DELAY_SECS")]
    pub retry_max_delay_secs: u64,
}

impl Cli {
    pub fn entra_id(&self) -> EntraIdConfig {
        EntraIdConfig {
            authority: self.authority.clone(),
            ..EntraIdConfig::new(&self.tenant_id, &self.client_id)
        }
    }

    pub fn azure(&self) -> AzureClientConfig {
        AzureClientConfig {
            endpoint: self.arm_endpoint.trim_end_matches('/').to_string(),
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay: Duration::from_secs(self.retry_base_delay_secs),
                max_delay: Duration::from_secs(self.retry_max_delay_secs),
                ..RetryPolicy::default()
            },
        }
    }

    /// `None` when refresh is disabled.
    pub fn jwks_refresh(&self) -> Option<Duration> {
        (self.jwks_refresh_secs > 0).then(|| Duration::from_secs(self.jwks_refresh_secs))
    }
}
