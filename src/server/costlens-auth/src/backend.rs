//! Bearer token validation seam.

use async_trait::async_trait;

use crate::{AuthContext, AuthError};

/// Validates the bearer token carried by a dashboard request.
///
/// The API layer holds an `Arc<dyn AuthBackend>`; [`crate::EntraIdBackend`]
/// is the production implementation.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Checks signature, issuer, audience and expiry of `token` (the header
    /// value without its `Bearer ` scheme) and extracts the caller.
    async fn validate(&self, token: &str) -> Result<AuthContext, AuthError>;

    /// Short backend identifier, used as a log field.
    fn name(&self) -> &'static str;
}
