//! Shared application state.

use std::sync::Arc;

use costlens_auth::AuthBackend;
use costlens_azure::AzureClient;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bearer token validation.
    pub auth: Arc<dyn AuthBackend>,
    /// Outbound Azure calls.
    pub azure: Arc<AzureClient>,
}

impl AppState {
    /// Creates the state.
    pub fn new(auth: Arc<dyn AuthBackend>, azure: Arc<AzureClient>) -> Self {
        Self { auth, azure }
    }
}
