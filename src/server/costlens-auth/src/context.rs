//! Authentication context types.

use serde::{Deserialize, Serialize};

/// Authenticated user context.
///
/// Built from the claims of a validated token and attached to the request
/// for the lifetime of that request only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Unique account identifier (`oid` claim, falling back to `sub`).
    pub account_id: String,

    /// Sign-in name or email address, when the token carries one.
    pub email: Option<String>,

    /// Display name (`name` claim).
    pub display_name: Option<String>,

    /// Directory (tenant) the account belongs to.
    pub tenant_id: Option<String>,

    /// Token expiration timestamp (Unix seconds).
    pub expires_at: u64,
}

impl AuthContext {
    /// Returns the best human-readable label for logs.
    pub fn label(&self) -> &str {
        self.email
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or(&self.account_id)
    }
}
