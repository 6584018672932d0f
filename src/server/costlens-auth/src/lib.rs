//! # Costlens Auth
//!
//! Bearer token validation for Costlens.
//!
//! Tokens are JWTs issued by Microsoft Entra ID. They are verified against the
//! tenant's published signing keys (JWKS), which are fetched once at startup
//! and injected into the backend.
//!
//! ## Checks
//!
//! - RS256 signature against the key named by the token's `kid`
//! - Audience equals the application (client) id
//! - Issuer equals the tenant's v2.0 issuer
//! - Expiry

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod context;
pub mod entra_id;
pub mod error;
pub mod keys;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backend::AuthBackend;
pub use context::AuthContext;
pub use entra_id::{EntraIdBackend, EntraIdConfig};
pub use error::AuthError;
pub use keys::KeySet;
