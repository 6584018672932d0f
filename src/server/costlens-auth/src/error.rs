//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication.
///
/// The display strings are returned to clients as the reason of a 401
/// response, so they name a category and never carry library internals.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be parsed as a JWT.
    #[error("malformed token")]
    MalformedToken,

    /// Token header has no key identifier.
    #[error("token header has no key id")]
    MissingKeyId,

    /// Token names a key that is not in the cached key set.
    #[error("unknown signing key")]
    UnknownKey,

    /// Token header declares an algorithm other than RS256.
    #[error("unsupported signing algorithm")]
    UnsupportedAlgorithm,

    /// Signature does not verify against the named key.
    #[error("invalid signature")]
    InvalidSignature,

    /// Token has expired.
    #[error("token expired")]
    TokenExpired,

    /// Audience does not match the configured client id.
    #[error("invalid audience")]
    InvalidAudience,

    /// Issuer does not match the configured tenant issuer.
    #[error("invalid issuer")]
    InvalidIssuer,

    /// Any other validation failure.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Signing keys could not be fetched or parsed.
    #[error("signing keys unavailable: {0}")]
    KeySetUnavailable(String),
}
