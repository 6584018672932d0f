//! Test helpers: fixture keys and a token minting builder.
//!
//! Enabled for this crate's tests and for downstream crates through the
//! `test-util` feature.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

use crate::{EntraIdConfig, KeySet};

/// Key id of the fixture signing key published in [`JWKS_JSON`].
pub const TEST_KID: &str = "test-key-1";

/// Tenant id used by [`test_config`].
pub const TEST_TENANT_ID: &str = "11111111-2222-3333-4444-555555555555";

/// Client id used by [`test_config`].
pub const TEST_CLIENT_ID: &str = "66666666-7777-8888-9999-000000000000";

/// Object id placed in tokens minted by [`TokenBuilder`].
pub const TEST_OID: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

/// JWKS document containing the public half of [`SIGNING_KEY_PEM`] under
/// [`TEST_KID`], plus one key without a `kid`.
pub const JWKS_JSON: &str = include_str!("../testdata/jwks.json");

/// RSA private key matching the `TEST_KID` entry of [`JWKS_JSON`].
pub const SIGNING_KEY_PEM: &str = include_str!("../testdata/signing_key.pem");

/// RSA private key that is not published anywhere.
pub const ROGUE_KEY_PEM: &str = include_str!("../testdata/rogue_key.pem");

/// Config for the fixture tenant and client.
pub fn test_config() -> EntraIdConfig {
    EntraIdConfig::new(TEST_TENANT_ID, TEST_CLIENT_ID)
}

/// Key set parsed from [`JWKS_JSON`].
pub fn key_set() -> KeySet {
    let jwks: JwkSet = serde_json::from_str(JWKS_JSON).expect("fixture JWKS is valid");
    KeySet::from_jwks(jwks).expect("fixture JWKS has a usable key")
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before epoch")
        .as_secs() as i64
}

/// Builds RS256 access tokens shaped like Entra ID v2.0 tokens.
pub struct TokenBuilder {
    claims: Map<String, Value>,
    kid: Option<String>,
    key_pem: &'static str,
}

impl TokenBuilder {
    /// Starts from a valid token for `config`, expiring in one hour.
    pub fn new(config: &EntraIdConfig) -> Self {
        let now = now();
        let claims = json!({
            "aud": config.client_id,
            "iss": config.issuer(),
            "iat": now,
            "nbf": now,
            "exp": now + 3600,
            "sub": "pairwise-subject",
            "oid": TEST_OID,
            "tid": config.tenant_id,
            "name": "Jane Doe",
            "preferred_username": "jane@contoso.com",
            "scp": "access_as_user",
            "ver": "2.0",
        });

        let Value::Object(claims) = claims else {
            unreachable!("json! object literal")
        };

        Self {
            claims,
            kid: Some(TEST_KID.to_string()),
            key_pem: SIGNING_KEY_PEM,
        }
    }

    /// Sets or overrides a claim.
    pub fn claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    /// Removes a claim.
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Sets `exp` relative to now (negative for already expired tokens).
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = now() + seconds;
        let iat = exp.min(now()) - 60;
        self.claim("exp", exp).claim("iat", iat).claim("nbf", iat)
    }

    /// Sets the header `kid`.
    pub fn kid(mut self, kid: Option<&str>) -> Self {
        self.kid = kid.map(str::to_string);
        self
    }

    /// Signs with a different private key.
    pub fn signing_key(mut self, pem: &'static str) -> Self {
        self.key_pem = pem;
        self
    }

    /// Returns the claims the token would carry.
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Encodes and signs the token.
    pub fn sign(&self) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.kid.clone();

        let key = EncodingKey::from_rsa_pem(self.key_pem.as_bytes()).expect("fixture key is valid");
        encode(&header, &self.claims, &key).expect("failed to encode JWT")
    }
}

/// Signs `claims` with HS256, for algorithm confusion tests.
pub fn sign_hs256(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());

    let key = EncodingKey::from_secret(b"not-an-rsa-key-but-long-enough-for-hmac");
    encode(&header, claims, &key).expect("failed to encode JWT")
}
