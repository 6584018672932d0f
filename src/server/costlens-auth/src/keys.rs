//! Signing key set (JWKS) handling.
//!
//! The key set is fetched from the identity provider's discovery endpoint and
//! turned into a map of key id to RSA decoding key.

use std::collections::HashMap;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::DecodingKey;
use tracing::{debug, info, warn};

use crate::AuthError;

/// Signing keys indexed by key id.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
}

impl KeySet {
    /// Builds a key set from a parsed JWKS document.
    ///
    /// Keys without a `kid`, non-RSA keys, encryption keys and keys that
    /// declare an algorithm other than RS256 are skipped. Fails if no usable
    /// key remains.
    pub fn from_jwks(jwks: JwkSet) -> Result<Self, AuthError> {
        let mut keys = HashMap::new();

        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                debug!("Skipping JWK without key id");
                continue;
            };

            match rsa_decoding_key(jwk) {
                Ok(key) => {
                    keys.insert(kid.to_string(), key);
                },
                Err(reason) => {
                    warn!(kid = kid, reason = reason, "Skipping unusable JWK");
                },
            }
        }

        if keys.is_empty() {
            return Err(AuthError::KeySetUnavailable(
                "no usable RSA signing keys in key set".to_string(),
            ));
        }

        Ok(Self { keys })
    }

    /// Fetches and parses the key set published at `jwks_url`.
    pub async fn fetch(http: &reqwest::Client, jwks_url: &str) -> Result<Self, AuthError> {
        debug!(url = jwks_url, "Fetching JWKS");

        let response = http
            .get(jwks_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::KeySetUnavailable(format!(
                "key endpoint returned {}",
                status
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(format!("invalid JWKS document: {}", e)))?;

        let key_set = Self::from_jwks(jwks)?;
        info!(keys_count = key_set.len(), url = jwks_url, "JWKS loaded");

        Ok(key_set)
    }

    /// Returns the decoding key for `kid`, if present.
    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    /// Number of usable keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&String> = self.keys.keys().collect();
        kids.sort();
        f.debug_struct("KeySet").field("kids", &kids).finish()
    }
}

fn rsa_decoding_key(jwk: &Jwk) -> Result<DecodingKey, &'static str> {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return Err("encryption key");
    }

    if let Some(alg) = jwk.common.key_algorithm {
        if alg != KeyAlgorithm::RS256 {
            return Err("algorithm is not RS256");
        }
    }

    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            DecodingKey::from_rsa_components(&rsa.n, &rsa.e).map_err(|_| "invalid RSA components")
        },
        _ => Err("not an RSA key"),
    }
}
