// ABOUTME: Signing and encryption credentials, JWK publication, and digest mapping
// ABOUTME: Hosts the algorithm→digest table used for c_hash/at_hash computation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Key Material
//!
//! Credentials wrap an [`RsaKeyPair`] together with an algorithm name and an
//! optional bound X.509 certificate. The JWKS endpoint publishes them through
//! [`JsonWebKey`]; the token service signs identity tokens with the first
//! signing credential and computes `c_hash`/`at_hash` through the explicit
//! algorithm→digest table below, which fails loudly on unknown algorithm
//! strings instead of guessing.

pub mod keys;
pub mod protector;

pub use keys::RsaKeyPair;
pub use protector::{DataProtector, TicketProtector};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::errors::ServerError;

/// Algorithm names the core recognizes.
pub mod algorithms {
    pub const RS256: &str = "RS256";
    pub const RS384: &str = "RS384";
    pub const RS512: &str = "RS512";
    pub const RSA_OAEP: &str = "RSA-OAEP";
    pub const RSA1_5: &str = "RSA1_5";
}

/// X.509 certificate bound to a credential, exposed first-class so JWKS
/// publication never has to dig through key internals.
#[derive(Debug, Clone)]
pub struct X509Certificate {
    /// DER-encoded leaf certificate.
    pub der: Vec<u8>,
    /// DER-encoded intermediates, leaf excluded, in order.
    pub chain: Vec<Vec<u8>>,
}

impl X509Certificate {
    /// SHA-1 thumbprint of the leaf, base64url without padding (`x5t`).
    #[must_use]
    pub fn thumbprint_b64url(&self) -> String {
        let digest =
            ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, &self.der);
        URL_SAFE_NO_PAD.encode(digest.as_ref())
    }

    /// Standard-base64 chain starting at the leaf (`x5c`).
    #[must_use]
    pub fn chain_b64(&self) -> Vec<String> {
        std::iter::once(&self.der)
            .chain(self.chain.iter())
            .map(|der| STANDARD.encode(der))
            .collect()
    }
}

/// Key material used to sign identity tokens and JWT access tokens.
#[derive(Debug, Clone)]
pub struct SigningCredentials {
    pub key: RsaKeyPair,
    /// JOSE algorithm name, e.g. `RS256`.
    pub algorithm: String,
    pub certificate: Option<X509Certificate>,
}

impl SigningCredentials {
    /// RS256 credentials without a bound certificate.
    #[must_use]
    pub fn rs256(key: RsaKeyPair) -> Self {
        Self {
            key,
            algorithm: algorithms::RS256.to_owned(),
            certificate: None,
        }
    }

    /// Convert to a JWK with `use` = `sig`.
    #[must_use]
    pub fn to_jwk(&self) -> JsonWebKey {
        to_jwk(&self.key, &self.algorithm, "sig", self.certificate.as_ref())
    }
}

/// Key material published for token encryption.
#[derive(Debug, Clone)]
pub struct EncryptionCredentials {
    pub key: RsaKeyPair,
    /// JWE key-management algorithm name, `RSA-OAEP` or `RSA1_5`.
    pub algorithm: String,
    pub certificate: Option<X509Certificate>,
}

impl EncryptionCredentials {
    /// RSA-OAEP credentials without a bound certificate.
    #[must_use]
    pub fn rsa_oaep(key: RsaKeyPair) -> Self {
        Self {
            key,
            algorithm: algorithms::RSA_OAEP.to_owned(),
            certificate: None,
        }
    }

    /// Convert to a JWK with `use` = `enc`.
    #[must_use]
    pub fn to_jwk(&self) -> JsonWebKey {
        to_jwk(&self.key, &self.algorithm, "enc", self.certificate.as_ref())
    }
}

fn to_jwk(
    key: &RsaKeyPair,
    algorithm: &str,
    key_use: &str,
    certificate: Option<&X509Certificate>,
) -> JsonWebKey {
    JsonWebKey {
        kty: Some("RSA".to_owned()),
        key_use: Some(key_use.to_owned()),
        alg: Some(algorithm.to_owned()),
        kid: Some(key.kid.clone()),
        n: Some(key.modulus_b64url()),
        e: Some(key.exponent_b64url()),
        x5t: certificate.map(X509Certificate::thumbprint_b64url),
        x5u: None,
        x5c: certificate.map(X509Certificate::chain_b64).unwrap_or_default(),
        key_ops: Vec::new(),
    }
}

/// JWK (JSON Web Key) representation for the JWKS endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (`RSA`). Keys with no `kty` are excluded from publication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,
    /// Public key use: `sig` or `enc`.
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// RSA modulus, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// Certificate SHA-1 thumbprint, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5u: Option<String>,
    /// Certificate chain, standard base64, leaf first.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub x5c: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub key_ops: Vec<String>,
}

/// JWKS container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

/// Digest functions the signing algorithms map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Map a signing algorithm name to its digest.
///
/// # Errors
/// Returns [`ServerError::UnsupportedAlgorithm`] for names outside the table —
/// a non-standard algorithm string must not silently fall back to SHA-256.
pub fn digest_for_algorithm(algorithm: &str) -> Result<DigestAlgorithm, ServerError> {
    match algorithm {
        algorithms::RS256 => Ok(DigestAlgorithm::Sha256),
        algorithms::RS384 => Ok(DigestAlgorithm::Sha384),
        algorithms::RS512 => Ok(DigestAlgorithm::Sha512),
        other => Err(ServerError::UnsupportedAlgorithm(other.to_owned())),
    }
}

/// Left-half hash used for `c_hash` and `at_hash`: base64url of the first half
/// of the digest of `value` under the signing algorithm's digest.
///
/// # Errors
/// Returns an error when the algorithm has no digest mapping.
pub fn left_half_hash(algorithm: &str, value: &str) -> Result<String, ServerError> {
    let digest = digest_for_algorithm(algorithm)?.digest(value.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_table_rejects_unknown_algorithms() {
        assert!(matches!(
            digest_for_algorithm("ES999"),
            Err(ServerError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn left_half_hash_is_half_the_digest() {
        // SHA-256 digests are 32 bytes, so the left half is 16 bytes: 22
        // base64url characters without padding.
        let hash = left_half_hash(algorithms::RS256, "SplxlOBeZQQYbYS6WxSbIA").unwrap();
        assert_eq!(hash.len(), 22);
    }

    #[test]
    fn jwk_serialization_omits_absent_fields() {
        let jwk = JsonWebKey {
            kty: Some("RSA".to_owned()),
            n: Some("abc".to_owned()),
            e: Some("AQAB".to_owned()),
            ..JsonWebKey::default()
        };

        let json = serde_json::to_string(&jwk).unwrap();
        assert!(!json.contains("x5t"));
        assert!(!json.contains("x5c"));
        assert!(!json.contains("key_ops"));
    }
}
