// ABOUTME: RSA key pair wrapper for RS256 signing and RSA key publication
// ABOUTME: Provides generation, PEM import/export, and JWT encoding-key conversion
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::errors::ServerError;

/// RSA key size in bits (2048 bits minimum, 4096 bits recommended).
const RSA_KEY_SIZE: usize = 4096;

/// RSA key pair with a key identifier.
#[derive(Clone)]
pub struct RsaKeyPair {
    /// Unique key identifier, published as `kid`.
    pub kid: String,
    /// Private key for signing.
    pub private_key: RsaPrivateKey,
    /// Public key for verification and JWKS publication.
    pub public_key: RsaPublicKey,
}

impl RsaKeyPair {
    /// Generate a new key pair with the production key size.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate(kid: &str) -> Result<Self, ServerError> {
        Self::generate_with_key_size(kid, RSA_KEY_SIZE)
    }

    /// Generate a key pair with a configurable key size.
    ///
    /// Use 2048 bits for faster test execution, 4096 bits for production.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate_with_key_size(kid: &str, key_size_bits: usize) -> Result<Self, ServerError> {
        use rand::rngs::OsRng;

        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, key_size_bits)
            .map_err(|e| ServerError::Crypto(format!("RSA key generation failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            kid: kid.to_owned(),
            private_key,
            public_key,
        })
    }

    /// Import a private key from PKCS#8 PEM.
    ///
    /// # Errors
    /// Returns an error if PEM parsing fails.
    pub fn from_pkcs8_pem(kid: &str, pem: &str) -> Result<Self, ServerError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| ServerError::Crypto(format!("private key PEM parsing failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            kid: kid.to_owned(),
            private_key,
            public_key,
        })
    }

    /// Export the private key as PKCS#8 PEM.
    ///
    /// # Errors
    /// Returns an error if PEM encoding fails.
    pub fn to_pkcs8_pem(&self) -> Result<String, ServerError> {
        self.private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| ServerError::Crypto(format!("private key PEM export failed: {e}")))
    }

    /// Export the public key as SPKI PEM.
    ///
    /// # Errors
    /// Returns an error if PEM encoding fails.
    pub fn public_key_pem(&self) -> Result<String, ServerError> {
        self.public_key
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .map_err(|e| ServerError::Crypto(format!("public key PEM export failed: {e}")))
    }

    /// JWT encoding key for RS256 signing.
    ///
    /// # Errors
    /// Returns an error if DER encoding fails.
    pub fn encoding_key(&self) -> Result<EncodingKey, ServerError> {
        let der = self
            .private_key
            .to_pkcs1_der()
            .map_err(|e| ServerError::Crypto(format!("private key DER export failed: {e}")))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }

    /// RSA modulus, base64url without padding.
    #[must_use]
    pub fn modulus_b64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be())
    }

    /// RSA public exponent, base64url without padding.
    #[must_use]
    pub fn exponent_b64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be())
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("kid", &self.kid)
            .field("bits", &self.public_key.size())
            .finish_non_exhaustive()
    }
}
