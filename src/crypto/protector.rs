// ABOUTME: AEAD data protection for opaque ticket payloads
// ABOUTME: Derives one ChaCha20-Poly1305 key per purpose tuple via HKDF-SHA256
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Data Protection
//!
//! Opaque tickets are sealed with keys derived from a single 256-bit master
//! key. Each token kind gets its own key by feeding a purpose tuple —
//! middleware name, authentication scheme, token kind, format version — into
//! HKDF, so a refresh token can never be replayed as an authorization code.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, CHACHA20_POLY1305, NONCE_LEN};
use ring::hkdf::{Salt, HKDF_SHA256};
use zeroize::Zeroizing;

use crate::clock::RandomSource;
use crate::errors::ServerError;

/// HKDF extraction salt, fixed per middleware.
const PROTECTION_SALT: &[u8] = b"margaux-oidc-server.data-protection";

/// Root of the data-protection key hierarchy.
pub struct DataProtector {
    master_key: Zeroizing<[u8; 32]>,
}

impl DataProtector {
    #[must_use]
    pub fn new(master_key: [u8; 32]) -> Self {
        Self {
            master_key: Zeroizing::new(master_key),
        }
    }

    /// Derive a protector bound to the given purpose tuple.
    ///
    /// # Errors
    /// Returns an error if key derivation fails.
    pub fn create(&self, purposes: &[&str]) -> Result<TicketProtector, ServerError> {
        let info: Vec<&[u8]> = purposes.iter().map(|purpose| purpose.as_bytes()).collect();

        let prk = Salt::new(HKDF_SHA256, PROTECTION_SALT).extract(self.master_key.as_ref());
        let okm = prk
            .expand(&info, HKDF_SHA256)
            .map_err(|_| ServerError::Crypto("HKDF expansion failed".to_owned()))?;

        let mut derived = Zeroizing::new([0u8; 32]);
        okm.fill(derived.as_mut())
            .map_err(|_| ServerError::Crypto("HKDF output fill failed".to_owned()))?;

        let unbound = UnboundKey::new(&CHACHA20_POLY1305, derived.as_ref())
            .map_err(|_| ServerError::Crypto("AEAD key construction failed".to_owned()))?;

        Ok(TicketProtector {
            key: LessSafeKey::new(unbound),
        })
    }
}

/// Seals and opens payloads for a single purpose tuple.
pub struct TicketProtector {
    key: LessSafeKey,
}

impl TicketProtector {
    /// Seal a payload: random 96-bit nonce, ciphertext, tag, base64url.
    ///
    /// # Errors
    /// Returns an error if the RNG or the seal operation fails.
    pub fn protect(
        &self,
        rng: &dyn RandomSource,
        plaintext: &[u8],
    ) -> Result<String, ServerError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| ServerError::Crypto("AEAD seal failed".to_owned()))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + in_out.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&in_out);
        Ok(URL_SAFE_NO_PAD.encode(envelope))
    }

    /// Open a sealed payload. Any tampering or key mismatch yields `None`.
    #[must_use]
    pub fn unprotect(&self, protected: &str) -> Option<Vec<u8>> {
        let envelope = URL_SAFE_NO_PAD.decode(protected).ok()?;
        if envelope.len() <= NONCE_LEN {
            return None;
        }

        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).ok()?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self.key.open_in_place(nonce, Aad::empty(), &mut in_out).ok()?;
        Some(plaintext.to_vec())
    }
}
