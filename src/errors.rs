// ABOUTME: Protocol error triples and internal server error types
// ABOUTME: Defines the OAuth/OIDC error surface and the fatal error enum used across modules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Error Handling
//!
//! Two error families live here. [`ProtocolError`] is the OAuth 2.0 / OIDC
//! wire-level error triple `(error, error_description, error_uri)` surfaced to
//! clients through JSON bodies, error redirects, or the error page.
//! [`ServerError`] covers fatal internal conditions — invalid options at
//! construction time, cryptography failures, missing signing credentials —
//! which endpoint handlers translate into `server_error` responses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::oauth::errors;

/// OAuth 2.0 / OIDC protocol error carried inside notification contexts and
/// written to responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI for error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl ProtocolError {
    /// Create an error with an arbitrary code and no description.
    #[must_use]
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: None,
            error_uri: None,
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error: errors::INVALID_REQUEST.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client(description: &str) -> Self {
        Self {
            error: errors::INVALID_CLIENT.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            error: errors::INVALID_GRANT.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `unauthorized_client` error
    #[must_use]
    pub fn unauthorized_client(description: &str) -> Self {
        Self {
            error: errors::UNAUTHORIZED_CLIENT.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type(description: &str) -> Self {
        Self {
            error: errors::UNSUPPORTED_GRANT_TYPE.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type(description: &str) -> Self {
        Self {
            error: errors::UNSUPPORTED_RESPONSE_TYPE.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: &str) -> Self {
        Self {
            error: errors::INVALID_SCOPE.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create a `server_error` error
    #[must_use]
    pub fn server_error(description: &str) -> Self {
        Self {
            error: errors::SERVER_ERROR.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: None,
        }
    }
}

/// Fatal internal errors that cannot be expressed as protocol errors.
///
/// Options violations surface at construction time; the remaining variants are
/// reported per request as `server_error` with HTTP 500.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Server options failed eager validation
    #[error("invalid server options: {0}")]
    Options(String),

    /// Key material or AEAD operation failed
    #[error("cryptography failure: {0}")]
    Crypto(String),

    /// Opaque ticket serialization or protection failed
    #[error("ticket serialization failed: {0}")]
    Serialization(String),

    /// Authorization-code cache operation failed
    #[error("authorization code cache failure: {0}")]
    Cache(String),

    /// An identity token was requested but no signing credentials are configured
    #[error("no signing credentials configured for identity token emission")]
    MissingSigningCredentials,

    /// The signing algorithm has no entry in the digest table
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Neither `sub` nor a name identifier claim is present on the identity
    #[error("no subject claim available for identity token")]
    MissingSubject,

    /// Authorization codes require the token endpoint to be enabled
    #[error("authorization codes cannot be issued while the token endpoint is disabled")]
    TokenEndpointDisabled,

    /// The random number generator failed to produce bytes
    #[error("random number generation failed")]
    RandomSource,
}
