// ABOUTME: Notification contexts carrying the uniform before/after decision object
// ABOUTME: One generic context wrapper plus one payload struct per provider event
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Notification Contexts
//!
//! Every provider hook receives an [`EventContext`] wrapping an event-specific
//! payload and a shared [`Outcome`]. The outcome carries the four decision
//! bits — `validated`, `rejected`, `handled_response`, `skipped` — plus
//! `request_completed` and the protocol error triple. Handlers evaluate
//! handled-response first, then skipped, then rejected/validated.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::Bytes;
use http::Response;
use serde_json::{Map, Value};

use crate::config::ServerOptions;
use crate::crypto::JsonWebKey;
use crate::errors::ProtocolError;
use crate::message::OidcMessage;
use crate::ticket::AuthenticationTicket;

/// Protocol endpoints the dispatcher can classify a request as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Authorization,
    Configuration,
    Cryptography,
    Token,
    Userinfo,
    Introspection,
    Revocation,
    Logout,
}

/// Decision state shared by every notification.
#[derive(Debug, Default)]
pub struct Outcome {
    validated: bool,
    rejected: bool,
    error: Option<ProtocolError>,
    response: Option<Response<Bytes>>,
    skipped: bool,
    request_completed: bool,
}

impl Outcome {
    /// Mark the logical check as passed; processing continues.
    pub fn validate(&mut self) {
        self.validated = true;
        self.rejected = false;
    }

    /// Mark the check as failed, surfacing the error triple.
    pub fn reject(&mut self, error: ProtocolError) {
        self.rejected = true;
        self.validated = false;
        self.error = Some(error);
    }

    /// Record that the hook already produced the HTTP response; the handler
    /// exits without writing.
    pub fn handle_response(&mut self, response: Response<Bytes>) {
        self.response = Some(response);
    }

    /// Stop the default pipeline and yield to the next HTTP middleware.
    pub fn skip(&mut self) {
        self.skipped = true;
    }

    /// The application has taken over the request entirely.
    pub fn complete_request(&mut self) {
        self.request_completed = true;
    }

    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    #[must_use]
    pub fn is_request_completed(&self) -> bool {
        self.request_completed
    }

    #[must_use]
    pub fn has_handled_response(&self) -> bool {
        self.response.is_some()
    }

    /// Take the hook-provided response, leaving the outcome empty.
    pub fn take_response(&mut self) -> Option<Response<Bytes>> {
        self.response.take()
    }

    #[must_use]
    pub fn error(&self) -> Option<&ProtocolError> {
        self.error.as_ref()
    }

    /// The recorded error, or `fallback` when the hook rejected silently.
    #[must_use]
    pub fn error_or(&self, fallback: ProtocolError) -> ProtocolError {
        self.error.clone().unwrap_or(fallback)
    }
}

/// Generic notification: frozen options, event payload, decision outcome.
pub struct EventContext<T> {
    pub options: Arc<ServerOptions>,
    pub payload: T,
    pub outcome: Outcome,
}

impl<T> EventContext<T> {
    #[must_use]
    pub fn new(options: Arc<ServerOptions>, payload: T) -> Self {
        Self {
            options,
            payload,
            outcome: Outcome::default(),
        }
    }
}

impl<T> Deref for EventContext<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.payload
    }
}

impl<T> DerefMut for EventContext<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.payload
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────────

/// Endpoint classification, overridable by the provider.
#[derive(Debug)]
pub struct MatchEndpoint {
    /// `None` passes the request to the next pipeline stage.
    pub endpoint: Option<Endpoint>,
}

// ── Configuration endpoint ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ValidateConfigurationRequest;

/// Carries the assembled metadata document for the provider to extend or
/// rewrite before emission.
#[derive(Debug)]
pub struct HandleConfigurationRequest {
    pub metadata: Map<String, Value>,
}

#[derive(Debug)]
pub struct ApplyConfigurationResponse {
    pub metadata: Map<String, Value>,
}

// ── Cryptography (JWKS) endpoint ────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ValidateCryptographyRequest;

#[derive(Debug)]
pub struct HandleCryptographyRequest {
    pub keys: Vec<JsonWebKey>,
}

#[derive(Debug)]
pub struct ApplyCryptographyResponse {
    pub keys: Vec<JsonWebKey>,
}

// ── Authorization endpoint ──────────────────────────────────────────────

/// Client/redirect_uri trust decision. Leaving the context unvalidated clears
/// the stored `redirect_uri` and routes errors to the error page.
#[derive(Debug)]
pub struct ValidateClientRedirectUri {
    pub request: OidcMessage,
}

#[derive(Debug)]
pub struct ValidateAuthorizationRequest {
    pub request: OidcMessage,
}

/// Interactive handoff point. The provider either signs in a ticket, takes
/// over the request, or leaves both untouched to let the inner pipeline
/// render its sign-in UI.
#[derive(Debug)]
pub struct HandleAuthorizationRequest {
    pub request: OidcMessage,
    pub ticket: Option<AuthenticationTicket>,
}

impl HandleAuthorizationRequest {
    /// Attach the sign-in grant the response teardown will serialize.
    pub fn sign_in(&mut self, ticket: AuthenticationTicket) {
        self.ticket = Some(ticket);
    }
}

#[derive(Debug)]
pub struct ApplyAuthorizationResponse {
    pub request: OidcMessage,
    pub response: OidcMessage,
}

// ── Token endpoint ──────────────────────────────────────────────────────

/// Client authentication for the token endpoint. `client_id`/`client_secret`
/// are pre-extracted from the form body or the Basic authorization header.
#[derive(Debug)]
pub struct ValidateClientAuthentication {
    pub request: OidcMessage,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Fires after one-shot code redemption with the recovered ticket. Validated
/// by default; reject to veto the exchange.
#[derive(Debug)]
pub struct GrantAuthorizationCode {
    pub request: OidcMessage,
    pub ticket: AuthenticationTicket,
}

#[derive(Debug)]
pub struct GrantResourceOwnerCredentials {
    pub request: OidcMessage,
    pub ticket: Option<AuthenticationTicket>,
}

#[derive(Debug)]
pub struct GrantClientCredentials {
    pub request: OidcMessage,
    pub ticket: Option<AuthenticationTicket>,
}

/// Fires after refresh-token deserialization. Validated by default.
#[derive(Debug)]
pub struct GrantRefreshToken {
    pub request: OidcMessage,
    pub ticket: AuthenticationTicket,
}

#[derive(Debug)]
pub struct GrantCustomExtension {
    pub request: OidcMessage,
    pub ticket: Option<AuthenticationTicket>,
}

/// Last look at the ticket before tokens are minted.
#[derive(Debug)]
pub struct TokenEndpoint {
    pub request: OidcMessage,
    pub ticket: AuthenticationTicket,
}

#[derive(Debug)]
pub struct TokenEndpointResponse {
    pub request: OidcMessage,
    pub response: OidcMessage,
}

// ── Userinfo endpoint ───────────────────────────────────────────────────

#[derive(Debug)]
pub struct ValidateUserinfoRequest {
    pub request: OidcMessage,
}

/// Carries the claims document under assembly; `sub` must survive the hooks.
#[derive(Debug)]
pub struct HandleUserinfoRequest {
    pub ticket: AuthenticationTicket,
    pub claims: Map<String, Value>,
}

#[derive(Debug)]
pub struct ApplyUserinfoResponse {
    pub claims: Map<String, Value>,
}

// ── Introspection endpoint ──────────────────────────────────────────────

#[derive(Debug)]
pub struct ValidateIntrospectionRequest {
    pub request: OidcMessage,
}

#[derive(Debug)]
pub struct HandleIntrospectionRequest {
    pub ticket: Option<AuthenticationTicket>,
    pub payload: Map<String, Value>,
}

#[derive(Debug)]
pub struct ApplyIntrospectionResponse {
    pub payload: Map<String, Value>,
}

// ── Revocation endpoint ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct ValidateRevocationRequest {
    pub request: OidcMessage,
}

#[derive(Debug)]
pub struct HandleRevocationRequest {
    pub request: OidcMessage,
    /// Whether the default pipeline found and discarded the token.
    pub revoked: bool,
}

#[derive(Debug, Default)]
pub struct ApplyRevocationResponse;

// ── Logout endpoint ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ValidateLogoutRequest {
    pub request: OidcMessage,
}

#[derive(Debug)]
pub struct HandleLogoutRequest {
    pub request: OidcMessage,
}

#[derive(Debug)]
pub struct ApplyLogoutResponse {
    pub request: OidcMessage,
    pub response: OidcMessage,
}

// ── Token lifecycle ─────────────────────────────────────────────────────

/// Shared shape of the four `create_*` notifications: the hook may replace
/// the ticket or short-circuit default serialization by setting `token`.
#[derive(Debug)]
pub struct CreateAccessToken {
    pub request: OidcMessage,
    pub response: OidcMessage,
    pub ticket: AuthenticationTicket,
    pub token: Option<String>,
}

#[derive(Debug)]
pub struct CreateIdentityToken {
    pub request: OidcMessage,
    pub response: OidcMessage,
    pub ticket: AuthenticationTicket,
    pub token: Option<String>,
}

#[derive(Debug)]
pub struct CreateRefreshToken {
    pub request: OidcMessage,
    pub response: OidcMessage,
    pub ticket: AuthenticationTicket,
    pub token: Option<String>,
}

#[derive(Debug)]
pub struct CreateAuthorizationCode {
    pub request: OidcMessage,
    pub response: OidcMessage,
    pub ticket: AuthenticationTicket,
    pub token: Option<String>,
}

/// Shared shape of the three `receive_*` notifications: the hook may supply
/// the ticket directly, bypassing default deserialization.
#[derive(Debug)]
pub struct ReceiveAccessToken {
    pub token: String,
    pub ticket: Option<AuthenticationTicket>,
}

#[derive(Debug)]
pub struct ReceiveAuthorizationCode {
    pub token: String,
    pub ticket: Option<AuthenticationTicket>,
}

#[derive(Debug)]
pub struct ReceiveRefreshToken {
    pub token: String,
    pub ticket: Option<AuthenticationTicket>,
}
