// ABOUTME: Token service — creates and consumes access, identity, refresh tokens and authorization codes
// ABOUTME: Filters claims by destination and branches between signed JWTs and opaque protected tickets
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Token Service
//!
//! The four creators share one skeleton: clone the ticket, stamp the issuance
//! window from the relevant lifetime, fire the `create_*` hook (which may
//! replace the ticket or short-circuit with a precomputed token), then run the
//! default serialization. The receivers mirror it: `receive_*` hooks may
//! supply the ticket directly, otherwise the cache or the protected payload is
//! consulted. Any consumption failure collapses to `None`, which the token
//! endpoint maps onto the grant-specific default error.

pub mod serializer;

pub use serializer::TicketFormat;

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, Header};
use serde_json::{Map, Number, Value};

use crate::clock::truncate_to_seconds;
use crate::config::ServerOptions;
use crate::constants::oauth::claims;
use crate::crypto::{algorithms, left_half_hash, SigningCredentials};
use crate::errors::ServerError;
use crate::message::OidcMessage;
use crate::provider::context::{
    CreateAccessToken, CreateAuthorizationCode, CreateIdentityToken, CreateRefreshToken,
    ReceiveAccessToken, ReceiveAuthorizationCode, ReceiveRefreshToken,
};
use crate::provider::EventContext;
use crate::ticket::{claim_types, destinations, properties, AuthenticationTicket, Claim};

/// Byte length of authorization-code cache keys (256 bits).
const CODE_KEY_LEN: usize = 32;

/// Token creation and consumption on top of the frozen options.
pub(crate) struct TokenService {
    options: Arc<ServerOptions>,
}

impl TokenService {
    pub(crate) fn new(options: Arc<ServerOptions>) -> Self {
        Self { options }
    }

    /// Mint an access token: JWT when configured, opaque ticket otherwise.
    pub(crate) async fn create_access_token(
        &self,
        request: &OidcMessage,
        response: &OidcMessage,
        ticket: &AuthenticationTicket,
    ) -> Result<String, ServerError> {
        let mut ticket = ticket.clone();
        self.stamp(&mut ticket, self.options.access_token_lifetime);

        let mut context = EventContext::new(
            self.options.clone(),
            CreateAccessToken {
                request: request.clone(),
                response: response.clone(),
                ticket,
                token: None,
            },
        );
        self.options.provider.create_access_token(&mut context).await;
        if let Some(token) = context.payload.token {
            return Ok(token);
        }

        let mut ticket = context.payload.ticket;
        self.filter_access_token_claims(&mut ticket);

        if self.options.use_jwt_access_tokens {
            self.sign_access_token_jwt(request, &ticket)
        } else {
            self.options
                .access_token_format
                .protect(self.options.rng.as_ref(), &ticket)
        }
    }

    /// Mint a signed identity token. Requires signing credentials.
    pub(crate) async fn create_identity_token(
        &self,
        request: &OidcMessage,
        response: &OidcMessage,
        ticket: &AuthenticationTicket,
    ) -> Result<String, ServerError> {
        let credentials = self
            .options
            .signing_credentials
            .first()
            .ok_or(ServerError::MissingSigningCredentials)?;

        let mut ticket = ticket.clone();
        self.stamp(&mut ticket, self.options.identity_token_lifetime);

        let mut context = EventContext::new(
            self.options.clone(),
            CreateIdentityToken {
                request: request.clone(),
                response: response.clone(),
                ticket,
                token: None,
            },
        );
        self.options
            .provider
            .create_identity_token(&mut context)
            .await;
        if let Some(token) = context.payload.token {
            return Ok(token);
        }

        let ticket = context.payload.ticket;
        let mut payload = Map::new();

        for claim in &ticket.identity.claims {
            let always = claim.claim_type == claim_types::SUBJECT
                || claim.claim_type == claim_types::NAME_IDENTIFIER;
            if always || claim.has_destination(destinations::IDENTITY_TOKEN) {
                insert_claim(&mut payload, claim);
            }
        }

        // Synthesize `sub` from the name identifier when the identity carries
        // no subject claim of its own.
        if !payload.contains_key(claims::SUBJECT) {
            let subject = ticket
                .identity
                .subject()
                .ok_or(ServerError::MissingSubject)?;
            payload.insert(
                claims::SUBJECT.to_owned(),
                Value::String(subject.to_owned()),
            );
        }
        payload.remove(claim_types::NAME_IDENTIFIER);

        let issued = ticket
            .properties
            .issued_utc
            .unwrap_or_else(|| truncate_to_seconds(self.options.clock.now()));
        let expires = ticket
            .properties
            .expires_utc
            .unwrap_or(issued + self.options.identity_token_lifetime);

        payload.insert(
            claims::ISSUER.to_owned(),
            Value::String(self.options.issuer_with_trailing_slash()),
        );
        payload.insert(
            claims::ISSUED_AT.to_owned(),
            Value::Number(Number::from(issued.timestamp())),
        );
        payload.insert(
            claims::NOT_BEFORE.to_owned(),
            Value::Number(Number::from(issued.timestamp())),
        );
        payload.insert(
            claims::EXPIRATION.to_owned(),
            Value::Number(Number::from(expires.timestamp())),
        );

        let audience = request
            .client_id()
            .or_else(|| ticket.properties.get(properties::CLIENT_ID));
        if let Some(audience) = audience {
            payload.insert(claims::AUDIENCE.to_owned(), Value::String(audience.to_owned()));
        }

        let nonce = request
            .nonce()
            .or_else(|| ticket.properties.get(properties::NONCE));
        if let Some(nonce) = nonce {
            payload.insert(claims::NONCE.to_owned(), Value::String(nonce.to_owned()));
        }

        if let Some(code) = response.code() {
            payload.insert(
                claims::C_HASH.to_owned(),
                Value::String(left_half_hash(&credentials.algorithm, code)?),
            );
        }
        if let Some(access_token) = response.access_token() {
            payload.insert(
                claims::AT_HASH.to_owned(),
                Value::String(left_half_hash(&credentials.algorithm, access_token)?),
            );
        }

        sign_jwt(credentials, &Value::Object(payload))
    }

    /// Mint an opaque refresh token. Claims are not filtered.
    pub(crate) async fn create_refresh_token(
        &self,
        request: &OidcMessage,
        response: &OidcMessage,
        ticket: &AuthenticationTicket,
    ) -> Result<String, ServerError> {
        let mut ticket = ticket.clone();
        self.stamp(&mut ticket, self.options.refresh_token_lifetime);

        let mut context = EventContext::new(
            self.options.clone(),
            CreateRefreshToken {
                request: request.clone(),
                response: response.clone(),
                ticket,
                token: None,
            },
        );
        self.options
            .provider
            .create_refresh_token(&mut context)
            .await;
        if let Some(token) = context.payload.token {
            return Ok(token);
        }

        self.options
            .refresh_token_format
            .protect(self.options.rng.as_ref(), &context.payload.ticket)
    }

    /// Mint an authorization code: protect the ticket, store it in the cache
    /// under a random 256-bit base64url key, hand the key to the client.
    pub(crate) async fn create_authorization_code(
        &self,
        request: &OidcMessage,
        response: &OidcMessage,
        ticket: &AuthenticationTicket,
    ) -> Result<String, ServerError> {
        if self.options.token_endpoint_path.is_none() {
            return Err(ServerError::TokenEndpointDisabled);
        }

        let mut ticket = ticket.clone();
        self.stamp(&mut ticket, self.options.authorization_code_lifetime);

        let mut context = EventContext::new(
            self.options.clone(),
            CreateAuthorizationCode {
                request: request.clone(),
                response: response.clone(),
                ticket,
                token: None,
            },
        );
        self.options
            .provider
            .create_authorization_code(&mut context)
            .await;
        if let Some(token) = context.payload.token {
            return Ok(token);
        }

        let payload = self
            .options
            .authorization_code_format
            .protect(self.options.rng.as_ref(), &context.payload.ticket)?;

        let mut key_bytes = [0u8; CODE_KEY_LEN];
        self.options.rng.fill(&mut key_bytes)?;
        let key = URL_SAFE_NO_PAD.encode(key_bytes);

        let ttl = self
            .options
            .authorization_code_lifetime
            .to_std()
            .map_err(|_| ServerError::Cache("negative authorization code lifetime".to_owned()))?;
        self.options.cache.set(&key, payload.as_bytes(), ttl).await?;

        Ok(key)
    }

    /// Resolve an access token back into a ticket. In JWT mode the provider
    /// hook is the only path — the default handles opaque tickets.
    pub(crate) async fn receive_access_token(&self, token: &str) -> Option<AuthenticationTicket> {
        let mut context = EventContext::new(
            self.options.clone(),
            ReceiveAccessToken {
                token: token.to_owned(),
                ticket: None,
            },
        );
        self.options
            .provider
            .receive_access_token(&mut context)
            .await;
        if context.payload.ticket.is_some() {
            return context.payload.ticket;
        }

        self.options.access_token_format.unprotect(token)
    }

    /// Redeem an authorization code. The cache entry is atomically removed on
    /// lookup: codes are single-use whether or not later checks pass.
    pub(crate) async fn receive_authorization_code(
        &self,
        code: &str,
    ) -> Option<AuthenticationTicket> {
        let mut context = EventContext::new(
            self.options.clone(),
            ReceiveAuthorizationCode {
                token: code.to_owned(),
                ticket: None,
            },
        );
        self.options
            .provider
            .receive_authorization_code(&mut context)
            .await;
        if context.payload.ticket.is_some() {
            return context.payload.ticket;
        }

        let payload = match self.options.cache.take(code).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(error) => {
                tracing::error!("authorization code lookup failed: {error}");
                return None;
            }
        };

        let payload = String::from_utf8(payload).ok()?;
        self.options.authorization_code_format.unprotect(&payload)
    }

    /// Resolve a refresh token back into a ticket.
    pub(crate) async fn receive_refresh_token(&self, token: &str) -> Option<AuthenticationTicket> {
        let mut context = EventContext::new(
            self.options.clone(),
            ReceiveRefreshToken {
                token: token.to_owned(),
                ticket: None,
            },
        );
        self.options
            .provider
            .receive_refresh_token(&mut context)
            .await;
        if context.payload.ticket.is_some() {
            return context.payload.ticket;
        }

        self.options.refresh_token_format.unprotect(token)
    }

    fn stamp(&self, ticket: &mut AuthenticationTicket, lifetime: chrono::Duration) {
        let now = truncate_to_seconds(self.options.clock.now());
        ticket.properties.issued_utc = Some(now);
        ticket.properties.expires_utc = Some(now + lifetime);
    }

    /// Destination filter for access tokens. `sub` and the name identifier are
    /// always kept. With JWT emission and no encryption credentials the token
    /// is readable by anyone, so claims must opt in via a `token` destination;
    /// opaque (or encrypted) tokens also keep claims with no declared
    /// destination.
    fn filter_access_token_claims(&self, ticket: &mut AuthenticationTicket) {
        let confidential =
            !self.options.use_jwt_access_tokens || !self.options.encryption_credentials.is_empty();

        ticket.identity.claims.retain(|claim| {
            if claim.claim_type == claim_types::SUBJECT
                || claim.claim_type == claim_types::NAME_IDENTIFIER
            {
                return true;
            }
            let declared = claim.destinations();
            if declared.is_empty() {
                confidential
            } else {
                declared.contains(&destinations::ACCESS_TOKEN)
            }
        });
    }

    fn sign_access_token_jwt(
        &self,
        request: &OidcMessage,
        ticket: &AuthenticationTicket,
    ) -> Result<String, ServerError> {
        let credentials = self
            .options
            .signing_credentials
            .first()
            .ok_or(ServerError::MissingSigningCredentials)?;

        let mut payload = Map::new();
        for claim in &ticket.identity.claims {
            insert_claim(&mut payload, claim);
        }
        payload.remove(claim_types::NAME_IDENTIFIER);
        if !payload.contains_key(claims::SUBJECT) {
            if let Some(subject) = ticket.identity.subject() {
                payload.insert(
                    claims::SUBJECT.to_owned(),
                    Value::String(subject.to_owned()),
                );
            }
        }

        payload.insert(
            claims::ISSUER.to_owned(),
            Value::String(self.options.issuer_with_trailing_slash()),
        );

        let resources = request.resources();
        match resources.len() {
            0 => {}
            1 => {
                payload.insert(
                    claims::AUDIENCE.to_owned(),
                    Value::String(resources[0].to_owned()),
                );
            }
            _ => {
                payload.insert(
                    claims::AUDIENCE.to_owned(),
                    Value::Array(
                        resources
                            .iter()
                            .map(|resource| Value::String((*resource).to_owned()))
                            .collect(),
                    ),
                );
            }
        }

        if let Some(issued) = ticket.properties.issued_utc {
            payload.insert(
                claims::ISSUED_AT.to_owned(),
                Value::Number(Number::from(issued.timestamp())),
            );
            payload.insert(
                claims::NOT_BEFORE.to_owned(),
                Value::Number(Number::from(issued.timestamp())),
            );
        }
        if let Some(expires) = ticket.properties.expires_utc {
            payload.insert(
                claims::EXPIRATION.to_owned(),
                Value::Number(Number::from(expires.timestamp())),
            );
        }

        sign_jwt(credentials, &Value::Object(payload))
    }
}

/// Insert a claim into a JWT payload, widening to an array on repeats.
fn insert_claim(payload: &mut Map<String, Value>, claim: &Claim) {
    let value = Value::String(claim.value.clone());
    match payload.get_mut(&claim.claim_type) {
        None => {
            payload.insert(claim.claim_type.clone(), value);
        }
        Some(Value::Array(existing)) => existing.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn jwt_algorithm(name: &str) -> Result<Algorithm, ServerError> {
    match name {
        algorithms::RS256 => Ok(Algorithm::RS256),
        algorithms::RS384 => Ok(Algorithm::RS384),
        algorithms::RS512 => Ok(Algorithm::RS512),
        other => Err(ServerError::UnsupportedAlgorithm(other.to_owned())),
    }
}

fn sign_jwt(credentials: &SigningCredentials, payload: &Value) -> Result<String, ServerError> {
    let mut header = Header::new(jwt_algorithm(&credentials.algorithm)?);
    header.kid = Some(credentials.key.kid.clone());

    let key = credentials.key.encoding_key()?;
    jsonwebtoken::encode(&header, payload, &key)
        .map_err(|e| ServerError::Crypto(format!("JWT signing failed: {e}")))
}
