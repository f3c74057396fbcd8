// ABOUTME: Token endpoint state machine — client authentication, grant dispatch, issuance
// ABOUTME: One-shot code redemption with constant-time client and redirect_uri verification
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Token Endpoint
//!
//! Grant dispatch is decided solely by the `grant_type` parameter. Each arm
//! resolves an [`AuthenticationTicket`] — from the code cache, the refresh
//! token, or a provider grant hook — then the shared issuance tail resets the
//! ticket's window, runs the `token_endpoint` hook, mints the tokens, runs
//! `token_endpoint_response`, and writes the JSON body with no-cache headers.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use subtle::ConstantTimeEq;

use super::response::{error_json, json_response, server_error_json};
use crate::clock::truncate_to_seconds;
use crate::config::ServerOptions;
use crate::constants::oauth::{grant_types, token_types};
use crate::errors::ProtocolError;
use crate::message::OidcMessage;
use crate::middleware::RequestDisposition;
use crate::provider::context::{
    GrantAuthorizationCode, GrantClientCredentials, GrantCustomExtension, GrantRefreshToken,
    GrantResourceOwnerCredentials, TokenEndpoint, TokenEndpointResponse,
    ValidateClientAuthentication,
};
use crate::provider::EventContext;
use crate::ticket::{properties, AuthenticationTicket};
use crate::tokens::TokenService;

pub(crate) async fn invoke(
    options: Arc<ServerOptions>,
    request: Request<Bytes>,
) -> RequestDisposition {
    if request.method() != Method::POST || !super::has_form_content_type(&request) {
        tracing::debug!(method = %request.method(), "rejecting token request shape");
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
            "The token endpoint only accepts form-urlencoded POST requests.",
        )));
    }

    let message = OidcMessage::from_urlencoded(request.body());

    // One clock snapshot per exchange keeps every issuance timestamp in the
    // response consistent.
    let now = truncate_to_seconds(options.clock.now());

    // Client credentials come from the form body or a Basic header.
    let (client_id, client_secret) = match super::basic_credentials(&request) {
        Some((id, secret)) => (Some(id), Some(secret)),
        None => (
            message.client_id().map(str::to_owned),
            message.client_secret().map(str::to_owned),
        ),
    };

    let mut authentication = EventContext::new(
        options.clone(),
        ValidateClientAuthentication {
            request: message.clone(),
            client_id,
            client_secret,
        },
    );
    options
        .provider
        .validate_client_authentication(&mut authentication)
        .await;
    if let Some(response) = authentication.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if authentication.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }
    if !authentication.outcome.is_validated() {
        let error = authentication
            .outcome
            .error_or(ProtocolError::invalid_client("Client authentication failed."));
        tracing::info!(
            client_id = message.client_id().unwrap_or_default(),
            "token request failed client authentication"
        );
        return RequestDisposition::Response(error_json(&error));
    }
    let client_id = authentication.payload.client_id;

    let ticket = match resolve_grant(&options, &message, client_id.as_deref(), now).await {
        Ok(GrantResolution::Ticket(ticket)) => ticket,
        Ok(GrantResolution::Handled(disposition)) => return disposition,
        Err(error) => return RequestDisposition::Response(error_json(&error)),
    };

    issue(&options, &message, client_id.as_deref(), ticket, now).await
}

/// Outcome of the grant-specific ticket resolution.
enum GrantResolution {
    Ticket(AuthenticationTicket),
    Handled(RequestDisposition),
}

async fn resolve_grant(
    options: &Arc<ServerOptions>,
    message: &OidcMessage,
    client_id: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<GrantResolution, ProtocolError> {
    let service = TokenService::new(options.clone());

    match message.grant_type().filter(|value| !value.is_empty()) {
        Some(grant_types::AUTHORIZATION_CODE) => {
            let code = message.code().ok_or_else(|| {
                ProtocolError::invalid_request("code parameter missing.")
            })?;

            // The cache entry is removed on lookup whether or not the checks
            // below pass: authorization codes are single-use.
            let ticket = service
                .receive_authorization_code(code)
                .await
                .ok_or_else(|| ProtocolError::invalid_grant("Invalid authorization code."))?;

            if ticket.is_expired(now) {
                return Err(ProtocolError::invalid_grant("Expired authorization code."));
            }

            let stored_client = ticket.properties.get(properties::CLIENT_ID);
            if !constant_time_matches(stored_client, client_id) {
                tracing::info!("authorization code presented by a different client");
                return Err(ProtocolError::invalid_grant(
                    "The authorization code was issued to another client.",
                ));
            }

            if let Some(stored_redirect) = ticket.properties.get(properties::REDIRECT_URI) {
                if message.redirect_uri() != Some(stored_redirect) {
                    return Err(ProtocolError::invalid_grant(
                        "The redirect_uri does not match the authorization request.",
                    ));
                }
            }

            let mut grant = EventContext::new(
                options.clone(),
                GrantAuthorizationCode {
                    request: message.clone(),
                    ticket,
                },
            );
            options.provider.grant_authorization_code(&mut grant).await;
            if let Some(response) = grant.outcome.take_response() {
                return Ok(GrantResolution::Handled(RequestDisposition::Response(response)));
            }
            if !grant.outcome.is_validated() {
                return Err(grant
                    .outcome
                    .error_or(ProtocolError::invalid_grant("The authorization code grant was rejected.")));
            }
            Ok(GrantResolution::Ticket(grant.payload.ticket))
        }

        Some(grant_types::PASSWORD) => {
            let mut grant = EventContext::new(
                options.clone(),
                GrantResourceOwnerCredentials {
                    request: message.clone(),
                    ticket: None,
                },
            );
            options
                .provider
                .grant_resource_owner_credentials(&mut grant)
                .await;
            if let Some(response) = grant.outcome.take_response() {
                return Ok(GrantResolution::Handled(RequestDisposition::Response(response)));
            }
            if !grant.outcome.is_validated() {
                return Err(grant
                    .outcome
                    .error_or(ProtocolError::invalid_grant("Resource owner credentials are invalid.")));
            }
            grant
                .payload
                .ticket
                .map(GrantResolution::Ticket)
                .ok_or_else(|| {
                    ProtocolError::invalid_grant("Resource owner credentials are invalid.")
                })
        }

        Some(grant_types::CLIENT_CREDENTIALS) => {
            let mut grant = EventContext::new(
                options.clone(),
                GrantClientCredentials {
                    request: message.clone(),
                    ticket: None,
                },
            );
            options.provider.grant_client_credentials(&mut grant).await;
            if let Some(response) = grant.outcome.take_response() {
                return Ok(GrantResolution::Handled(RequestDisposition::Response(response)));
            }
            if !grant.outcome.is_validated() {
                return Err(grant
                    .outcome
                    .error_or(ProtocolError::unauthorized_client("The client credentials grant was rejected.")));
            }
            grant
                .payload
                .ticket
                .map(GrantResolution::Ticket)
                .ok_or_else(|| {
                    ProtocolError::unauthorized_client("The client credentials grant was rejected.")
                })
        }

        Some(grant_types::REFRESH_TOKEN) => {
            let refresh_token = message.refresh_token().ok_or_else(|| {
                ProtocolError::invalid_request("refresh_token parameter missing.")
            })?;

            let ticket = service
                .receive_refresh_token(refresh_token)
                .await
                .ok_or_else(|| ProtocolError::invalid_grant("Invalid refresh token."))?;

            if ticket.is_expired(now) {
                return Err(ProtocolError::invalid_grant("Expired refresh token."));
            }

            let mut grant = EventContext::new(
                options.clone(),
                GrantRefreshToken {
                    request: message.clone(),
                    ticket,
                },
            );
            options.provider.grant_refresh_token(&mut grant).await;
            if let Some(response) = grant.outcome.take_response() {
                return Ok(GrantResolution::Handled(RequestDisposition::Response(response)));
            }
            if !grant.outcome.is_validated() {
                return Err(grant
                    .outcome
                    .error_or(ProtocolError::invalid_grant("The refresh token grant was rejected.")));
            }
            Ok(GrantResolution::Ticket(grant.payload.ticket))
        }

        Some(custom) => {
            tracing::debug!(grant_type = custom, "dispatching custom grant extension");
            let mut grant = EventContext::new(
                options.clone(),
                GrantCustomExtension {
                    request: message.clone(),
                    ticket: None,
                },
            );
            options.provider.grant_custom_extension(&mut grant).await;
            if let Some(response) = grant.outcome.take_response() {
                return Ok(GrantResolution::Handled(RequestDisposition::Response(response)));
            }
            if !grant.outcome.is_validated() {
                return Err(grant
                    .outcome
                    .error_or(ProtocolError::unsupported_grant_type("The grant type is not supported.")));
            }
            grant
                .payload
                .ticket
                .map(GrantResolution::Ticket)
                .ok_or_else(|| {
                    ProtocolError::unsupported_grant_type("The grant type is not supported.")
                })
        }

        None => Err(ProtocolError::unsupported_grant_type(
            "grant_type parameter missing.",
        )),
    }
}

async fn issue(
    options: &Arc<ServerOptions>,
    message: &OidcMessage,
    client_id: Option<&str>,
    mut ticket: AuthenticationTicket,
    now: chrono::DateTime<chrono::Utc>,
) -> RequestDisposition {
    ticket.properties.issued_utc = Some(now);
    ticket.properties.expires_utc = Some(now + options.access_token_lifetime);

    // Provider-created tickets may not have recorded the client yet; the
    // identity token audience and userinfo presenters need it.
    if let Some(client_id) = client_id {
        if ticket.properties.get(properties::CLIENT_ID).is_none() {
            ticket.properties.set(properties::CLIENT_ID, client_id);
        }
        if ticket.properties.get(properties::PRESENTERS).is_none() {
            ticket.properties.set(properties::PRESENTERS, client_id);
        }
    }

    let mut endpoint = EventContext::new(
        options.clone(),
        TokenEndpoint {
            request: message.clone(),
            ticket,
        },
    );
    options.provider.token_endpoint(&mut endpoint).await;
    if let Some(response) = endpoint.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    let ticket = endpoint.payload.ticket;

    let service = TokenService::new(options.clone());
    let mut response = OidcMessage::new();
    response.set_token_type(token_types::BEARER);

    match service.create_access_token(message, &response, &ticket).await {
        Ok(token) => response.set_access_token(&token),
        Err(error) => {
            tracing::error!("access token creation failed: {error}");
            return RequestDisposition::Response(server_error_json(
                "The access token could not be created.",
            ));
        }
    }

    match service
        .create_identity_token(message, &response, &ticket)
        .await
    {
        Ok(token) => response.set_id_token(&token),
        Err(error) => {
            tracing::error!("identity token creation failed: {error}");
            return RequestDisposition::Response(server_error_json(
                "The identity token could not be created.",
            ));
        }
    }

    // Refresh-based grants only rotate the refresh token under sliding
    // expiration; every other grant always gets one.
    let refresh_based = message.grant_type() == Some(grant_types::REFRESH_TOKEN);
    if !refresh_based || options.use_sliding_expiration {
        match service.create_refresh_token(message, &response, &ticket).await {
            Ok(token) => response.set_refresh_token(&token),
            Err(error) => {
                tracing::error!("refresh token creation failed: {error}");
                return RequestDisposition::Response(server_error_json(
                    "The refresh token could not be created.",
                ));
            }
        }
    }

    let expires_in = ticket
        .properties
        .expires_utc
        .zip(ticket.properties.issued_utc)
        .map_or(options.access_token_lifetime.num_seconds(), |(expires, issued)| {
            (expires - issued).num_seconds()
        });
    response.set_expires_in(&expires_in.to_string());

    let mut finish = EventContext::new(
        options.clone(),
        TokenEndpointResponse {
            request: message.clone(),
            response,
        },
    );
    options.provider.token_endpoint_response(&mut finish).await;
    if let Some(response) = finish.outcome.take_response() {
        return RequestDisposition::Response(response);
    }

    RequestDisposition::Response(json_response(
        StatusCode::OK,
        &finish.payload.response.to_json(),
    ))
}

/// Constant-time equality over two optional client identifiers; absent values
/// never match.
fn constant_time_matches(stored: Option<&str>, presented: Option<&str>) -> bool {
    match (stored, presented) {
        (Some(stored), Some(presented)) => {
            stored.as_bytes().ct_eq(presented.as_bytes()).into()
        }
        _ => false,
    }
}
