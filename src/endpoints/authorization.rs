// ABOUTME: Authorization endpoint state machine — parse, validate, hand off, tear down, emit
// ABOUTME: Routes failures to error redirects once the redirect_uri is trusted, error pages before
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Authorization Endpoint
//!
//! The state machine runs request parsing, `redirect_uri` trust establishment,
//! response_type/response_mode/consistency validation, the interactive
//! handoff, and finally the response-grant teardown that mints the code,
//! access token, and identity token the response type asked for.
//!
//! Until `validate_client_redirect_uri` marks the context validated, every
//! failure renders through the error page; afterwards failures become
//! protocol-compliant error redirects to the client.

use std::sync::Arc;

use bytes::Bytes;
use http::Request;
use url::Url;

use super::response::{error_page, server_error_json, write_authorization_response};
use crate::config::ServerOptions;
use crate::constants::oauth::{response_modes, response_types, scopes, token_types};
use crate::errors::ProtocolError;
use crate::message::{OidcMessage, OidcRequestExtension};
use crate::middleware::RequestDisposition;
use crate::provider::context::{
    ApplyAuthorizationResponse, HandleAuthorizationRequest, ValidateAuthorizationRequest,
    ValidateClientRedirectUri,
};
use crate::provider::EventContext;
use crate::ticket::{properties, AuthenticationTicket};
use crate::tokens::TokenService;

pub(crate) async fn invoke(
    options: Arc<ServerOptions>,
    mut request: Request<Bytes>,
) -> RequestDisposition {
    let Some(mut message) = super::parse_message(&request) else {
        tracing::debug!(method = %request.method(), "authorization request has an unsupported shape");
        return error_page(
            &options,
            request,
            &ProtocolError::invalid_request(
                "The authorization endpoint only accepts GET requests or form-urlencoded POST requests.",
            ),
        );
    };

    // Validate the redirect_uri shape before asking the provider to trust it.
    if let Some(redirect_uri) = message.redirect_uri() {
        if let Err(error) = check_redirect_uri_shape(&options, redirect_uri) {
            message.remove_redirect_uri();
            stash_request(&mut request, &message);
            return error_page(&options, request, &error);
        }
    }

    let mut client = EventContext::new(
        options.clone(),
        ValidateClientRedirectUri {
            request: message.clone(),
        },
    );
    options
        .provider
        .validate_client_redirect_uri(&mut client)
        .await;
    if let Some(response) = client.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if client.outcome.is_skipped() {
        stash_request(&mut request, &message);
        return RequestDisposition::Continue(request);
    }
    if !client.outcome.is_validated() {
        // Drop the untrusted redirect_uri so later errors land on the error
        // page instead of an attacker-controlled location.
        let error = client
            .outcome
            .error_or(ProtocolError::invalid_client("Client validation failed."));
        tracing::info!(
            client_id = message.client_id().unwrap_or_default(),
            "client validation rejected the authorization request"
        );
        message.remove_redirect_uri();
        stash_request(&mut request, &message);
        return error_page(&options, request, &error);
    }

    // The provider may have supplied the registered redirect_uri for clients
    // that omitted it from the request.
    if message.redirect_uri().is_none() {
        if let Some(redirect_uri) = client.payload.request.redirect_uri() {
            message.set_redirect_uri(redirect_uri);
        }
    }
    stash_request(&mut request, &message);

    // redirect_uri is trusted from here on: failures become error redirects.
    if let Err(error) = validate_request_shape(&options, &message) {
        return emit(&options, &message, error_message(&message, &error)).await;
    }

    let mut validate = EventContext::new(
        options.clone(),
        ValidateAuthorizationRequest {
            request: message.clone(),
        },
    );
    options
        .provider
        .validate_authorization_request(&mut validate)
        .await;
    if let Some(response) = validate.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if validate.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }
    if !validate.outcome.is_validated() {
        let error = validate
            .outcome
            .error_or(ProtocolError::invalid_request("Request validation failed."));
        return emit(&options, &message, error_message(&message, &error)).await;
    }

    let mut handle = EventContext::new(
        options.clone(),
        HandleAuthorizationRequest {
            request: message.clone(),
            ticket: None,
        },
    );
    options
        .provider
        .handle_authorization_request(&mut handle)
        .await;
    if let Some(response) = handle.outcome.take_response() {
        if handle.payload.ticket.is_some() {
            // One-shot guard: the hook already produced the response, so the
            // teardown must not run again on top of it.
            tracing::warn!("sign-in grant discarded: the response was already handled");
        }
        return RequestDisposition::Response(response);
    }
    if handle.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }
    if handle.outcome.is_request_completed() {
        tracing::debug!("authorization request taken over by the application");
        return RequestDisposition::Abandon;
    }

    match handle.payload.ticket {
        Some(ticket) => teardown(&options, &message, ticket).await,
        // No sign-in grant yet: yield to the inner pipeline so the
        // application can render its sign-in or consent UI.
        None => RequestDisposition::Continue(request),
    }
}

/// Build the authorization response from a sign-in grant.
async fn teardown(
    options: &Arc<ServerOptions>,
    message: &OidcMessage,
    mut ticket: AuthenticationTicket,
) -> RequestDisposition {
    record_grant_properties(&mut ticket, message);

    let service = TokenService::new(options.clone());
    let mut response = OidcMessage::new();
    if let Some(state) = message.state() {
        response.set_state(state);
    }

    if message.has_response_type(response_types::CODE) {
        match service
            .create_authorization_code(message, &response, &ticket)
            .await
        {
            Ok(code) => response.set_code(&code),
            Err(error) => {
                tracing::error!("authorization code creation failed: {error}");
                return RequestDisposition::Response(server_error_json(
                    "The authorization code could not be created.",
                ));
            }
        }
    }

    if message.has_response_type(response_types::TOKEN) {
        match service.create_access_token(message, &response, &ticket).await {
            Ok(token) => {
                response.set_access_token(&token);
                response.set_token_type(token_types::BEARER);
                response
                    .set_expires_in(&options.access_token_lifetime.num_seconds().to_string());
            }
            Err(error) => {
                tracing::error!("access token creation failed: {error}");
                return RequestDisposition::Response(server_error_json(
                    "The access token could not be created.",
                ));
            }
        }
    }

    if message.has_response_type(response_types::ID_TOKEN) {
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
    }

    emit(options, message, response).await
}

/// Run the apply hook, then write through the selected response mode.
async fn emit(
    options: &Arc<ServerOptions>,
    message: &OidcMessage,
    response: OidcMessage,
) -> RequestDisposition {
    let mut apply = EventContext::new(
        options.clone(),
        ApplyAuthorizationResponse {
            request: message.clone(),
            response,
        },
    );
    options
        .provider
        .apply_authorization_response(&mut apply)
        .await;
    if let Some(response) = apply.outcome.take_response() {
        return RequestDisposition::Response(response);
    }

    let Some(redirect_uri) = message.redirect_uri() else {
        tracing::error!("authorization response has no redirect_uri to deliver to");
        return RequestDisposition::Response(server_error_json(
            "The authorization response could not be delivered.",
        ));
    };

    let mode = resolve_response_mode(message, &apply.payload.response);
    RequestDisposition::Response(write_authorization_response(
        redirect_uri,
        Some(mode),
        &apply.payload.response,
    ))
}

fn error_message(message: &OidcMessage, error: &ProtocolError) -> OidcMessage {
    let mut response = OidcMessage::new();
    response.set_error(&error.error);
    if let Some(description) = &error.error_description {
        response.set_error_description(description);
    }
    if let Some(uri) = &error.error_uri {
        response.set_error_uri(uri);
    }
    if let Some(state) = message.state() {
        response.set_state(state);
    }
    response
}

fn check_redirect_uri_shape(
    options: &ServerOptions,
    redirect_uri: &str,
) -> Result<(), ProtocolError> {
    let parsed = Url::parse(redirect_uri).map_err(|_| {
        ProtocolError::invalid_request("redirect_uri must be an absolute URI.")
    })?;

    if parsed.fragment().is_some() {
        return Err(ProtocolError::invalid_request(
            "redirect_uri must not contain a fragment.",
        ));
    }

    if parsed.scheme() == "http" && !options.allow_insecure_http {
        return Err(ProtocolError::invalid_request(
            "redirect_uri must use HTTPS.",
        ));
    }

    Ok(())
}

fn validate_request_shape(
    options: &ServerOptions,
    message: &OidcMessage,
) -> Result<(), ProtocolError> {
    let response_type = message
        .response_type()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProtocolError::invalid_request("response_type parameter missing."))?;

    let recognized = [
        response_types::CODE,
        response_types::TOKEN,
        response_types::ID_TOKEN,
    ];
    if !response_type
        .split(' ')
        .all(|part| recognized.contains(&part))
    {
        return Err(ProtocolError::unsupported_response_type(
            "The response type is not supported.",
        ));
    }

    if let Some(mode) = message.response_mode() {
        let known = [
            response_modes::QUERY,
            response_modes::FRAGMENT,
            response_modes::FORM_POST,
        ];
        if !known.contains(&mode) {
            return Err(ProtocolError::invalid_request(
                "The response mode is not supported.",
            ));
        }
    }

    if message.has_response_type(response_types::ID_TOKEN) {
        if !message.has_scope(scopes::OPENID) {
            return Err(ProtocolError::invalid_request(
                "The openid scope is required for id_token response types.",
            ));
        }
        if options.signing_credentials.is_empty() {
            return Err(ProtocolError::unsupported_response_type(
                "No signing credentials are configured for id_token emission.",
            ));
        }
    }

    if message.has_response_type(response_types::CODE) && options.token_endpoint_path.is_none() {
        return Err(ProtocolError::unsupported_response_type(
            "The authorization code flow requires the token endpoint.",
        ));
    }

    Ok(())
}

/// Explicit response mode when the request named a recognized one; otherwise
/// the default implied by the response content. Responses carrying tokens must
/// never travel in a query string, so they default to `fragment`; everything
/// else — including error responses — defaults to `query`.
fn resolve_response_mode<'a>(message: &'a OidcMessage, response: &OidcMessage) -> &'a str {
    if let Some(mode) = message.response_mode() {
        let known = [
            response_modes::QUERY,
            response_modes::FRAGMENT,
            response_modes::FORM_POST,
        ];
        if known.contains(&mode) {
            return mode;
        }
    }
    if response.access_token().is_some() || response.id_token().is_some() {
        response_modes::FRAGMENT
    } else {
        response_modes::QUERY
    }
}

/// Record the grant parameters redemption and userinfo need later.
fn record_grant_properties(ticket: &mut AuthenticationTicket, message: &OidcMessage) {
    if let Some(client_id) = message.client_id() {
        ticket.properties.set(properties::CLIENT_ID, client_id);
        if ticket.properties.get(properties::PRESENTERS).is_none() {
            ticket.properties.set(properties::PRESENTERS, client_id);
        }
    }
    if let Some(redirect_uri) = message.redirect_uri() {
        ticket.properties.set(properties::REDIRECT_URI, redirect_uri);
    }
    if ticket.properties.get(properties::SCOPE).is_none() {
        if let Some(scope) = message.scope() {
            ticket.properties.set(properties::SCOPE, scope);
        }
    }
    if let Some(nonce) = message.nonce() {
        ticket.properties.set(properties::NONCE, nonce);
    }
}

fn stash_request(request: &mut Request<Bytes>, message: &OidcMessage) {
    request
        .extensions_mut()
        .insert(OidcRequestExtension(message.clone()));
}
