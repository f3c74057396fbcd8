// ABOUTME: Logout endpoint — validates the request and redirects to the post-logout location
// ABOUTME: Unvalidated requests pass through so the application keeps control of sign-out
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use bytes::Bytes;
use http::header::LOCATION;
use http::{Request, Response, StatusCode};

use super::response::error_json;
use crate::config::ServerOptions;
use crate::errors::ProtocolError;
use crate::message::{OidcMessage, OidcRequestExtension};
use crate::middleware::RequestDisposition;
use crate::provider::context::{
    ApplyLogoutResponse, HandleLogoutRequest, ValidateLogoutRequest,
};
use crate::provider::EventContext;

pub(crate) async fn invoke(
    options: Arc<ServerOptions>,
    mut request: Request<Bytes>,
) -> RequestDisposition {
    let Some(message) = super::parse_message(&request) else {
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
            "The logout endpoint only accepts GET requests or form-urlencoded POST requests.",
        )));
    };

    request
        .extensions_mut()
        .insert(OidcRequestExtension(message.clone()));

    let mut validate = EventContext::new(
        options.clone(),
        ValidateLogoutRequest {
            request: message.clone(),
        },
    );
    options.provider.validate_logout_request(&mut validate).await;
    if let Some(response) = validate.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if validate.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }
    if validate.outcome.is_rejected() {
        let error = validate
            .outcome
            .error_or(ProtocolError::invalid_request("Request validation failed."));
        return RequestDisposition::Response(error_json(&error));
    }
    let validated = validate.outcome.is_validated();

    let mut handle = EventContext::new(
        options.clone(),
        HandleLogoutRequest {
            request: message.clone(),
        },
    );
    options.provider.handle_logout_request(&mut handle).await;
    if let Some(response) = handle.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if handle.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }
    if handle.outcome.is_request_completed() {
        return RequestDisposition::Abandon;
    }

    let mut response_message = OidcMessage::new();
    if let Some(state) = message.state() {
        response_message.set_state(state);
    }

    let mut apply = EventContext::new(
        options.clone(),
        ApplyLogoutResponse {
            request: message.clone(),
            response: response_message,
        },
    );
    options.provider.apply_logout_response(&mut apply).await;
    if let Some(response) = apply.outcome.take_response() {
        return RequestDisposition::Response(response);
    }

    // The post-logout redirect is honored only for requests the provider
    // explicitly validated; anything else stays with the application.
    let redirect = message
        .post_logout_redirect_uri()
        .filter(|_| validated)
        .map(str::to_owned);
    let Some(redirect_uri) = redirect else {
        return RequestDisposition::Continue(request);
    };

    let location = match url::Url::parse(&redirect_uri) {
        Ok(mut location) => {
            if !apply.payload.response.is_empty() {
                let mut pairs = location.query_pairs_mut();
                for (name, value) in apply.payload.response.pairs() {
                    pairs.append_pair(name, value);
                }
            }
            location.to_string()
        }
        Err(_) => redirect_uri,
    };

    let response = Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location)
        .body(Bytes::new())
        .unwrap_or_default();
    RequestDisposition::Response(response)
}
