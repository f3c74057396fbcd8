// ABOUTME: Revocation endpoint — discards cached authorization codes on request
// ABOUTME: Self-contained tokens cannot be recalled server-side; the provider hook may take over
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use serde_json::{Map, Value};

use super::response::{error_json, json_response};
use crate::config::ServerOptions;
use crate::errors::ProtocolError;
use crate::message::OidcMessage;
use crate::middleware::RequestDisposition;
use crate::provider::context::{
    ApplyRevocationResponse, HandleRevocationRequest, ValidateRevocationRequest,
};
use crate::provider::EventContext;

pub(crate) async fn invoke(
    options: Arc<ServerOptions>,
    request: Request<Bytes>,
) -> RequestDisposition {
    if request.method() != Method::POST || !super::has_form_content_type(&request) {
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
            "The revocation endpoint only accepts form-urlencoded POST requests.",
        )));
    }

    let message = OidcMessage::from_urlencoded(request.body());
    let Some(token) = message.token().map(str::to_owned) else {
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
            "token parameter missing.",
        )));
    };

    let mut validate = EventContext::new(
        options.clone(),
        ValidateRevocationRequest {
            request: message.clone(),
        },
    );
    options
        .provider
        .validate_revocation_request(&mut validate)
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
        return RequestDisposition::Response(error_json(&error));
    }

    // Authorization codes live in the cache and can genuinely be recalled.
    // Access and refresh tokens are self-contained, so the default can only
    // drop what the cache knows about; per RFC 7009 an unknown token is not
    // an error.
    let revoked = match options.cache.take(&token).await {
        Ok(found) => found.is_some(),
        Err(error) => {
            tracing::error!("revocation cache lookup failed: {error}");
            false
        }
    };
    if revoked {
        tracing::info!("revoked cached authorization code");
    }

    let mut handle = EventContext::new(
        options.clone(),
        HandleRevocationRequest {
            request: message,
            revoked,
        },
    );
    options
        .provider
        .handle_revocation_request(&mut handle)
        .await;
    if let Some(response) = handle.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if handle.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }

    let mut apply = EventContext::new(options.clone(), ApplyRevocationResponse);
    options
        .provider
        .apply_revocation_response(&mut apply)
        .await;
    if let Some(response) = apply.outcome.take_response() {
        return RequestDisposition::Response(response);
    }

    RequestDisposition::Response(json_response(StatusCode::OK, &Value::Object(Map::new())))
}
