// ABOUTME: JWKS (cryptography) endpoint — publishes signing and encryption keys
// ABOUTME: Filters key material to RS256 signing and RSA-OAEP/RSA1_5 encryption shapes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, StatusCode};

use super::response::{error_json, json_response};
use crate::config::ServerOptions;
use crate::crypto::{algorithms, JsonWebKey, JsonWebKeySet};
use crate::errors::ProtocolError;
use crate::middleware::RequestDisposition;
use crate::provider::context::{
    ApplyCryptographyResponse, HandleCryptographyRequest, ValidateCryptographyRequest,
};
use crate::provider::EventContext;

pub(crate) async fn invoke(
    options: Arc<ServerOptions>,
    request: Request<Bytes>,
) -> RequestDisposition {
    if request.method() != Method::GET {
        tracing::debug!(method = %request.method(), "rejecting cryptography request");
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
            "The cryptography endpoint only accepts GET requests.",
        )));
    }

    let mut validate = EventContext::new(options.clone(), ValidateCryptographyRequest);
    options
        .provider
        .validate_cryptography_request(&mut validate)
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

    let keys = assemble_keys(&options);

    let mut handle = EventContext::new(options.clone(), HandleCryptographyRequest { keys });
    options
        .provider
        .handle_cryptography_request(&mut handle)
        .await;
    if let Some(response) = handle.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if handle.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }

    let mut apply = EventContext::new(
        options.clone(),
        ApplyCryptographyResponse {
            keys: handle.payload.keys,
        },
    );
    options
        .provider
        .apply_cryptography_response(&mut apply)
        .await;
    if let Some(response) = apply.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if apply.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }

    // A JWK with no key type cannot be used by any client; drop it rather than
    // publish an unusable entry.
    let keys: Vec<JsonWebKey> = apply
        .payload
        .keys
        .into_iter()
        .filter(|key| {
            if key.kty.is_none() {
                tracing::warn!(kid = key.kid.as_deref(), "excluding JWK with no kty");
                return false;
            }
            true
        })
        .collect();

    RequestDisposition::Response(json_response(StatusCode::OK, &JsonWebKeySet { keys }))
}

fn assemble_keys(options: &ServerOptions) -> Vec<JsonWebKey> {
    let mut keys = Vec::new();

    for credentials in &options.signing_credentials {
        if credentials.algorithm != algorithms::RS256 {
            tracing::info!(
                algorithm = %credentials.algorithm,
                kid = %credentials.key.kid,
                "skipping signing credentials without RS256 support"
            );
            continue;
        }
        keys.push(credentials.to_jwk());
    }

    for credentials in &options.encryption_credentials {
        if credentials.algorithm != algorithms::RSA_OAEP
            && credentials.algorithm != algorithms::RSA1_5
        {
            tracing::info!(
                algorithm = %credentials.algorithm,
                kid = %credentials.key.kid,
                "skipping encryption credentials without an RSA key-wrap algorithm"
            );
            continue;
        }
        keys.push(credentials.to_jwk());
    }

    keys
}
