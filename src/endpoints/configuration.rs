// ABOUTME: Discovery (configuration) endpoint — assembles the OIDC metadata document
// ABOUTME: Grant type, response type, and response mode matrices derive from the enabled endpoints
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use serde_json::{Map, Value};

use super::response::{error_json, json_response};
use crate::config::ServerOptions;
use crate::constants::oauth::{grant_types, metadata, response_modes, response_types, scopes};
use crate::crypto::algorithms;
use crate::errors::ProtocolError;
use crate::middleware::RequestDisposition;
use crate::provider::context::{
    ApplyConfigurationResponse, HandleConfigurationRequest, ValidateConfigurationRequest,
};
use crate::provider::EventContext;

pub(crate) async fn invoke(
    options: Arc<ServerOptions>,
    request: Request<Bytes>,
) -> RequestDisposition {
    if request.method() != Method::GET {
        tracing::debug!(method = %request.method(), "rejecting configuration request");
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
            "The configuration endpoint only accepts GET requests.",
        )));
    }

    let mut validate = EventContext::new(options.clone(), ValidateConfigurationRequest);
    options
        .provider
        .validate_configuration_request(&mut validate)
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

    let metadata = assemble_metadata(&options);

    let mut handle = EventContext::new(
        options.clone(),
        HandleConfigurationRequest { metadata },
    );
    options
        .provider
        .handle_configuration_request(&mut handle)
        .await;
    if let Some(response) = handle.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if handle.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }

    let mut apply = EventContext::new(
        options.clone(),
        ApplyConfigurationResponse {
            metadata: handle.payload.metadata,
        },
    );
    options
        .provider
        .apply_configuration_response(&mut apply)
        .await;
    if let Some(response) = apply.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if apply.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }

    RequestDisposition::Response(json_response(
        StatusCode::OK,
        &Value::Object(apply.payload.metadata),
    ))
}

fn assemble_metadata(options: &ServerOptions) -> Map<String, Value> {
    let mut document = Map::new();
    document.insert(
        metadata::ISSUER.to_owned(),
        Value::String(options.issuer.to_string()),
    );

    let endpoints = [
        (metadata::AUTHORIZATION_ENDPOINT, &options.authorization_endpoint_path),
        (metadata::TOKEN_ENDPOINT, &options.token_endpoint_path),
        (metadata::USERINFO_ENDPOINT, &options.userinfo_endpoint_path),
        (metadata::JWKS_URI, &options.cryptography_endpoint_path),
        (metadata::INTROSPECTION_ENDPOINT, &options.introspection_endpoint_path),
        (metadata::REVOCATION_ENDPOINT, &options.revocation_endpoint_path),
        (metadata::END_SESSION_ENDPOINT, &options.logout_endpoint_path),
    ];
    for (field, path) in endpoints {
        if let Some(path) = path {
            document.insert(
                field.to_owned(),
                Value::String(options.endpoint_url(path)),
            );
        }
    }

    let authorization_enabled = options.authorization_endpoint_path.is_some();
    let token_enabled = options.token_endpoint_path.is_some();
    let signing_enabled = !options.signing_credentials.is_empty();

    let mut grants = Vec::new();
    if authorization_enabled {
        grants.push(grant_types::IMPLICIT);
    }
    if authorization_enabled && token_enabled {
        grants.push(grant_types::AUTHORIZATION_CODE);
    }
    if token_enabled {
        grants.push(grant_types::REFRESH_TOKEN);
    }
    if token_enabled && !authorization_enabled {
        grants.push(grant_types::CLIENT_CREDENTIALS);
        grants.push(grant_types::PASSWORD);
    }
    document.insert(
        metadata::GRANT_TYPES_SUPPORTED.to_owned(),
        string_array(&grants),
    );

    // The response type matrix is gated by which endpoints are enabled;
    // id_token-bearing combinations additionally require signing credentials.
    let mut response_types_supported: Vec<String> = Vec::new();
    if authorization_enabled {
        response_types_supported.push(response_types::TOKEN.to_owned());
        if signing_enabled {
            response_types_supported.push(response_types::ID_TOKEN.to_owned());
            response_types_supported.push(format!(
                "{} {}",
                response_types::ID_TOKEN,
                response_types::TOKEN
            ));
        }
        if token_enabled {
            response_types_supported.push(response_types::CODE.to_owned());
            response_types_supported.push(format!(
                "{} {}",
                response_types::CODE,
                response_types::TOKEN
            ));
            if signing_enabled {
                response_types_supported.push(format!(
                    "{} {}",
                    response_types::CODE,
                    response_types::ID_TOKEN
                ));
                response_types_supported.push(format!(
                    "{} {} {}",
                    response_types::CODE,
                    response_types::ID_TOKEN,
                    response_types::TOKEN
                ));
            }
        }
    }
    document.insert(
        metadata::RESPONSE_TYPES_SUPPORTED.to_owned(),
        Value::Array(response_types_supported.into_iter().map(Value::String).collect()),
    );

    if authorization_enabled {
        document.insert(
            metadata::RESPONSE_MODES_SUPPORTED.to_owned(),
            string_array(&[
                response_modes::FORM_POST,
                response_modes::FRAGMENT,
                response_modes::QUERY,
            ]),
        );
    }

    document.insert(
        metadata::SCOPES_SUPPORTED.to_owned(),
        string_array(&[scopes::OPENID]),
    );
    document.insert(
        metadata::SUBJECT_TYPES_SUPPORTED.to_owned(),
        string_array(&["public"]),
    );
    document.insert(
        metadata::ID_TOKEN_SIGNING_ALG_VALUES_SUPPORTED.to_owned(),
        string_array(&[algorithms::RS256]),
    );

    document
}

fn string_array(values: &[&str]) -> Value {
    Value::Array(values.iter().map(|value| Value::String((*value).to_owned())).collect())
}
