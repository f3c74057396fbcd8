// ABOUTME: Introspection endpoint — reports token state without leaking unknown-token detail
// ABOUTME: Honors token_type_hint and falls back across token kinds on a miss
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use serde_json::{Map, Number, Value};

use super::response::{error_json, json_response};
use crate::config::ServerOptions;
use crate::constants::oauth::{claims, params, token_type_hints, token_types};
use crate::errors::ProtocolError;
use crate::message::OidcMessage;
use crate::middleware::RequestDisposition;
use crate::provider::context::{
    ApplyIntrospectionResponse, HandleIntrospectionRequest, ValidateIntrospectionRequest,
};
use crate::provider::EventContext;
use crate::ticket::{properties, AuthenticationTicket};
use crate::tokens::TokenService;

pub(crate) async fn invoke(
    options: Arc<ServerOptions>,
    request: Request<Bytes>,
) -> RequestDisposition {
    if request.method() != Method::POST || !super::has_form_content_type(&request) {
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
            "The introspection endpoint only accepts form-urlencoded POST requests.",
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
        ValidateIntrospectionRequest {
            request: message.clone(),
        },
    );
    options
        .provider
        .validate_introspection_request(&mut validate)
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

    let service = TokenService::new(options.clone());
    let ticket = resolve_token(&service, &token, message.token_type_hint()).await;

    // Unknown and expired tokens get the same inactive document: the endpoint
    // must not reveal whether a token ever existed.
    let active = ticket
        .as_ref()
        .is_some_and(|ticket| !ticket.is_expired(options.clock.now()));

    let payload = if active {
        // Checked by `active` above.
        ticket
            .as_ref()
            .map(|ticket| active_payload(&options, ticket))
            .unwrap_or_default()
    } else {
        let mut payload = Map::new();
        payload.insert("active".to_owned(), Value::Bool(false));
        payload
    };

    let mut handle = EventContext::new(
        options.clone(),
        HandleIntrospectionRequest { ticket, payload },
    );
    options
        .provider
        .handle_introspection_request(&mut handle)
        .await;
    if let Some(response) = handle.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if handle.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }

    let mut apply = EventContext::new(
        options.clone(),
        ApplyIntrospectionResponse {
            payload: handle.payload.payload,
        },
    );
    options
        .provider
        .apply_introspection_response(&mut apply)
        .await;
    if let Some(response) = apply.outcome.take_response() {
        return RequestDisposition::Response(response);
    }

    RequestDisposition::Response(json_response(
        StatusCode::OK,
        &Value::Object(apply.payload.payload),
    ))
}

/// Try the hinted token kind first, then the remaining kinds.
async fn resolve_token(
    service: &TokenService,
    token: &str,
    hint: Option<&str>,
) -> Option<AuthenticationTicket> {
    let order: [&str; 3] = match hint {
        Some(token_type_hints::REFRESH_TOKEN) => [
            token_type_hints::REFRESH_TOKEN,
            token_type_hints::ACCESS_TOKEN,
            token_type_hints::AUTHORIZATION_CODE,
        ],
        Some(token_type_hints::AUTHORIZATION_CODE) => [
            token_type_hints::AUTHORIZATION_CODE,
            token_type_hints::ACCESS_TOKEN,
            token_type_hints::REFRESH_TOKEN,
        ],
        _ => [
            token_type_hints::ACCESS_TOKEN,
            token_type_hints::REFRESH_TOKEN,
            token_type_hints::AUTHORIZATION_CODE,
        ],
    };

    for kind in order {
        let ticket = match kind {
            token_type_hints::ACCESS_TOKEN => service.receive_access_token(token).await,
            token_type_hints::REFRESH_TOKEN => service.receive_refresh_token(token).await,
            _ => service.receive_authorization_code(token).await,
        };
        if ticket.is_some() {
            return ticket;
        }
    }
    None
}

fn active_payload(options: &ServerOptions, ticket: &AuthenticationTicket) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("active".to_owned(), Value::Bool(true));
    payload.insert(
        claims::ISSUER.to_owned(),
        Value::String(options.issuer_with_trailing_slash()),
    );
    payload.insert(
        params::TOKEN_TYPE.to_owned(),
        Value::String(token_types::BEARER.to_owned()),
    );

    if let Some(subject) = ticket.identity.subject() {
        payload.insert(claims::SUBJECT.to_owned(), Value::String(subject.to_owned()));
    }
    if let Some(scope) = ticket.properties.get(properties::SCOPE) {
        payload.insert("scope".to_owned(), Value::String(scope.to_owned()));
    }
    if let Some(client_id) = ticket.properties.get(properties::CLIENT_ID) {
        payload.insert("client_id".to_owned(), Value::String(client_id.to_owned()));
    }
    if let Some(issued) = ticket.properties.issued_utc {
        payload.insert(
            claims::ISSUED_AT.to_owned(),
            Value::Number(Number::from(issued.timestamp())),
        );
    }
    if let Some(expires) = ticket.properties.expires_utc {
        payload.insert(
            claims::EXPIRATION.to_owned(),
            Value::Number(Number::from(expires.timestamp())),
        );
    }

    let presenters = ticket.presenters();
    match presenters.len() {
        0 => {}
        1 => {
            payload.insert(
                claims::AUDIENCE.to_owned(),
                Value::String(presenters[0].to_owned()),
            );
        }
        _ => {
            payload.insert(
                claims::AUDIENCE.to_owned(),
                Value::Array(
                    presenters
                        .iter()
                        .map(|presenter| Value::String((*presenter).to_owned()))
                        .collect(),
                ),
            );
        }
    }

    payload
}
