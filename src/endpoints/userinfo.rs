// ABOUTME: Userinfo endpoint — resolves the bearer ticket and emits scope-gated claims
// ABOUTME: Uses 400 invalid_grant for token failures to stay clear of upstream auth middleware
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, StatusCode};
use serde_json::{Map, Value};

use super::response::{error_json, json_response, server_error_json};
use crate::config::ServerOptions;
use crate::constants::oauth::{claims, scopes};
use crate::errors::ProtocolError;
use crate::middleware::RequestDisposition;
use crate::provider::context::{
    ApplyUserinfoResponse, HandleUserinfoRequest, ValidateUserinfoRequest,
};
use crate::provider::EventContext;
use crate::ticket::{AuthenticationTicket, ClaimsIdentity};
use crate::tokens::TokenService;

pub(crate) async fn invoke(
    options: Arc<ServerOptions>,
    request: Request<Bytes>,
) -> RequestDisposition {
    let Some(message) = super::parse_message(&request) else {
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
            "The userinfo endpoint only accepts GET requests or form-urlencoded POST requests.",
        )));
    };

    let header_token = super::bearer_token(&request);
    let parameter_token = message.access_token().map(str::to_owned);
    let token = match (header_token, parameter_token) {
        (Some(_), Some(_)) => {
            return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
                "The access token must not be sent in both the header and the body.",
            )));
        }
        (Some(token), None) | (None, Some(token)) => token,
        (None, None) => {
            return RequestDisposition::Response(error_json(&ProtocolError::invalid_request(
                "The access token is missing.",
            )));
        }
    };

    let service = TokenService::new(options.clone());
    let Some(ticket) = service.receive_access_token(&token).await else {
        // 400 rather than 401: a WWW-Authenticate challenge here would collide
        // with whatever authentication middleware sits upstream.
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_grant(
            "Invalid token.",
        )));
    };

    if ticket.is_expired(options.clock.now()) {
        return RequestDisposition::Response(error_json(&ProtocolError::invalid_grant(
            "Expired token.",
        )));
    }

    let mut validate = EventContext::new(
        options.clone(),
        ValidateUserinfoRequest {
            request: message.clone(),
        },
    );
    options
        .provider
        .validate_userinfo_request(&mut validate)
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

    let claims_document = assemble_claims(&ticket);

    let mut handle = EventContext::new(
        options.clone(),
        HandleUserinfoRequest {
            ticket,
            claims: claims_document,
        },
    );
    options.provider.handle_userinfo_request(&mut handle).await;
    if let Some(response) = handle.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if handle.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }

    // `sub` is the one mandatory userinfo claim; a document without it after
    // the hooks is a server-side defect, not a client error.
    if !handle
        .payload
        .claims
        .get(claims::SUBJECT)
        .and_then(Value::as_str)
        .is_some_and(|subject| !subject.is_empty())
    {
        tracing::error!("userinfo response is missing the mandatory sub claim");
        return RequestDisposition::Response(server_error_json(
            "The userinfo response requires a sub claim.",
        ));
    }

    let mut apply = EventContext::new(
        options.clone(),
        ApplyUserinfoResponse {
            claims: handle.payload.claims,
        },
    );
    options.provider.apply_userinfo_response(&mut apply).await;
    if let Some(response) = apply.outcome.take_response() {
        return RequestDisposition::Response(response);
    }
    if apply.outcome.is_skipped() {
        return RequestDisposition::Continue(request);
    }

    RequestDisposition::Response(json_response(
        StatusCode::OK,
        &Value::Object(apply.payload.claims),
    ))
}

fn assemble_claims(ticket: &AuthenticationTicket) -> Map<String, Value> {
    let mut document = Map::new();

    if let Some(subject) = ticket.identity.subject() {
        document.insert(claims::SUBJECT.to_owned(), Value::String(subject.to_owned()));
    }

    // Audience is the set of recorded presenters: scalar when one, array when
    // several.
    let presenters = ticket.presenters();
    match presenters.len() {
        0 => {}
        1 => {
            document.insert(
                claims::AUDIENCE.to_owned(),
                Value::String(presenters[0].to_owned()),
            );
        }
        _ => {
            document.insert(
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

    let granted = ticket.scopes();
    if granted.contains(&scopes::PROFILE) {
        copy_claim(&mut document, &ticket.identity, claims::NAME);
        copy_claim(&mut document, &ticket.identity, claims::FAMILY_NAME);
        copy_claim(&mut document, &ticket.identity, claims::GIVEN_NAME);
        copy_claim(&mut document, &ticket.identity, claims::BIRTHDATE);
    }
    if granted.contains(&scopes::EMAIL) {
        copy_claim(&mut document, &ticket.identity, claims::EMAIL);
        copy_boolean_claim(&mut document, &ticket.identity, claims::EMAIL_VERIFIED);
    }
    if granted.contains(&scopes::PHONE) {
        copy_claim(&mut document, &ticket.identity, claims::PHONE_NUMBER);
        copy_boolean_claim(&mut document, &ticket.identity, claims::PHONE_NUMBER_VERIFIED);
    }

    document
}

fn copy_claim(document: &mut Map<String, Value>, identity: &ClaimsIdentity, claim_type: &str) {
    if let Some(claim) = identity.find_claim(claim_type) {
        document.insert(claim_type.to_owned(), Value::String(claim.value.clone()));
    }
}

fn copy_boolean_claim(
    document: &mut Map<String, Value>,
    identity: &ClaimsIdentity,
    claim_type: &str,
) {
    if let Some(claim) = identity.find_claim(claim_type) {
        let value = claim
            .value
            .parse::<bool>()
            .map_or_else(|_| Value::String(claim.value.clone()), Value::Bool);
        document.insert(claim_type.to_owned(), value);
    }
}
