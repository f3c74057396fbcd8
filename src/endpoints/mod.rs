// ABOUTME: Endpoint handler modules and shared request-shape helpers
// ABOUTME: Method/content-type gates, message parsing, and bearer-token extraction
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

pub(crate) mod authorization;
pub(crate) mod configuration;
pub(crate) mod introspection;
pub(crate) mod jwks;
pub(crate) mod logout;
pub(crate) mod response;
pub(crate) mod revocation;
pub(crate) mod token;
pub(crate) mod userinfo;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request};

use crate::message::OidcMessage;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Whether the request body is urlencoded form data.
pub(crate) fn has_form_content_type(request: &Request<Bytes>) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .split(';')
                .next()
                .is_some_and(|media| media.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        })
}

/// Parse the OIDC message from the query string (GET) or the form body (POST).
/// `None` when the request shape is not one the endpoint accepts.
pub(crate) fn parse_message(request: &Request<Bytes>) -> Option<OidcMessage> {
    if request.method() == Method::GET {
        let query = request.uri().query().unwrap_or_default();
        Some(OidcMessage::from_urlencoded(query.as_bytes()))
    } else if request.method() == Method::POST && has_form_content_type(request) {
        Some(OidcMessage::from_urlencoded(request.body()))
    } else {
        None
    }
}

/// Bearer token from the `Authorization` header, if any.
pub(crate) fn bearer_token(request: &Request<Bytes>) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Decode a Basic authorization header into `(client_id, client_secret)`.
pub(crate) fn basic_credentials(request: &Request<Bytes>) -> Option<(String, String)> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let (client_id, client_secret) = decoded.split_once(':')?;
    Some((client_id.to_owned(), client_secret.to_owned()))
}
