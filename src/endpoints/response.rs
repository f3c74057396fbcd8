// ABOUTME: Response emission — JSON writers, response-mode writers, and the error page
// ABOUTME: Centralizes no-cache headers, redirect assembly, and the form_post document
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Response Writers
//!
//! Authorization responses are delivered through one of three response modes:
//! `query` and `fragment` produce a 302 redirect, `form_post` produces an
//! auto-submitting HTML document. The `client_id`, `redirect_uri`, and
//! `response_mode` parameters never appear in the emitted payload. JSON
//! writers stamp the UTF-8 content type and the no-cache header trio on every
//! body.

use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, LOCATION, PRAGMA};
use http::{Request, Response, StatusCode};
use serde::Serialize;

use crate::config::ServerOptions;
use crate::constants::oauth::{params, response_modes};
use crate::errors::ProtocolError;
use crate::message::{OidcMessage, OidcResponseExtension};
use crate::middleware::RequestDisposition;

/// Parameters the response-mode writers never emit.
const SUPPRESSED_PARAMS: [&str; 3] = [
    params::CLIENT_ID,
    params::REDIRECT_URI,
    params::RESPONSE_MODE,
];

const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";
const HTML_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

/// JSON body with no-cache headers.
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    no_cache(Response::builder().status(status))
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Bytes::from(payload))
        .unwrap_or_default()
}

/// Protocol error as JSON with HTTP 400.
pub(crate) fn error_json(error: &ProtocolError) -> Response<Bytes> {
    json_response(StatusCode::BAD_REQUEST, error)
}

/// Fatal condition as `server_error` JSON with HTTP 500.
pub(crate) fn server_error_json(description: &str) -> Response<Bytes> {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &ProtocolError::server_error(description),
    )
}

fn no_cache(builder: http::response::Builder) -> http::response::Builder {
    builder
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache")
        .header(EXPIRES, "-1")
}

/// Render an authorization response (or error) through the response mode the
/// request selected. An unrecognized mode falls back to `query`; the caller
/// validated it earlier.
pub(crate) fn write_authorization_response(
    redirect_uri: &str,
    response_mode: Option<&str>,
    message: &OidcMessage,
) -> Response<Bytes> {
    match response_mode {
        Some(response_modes::FORM_POST) => write_form_post(redirect_uri, message),
        Some(response_modes::FRAGMENT) => write_fragment(redirect_uri, message),
        _ => write_query(redirect_uri, message),
    }
}

fn emitted_pairs(message: &OidcMessage) -> impl Iterator<Item = (&str, &str)> {
    message
        .pairs()
        .filter(|(name, _)| !SUPPRESSED_PARAMS.contains(name))
}

fn write_query(redirect_uri: &str, message: &OidcMessage) -> Response<Bytes> {
    let location = match url::Url::parse(redirect_uri) {
        Ok(mut location) => {
            {
                let mut pairs = location.query_pairs_mut();
                for (name, value) in emitted_pairs(message) {
                    pairs.append_pair(name, value);
                }
            }
            location.to_string()
        }
        Err(_) => redirect_uri.to_owned(),
    };

    redirect(&location)
}

fn write_fragment(redirect_uri: &str, message: &OidcMessage) -> Response<Bytes> {
    let mut location = String::from(redirect_uri);
    let mut separator = '#';
    for (name, value) in emitted_pairs(message) {
        location.push(separator);
        location.push_str(&urlencoding::encode(name));
        location.push('=');
        location.push_str(&urlencoding::encode(value));
        separator = '&';
    }

    redirect(&location)
}

fn write_form_post(redirect_uri: &str, message: &OidcMessage) -> Response<Bytes> {
    let mut inputs = String::new();
    for (name, value) in emitted_pairs(message) {
        inputs.push_str(&format!(
            "<input type=\"hidden\" name=\"{}\" value=\"{}\">\n",
            html_escape(name),
            html_escape(value)
        ));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Working...</title></head>
<body onload="document.forms[0].submit()">
<form action="{action}" method="post">
{inputs}<noscript><button type="submit">Continue</button></noscript>
</form>
</body>
</html>
"#,
        action = html_escape(redirect_uri),
        inputs = inputs
    );

    no_cache(Response::builder().status(StatusCode::OK))
        .header(CONTENT_TYPE, HTML_CONTENT_TYPE)
        .body(Bytes::from(html))
        .unwrap_or_default()
}

fn redirect(location: &str) -> Response<Bytes> {
    no_cache(Response::builder().status(StatusCode::FOUND))
        .header(LOCATION, location)
        .body(Bytes::new())
        .unwrap_or_default()
}

/// Error rendering for requests without a trusted `redirect_uri`. When the
/// application opted into displaying errors, the response message is recorded
/// on the request and control passes to the inner pipeline; otherwise a
/// minimal text body is written.
pub(crate) fn error_page(
    options: &ServerOptions,
    mut request: Request<Bytes>,
    error: &ProtocolError,
) -> RequestDisposition {
    tracing::debug!(error = %error.error, "rendering authorization error page");

    if options.application_can_display_errors {
        let mut message = OidcMessage::new();
        message.set_error(&error.error);
        if let Some(description) = &error.error_description {
            message.set_error_description(description);
        }
        if let Some(uri) = &error.error_uri {
            message.set_error_uri(uri);
        }
        request.extensions_mut().insert(OidcResponseExtension(message));
        return RequestDisposition::Continue(request);
    }

    let mut body = format!("error: {}\n", error.error);
    if let Some(description) = &error.error_description {
        body.push_str(&format!("error_description: {description}\n"));
    }
    if let Some(uri) = &error.error_uri {
        body.push_str(&format!("error_uri: {uri}\n"));
    }

    let response = no_cache(Response::builder().status(StatusCode::BAD_REQUEST))
        .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
        .body(Bytes::from(body))
        .unwrap_or_default();
    RequestDisposition::Response(response)
}

fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> OidcMessage {
        let mut message = OidcMessage::new();
        message.set_code("SplxlOBeZQQYbYS6WxSbIA");
        message.set_state("af0ifjsldkj");
        message.set_client_id("abc");
        message.set_redirect_uri("https://app/cb");
        message
    }

    #[test]
    fn query_mode_appends_parameters() {
        let response = write_query("https://app/cb", &sample_message());
        let location = response.headers()[LOCATION].to_str().unwrap();

        assert!(location.starts_with("https://app/cb?"));
        assert!(location.contains("code=SplxlOBeZQQYbYS6WxSbIA"));
        assert!(location.contains("state=af0ifjsldkj"));
        assert!(!location.contains("client_id"));
    }

    #[test]
    fn fragment_mode_uses_hash_then_ampersands() {
        let response = write_fragment("https://app/cb", &sample_message());
        let location = response.headers()[LOCATION].to_str().unwrap();

        assert!(!location.contains('?'));
        let fragment = location.split_once('#').unwrap().1;
        assert!(fragment.contains("code="));
        assert!(fragment.contains('&'));
    }

    #[test]
    fn form_post_emits_hidden_inputs_without_suppressed_params() {
        let response = write_form_post("https://app/cb", &sample_message());
        let body = String::from_utf8(response.body().to_vec()).unwrap();

        assert!(body.contains(r#"<form action="https://app/cb" method="post">"#));
        assert!(body.contains(r#"name="code""#));
        assert!(body.contains(r#"name="state""#));
        assert!(!body.contains(r#"name="client_id""#));
        assert!(!body.contains(r#"name="redirect_uri""#));
        assert!(body.contains("<noscript>"));
    }

    #[test]
    fn html_escape_covers_attribute_breakers() {
        assert_eq!(
            html_escape(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
        );
    }
}
