// ABOUTME: Integration tests for the authorization endpoint state machine
// ABOUTME: Covers code issuance, error redirects, error pages, response modes, and handoff
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{
    expect_response, get_request, location_header, middleware, middleware_with,
    obtain_authorization_code, parse_params, TestProvider, CLIENT_ID,
};
use http::{Method, Request, StatusCode};
use margaux_oidc_server::message::{OidcRequestExtension, OidcResponseExtension};
use margaux_oidc_server::{OidcServerMiddleware, RequestDisposition};

fn authorize_uri(params: &str) -> String {
    format!("https://idp.example/connect/authorize?{params}")
}

// =============================================================================
// Code Flow Tests
// =============================================================================

#[tokio::test]
async fn code_flow_redirects_with_code_and_state() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "response_type=code&client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&state=xyz",
    ));

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location_header(&response);
    assert!(location.starts_with("https://app/cb?"));

    let params = parse_params(location.split_once('?').unwrap().1);
    assert_eq!(params.get("state").map(String::as_str), Some("xyz"));

    // 256-bit base64url key: 43 characters, URL-safe alphabet.
    let code = params.get("code").expect("code parameter missing");
    assert_eq!(code.len(), 43);
    assert!(!code.contains('+') && !code.contains('/') && !code.contains('='));

    assert!(!location.contains("client_id"));
    assert!(!location.contains("redirect_uri="));
}

#[tokio::test]
async fn issued_codes_are_unique() {
    let middleware = middleware();
    let first = obtain_authorization_code(&middleware).await;
    let second = obtain_authorization_code(&middleware).await;
    assert_ne!(first, second);
}

// =============================================================================
// Validation Error Tests
// =============================================================================

#[tokio::test]
async fn unsupported_response_type_redirects_with_error_and_state() {
    // No signing credentials: id_token response types cannot be served.
    let provider = Arc::new(TestProvider::default());
    let options = margaux_oidc_server::ServerOptionsBuilder::new("https://idp.example", provider)
        .data_protection_key([42u8; 32])
        .build()
        .unwrap();
    let middleware = OidcServerMiddleware::new(options);

    let request = get_request(&authorize_uri(
        "response_type=code%20id_token&client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&state=s",
    ));
    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location_header(&response);
    assert!(location.starts_with("https://app/cb?"));
    // Error responses carry no tokens, so they default to the query mode.
    let params = parse_params(location.split_once('?').unwrap().1);
    assert_eq!(
        params.get("error").map(String::as_str),
        Some("unsupported_response_type")
    );
    assert!(params.contains_key("error_description"));
    assert_eq!(params.get("state").map(String::as_str), Some("s"));
}

#[tokio::test]
async fn missing_response_type_redirects_with_invalid_request() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&state=s",
    ));

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location_header(&response);
    let params = parse_params(location.split_once('?').unwrap().1);
    assert_eq!(params.get("error").map(String::as_str), Some("invalid_request"));
}

#[tokio::test]
async fn unknown_response_mode_is_rejected() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "response_type=code&client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&response_mode=web_message",
    ));

    let response = expect_response(middleware.process(request).await);
    let location = location_header(&response);
    let params = parse_params(location.split_once('?').unwrap().1);
    assert_eq!(params.get("error").map(String::as_str), Some("invalid_request"));
}

#[tokio::test]
async fn id_token_without_openid_scope_is_rejected() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "response_type=id_token&client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=profile",
    ));

    let response = expect_response(middleware.process(request).await);
    let location = location_header(&response);
    let params = parse_params(location.split_once('?').unwrap().1);
    assert_eq!(params.get("error").map(String::as_str), Some("invalid_request"));
}

// =============================================================================
// Error Page Tests
// =============================================================================

#[tokio::test]
async fn unknown_client_gets_error_page_not_redirect() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "response_type=code&client_id=intruder&redirect_uri=https%3A%2F%2Fevil%2Fcb&state=s",
    ));

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=UTF-8"
    );

    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert!(body.starts_with("error: invalid_client\n"));
    assert!(response.headers().get("location").is_none());
}

#[tokio::test]
async fn redirect_uri_with_fragment_gets_error_page() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "response_type=code&client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb%23frag",
    ));

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert!(body.starts_with("error: invalid_request\n"));
}

#[tokio::test]
async fn http_redirect_uri_requires_insecure_opt_in() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "response_type=code&client_id=abc&redirect_uri=http%3A%2F%2Fapp%2Fcb",
    ));

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_method_gets_error_page() {
    let middleware = middleware();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("https://idp.example/connect/authorize")
        .body(bytes::Bytes::new())
        .unwrap();

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn error_rendering_can_be_delegated_to_the_application() {
    let provider = Arc::new(TestProvider::default());
    let options = common::options_builder(provider)
        .application_can_display_errors(true)
        .build()
        .unwrap();
    let middleware = OidcServerMiddleware::new(options);

    let request = get_request(&authorize_uri(
        "response_type=code&client_id=intruder&redirect_uri=https%3A%2F%2Fevil%2Fcb",
    ));
    match middleware.process(request).await {
        RequestDisposition::Continue(passed) => {
            let recorded = passed
                .extensions()
                .get::<OidcResponseExtension>()
                .expect("error response must be recorded for the application");
            assert_eq!(recorded.0.error(), Some("invalid_client"));
        }
        _ => panic!("expected delegation to the inner pipeline"),
    }
}

// =============================================================================
// Response Mode Tests
// =============================================================================

#[tokio::test]
async fn implicit_flow_defaults_to_fragment_mode() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "response_type=token&client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&state=xyz",
    ));

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location_header(&response);
    assert!(!location.contains('?'));
    let fragment = location.split_once('#').expect("fragment expected").1;

    let params = parse_params(fragment);
    assert!(params.contains_key("access_token"));
    assert_eq!(params.get("token_type").map(String::as_str), Some("Bearer"));
    assert_eq!(params.get("expires_in").map(String::as_str), Some("3600"));
    assert_eq!(params.get("state").map(String::as_str), Some("xyz"));
}

#[tokio::test]
async fn form_post_mode_emits_auto_submitting_form() {
    let middleware = middleware();
    let request = get_request(&authorize_uri(
        "response_type=token&client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&state=xyz&response_mode=form_post",
    ));

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=UTF-8"
    );

    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert!(body.contains(r#"<form action="https://app/cb" method="post">"#));
    for input in ["access_token", "token_type", "expires_in", "state"] {
        assert!(body.contains(&format!(r#"name="{input}""#)), "missing input {input}");
    }
    for suppressed in ["client_id", "redirect_uri", "response_mode"] {
        assert!(
            !body.contains(&format!(r#"name="{suppressed}""#)),
            "unexpected input {suppressed}"
        );
    }
}

// =============================================================================
// Interactive Handoff Tests
// =============================================================================

#[tokio::test]
async fn request_without_sign_in_passes_through_with_stashed_message() {
    let middleware = middleware_with(TestProvider {
        sign_in: false,
        ..TestProvider::default()
    });
    let request = get_request(&authorize_uri(
        "response_type=code&client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid",
    ));

    match middleware.process(request).await {
        RequestDisposition::Continue(passed) => {
            let stashed = passed
                .extensions()
                .get::<OidcRequestExtension>()
                .expect("parsed request must be stashed");
            assert_eq!(stashed.0.client_id(), Some(CLIENT_ID));
            assert_eq!(stashed.0.response_type(), Some("code"));
        }
        _ => panic!("expected pass-through to the sign-in UI"),
    }
}
