// ABOUTME: Integration tests for the token endpoint grant dispatch and issuance
// ABOUTME: Covers code redemption, one-shot semantics, grant defaults, and response shape
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{
    expect_response, json_body, middleware, obtain_authorization_code, post_form, TestProvider,
};
use http::StatusCode;
use margaux_oidc_server::OidcServerMiddleware;
use serde_json::json;

const TOKEN_URI: &str = "https://idp.example/connect/token";

// =============================================================================
// Authorization Code Redemption Tests
// =============================================================================

#[tokio::test]
async fn code_redemption_returns_full_token_response() {
    let middleware = middleware();
    let code = obtain_authorization_code(&middleware).await;

    let request = post_form(
        TOKEN_URI,
        &format!(
            "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fapp%2Fcb&client_id=abc"
        ),
    );
    let response = expect_response(middleware.process(request).await);

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-cache");
    assert_eq!(response.headers()["pragma"], "no-cache");
    assert_eq!(response.headers()["expires"], "-1");

    let body = json_body(&response);
    assert_eq!(body["token_type"], json!("Bearer"));
    assert_eq!(body["expires_in"], json!(3600));
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
    // Identity tokens are JWTs: three dot-separated segments.
    let id_token = body["id_token"].as_str().unwrap();
    assert_eq!(id_token.split('.').count(), 3);
}

#[tokio::test]
async fn codes_are_single_use() {
    let middleware = middleware();
    let code = obtain_authorization_code(&middleware).await;
    let form = format!(
        "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fapp%2Fcb&client_id=abc"
    );

    let first = expect_response(middleware.process(post_form(TOKEN_URI, &form)).await);
    assert_eq!(first.status(), StatusCode::OK);

    let second = expect_response(middleware.process(post_form(TOKEN_URI, &form)).await);
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&second)["error"], json!("invalid_grant"));
}

#[tokio::test]
async fn redemption_rejects_mismatched_redirect_uri() {
    let middleware = middleware();
    let code = obtain_authorization_code(&middleware).await;

    let request = post_form(
        TOKEN_URI,
        &format!(
            "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fother%2Fcb&client_id=abc"
        ),
    );
    let response = expect_response(middleware.process(request).await);

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&response)["error"], json!("invalid_grant"));
}

#[tokio::test]
async fn mismatched_redirect_uri_still_burns_the_code() {
    let middleware = middleware();
    let code = obtain_authorization_code(&middleware).await;

    let bad = post_form(
        TOKEN_URI,
        &format!(
            "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fother%2Fcb&client_id=abc"
        ),
    );
    expect_response(middleware.process(bad).await);

    // A correct retry must fail: the code was removed on first lookup.
    let good = post_form(
        TOKEN_URI,
        &format!(
            "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fapp%2Fcb&client_id=abc"
        ),
    );
    let response = expect_response(middleware.process(good).await);
    assert_eq!(json_body(&response)["error"], json!("invalid_grant"));
}

#[tokio::test]
async fn unknown_code_yields_invalid_grant() {
    let middleware = middleware();
    let request = post_form(
        TOKEN_URI,
        "grant_type=authorization_code&code=bogus&client_id=abc",
    );
    let response = expect_response(middleware.process(request).await);

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&response)["error"], json!("invalid_grant"));
}

#[tokio::test]
async fn missing_code_parameter_yields_invalid_request() {
    let middleware = middleware();
    let request = post_form(TOKEN_URI, "grant_type=authorization_code&client_id=abc");
    let response = expect_response(middleware.process(request).await);

    assert_eq!(json_body(&response)["error"], json!("invalid_request"));
}

// =============================================================================
// Client Authentication Tests
// =============================================================================

#[tokio::test]
async fn unauthenticated_client_yields_invalid_client() {
    let middleware = middleware();
    let request = post_form(TOKEN_URI, "grant_type=password&username=u1&password=pw");
    let response = expect_response(middleware.process(request).await);

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&response)["error"], json!("invalid_client"));
}

#[tokio::test]
async fn basic_header_authenticates_the_client() {
    let middleware = middleware();
    let mut request = post_form(TOKEN_URI, "grant_type=password&username=u1&password=pw");
    // base64("abc:secret")
    request.headers_mut().insert(
        http::header::AUTHORIZATION,
        "Basic YWJjOnNlY3JldA==".parse().unwrap(),
    );

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Grant Dispatch Tests
// =============================================================================

#[tokio::test]
async fn password_grant_issues_tokens() {
    let middleware = middleware();
    let request = post_form(
        TOKEN_URI,
        "grant_type=password&username=u1&password=pw&client_id=abc",
    );
    let response = expect_response(middleware.process(request).await);

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(&response);
    assert!(body["access_token"].as_str().is_some());
    assert_eq!(body["token_type"], json!("Bearer"));
}

#[tokio::test]
async fn password_grant_rejects_bad_credentials() {
    let middleware = middleware();
    let request = post_form(
        TOKEN_URI,
        "grant_type=password&username=u1&password=wrong&client_id=abc",
    );
    let response = expect_response(middleware.process(request).await);

    assert_eq!(json_body(&response)["error"], json!("invalid_grant"));
}

#[tokio::test]
async fn client_credentials_grant_defaults_to_unauthorized_client() {
    let middleware = middleware();
    let request = post_form(TOKEN_URI, "grant_type=client_credentials&client_id=abc");
    let response = expect_response(middleware.process(request).await);

    assert_eq!(json_body(&response)["error"], json!("unauthorized_client"));
}

#[tokio::test]
async fn custom_grant_defaults_to_unsupported_grant_type() {
    let middleware = middleware();
    let request = post_form(
        TOKEN_URI,
        "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code&client_id=abc",
    );
    let response = expect_response(middleware.process(request).await);

    assert_eq!(
        json_body(&response)["error"],
        json!("unsupported_grant_type")
    );
}

#[tokio::test]
async fn missing_grant_type_yields_unsupported_grant_type() {
    let middleware = middleware();
    let request = post_form(TOKEN_URI, "client_id=abc");
    let response = expect_response(middleware.process(request).await);

    assert_eq!(
        json_body(&response)["error"],
        json!("unsupported_grant_type")
    );
}

// =============================================================================
// Refresh Token Tests
// =============================================================================

#[tokio::test]
async fn refresh_grant_rotates_tokens_under_sliding_expiration() {
    let middleware = middleware();
    let code = obtain_authorization_code(&middleware).await;

    let initial = expect_response(
        middleware
            .process(post_form(
                TOKEN_URI,
                &format!(
                    "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fapp%2Fcb&client_id=abc"
                ),
            ))
            .await,
    );
    let refresh_token = json_body(&initial)["refresh_token"]
        .as_str()
        .unwrap()
        .to_owned();

    let refreshed = expect_response(
        middleware
            .process(post_form(
                TOKEN_URI,
                &format!("grant_type=refresh_token&refresh_token={refresh_token}&client_id=abc"),
            ))
            .await,
    );
    assert_eq!(refreshed.status(), StatusCode::OK);

    let body = json_body(&refreshed);
    assert!(body["access_token"].as_str().is_some());
    // Sliding expiration is the default: a fresh refresh token is issued.
    assert!(body["refresh_token"].as_str().is_some());
}

#[tokio::test]
async fn refresh_grant_omits_rotation_without_sliding_expiration() {
    let options = common::options_builder(Arc::new(TestProvider::default()))
        .use_sliding_expiration(false)
        .build()
        .unwrap();
    let middleware = OidcServerMiddleware::new(options);

    let code = obtain_authorization_code(&middleware).await;
    let initial = expect_response(
        middleware
            .process(post_form(
                TOKEN_URI,
                &format!(
                    "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fapp%2Fcb&client_id=abc"
                ),
            ))
            .await,
    );
    let refresh_token = json_body(&initial)["refresh_token"]
        .as_str()
        .unwrap()
        .to_owned();

    let refreshed = expect_response(
        middleware
            .process(post_form(
                TOKEN_URI,
                &format!("grant_type=refresh_token&refresh_token={refresh_token}&client_id=abc"),
            ))
            .await,
    );
    let body = json_body(&refreshed);
    assert!(body["access_token"].as_str().is_some());
    assert!(body.get("refresh_token").is_none());
}

#[tokio::test]
async fn garbage_refresh_token_yields_invalid_grant() {
    let middleware = middleware();
    let request = post_form(
        TOKEN_URI,
        "grant_type=refresh_token&refresh_token=not-a-token&client_id=abc",
    );
    let response = expect_response(middleware.process(request).await);

    assert_eq!(json_body(&response)["error"], json!("invalid_grant"));
}

// =============================================================================
// Request Shape Tests
// =============================================================================

#[tokio::test]
async fn get_requests_are_rejected() {
    let middleware = middleware();
    let response = expect_response(
        middleware
            .process(common::get_request(
                "https://idp.example/connect/token?grant_type=password",
            ))
            .await,
    );

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&response)["error"], json!("invalid_request"));
}

#[tokio::test]
async fn json_bodies_are_rejected() {
    let middleware = middleware();
    let request = http::Request::builder()
        .method(http::Method::POST)
        .uri(TOKEN_URI)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(bytes::Bytes::from_static(b"{\"grant_type\":\"password\"}"))
        .unwrap();

    let response = expect_response(middleware.process(request).await);
    assert_eq!(json_body(&response)["error"], json!("invalid_request"));
}

// =============================================================================
// Fatal Condition Tests
// =============================================================================

#[tokio::test]
async fn missing_signing_credentials_surface_as_server_error() {
    // The token endpoint always mints an identity token, which requires
    // signing credentials.
    let provider = Arc::new(TestProvider::default());
    let options = margaux_oidc_server::ServerOptionsBuilder::new("https://idp.example", provider)
        .data_protection_key([42u8; 32])
        .build()
        .unwrap();
    let middleware = OidcServerMiddleware::new(options);

    let request = post_form(
        TOKEN_URI,
        "grant_type=password&username=u1&password=pw&client_id=abc",
    );
    let response = expect_response(middleware.process(request).await);

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&response)["error"], json!("server_error"));
}
