// ABOUTME: Integration tests for the introspection, revocation, and logout endpoints
// ABOUTME: Covers active/inactive reporting, code revocation, and post-logout redirects
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{
    expect_response, get_request, json_body, middleware_with, obtain_authorization_code, post_form,
    TestProvider,
};
use http::StatusCode;
use margaux_oidc_server::OidcServerMiddleware;
use serde_json::json;

const INTROSPECT_URI: &str = "https://idp.example/connect/introspect";
const REVOKE_URI: &str = "https://idp.example/connect/revoke";
const TOKEN_URI: &str = "https://idp.example/connect/token";
const LOGOUT_URI: &str = "https://idp.example/connect/logout";

fn confidential_middleware() -> OidcServerMiddleware {
    middleware_with(TestProvider {
        confidential_endpoints: true,
        validate_logout: true,
        ..TestProvider::default()
    })
}

async fn obtain_access_token(middleware: &OidcServerMiddleware) -> String {
    let code = obtain_authorization_code(middleware).await;
    let response = expect_response(
        middleware
            .process(post_form(
                TOKEN_URI,
                &format!(
                    "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fapp%2Fcb&client_id=abc"
                ),
            ))
            .await,
    );
    json_body(&response)["access_token"]
        .as_str()
        .unwrap()
        .to_owned()
}

// =============================================================================
// Introspection Tests
// =============================================================================

#[tokio::test]
async fn active_token_is_reported_with_metadata() {
    let middleware = confidential_middleware();
    let token = obtain_access_token(&middleware).await;

    let response = expect_response(
        middleware
            .process(post_form(
                INTROSPECT_URI,
                &format!("token={token}&client_id=abc"),
            ))
            .await,
    );

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(&response);
    assert_eq!(body["active"], json!(true));
    assert_eq!(body["iss"], json!("https://idp.example/"));
    assert_eq!(body["sub"], json!("u1"));
    assert_eq!(body["token_type"], json!("Bearer"));
    assert_eq!(body["client_id"], json!("abc"));
    assert!(body["exp"].as_i64().is_some());
    assert!(body["iat"].as_i64().is_some());
}

#[tokio::test]
async fn unknown_token_is_reported_inactive_without_detail() {
    let middleware = confidential_middleware();
    let response = expect_response(
        middleware
            .process(post_form(INTROSPECT_URI, "token=unknown&client_id=abc"))
            .await,
    );

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response), json!({ "active": false }));
}

#[tokio::test]
async fn unauthenticated_introspection_is_rejected() {
    let middleware = confidential_middleware();
    let response = expect_response(
        middleware
            .process(post_form(INTROSPECT_URI, "token=whatever"))
            .await,
    );

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn introspection_requires_the_token_parameter() {
    let middleware = confidential_middleware();
    let response = expect_response(
        middleware
            .process(post_form(INTROSPECT_URI, "client_id=abc"))
            .await,
    );

    assert_eq!(json_body(&response)["error"], json!("invalid_request"));
}

#[tokio::test]
async fn introspection_rejects_get_requests() {
    let middleware = confidential_middleware();
    let response = expect_response(
        middleware
            .process(get_request(&format!("{INTROSPECT_URI}?token=t")))
            .await,
    );

    assert_eq!(json_body(&response)["error"], json!("invalid_request"));
}

// =============================================================================
// Revocation Tests
// =============================================================================

#[tokio::test]
async fn revoked_code_can_no_longer_be_redeemed() {
    let middleware = confidential_middleware();
    let code = obtain_authorization_code(&middleware).await;

    let revocation = expect_response(
        middleware
            .process(post_form(
                REVOKE_URI,
                &format!("token={code}&client_id=abc"),
            ))
            .await,
    );
    assert_eq!(revocation.status(), StatusCode::OK);
    assert_eq!(json_body(&revocation), json!({}));

    let redemption = expect_response(
        middleware
            .process(post_form(
                TOKEN_URI,
                &format!(
                    "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fapp%2Fcb&client_id=abc"
                ),
            ))
            .await,
    );
    assert_eq!(json_body(&redemption)["error"], json!("invalid_grant"));
}

#[tokio::test]
async fn revoking_an_unknown_token_still_succeeds() {
    let middleware = confidential_middleware();
    let response = expect_response(
        middleware
            .process(post_form(REVOKE_URI, "token=unknown&client_id=abc"))
            .await,
    );

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_revocation_is_rejected() {
    let middleware = confidential_middleware();
    let response = expect_response(
        middleware
            .process(post_form(REVOKE_URI, "token=whatever"))
            .await,
    );

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Logout Tests
// =============================================================================

#[tokio::test]
async fn validated_logout_redirects_to_post_logout_uri_with_state() {
    let middleware = confidential_middleware();
    let request = get_request(&format!(
        "{LOGOUT_URI}?post_logout_redirect_uri=https%3A%2F%2Fapp%2Fsigned-out&state=bye"
    ));

    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = common::location_header(&response);
    assert!(location.starts_with("https://app/signed-out?"));
    let params = common::parse_params(location.split_once('?').unwrap().1);
    assert_eq!(params.get("state").map(String::as_str), Some("bye"));
}

#[tokio::test]
async fn unvalidated_logout_passes_through() {
    // The default TestProvider does not validate logout requests.
    let middleware = middleware_with(TestProvider::default());
    let request = get_request(&format!(
        "{LOGOUT_URI}?post_logout_redirect_uri=https%3A%2F%2Fapp%2Fsigned-out"
    ));

    match middleware.process(request).await {
        margaux_oidc_server::RequestDisposition::Continue(_) => {}
        _ => panic!("expected logout pass-through"),
    }
}
