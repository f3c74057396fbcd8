// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides common provider, options, request, and response helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]

//! Shared test utilities for `margaux_oidc_server`
//!
//! This module provides common test setup functions to reduce duplication
//! across integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Once, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{Method, Request, Response};

use margaux_oidc_server::crypto::{RsaKeyPair, SigningCredentials};
use margaux_oidc_server::errors::ProtocolError;
use margaux_oidc_server::provider::context::{
    GrantResourceOwnerCredentials, HandleAuthorizationRequest, ValidateAuthorizationRequest,
    ValidateClientAuthentication, ValidateClientRedirectUri, ValidateIntrospectionRequest,
    ValidateLogoutRequest, ValidateRevocationRequest,
};
use margaux_oidc_server::provider::{EventContext, OidcServerProvider};
use margaux_oidc_server::ticket::{claim_types, Claim};
use margaux_oidc_server::{
    AuthenticationTicket, ClaimsIdentity, OidcServerMiddleware, RequestDisposition,
    ServerOptionsBuilder,
};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Well-known test client.
pub const CLIENT_ID: &str = "abc";
pub const REDIRECT_URI: &str = "https://app/cb";
pub const SUBJECT: &str = "u1";
pub const USERNAME: &str = "u1";
pub const PASSWORD: &str = "pw";

/// Shared 2048-bit signing key so each test does not pay RSA generation.
pub fn shared_signing_key() -> RsaKeyPair {
    static KEY: OnceLock<RsaKeyPair> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaKeyPair::generate_with_key_size("test-signing-key", 2048)
            .expect("RSA key generation failed")
    })
    .clone()
}

/// Provider that trusts the well-known test client and signs subjects in.
#[derive(Clone)]
pub struct TestProvider {
    /// Sign in `SUBJECT` on the authorization endpoint when set.
    pub sign_in: bool,
    /// Extra claims attached to the signed-in identity.
    pub extra_claims: Vec<Claim>,
    /// Authorize introspection and revocation for the well-known client.
    pub confidential_endpoints: bool,
    /// Validate logout requests so post-logout redirects are honored.
    pub validate_logout: bool,
}

impl Default for TestProvider {
    fn default() -> Self {
        Self {
            sign_in: true,
            extra_claims: Vec::new(),
            confidential_endpoints: false,
            validate_logout: false,
        }
    }
}

impl TestProvider {
    pub fn ticket(&self) -> AuthenticationTicket {
        let mut identity = ClaimsIdentity::new("margaux-oidc-server")
            .with_claim(Claim::new(claim_types::SUBJECT, SUBJECT));
        for claim in &self.extra_claims {
            identity.add_claim(claim.clone());
        }
        AuthenticationTicket::new(identity)
    }
}

#[async_trait]
impl OidcServerProvider for TestProvider {
    async fn validate_client_redirect_uri(
        &self,
        context: &mut EventContext<ValidateClientRedirectUri>,
    ) {
        let client_matches = context.request.client_id() == Some(CLIENT_ID);
        let redirect_matches = context
            .request
            .redirect_uri()
            .map_or(true, |uri| uri == REDIRECT_URI);
        if client_matches && redirect_matches {
            context.outcome.validate();
        }
    }

    async fn validate_authorization_request(
        &self,
        context: &mut EventContext<ValidateAuthorizationRequest>,
    ) {
        context.outcome.validate();
    }

    async fn handle_authorization_request(
        &self,
        context: &mut EventContext<HandleAuthorizationRequest>,
    ) {
        if self.sign_in {
            let ticket = self.ticket();
            context.sign_in(ticket);
        }
    }

    async fn validate_client_authentication(
        &self,
        context: &mut EventContext<ValidateClientAuthentication>,
    ) {
        if context.client_id.as_deref() == Some(CLIENT_ID) {
            context.outcome.validate();
        }
    }

    async fn grant_resource_owner_credentials(
        &self,
        context: &mut EventContext<GrantResourceOwnerCredentials>,
    ) {
        if context.request.username() == Some(USERNAME)
            && context.request.password() == Some(PASSWORD)
        {
            context.ticket = Some(self.ticket());
            context.outcome.validate();
        } else {
            context
                .outcome
                .reject(ProtocolError::invalid_grant("Unknown resource owner."));
        }
    }

    async fn validate_introspection_request(
        &self,
        context: &mut EventContext<ValidateIntrospectionRequest>,
    ) {
        if self.confidential_endpoints && context.request.client_id() == Some(CLIENT_ID) {
            context.outcome.validate();
        }
    }

    async fn validate_revocation_request(
        &self,
        context: &mut EventContext<ValidateRevocationRequest>,
    ) {
        if self.confidential_endpoints && context.request.client_id() == Some(CLIENT_ID) {
            context.outcome.validate();
        }
    }

    async fn validate_logout_request(&self, context: &mut EventContext<ValidateLogoutRequest>) {
        if self.validate_logout {
            context.outcome.validate();
        }
    }
}

/// Options builder preconfigured with the test issuer, protection key, and
/// shared signing credentials.
pub fn options_builder(provider: Arc<dyn OidcServerProvider>) -> ServerOptionsBuilder {
    ServerOptionsBuilder::new("https://idp.example", provider)
        .data_protection_key([42u8; 32])
        .add_signing_credentials(SigningCredentials::rs256(shared_signing_key()))
}

/// Middleware over the default test provider.
pub fn middleware() -> OidcServerMiddleware {
    middleware_with(TestProvider::default())
}

pub fn middleware_with(provider: TestProvider) -> OidcServerMiddleware {
    init_test_logging();
    let options = options_builder(Arc::new(provider))
        .build()
        .expect("test options must build");
    OidcServerMiddleware::new(options)
}

pub fn get_request(uri: &str) -> Request<Bytes> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

pub fn post_form(uri: &str, body: &str) -> Request<Bytes> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Bytes::from(body.to_owned()))
        .unwrap()
}

/// Unwrap a disposition that must be a finished response.
pub fn expect_response(disposition: RequestDisposition) -> Response<Bytes> {
    match disposition {
        RequestDisposition::Response(response) => response,
        RequestDisposition::Continue(_) => panic!("expected a response, got a pass-through"),
        RequestDisposition::Abandon => panic!("expected a response, got an abandon"),
    }
}

pub fn location_header(response: &Response<Bytes>) -> String {
    response.headers()[LOCATION].to_str().unwrap().to_owned()
}

pub fn json_body(response: &Response<Bytes>) -> serde_json::Value {
    serde_json::from_slice(response.body()).expect("response body must be JSON")
}

/// Parse `name=value` pairs out of a query or fragment component.
pub fn parse_params(component: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(component.as_bytes())
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

/// Decode a JWT segment (header or payload) without verifying the signature.
pub fn decode_jwt_segment(token: &str, index: usize) -> serde_json::Value {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let segment = token.split('.').nth(index).expect("JWT segment missing");
    let bytes = URL_SAFE_NO_PAD.decode(segment).expect("JWT segment must be base64url");
    serde_json::from_slice(&bytes).expect("JWT segment must be JSON")
}

/// Drive a full authorization-code round trip and return the code.
pub async fn obtain_authorization_code(middleware: &OidcServerMiddleware) -> String {
    let request = get_request(&format!(
        "https://idp.example/connect/authorize?response_type=code&client_id={CLIENT_ID}\
         &redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&state=xyz"
    ));
    let response = expect_response(middleware.process(request).await);
    assert_eq!(response.status(), http::StatusCode::FOUND);

    let location = location_header(&response);
    let query = location.split_once('?').expect("redirect must carry a query").1;
    parse_params(query)
        .get("code")
        .expect("authorization code missing")
        .clone()
}
