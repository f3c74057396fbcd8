// ABOUTME: Provider contract — one hook per protocol event, all defaulting to untouched
// ABOUTME: Applications override only the decision points they care about
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Server Provider
//!
//! [`OidcServerProvider`] is the vtable of application policy hooks invoked at
//! every decision point: endpoint classification, per-endpoint
//! validate/handle/apply triples, per-grant handlers, and token lifecycle
//! events. Every method has an empty default body, so implementations
//! override only what they need; a hook communicates through its context's
//! [`Outcome`](context::Outcome) rather than a return value.
//!
//! Within a request, hooks fire in the documented order
//! (match → validate → handle → apply); every hook invocation is a suspension
//! point and no lock is held across it.

pub mod context;

pub use context::{Endpoint, EventContext, Outcome};

use async_trait::async_trait;

use context::{
    ApplyAuthorizationResponse, ApplyConfigurationResponse, ApplyCryptographyResponse,
    ApplyIntrospectionResponse, ApplyLogoutResponse, ApplyRevocationResponse,
    ApplyUserinfoResponse, CreateAccessToken, CreateAuthorizationCode, CreateIdentityToken,
    CreateRefreshToken, GrantAuthorizationCode, GrantClientCredentials, GrantCustomExtension,
    GrantRefreshToken, GrantResourceOwnerCredentials, HandleAuthorizationRequest,
    HandleConfigurationRequest, HandleCryptographyRequest, HandleIntrospectionRequest,
    HandleLogoutRequest, HandleRevocationRequest, HandleUserinfoRequest, MatchEndpoint,
    ReceiveAccessToken, ReceiveAuthorizationCode, ReceiveRefreshToken, TokenEndpoint,
    TokenEndpointResponse, ValidateAuthorizationRequest, ValidateClientAuthentication,
    ValidateClientRedirectUri, ValidateConfigurationRequest, ValidateCryptographyRequest,
    ValidateIntrospectionRequest, ValidateLogoutRequest, ValidateRevocationRequest,
    ValidateUserinfoRequest,
};

/// Application-supplied policy hooks driving every endpoint state machine.
#[allow(unused_variables)]
#[async_trait]
pub trait OidcServerProvider: Send + Sync {
    /// Override the dispatcher's endpoint classification.
    async fn match_endpoint(&self, context: &mut EventContext<MatchEndpoint>) {}

    async fn validate_configuration_request(
        &self,
        context: &mut EventContext<ValidateConfigurationRequest>,
    ) {
        context.outcome.validate();
    }

    async fn handle_configuration_request(
        &self,
        context: &mut EventContext<HandleConfigurationRequest>,
    ) {
    }

    async fn apply_configuration_response(
        &self,
        context: &mut EventContext<ApplyConfigurationResponse>,
    ) {
    }

    async fn validate_cryptography_request(
        &self,
        context: &mut EventContext<ValidateCryptographyRequest>,
    ) {
        context.outcome.validate();
    }

    async fn handle_cryptography_request(
        &self,
        context: &mut EventContext<HandleCryptographyRequest>,
    ) {
    }

    async fn apply_cryptography_response(
        &self,
        context: &mut EventContext<ApplyCryptographyResponse>,
    ) {
    }

    /// Decide whether the client and its `redirect_uri` are trusted. The
    /// default leaves the context unvalidated, which clears the stored
    /// `redirect_uri` and routes errors to the error page.
    async fn validate_client_redirect_uri(
        &self,
        context: &mut EventContext<ValidateClientRedirectUri>,
    ) {
    }

    async fn validate_authorization_request(
        &self,
        context: &mut EventContext<ValidateAuthorizationRequest>,
    ) {
    }

    async fn handle_authorization_request(
        &self,
        context: &mut EventContext<HandleAuthorizationRequest>,
    ) {
    }

    async fn apply_authorization_response(
        &self,
        context: &mut EventContext<ApplyAuthorizationResponse>,
    ) {
    }

    /// Authenticate the client on the token endpoint. An unvalidated context
    /// fails the exchange with `invalid_client`.
    async fn validate_client_authentication(
        &self,
        context: &mut EventContext<ValidateClientAuthentication>,
    ) {
    }

    async fn grant_authorization_code(
        &self,
        context: &mut EventContext<GrantAuthorizationCode>,
    ) {
        context.outcome.validate();
    }

    async fn grant_resource_owner_credentials(
        &self,
        context: &mut EventContext<GrantResourceOwnerCredentials>,
    ) {
    }

    async fn grant_client_credentials(
        &self,
        context: &mut EventContext<GrantClientCredentials>,
    ) {
    }

    async fn grant_refresh_token(&self, context: &mut EventContext<GrantRefreshToken>) {
        context.outcome.validate();
    }

    async fn grant_custom_extension(&self, context: &mut EventContext<GrantCustomExtension>) {}

    async fn token_endpoint(&self, context: &mut EventContext<TokenEndpoint>) {}

    async fn token_endpoint_response(&self, context: &mut EventContext<TokenEndpointResponse>) {}

    async fn validate_userinfo_request(
        &self,
        context: &mut EventContext<ValidateUserinfoRequest>,
    ) {
        context.outcome.validate();
    }

    async fn handle_userinfo_request(&self, context: &mut EventContext<HandleUserinfoRequest>) {}

    async fn apply_userinfo_response(&self, context: &mut EventContext<ApplyUserinfoResponse>) {}

    /// Authenticate the caller before any token metadata is disclosed. The
    /// default leaves the context unvalidated, failing the request.
    async fn validate_introspection_request(
        &self,
        context: &mut EventContext<ValidateIntrospectionRequest>,
    ) {
    }

    async fn handle_introspection_request(
        &self,
        context: &mut EventContext<HandleIntrospectionRequest>,
    ) {
    }

    async fn apply_introspection_response(
        &self,
        context: &mut EventContext<ApplyIntrospectionResponse>,
    ) {
    }

    /// Authenticate the caller before tokens are discarded. The default
    /// leaves the context unvalidated, failing the request.
    async fn validate_revocation_request(
        &self,
        context: &mut EventContext<ValidateRevocationRequest>,
    ) {
    }

    async fn handle_revocation_request(
        &self,
        context: &mut EventContext<HandleRevocationRequest>,
    ) {
    }

    async fn apply_revocation_response(
        &self,
        context: &mut EventContext<ApplyRevocationResponse>,
    ) {
    }

    async fn validate_logout_request(&self, context: &mut EventContext<ValidateLogoutRequest>) {}

    async fn handle_logout_request(&self, context: &mut EventContext<HandleLogoutRequest>) {}

    async fn apply_logout_response(&self, context: &mut EventContext<ApplyLogoutResponse>) {}

    async fn create_access_token(&self, context: &mut EventContext<CreateAccessToken>) {}

    async fn create_identity_token(&self, context: &mut EventContext<CreateIdentityToken>) {}

    async fn create_refresh_token(&self, context: &mut EventContext<CreateRefreshToken>) {}

    async fn create_authorization_code(
        &self,
        context: &mut EventContext<CreateAuthorizationCode>,
    ) {
    }

    async fn receive_access_token(&self, context: &mut EventContext<ReceiveAccessToken>) {}

    async fn receive_authorization_code(
        &self,
        context: &mut EventContext<ReceiveAuthorizationCode>,
    ) {
    }

    async fn receive_refresh_token(&self, context: &mut EventContext<ReceiveRefreshToken>) {}
}

/// Provider that never touches any notification; every endpoint falls back to
/// its default behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProvider;

#[async_trait]
impl OidcServerProvider for DefaultProvider {}
