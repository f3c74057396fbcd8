// ABOUTME: Frozen server options with builder-side eager validation
// ABOUTME: Issuer, endpoint paths, lifetimes, key material, formats, and injected collaborators
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Server Options
//!
//! [`ServerOptions`] is constructed once through [`ServerOptionsBuilder`],
//! validated eagerly, and never mutated afterwards — every request handler
//! reads it through a shared `Arc`. Construction fails when the issuer is
//! malformed or the data-protection key is missing, so an instance that
//! exists is an instance that can serve requests.

use std::sync::Arc;

use chrono::Duration;
use url::Url;

use crate::cache::{CodeCache, InMemoryCodeCache};
use crate::clock::{Clock, RandomSource, SystemClock, SystemRandomSource};
use crate::crypto::{DataProtector, EncryptionCredentials, SigningCredentials};
use crate::errors::ServerError;
use crate::provider::{Endpoint, OidcServerProvider};
use crate::tokens::serializer::TicketFormat;

/// Middleware name, used in data-protection purpose tuples.
pub const MIDDLEWARE_NAME: &str = "margaux-oidc-server";

/// Ticket format version string, part of every purpose tuple.
const FORMAT_VERSION_PURPOSE: &str = "v3";

/// Default endpoint paths.
mod default_paths {
    pub const AUTHORIZATION: &str = "/connect/authorize";
    pub const CONFIGURATION: &str = "/.well-known/openid-configuration";
    pub const CRYPTOGRAPHY: &str = "/.well-known/jwks";
    pub const INTROSPECTION: &str = "/connect/introspect";
    pub const LOGOUT: &str = "/connect/logout";
    pub const REVOCATION: &str = "/connect/revoke";
    pub const TOKEN: &str = "/connect/token";
    pub const USERINFO: &str = "/connect/userinfo";
}

/// Immutable middleware configuration.
pub struct ServerOptions {
    /// Absolute issuer URI without query or fragment.
    pub issuer: Url,
    /// Authentication scheme stamped on tickets this middleware issues.
    pub authentication_scheme: String,
    pub provider: Arc<dyn OidcServerProvider>,
    pub clock: Arc<dyn Clock>,
    pub rng: Arc<dyn RandomSource>,
    pub cache: Arc<dyn CodeCache>,

    pub authorization_endpoint_path: Option<String>,
    pub configuration_endpoint_path: Option<String>,
    pub cryptography_endpoint_path: Option<String>,
    pub token_endpoint_path: Option<String>,
    pub userinfo_endpoint_path: Option<String>,
    pub introspection_endpoint_path: Option<String>,
    pub revocation_endpoint_path: Option<String>,
    pub logout_endpoint_path: Option<String>,

    pub access_token_lifetime: Duration,
    pub authorization_code_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub identity_token_lifetime: Duration,

    pub signing_credentials: Vec<SigningCredentials>,
    pub encryption_credentials: Vec<EncryptionCredentials>,

    pub access_token_format: TicketFormat,
    pub authorization_code_format: TicketFormat,
    pub refresh_token_format: TicketFormat,

    /// Emit access tokens as signed JWTs instead of opaque tickets.
    pub use_jwt_access_tokens: bool,
    pub allow_insecure_http: bool,
    pub use_sliding_expiration: bool,
    /// Delegate error-page rendering to the inner pipeline.
    pub application_can_display_errors: bool,
}

impl ServerOptions {
    /// Classify a request path against the configured endpoint paths.
    #[must_use]
    pub fn endpoint_for_path(&self, path: &str) -> Option<Endpoint> {
        let matches = |configured: &Option<String>| {
            configured.as_deref().is_some_and(|candidate| candidate == path)
        };

        if matches(&self.authorization_endpoint_path) {
            Some(Endpoint::Authorization)
        } else if matches(&self.configuration_endpoint_path) {
            Some(Endpoint::Configuration)
        } else if matches(&self.cryptography_endpoint_path) {
            Some(Endpoint::Cryptography)
        } else if matches(&self.token_endpoint_path) {
            Some(Endpoint::Token)
        } else if matches(&self.userinfo_endpoint_path) {
            Some(Endpoint::Userinfo)
        } else if matches(&self.introspection_endpoint_path) {
            Some(Endpoint::Introspection)
        } else if matches(&self.revocation_endpoint_path) {
            Some(Endpoint::Revocation)
        } else if matches(&self.logout_endpoint_path) {
            Some(Endpoint::Logout)
        } else {
            None
        }
    }

    /// Absolute URL for an endpoint path, anchored at the issuer.
    #[must_use]
    pub fn endpoint_url(&self, path: &str) -> String {
        let base = self.issuer.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }

    /// Issuer with a guaranteed trailing slash, as emitted in `iss` claims.
    #[must_use]
    pub fn issuer_with_trailing_slash(&self) -> String {
        let issuer = self.issuer.as_str();
        if issuer.ends_with('/') {
            issuer.to_owned()
        } else {
            format!("{issuer}/")
        }
    }
}

/// Builder for [`ServerOptions`]; `build` performs the eager validation.
pub struct ServerOptionsBuilder {
    issuer: String,
    authentication_scheme: String,
    provider: Arc<dyn OidcServerProvider>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    cache: Arc<dyn CodeCache>,
    master_key: Option<[u8; 32]>,

    authorization_endpoint_path: Option<String>,
    configuration_endpoint_path: Option<String>,
    cryptography_endpoint_path: Option<String>,
    token_endpoint_path: Option<String>,
    userinfo_endpoint_path: Option<String>,
    introspection_endpoint_path: Option<String>,
    revocation_endpoint_path: Option<String>,
    logout_endpoint_path: Option<String>,

    access_token_lifetime: Duration,
    authorization_code_lifetime: Duration,
    refresh_token_lifetime: Duration,
    identity_token_lifetime: Duration,

    signing_credentials: Vec<SigningCredentials>,
    encryption_credentials: Vec<EncryptionCredentials>,

    use_jwt_access_tokens: bool,
    allow_insecure_http: bool,
    use_sliding_expiration: bool,
    application_can_display_errors: bool,
}

impl ServerOptionsBuilder {
    /// Start from an issuer and a provider; everything else has defaults.
    pub fn new(issuer: &str, provider: Arc<dyn OidcServerProvider>) -> Self {
        Self {
            issuer: issuer.to_owned(),
            authentication_scheme: MIDDLEWARE_NAME.to_owned(),
            provider,
            clock: Arc::new(SystemClock),
            rng: Arc::new(SystemRandomSource::new()),
            cache: Arc::new(InMemoryCodeCache::new()),
            master_key: None,
            authorization_endpoint_path: Some(default_paths::AUTHORIZATION.to_owned()),
            configuration_endpoint_path: Some(default_paths::CONFIGURATION.to_owned()),
            cryptography_endpoint_path: Some(default_paths::CRYPTOGRAPHY.to_owned()),
            token_endpoint_path: Some(default_paths::TOKEN.to_owned()),
            userinfo_endpoint_path: Some(default_paths::USERINFO.to_owned()),
            introspection_endpoint_path: Some(default_paths::INTROSPECTION.to_owned()),
            revocation_endpoint_path: Some(default_paths::REVOCATION.to_owned()),
            logout_endpoint_path: Some(default_paths::LOGOUT.to_owned()),
            access_token_lifetime: Duration::hours(1),
            authorization_code_lifetime: Duration::minutes(5),
            refresh_token_lifetime: Duration::days(14),
            identity_token_lifetime: Duration::minutes(20),
            signing_credentials: Vec::new(),
            encryption_credentials: Vec::new(),
            use_jwt_access_tokens: false,
            allow_insecure_http: false,
            use_sliding_expiration: true,
            application_can_display_errors: false,
        }
    }

    #[must_use]
    pub fn authentication_scheme(mut self, scheme: &str) -> Self {
        self.authentication_scheme = scheme.to_owned();
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn rng(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CodeCache>) -> Self {
        self.cache = cache;
        self
    }

    /// 256-bit master key feeding the data-protection hierarchy. Required.
    #[must_use]
    pub fn data_protection_key(mut self, key: [u8; 32]) -> Self {
        self.master_key = Some(key);
        self
    }

    #[must_use]
    pub fn authorization_endpoint(mut self, path: Option<&str>) -> Self {
        self.authorization_endpoint_path = path.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn configuration_endpoint(mut self, path: Option<&str>) -> Self {
        self.configuration_endpoint_path = path.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn cryptography_endpoint(mut self, path: Option<&str>) -> Self {
        self.cryptography_endpoint_path = path.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn token_endpoint(mut self, path: Option<&str>) -> Self {
        self.token_endpoint_path = path.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn userinfo_endpoint(mut self, path: Option<&str>) -> Self {
        self.userinfo_endpoint_path = path.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn introspection_endpoint(mut self, path: Option<&str>) -> Self {
        self.introspection_endpoint_path = path.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn revocation_endpoint(mut self, path: Option<&str>) -> Self {
        self.revocation_endpoint_path = path.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn logout_endpoint(mut self, path: Option<&str>) -> Self {
        self.logout_endpoint_path = path.map(str::to_owned);
        self
    }

    #[must_use]
    pub fn access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn authorization_code_lifetime(mut self, lifetime: Duration) -> Self {
        self.authorization_code_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn identity_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.identity_token_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn add_signing_credentials(mut self, credentials: SigningCredentials) -> Self {
        self.signing_credentials.push(credentials);
        self
    }

    #[must_use]
    pub fn add_encryption_credentials(mut self, credentials: EncryptionCredentials) -> Self {
        self.encryption_credentials.push(credentials);
        self
    }

    #[must_use]
    pub fn use_jwt_access_tokens(mut self, enabled: bool) -> Self {
        self.use_jwt_access_tokens = enabled;
        self
    }

    #[must_use]
    pub fn allow_insecure_http(mut self, enabled: bool) -> Self {
        self.allow_insecure_http = enabled;
        self
    }

    #[must_use]
    pub fn use_sliding_expiration(mut self, enabled: bool) -> Self {
        self.use_sliding_expiration = enabled;
        self
    }

    #[must_use]
    pub fn application_can_display_errors(mut self, enabled: bool) -> Self {
        self.application_can_display_errors = enabled;
        self
    }

    /// Validate and freeze the options.
    ///
    /// # Errors
    /// Returns [`ServerError::Options`] when the issuer is not an absolute
    /// URI, carries a query or fragment, uses `http` without
    /// `allow_insecure_http`, or no data-protection key was supplied.
    pub fn build(self) -> Result<ServerOptions, ServerError> {
        let issuer = Url::parse(&self.issuer)
            .map_err(|e| ServerError::Options(format!("issuer is not an absolute URI: {e}")))?;

        if issuer.query().is_some() || issuer.fragment().is_some() {
            return Err(ServerError::Options(
                "issuer must not contain a query or fragment".to_owned(),
            ));
        }

        if issuer.scheme() == "http" && !self.allow_insecure_http {
            return Err(ServerError::Options(
                "issuer requires HTTPS unless allow_insecure_http is set".to_owned(),
            ));
        }

        let master_key = self.master_key.ok_or_else(|| {
            ServerError::Options("a 256-bit data-protection key is required".to_owned())
        })?;

        let protector = DataProtector::new(master_key);
        let scheme = self.authentication_scheme.as_str();
        let format_for = |kind: &str| -> Result<TicketFormat, ServerError> {
            Ok(TicketFormat::new(protector.create(&[
                MIDDLEWARE_NAME,
                scheme,
                kind,
                FORMAT_VERSION_PURPOSE,
            ])?))
        };

        let access_token_format = format_for("access_token")?;
        let authorization_code_format = format_for("authorization_code")?;
        let refresh_token_format = format_for("refresh_token")?;

        Ok(ServerOptions {
            issuer,
            authentication_scheme: self.authentication_scheme,
            provider: self.provider,
            clock: self.clock,
            rng: self.rng,
            cache: self.cache,
            authorization_endpoint_path: self.authorization_endpoint_path,
            configuration_endpoint_path: self.configuration_endpoint_path,
            cryptography_endpoint_path: self.cryptography_endpoint_path,
            token_endpoint_path: self.token_endpoint_path,
            userinfo_endpoint_path: self.userinfo_endpoint_path,
            introspection_endpoint_path: self.introspection_endpoint_path,
            revocation_endpoint_path: self.revocation_endpoint_path,
            logout_endpoint_path: self.logout_endpoint_path,
            access_token_lifetime: self.access_token_lifetime,
            authorization_code_lifetime: self.authorization_code_lifetime,
            refresh_token_lifetime: self.refresh_token_lifetime,
            identity_token_lifetime: self.identity_token_lifetime,
            signing_credentials: self.signing_credentials,
            encryption_credentials: self.encryption_credentials,
            access_token_format,
            authorization_code_format,
            refresh_token_format,
            use_jwt_access_tokens: self.use_jwt_access_tokens,
            allow_insecure_http: self.allow_insecure_http,
            use_sliding_expiration: self.use_sliding_expiration,
            application_can_display_errors: self.application_can_display_errors,
        })
    }
}
