// ABOUTME: Endpoint dispatcher — classifies requests, enforces HTTPS, and routes to handlers
// ABOUTME: Unmatched requests pass through untouched to the next pipeline stage
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Middleware Entry Point
//!
//! [`OidcServerMiddleware::process`] runs once per HTTP request: match the
//! path against the configured endpoint paths, let the provider override the
//! classification through `match_endpoint`, enforce the HTTPS requirement,
//! then branch into the endpoint handler. The return value tells the host
//! pipeline what happened — a finished response, a pass-through to the next
//! stage, or an abandoned exchange.

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};

use crate::config::ServerOptions;
use crate::endpoints;
use crate::provider::context::MatchEndpoint;
use crate::provider::{Endpoint, EventContext};

/// What the middleware decided about a request.
pub enum RequestDisposition {
    /// A finished response the host must write.
    Response(Response<Bytes>),
    /// Not for this middleware (or delegated): hand the request — possibly
    /// annotated with extensions — to the next pipeline stage.
    Continue(Request<Bytes>),
    /// Stop processing without writing a response.
    Abandon,
}

/// The OIDC / OAuth 2.0 authorization-server middleware.
pub struct OidcServerMiddleware {
    options: Arc<ServerOptions>,
}

impl OidcServerMiddleware {
    #[must_use]
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    #[must_use]
    pub fn options(&self) -> &Arc<ServerOptions> {
        &self.options
    }

    /// Process one request.
    pub async fn process(&self, request: Request<Bytes>) -> RequestDisposition {
        let path = request.uri().path().to_owned();
        let endpoint = self.options.endpoint_for_path(&path);

        let mut matched = EventContext::new(self.options.clone(), MatchEndpoint { endpoint });
        self.options.provider.match_endpoint(&mut matched).await;
        if let Some(response) = matched.outcome.take_response() {
            return RequestDisposition::Response(response);
        }
        if matched.outcome.is_request_completed() {
            return RequestDisposition::Abandon;
        }

        let Some(endpoint) = matched.payload.endpoint else {
            return RequestDisposition::Continue(request);
        };

        // An OIDC endpoint reached over plain HTTP leaks codes and tokens;
        // abandon the exchange without an answer unless explicitly allowed.
        if request.uri().scheme_str() == Some("http") && !self.options.allow_insecure_http {
            tracing::warn!(path = %path, "abandoning insecure HTTP request to an OIDC endpoint");
            return RequestDisposition::Abandon;
        }

        tracing::debug!(path = %path, ?endpoint, "dispatching OIDC endpoint request");

        match endpoint {
            Endpoint::Authorization => {
                endpoints::authorization::invoke(self.options.clone(), request).await
            }
            Endpoint::Configuration => {
                endpoints::configuration::invoke(self.options.clone(), request).await
            }
            Endpoint::Cryptography => endpoints::jwks::invoke(self.options.clone(), request).await,
            Endpoint::Token => endpoints::token::invoke(self.options.clone(), request).await,
            Endpoint::Userinfo => endpoints::userinfo::invoke(self.options.clone(), request).await,
            Endpoint::Introspection => {
                endpoints::introspection::invoke(self.options.clone(), request).await
            }
            Endpoint::Revocation => {
                endpoints::revocation::invoke(self.options.clone(), request).await
            }
            Endpoint::Logout => endpoints::logout::invoke(self.options.clone(), request).await,
        }
    }
}
