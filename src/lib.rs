// ABOUTME: Main library entry point for the Margaux OIDC authorization-server middleware
// ABOUTME: Re-exports the options, provider contract, middleware, and core protocol types
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # Margaux OIDC Server
//!
//! An embeddable OpenID Connect 1.0 / OAuth 2.0 authorization server that
//! plugs into an HTTP middleware pipeline. The middleware recognizes the
//! protocol endpoints on incoming requests, drives the per-endpoint state
//! machines, invokes application-supplied policy hooks at every decision
//! point, and emits protocol-compliant responses — redirects, form posts,
//! JSON bodies, JWKS documents, and discovery metadata.
//!
//! ## Architecture
//!
//! - **Options**: frozen configuration built once through
//!   [`ServerOptionsBuilder`] — issuer, endpoint paths, lifetimes, key
//!   material, ticket formats, injected clock/RNG/cache.
//! - **Provider**: [`OidcServerProvider`], a trait with one hook per protocol
//!   event; every hook defaults to "not touched".
//! - **Middleware**: [`OidcServerMiddleware::process`] classifies each
//!   request and returns a [`RequestDisposition`] — response, pass-through,
//!   or abandoned.
//! - **Token service**: issuance and consumption of access tokens, identity
//!   tokens, refresh tokens, and one-shot authorization codes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use margaux_oidc_server::{
//!     OidcServerMiddleware, ServerOptionsBuilder, provider::DefaultProvider,
//! };
//!
//! # fn main() -> Result<(), margaux_oidc_server::errors::ServerError> {
//! let options = ServerOptionsBuilder::new("https://idp.example", Arc::new(DefaultProvider))
//!     .data_protection_key([0u8; 32])
//!     .build()?;
//! let middleware = OidcServerMiddleware::new(options);
//! # let _ = middleware;
//! # Ok(())
//! # }
//! ```

/// Authorization-code cache abstraction and the in-memory implementation
pub mod cache;

/// Injectable clock and random-source traits
pub mod clock;

/// Frozen server options and their builder
pub mod config;

/// Protocol literals shared across handlers
pub mod constants;

/// Key material, JWK publication, and data protection
pub mod crypto;

/// Endpoint handlers (internal; reached through the middleware)
mod endpoints;

/// Protocol and fatal error types
pub mod errors;

/// The OIDC request/response parameter bag
pub mod message;

/// Dispatcher middleware and request dispositions
pub mod middleware;

/// Provider contract and notification contexts
pub mod provider;

/// Authentication tickets, claims, and destinations
pub mod ticket;

/// Token issuance and consumption
pub mod tokens;

pub use config::{ServerOptions, ServerOptionsBuilder};
pub use errors::{ProtocolError, ServerError};
pub use message::OidcMessage;
pub use middleware::{OidcServerMiddleware, RequestDisposition};
pub use provider::{Endpoint, EventContext, OidcServerProvider};
pub use ticket::{AuthenticationTicket, Claim, ClaimsIdentity};
