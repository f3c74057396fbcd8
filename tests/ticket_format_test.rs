// ABOUTME: Integration tests for the opaque ticket format wired through the server options
// ABOUTME: Round trips full tickets and verifies purpose isolation between token kinds
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use chrono::{Duration, SubsecRound, Utc};
use common::TestProvider;
use margaux_oidc_server::ticket::{claim_types, destinations, properties, Claim};
use margaux_oidc_server::{AuthenticationTicket, ClaimsIdentity, ServerOptions};

fn options() -> ServerOptions {
    common::init_test_logging();
    common::options_builder(Arc::new(TestProvider::default()))
        .build()
        .unwrap()
}

fn full_ticket() -> AuthenticationTicket {
    let mut identity = ClaimsIdentity::new("margaux-oidc-server")
        .with_claim(Claim::new(claim_types::SUBJECT, "u1"))
        .with_claim(
            Claim::new("email", "u1@example.com")
                .with_destinations(&[destinations::ACCESS_TOKEN, destinations::IDENTITY_TOKEN]),
        );
    identity.bootstrap_token = Some("bootstrap".to_owned());
    identity.actor = Some(Box::new(
        ClaimsIdentity::new("delegation").with_claim(Claim::new(claim_types::SUBJECT, "service-7")),
    ));

    let mut ticket = AuthenticationTicket::new(identity);
    ticket.properties.set(properties::CLIENT_ID, "abc");
    ticket.properties.set(properties::SCOPE, "openid email");
    ticket.properties.set(properties::PRESENTERS, "abc");
    let now = Utc::now().trunc_subsecs(0);
    ticket.properties.issued_utc = Some(now);
    ticket.properties.expires_utc = Some(now + Duration::minutes(5));
    ticket
}

#[test]
fn protected_ticket_round_trips_including_actor_chain() {
    let options = options();
    let ticket = full_ticket();

    let protected = options
        .access_token_format
        .protect(options.rng.as_ref(), &ticket)
        .unwrap();
    let restored = options.access_token_format.unprotect(&protected).unwrap();

    assert_eq!(restored, ticket);
    assert_eq!(
        restored.identity.actor.as_ref().unwrap().claims[0].value,
        "service-7"
    );
}

#[test]
fn token_kinds_cannot_be_swapped() {
    let options = options();
    let ticket = full_ticket();

    let refresh = options
        .refresh_token_format
        .protect(options.rng.as_ref(), &ticket)
        .unwrap();

    // A refresh token must not be redeemable as an access token or a code.
    assert!(options.access_token_format.unprotect(&refresh).is_none());
    assert!(options.authorization_code_format.unprotect(&refresh).is_none());
    assert!(options.refresh_token_format.unprotect(&refresh).is_some());
}

#[test]
fn protected_output_is_url_safe() {
    let options = options();
    let protected = options
        .access_token_format
        .protect(options.rng.as_ref(), &full_ticket())
        .unwrap();

    assert!(!protected.contains('+'));
    assert!(!protected.contains('/'));
    assert!(!protected.contains('='));
}

#[test]
fn tampered_payloads_are_rejected() {
    let options = options();
    let mut protected = options
        .access_token_format
        .protect(options.rng.as_ref(), &full_ticket())
        .unwrap();

    let flipped = if protected.ends_with('A') { 'B' } else { 'A' };
    protected.pop();
    protected.push(flipped);

    assert!(options.access_token_format.unprotect(&protected).is_none());
}
