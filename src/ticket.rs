// ABOUTME: Authentication ticket model — claims identity plus authentication properties
// ABOUTME: Carries destination tagging, delegation actors, and the well-known property keys
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Authentication Ticket
//!
//! The server's internal representation of an authenticated session: a
//! [`ClaimsIdentity`] paired with [`AuthenticationProperties`]. Tickets are
//! created by the provider inside validate/grant hooks, mutated by the token
//! lifecycle hooks, serialized into opaque tokens, and never retained between
//! requests.
//!
//! Each [`Claim`] may declare *destinations* — the token kinds allowed to embed
//! it. The token service filters claims by destination before emission.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Default claim value type.
pub const XML_SCHEMA_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// Default claim issuer.
pub const LOCAL_AUTHORITY: &str = "LOCAL AUTHORITY";

/// Well-known claim types.
pub mod claim_types {
    /// Subject identifier (OIDC `sub`).
    pub const SUBJECT: &str = "sub";
    /// Name identifier, interchangeable with `sub` for subject resolution.
    pub const NAME_IDENTIFIER: &str =
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
    /// Default name claim type for new identities.
    pub const NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";
    /// Default role claim type for new identities.
    pub const ROLE: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";
}

/// Claim property key listing the token kinds a claim may appear in.
pub const DESTINATIONS_PROPERTY: &str = "destinations";

/// Destination tokens recognized by the claim filter.
pub mod destinations {
    /// The claim may be embedded in access tokens.
    pub const ACCESS_TOKEN: &str = "token";
    /// The claim may be embedded in identity tokens.
    pub const IDENTITY_TOKEN: &str = "id_token";
}

/// Well-known authentication property keys recorded at issuance time.
pub mod properties {
    /// Client the grant was issued to; verified on code redemption.
    pub const CLIENT_ID: &str = "client_id";
    /// Redirect URI recorded with an authorization code, when one was sent.
    pub const REDIRECT_URI: &str = "redirect_uri";
    /// Space-separated scopes granted to the ticket.
    pub const SCOPE: &str = "scope";
    /// Nonce captured from the authorization request for later id_token echo.
    pub const NONCE: &str = "nonce";
    /// Space-separated clients authorized to present tokens from this ticket.
    pub const PRESENTERS: &str = "presenters";
}

/// A single claim with its metadata and property bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    pub value_type: String,
    pub issuer: String,
    pub original_issuer: String,
    pub properties: BTreeMap<String, String>,
}

impl Claim {
    /// Create a claim with default value type and issuer metadata.
    #[must_use]
    pub fn new(claim_type: &str, value: &str) -> Self {
        Self {
            claim_type: claim_type.to_owned(),
            value: value.to_owned(),
            value_type: XML_SCHEMA_STRING.to_owned(),
            issuer: LOCAL_AUTHORITY.to_owned(),
            original_issuer: LOCAL_AUTHORITY.to_owned(),
            properties: BTreeMap::new(),
        }
    }

    /// Tag the claim with the destinations allowed to embed it.
    #[must_use]
    pub fn with_destinations(mut self, destinations: &[&str]) -> Self {
        self.properties
            .insert(DESTINATIONS_PROPERTY.to_owned(), destinations.join(" "));
        self
    }

    /// Declared destinations, empty when the claim carries none.
    #[must_use]
    pub fn destinations(&self) -> Vec<&str> {
        self.properties
            .get(DESTINATIONS_PROPERTY)
            .map(|value| value.split(' ').filter(|part| !part.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Whether the claim is allowed in the given destination.
    #[must_use]
    pub fn has_destination(&self, destination: &str) -> bool {
        self.destinations().contains(&destination)
    }
}

/// A claim set bound to an authentication scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsIdentity {
    /// Authentication scheme that produced this identity.
    pub authentication_scheme: String,
    /// Claim type treated as the identity's display name.
    pub name_claim_type: String,
    /// Claim type treated as the identity's role.
    pub role_claim_type: String,
    pub claims: Vec<Claim>,
    /// Opaque bootstrap token captured at sign-in, if any.
    pub bootstrap_token: Option<String>,
    /// Delegation: the identity acting on behalf of this one. Owned and boxed,
    /// so serialization recursion terminates with the chain.
    pub actor: Option<Box<ClaimsIdentity>>,
}

impl ClaimsIdentity {
    #[must_use]
    pub fn new(authentication_scheme: &str) -> Self {
        Self {
            authentication_scheme: authentication_scheme.to_owned(),
            name_claim_type: claim_types::NAME.to_owned(),
            role_claim_type: claim_types::ROLE.to_owned(),
            claims: Vec::new(),
            bootstrap_token: None,
            actor: None,
        }
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// Builder-style claim attachment.
    #[must_use]
    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }

    /// First claim of the given type.
    #[must_use]
    pub fn find_claim(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.claim_type == claim_type)
    }

    /// Subject value: the `sub` claim, falling back to the name identifier.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.find_claim(claim_types::SUBJECT)
            .or_else(|| self.find_claim(claim_types::NAME_IDENTIFIER))
            .map(|claim| claim.value.as_str())
    }
}

/// Dictionary of authentication state plus the issuance window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationProperties {
    pub dictionary: BTreeMap<String, String>,
    pub issued_utc: Option<DateTime<Utc>>,
    pub expires_utc: Option<DateTime<Utc>>,
}

impl AuthenticationProperties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.dictionary.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.dictionary.insert(key.to_owned(), value.to_owned());
    }
}

/// Identity plus properties: the unit the token service serializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationTicket {
    pub identity: ClaimsIdentity,
    pub properties: AuthenticationProperties,
}

impl AuthenticationTicket {
    #[must_use]
    pub fn new(identity: ClaimsIdentity) -> Self {
        Self {
            identity,
            properties: AuthenticationProperties::new(),
        }
    }

    /// Whether the ticket's expiration, if any, is at or before `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.properties
            .expires_utc
            .is_some_and(|expires| expires <= now)
    }

    /// Scopes recorded at issuance.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.properties
            .get(properties::SCOPE)
            .map(|scope| scope.split(' ').filter(|part| !part.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Clients recorded as authorized presenters.
    #[must_use]
    pub fn presenters(&self) -> Vec<&str> {
        self.properties
            .get(properties::PRESENTERS)
            .map(|list| list.split(' ').filter(|part| !part.is_empty()).collect())
            .unwrap_or_default()
    }
}
