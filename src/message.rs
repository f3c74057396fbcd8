// ABOUTME: Typed view over the OAuth/OIDC request and response parameter bag
// ABOUTME: Parses query strings and form bodies and exposes named accessors per parameter
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # OIDC Message
//!
//! [`OidcMessage`] is the single parameter-bag type shared by every endpoint:
//! requests are parsed into it, responses are composed in it, and the
//! response-mode writers and JSON serializer consume it. A parameter may carry
//! multiple values (`resource` does in practice); named accessors return the
//! first value.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::constants::oauth::params;

/// String-to-string(+) parameter bag with named accessors for the protocol
/// parameters the core understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OidcMessage {
    parameters: BTreeMap<String, Vec<String>>,
}

macro_rules! accessor {
    ($(#[$doc:meta])* $getter:ident, $setter:ident, $name:expr) => {
        $(#[$doc])*
        #[must_use]
        pub fn $getter(&self) -> Option<&str> {
            self.get($name)
        }

        pub fn $setter(&mut self, value: &str) {
            self.set($name, value);
        }
    };
}

impl OidcMessage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a message from an urlencoded query string or form body.
    #[must_use]
    pub fn from_urlencoded(input: &[u8]) -> Self {
        let mut message = Self::new();
        for (key, value) in url::form_urlencoded::parse(input) {
            message.add(&key, &value);
        }
        message
    }

    /// First value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a parameter.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.parameters.get(name).map_or(&[], Vec::as_slice)
    }

    /// Replace a parameter with a single value.
    pub fn set(&mut self, name: &str, value: &str) {
        self.parameters
            .insert(name.to_owned(), vec![value.to_owned()]);
    }

    /// Append an additional value to a parameter.
    pub fn add(&mut self, name: &str, value: &str) {
        self.parameters
            .entry(name.to_owned())
            .or_default()
            .push(value.to_owned());
    }

    /// Remove a parameter entirely.
    pub fn remove(&mut self, name: &str) {
        self.parameters.remove(name);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Iterate `(name, value)` pairs, flattening multi-valued parameters.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters.iter().flat_map(|(name, values)| {
            values.iter().map(move |value| (name.as_str(), value.as_str()))
        })
    }

    accessor!(
        /// `client_id` request parameter.
        client_id, set_client_id, params::CLIENT_ID);
    accessor!(
        /// `redirect_uri` parameter. Invariant: when present, absolute with no
        /// fragment — enforced by the authorization endpoint before use.
        redirect_uri, set_redirect_uri, params::REDIRECT_URI);
    accessor!(response_type, set_response_type, params::RESPONSE_TYPE);
    accessor!(response_mode, set_response_mode, params::RESPONSE_MODE);
    accessor!(scope, set_scope, params::SCOPE);
    accessor!(state, set_state, params::STATE);
    accessor!(nonce, set_nonce, params::NONCE);
    accessor!(code, set_code, params::CODE);
    accessor!(grant_type, set_grant_type, params::GRANT_TYPE);
    accessor!(refresh_token, set_refresh_token, params::REFRESH_TOKEN);
    accessor!(access_token, set_access_token, params::ACCESS_TOKEN);
    accessor!(id_token, set_id_token, params::ID_TOKEN);
    accessor!(id_token_hint, set_id_token_hint, params::ID_TOKEN_HINT);
    accessor!(
        post_logout_redirect_uri,
        set_post_logout_redirect_uri,
        params::POST_LOGOUT_REDIRECT_URI
    );
    accessor!(resource, set_resource, params::RESOURCE);
    accessor!(error, set_error, params::ERROR);
    accessor!(
        error_description,
        set_error_description,
        params::ERROR_DESCRIPTION
    );
    accessor!(error_uri, set_error_uri, params::ERROR_URI);
    accessor!(expires_in, set_expires_in, params::EXPIRES_IN);
    accessor!(token_type, set_token_type, params::TOKEN_TYPE);
    accessor!(token, set_token, params::TOKEN);
    accessor!(token_type_hint, set_token_type_hint, params::TOKEN_TYPE_HINT);
    accessor!(username, set_username, params::USERNAME);
    accessor!(password, set_password, params::PASSWORD);
    accessor!(client_secret, set_client_secret, params::CLIENT_SECRET);

    /// Drop the `redirect_uri` parameter, used when the client could not be
    /// trusted with it.
    pub fn remove_redirect_uri(&mut self) {
        self.remove(params::REDIRECT_URI);
    }

    /// Whether the space-separated `scope` parameter contains `value`.
    #[must_use]
    pub fn has_scope(&self, value: &str) -> bool {
        self.scope()
            .is_some_and(|scope| scope.split(' ').any(|part| part == value))
    }

    /// Whether the space-separated `response_type` contains `value`.
    #[must_use]
    pub fn has_response_type(&self, value: &str) -> bool {
        self.response_type()
            .is_some_and(|rt| rt.split(' ').any(|part| part == value))
    }

    /// All values of the `resource` parameter, splitting space-separated lists.
    #[must_use]
    pub fn resources(&self) -> Vec<&str> {
        self.get_all(params::RESOURCE)
            .iter()
            .flat_map(|value| value.split(' '))
            .filter(|part| !part.is_empty())
            .collect()
    }

    /// Serialize to a JSON object. `expires_in` becomes a number when it
    /// parses as one; multi-valued parameters become arrays.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (name, values) in &self.parameters {
            let entry = if name == params::EXPIRES_IN {
                values
                    .first()
                    .and_then(|value| value.parse::<i64>().ok())
                    .map_or_else(
                        || Value::String(values.first().cloned().unwrap_or_default()),
                        |seconds| Value::Number(Number::from(seconds)),
                    )
            } else if values.len() == 1 {
                Value::String(values[0].clone())
            } else {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            };
            object.insert(name.clone(), entry);
        }
        Value::Object(object)
    }
}

/// Request-extension key carrying the parsed OIDC request message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcRequestExtension(pub OidcMessage);

/// Request-extension key carrying the pending OIDC response message, recorded
/// when error rendering is delegated to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcResponseExtension(pub OidcMessage);
