// ABOUTME: OAuth 2.0 and OpenID Connect protocol literals
// ABOUTME: Parameter names, error codes, grant types, response types/modes, and claim names
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Protocol literals used by the endpoint handlers and the token service.

/// Request and response parameter names.
pub mod params {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const CODE: &str = "code";
    pub const ERROR: &str = "error";
    pub const ERROR_DESCRIPTION: &str = "error_description";
    pub const ERROR_URI: &str = "error_uri";
    pub const EXPIRES_IN: &str = "expires_in";
    pub const GRANT_TYPE: &str = "grant_type";
    pub const ID_TOKEN: &str = "id_token";
    pub const ID_TOKEN_HINT: &str = "id_token_hint";
    pub const NONCE: &str = "nonce";
    pub const PASSWORD: &str = "password";
    pub const POST_LOGOUT_REDIRECT_URI: &str = "post_logout_redirect_uri";
    pub const REDIRECT_URI: &str = "redirect_uri";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const RESOURCE: &str = "resource";
    pub const RESPONSE_MODE: &str = "response_mode";
    pub const RESPONSE_TYPE: &str = "response_type";
    pub const SCOPE: &str = "scope";
    pub const STATE: &str = "state";
    pub const TOKEN: &str = "token";
    pub const TOKEN_TYPE: &str = "token_type";
    pub const TOKEN_TYPE_HINT: &str = "token_type_hint";
    pub const USERNAME: &str = "username";
}

/// OAuth 2.0 error codes (RFC 6749 section 5.2 and section 4.1.2.1).
pub mod errors {
    pub const ACCESS_DENIED: &str = "access_denied";
    pub const INVALID_CLIENT: &str = "invalid_client";
    pub const INVALID_GRANT: &str = "invalid_grant";
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const INVALID_SCOPE: &str = "invalid_scope";
    pub const SERVER_ERROR: &str = "server_error";
    pub const UNAUTHORIZED_CLIENT: &str = "unauthorized_client";
    pub const UNSUPPORTED_GRANT_TYPE: &str = "unsupported_grant_type";
    pub const UNSUPPORTED_RESPONSE_TYPE: &str = "unsupported_response_type";
}

/// Grant type values accepted at the token endpoint.
pub mod grant_types {
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";
    pub const IMPLICIT: &str = "implicit";
    pub const PASSWORD: &str = "password";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Response type components recognized at the authorization endpoint.
pub mod response_types {
    pub const CODE: &str = "code";
    pub const ID_TOKEN: &str = "id_token";
    pub const TOKEN: &str = "token";
}

/// Response delivery modes for the authorization endpoint.
pub mod response_modes {
    pub const FORM_POST: &str = "form_post";
    pub const FRAGMENT: &str = "fragment";
    pub const QUERY: &str = "query";
}

/// Token type values.
pub mod token_types {
    pub const BEARER: &str = "Bearer";
}

/// Token type hints accepted by introspection and revocation (RFC 7009/7662).
pub mod token_type_hints {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Standard OIDC scope values the core recognizes.
pub mod scopes {
    pub const EMAIL: &str = "email";
    pub const OPENID: &str = "openid";
    pub const PHONE: &str = "phone";
    pub const PROFILE: &str = "profile";
}

/// JWT and userinfo claim names (OIDC core section 5.1).
pub mod claims {
    pub const AUDIENCE: &str = "aud";
    pub const AT_HASH: &str = "at_hash";
    pub const BIRTHDATE: &str = "birthdate";
    pub const C_HASH: &str = "c_hash";
    pub const EMAIL: &str = "email";
    pub const EMAIL_VERIFIED: &str = "email_verified";
    pub const EXPIRATION: &str = "exp";
    pub const FAMILY_NAME: &str = "family_name";
    pub const GIVEN_NAME: &str = "given_name";
    pub const ISSUED_AT: &str = "iat";
    pub const ISSUER: &str = "iss";
    pub const NAME: &str = "name";
    pub const NONCE: &str = "nonce";
    pub const NOT_BEFORE: &str = "nbf";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const PHONE_NUMBER_VERIFIED: &str = "phone_number_verified";
    pub const SUBJECT: &str = "sub";
}

/// Discovery metadata field names (OIDC discovery 1.0 section 3).
pub mod metadata {
    pub const AUTHORIZATION_ENDPOINT: &str = "authorization_endpoint";
    pub const END_SESSION_ENDPOINT: &str = "end_session_endpoint";
    pub const GRANT_TYPES_SUPPORTED: &str = "grant_types_supported";
    pub const ID_TOKEN_SIGNING_ALG_VALUES_SUPPORTED: &str =
        "id_token_signing_alg_values_supported";
    pub const INTROSPECTION_ENDPOINT: &str = "introspection_endpoint";
    pub const ISSUER: &str = "issuer";
    pub const JWKS_URI: &str = "jwks_uri";
    pub const RESPONSE_MODES_SUPPORTED: &str = "response_modes_supported";
    pub const RESPONSE_TYPES_SUPPORTED: &str = "response_types_supported";
    pub const REVOCATION_ENDPOINT: &str = "revocation_endpoint";
    pub const SCOPES_SUPPORTED: &str = "scopes_supported";
    pub const SUBJECT_TYPES_SUPPORTED: &str = "subject_types_supported";
    pub const TOKEN_ENDPOINT: &str = "token_endpoint";
    pub const USERINFO_ENDPOINT: &str = "userinfo_endpoint";
}
