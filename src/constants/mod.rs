// ABOUTME: Application constants shared across endpoint handlers and the token service
// ABOUTME: Groups OAuth/OIDC protocol literals into a single namespace
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

pub mod oauth;
