// ABOUTME: Versioned binary envelope for opaque authentication tickets
// ABOUTME: Sentinel-compresses default field values and seals the payload through the data protector
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Opaque Ticket Format
//!
//! Version-3 binary envelope: format version, claims identity (with
//! sentinel-compressed defaults), bootstrap token, optional recursive actor
//! identity, then the authentication properties dictionary. Strings are
//! u32-LE-length-prefixed UTF-8; counts are u32-LE; flags are single bytes.
//! The serialized envelope is sealed by a purpose-bound [`TicketProtector`].

use chrono::{DateTime, Utc};

use crate::clock::RandomSource;
use crate::crypto::TicketProtector;
use crate::errors::ServerError;
use crate::ticket::{
    claim_types, AuthenticationProperties, AuthenticationTicket, Claim, ClaimsIdentity,
    LOCAL_AUTHORITY, XML_SCHEMA_STRING,
};

/// Current envelope version.
const FORMAT_VERSION: i32 = 3;

/// Marker standing in for a field equal to its well-known default.
const DEFAULT_SENTINEL: &str = "\0";

/// Property keys holding the issuance window inside the serialized dictionary.
const ISSUED_KEY: &str = ".issued";
const EXPIRES_KEY: &str = ".expires";

/// Serializer plus protector for one token kind.
pub struct TicketFormat {
    protector: TicketProtector,
}

impl TicketFormat {
    #[must_use]
    pub fn new(protector: TicketProtector) -> Self {
        Self { protector }
    }

    /// Serialize and seal a ticket.
    ///
    /// # Errors
    /// Returns an error if the RNG or the AEAD seal fails.
    pub fn protect(
        &self,
        rng: &dyn RandomSource,
        ticket: &AuthenticationTicket,
    ) -> Result<String, ServerError> {
        let payload = serialize_ticket(ticket);
        self.protector.protect(rng, &payload)
    }

    /// Open and deserialize a ticket. Returns `None` on any tampering,
    /// key mismatch, or malformed envelope.
    #[must_use]
    pub fn unprotect(&self, protected: &str) -> Option<AuthenticationTicket> {
        let payload = self.protector.unprotect(protected)?;
        deserialize_ticket(&payload)
    }
}

/// Serialize a ticket into the version-3 envelope.
#[must_use]
pub fn serialize_ticket(ticket: &AuthenticationTicket) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    write_identity(&mut buffer, &ticket.identity);
    write_properties(&mut buffer, &ticket.properties);
    buffer
}

/// Deserialize a version-3 envelope. `None` on malformed input or a version
/// this build does not understand.
#[must_use]
pub fn deserialize_ticket(payload: &[u8]) -> Option<AuthenticationTicket> {
    let mut reader = Reader::new(payload);
    let version = reader.read_i32()?;
    if version != FORMAT_VERSION {
        tracing::debug!(version, "rejecting ticket with unknown format version");
        return None;
    }

    let identity = read_identity(&mut reader)?;
    let properties = read_properties(&mut reader)?;
    Some(AuthenticationTicket {
        identity,
        properties,
    })
}

fn write_identity(buffer: &mut Vec<u8>, identity: &ClaimsIdentity) {
    write_string(buffer, &identity.authentication_scheme);
    write_with_default(buffer, &identity.name_claim_type, claim_types::NAME);
    write_with_default(buffer, &identity.role_claim_type, claim_types::ROLE);

    write_count(buffer, identity.claims.len());
    for claim in &identity.claims {
        write_claim(buffer, claim, &identity.name_claim_type);
    }

    match &identity.bootstrap_token {
        Some(token) => write_string(buffer, token),
        None => write_count(buffer, 0),
    }

    match &identity.actor {
        Some(actor) => {
            buffer.push(1);
            write_identity(buffer, actor);
        }
        None => buffer.push(0),
    }
}

fn write_claim(buffer: &mut Vec<u8>, claim: &Claim, name_claim_type: &str) {
    write_with_default(buffer, &claim.claim_type, name_claim_type);
    write_string(buffer, &claim.value);
    write_with_default(buffer, &claim.value_type, XML_SCHEMA_STRING);
    write_with_default(buffer, &claim.issuer, LOCAL_AUTHORITY);
    write_with_default(buffer, &claim.original_issuer, &claim.issuer);

    write_count(buffer, claim.properties.len());
    for (key, value) in &claim.properties {
        write_string(buffer, key);
        write_string(buffer, value);
    }
}

fn write_properties(buffer: &mut Vec<u8>, properties: &AuthenticationProperties) {
    let mut entries: Vec<(String, String)> = properties
        .dictionary
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if let Some(issued) = properties.issued_utc {
        entries.push((ISSUED_KEY.to_owned(), issued.to_rfc3339()));
    }
    if let Some(expires) = properties.expires_utc {
        entries.push((EXPIRES_KEY.to_owned(), expires.to_rfc3339()));
    }

    write_count(buffer, entries.len());
    for (key, value) in &entries {
        write_string(buffer, key);
        write_string(buffer, value);
    }
}

fn write_with_default(buffer: &mut Vec<u8>, value: &str, default: &str) {
    if value == default {
        write_string(buffer, DEFAULT_SENTINEL);
    } else {
        write_string(buffer, value);
    }
}

fn write_string(buffer: &mut Vec<u8>, value: &str) {
    write_count(buffer, value.len());
    buffer.extend_from_slice(value.as_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn write_count(buffer: &mut Vec<u8>, count: usize) {
    buffer.extend_from_slice(&(count as u32).to_le_bytes());
}

fn read_identity(reader: &mut Reader<'_>) -> Option<ClaimsIdentity> {
    let authentication_scheme = reader.read_string()?;
    let name_claim_type = read_with_default(reader, claim_types::NAME)?;
    let role_claim_type = read_with_default(reader, claim_types::ROLE)?;

    let claim_count = reader.read_count()?;
    let mut claims = Vec::with_capacity(claim_count.min(64));
    for _ in 0..claim_count {
        claims.push(read_claim(reader, &name_claim_type)?);
    }

    let bootstrap = reader.read_string()?;
    let bootstrap_token = if bootstrap.is_empty() {
        None
    } else {
        Some(bootstrap)
    };

    let actor = match reader.read_u8()? {
        0 => None,
        1 => Some(Box::new(read_identity(reader)?)),
        _ => return None,
    };

    Some(ClaimsIdentity {
        authentication_scheme,
        name_claim_type,
        role_claim_type,
        claims,
        bootstrap_token,
        actor,
    })
}

fn read_claim(reader: &mut Reader<'_>, name_claim_type: &str) -> Option<Claim> {
    let claim_type = read_with_default(reader, name_claim_type)?;
    let value = reader.read_string()?;
    let value_type = read_with_default(reader, XML_SCHEMA_STRING)?;
    let issuer = read_with_default(reader, LOCAL_AUTHORITY)?;
    let original_issuer = read_with_default(reader, &issuer)?;

    let property_count = reader.read_count()?;
    let mut properties = std::collections::BTreeMap::new();
    for _ in 0..property_count {
        let key = reader.read_string()?;
        let value = reader.read_string()?;
        properties.insert(key, value);
    }

    Some(Claim {
        claim_type,
        value,
        value_type,
        issuer,
        original_issuer,
        properties,
    })
}

fn read_properties(reader: &mut Reader<'_>) -> Option<AuthenticationProperties> {
    let count = reader.read_count()?;
    let mut properties = AuthenticationProperties::new();
    for _ in 0..count {
        let key = reader.read_string()?;
        let value = reader.read_string()?;
        match key.as_str() {
            ISSUED_KEY => properties.issued_utc = parse_timestamp(&value),
            EXPIRES_KEY => properties.expires_utc = parse_timestamp(&value),
            _ => {
                properties.dictionary.insert(key, value);
            }
        }
    }
    Some(properties)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn read_with_default(reader: &mut Reader<'_>, default: &str) -> Option<String> {
    let value = reader.read_string()?;
    if value == DEFAULT_SENTINEL {
        Some(default.to_owned())
    } else {
        Some(value)
    }
}

/// Cursor over the raw envelope bytes.
struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        let slice = &self.data[self.position..end];
        self.position = end;
        Some(slice)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.read_bytes(1).map(|bytes| bytes[0])
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.read_bytes(4)
            .map(|bytes| i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_count(&mut self) -> Option<usize> {
        self.read_bytes(4)
            .map(|bytes| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
    }

    fn read_string(&mut self) -> Option<String> {
        let len = self.read_count()?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).ok()
    }
}
