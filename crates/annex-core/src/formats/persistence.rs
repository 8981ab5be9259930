//! Postcard encoding behind a one-byte version header.
//!
//! Every stored blob is `[FORMAT_VERSION][postcard payload]`. The header
//! lets a future format revision coexist with already-written databases;
//! an unknown version decodes to a persistence error instead of garbage.

use crate::attribute::AttributeDefinition;
use crate::change::ChangeRecord;
use crate::error::ExtensionError;
use crate::AttributeValue;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ExtensionError> {
    let payload = postcard::to_stdvec(value)
        .map_err(|e| ExtensionError::Persistence(format!("encode failed: {e}")))?;
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ExtensionError> {
    let (&version, payload) = bytes
        .split_first()
        .ok_or_else(|| ExtensionError::Persistence("empty stored blob".into()))?;
    if version != FORMAT_VERSION {
        return Err(ExtensionError::Persistence(format!(
            "unsupported format version {version} (expected {FORMAT_VERSION})"
        )));
    }
    postcard::from_bytes(payload)
        .map_err(|e| ExtensionError::Persistence(format!("decode failed: {e}")))
}

/// Encode an attribute value for storage.
pub fn encode_value(value: &AttributeValue) -> Result<Vec<u8>, ExtensionError> {
    encode(value)
}

/// Decode a stored attribute value.
pub fn decode_value(bytes: &[u8]) -> Result<AttributeValue, ExtensionError> {
    decode(bytes)
}

/// Encode a change record for storage.
pub fn encode_record(record: &ChangeRecord) -> Result<Vec<u8>, ExtensionError> {
    encode(record)
}

/// Decode a stored change record.
pub fn decode_record(bytes: &[u8]) -> Result<ChangeRecord, ExtensionError> {
    decode(bytes)
}

/// Encode an attribute definition for storage.
pub fn encode_definition(definition: &AttributeDefinition) -> Result<Vec<u8>, ExtensionError> {
    encode(definition)
}

/// Decode a stored attribute definition.
pub fn decode_definition(bytes: &[u8]) -> Result<AttributeDefinition, ExtensionError> {
    decode(bytes)
}

// =============================================================================
// TESTS
// =============================================================================
