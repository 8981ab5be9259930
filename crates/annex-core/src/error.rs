//! # Error Types
//!
//! One error kind per observable failure mode. Every failing operation
//! leaves the underlying store unchanged; nothing is swallowed or retried
//! inside the engine.

use crate::attribute::ValueType;
use crate::primitives::{AttrName, Capability, EntityKind};
use thiserror::Error;

/// Errors surfaced by the extension engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    /// Attribute name is empty or exceeds the engine bound.
    #[error("invalid attribute name `{name}`")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// An attribute with this name is already registered for the kind.
    /// Definitions are immutable once registered.
    #[error("attribute `{name}` is already registered for `{kind}`")]
    DuplicateAttribute {
        /// The entity kind the registration targeted.
        kind: EntityKind,
        /// The already-taken name.
        name: AttrName,
    },

    /// No attribute with this name is registered for the kind.
    #[error("unknown attribute `{name}` for `{kind}`")]
    UnknownAttribute {
        /// The entity kind that was queried.
        kind: EntityKind,
        /// The unknown name.
        name: AttrName,
    },

    /// The caller does not hold the capability gating the attribute.
    #[error("access to `{name}` denied: requires capability `{required}`")]
    AccessDenied {
        /// The gated attribute.
        name: AttrName,
        /// The capability the caller would need.
        required: Capability,
    },

    /// The value does not conform to the attribute's declared type.
    #[error("type mismatch for `{name}`: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The attribute being written.
        name: AttrName,
        /// The declared value type.
        expected: ValueType,
        /// The type of the rejected value.
        actual: ValueType,
    },

    /// The storage medium failed. The triggering write and its change
    /// record roll back together; no orphaned value or record remains.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

// =============================================================================
// TESTS
// =============================================================================
