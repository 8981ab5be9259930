//! # Attribute Model
//!
//! The fixed tagged union of value types, the values themselves, and the
//! immutable attribute definitions the catalog hands out.
//!
//! No runtime reflection: every attribute is declared up front with one of
//! the [`ValueType`] variants, and every write is checked against that
//! declaration before it reaches a store.

use crate::primitives::{AttrName, Capability, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// VALUE TYPES
// =============================================================================

/// The declared type of an extended attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueType {
    /// Arbitrary JSON document (e.g. an analytic distribution mapping).
    Json,
    /// Signed 64-bit integer.
    Integer,
    /// Unordered many-to-many relation to other entities.
    RelationMany,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Integer => f.write_str("integer"),
            Self::RelationMany => f.write_str("relation-many"),
        }
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// A concrete attribute value.
///
/// The `Json` payload serializes as canonical JSON text rather than as a
/// structured tree: the binary persistence format (postcard) is not
/// self-describing and cannot round-trip `serde_json::Value` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A JSON document.
    Json(#[serde(with = "json_text")] serde_json::Value),
    /// An integer.
    Integer(i64),
    /// A set of related entity ids. `BTreeSet` keeps relation order
    /// deterministic regardless of insertion order.
    Relation(BTreeSet<EntityId>),
}

impl AttributeValue {
    /// The [`ValueType`] this value belongs to.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Json(_) => ValueType::Json,
            Self::Integer(_) => ValueType::Integer,
            Self::Relation(_) => ValueType::RelationMany,
        }
    }

    /// Whether this value conforms to a declared type.
    #[must_use]
    pub fn conforms_to(&self, declared: ValueType) -> bool {
        self.value_type() == declared
    }

    /// Build a relation value from raw entity ids.
    pub fn relation_from_ids<I: IntoIterator<Item = u64>>(ids: I) -> Self {
        Self::Relation(ids.into_iter().map(EntityId).collect())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(v) => f.write_str(&v.to_string()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Relation(ids) => {
                let joined = ids
                    .iter()
                    .map(|id| id.0.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "[{joined}]")
            }
        }
    }
}

/// Serialize a `serde_json::Value` as its canonical text form.
///
/// Postcard carries strings fine but cannot drive `Value`'s
/// `deserialize_any`; going through text keeps one codec for every store.
mod json_text {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &serde_json::Value,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<serde_json::Value, D::Error> {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map_err(D::Error::custom)
    }
}

// =============================================================================
// DEFINITIONS
// =============================================================================

/// The declaration of one extended attribute.
///
/// Immutable once registered: the catalog never updates or removes a
/// definition, it only rejects duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute name, unique within its entity kind.
    pub name: AttrName,
    /// Declared value type; writes of any other type are rejected.
    pub value_type: ValueType,
    /// Capability a caller must hold to read or write the attribute.
    pub required_capability: Capability,
    /// When set, every successful write appends one change record.
    pub trackable: bool,
}

impl AttributeDefinition {
    /// Declare a new attribute.
    pub fn new(
        name: impl Into<AttrName>,
        value_type: ValueType,
        required_capability: impl Into<Capability>,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            required_capability: required_capability.into(),
            trackable: false,
        }
    }

    /// Mark the attribute as change-tracked.
    #[must_use]
    pub fn tracked(mut self) -> Self {
        self.trackable = true;
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
