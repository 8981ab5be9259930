//! # Primitives
//!
//! Typed identifiers and computational bounds shared across the engine.
//!
//! All identifiers are newtypes so that an entity id can never be confused
//! with a change sequence number, and all collections of them use `BTreeMap`/
//! `BTreeSet` for deterministic ordering.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// BOUNDS
// =============================================================================

/// Maximum byte length for entity kinds, attribute names, and capabilities.
pub const MAX_NAME_LEN: usize = 256;

/// Default page size for history scans.
pub const DEFAULT_HISTORY_PAGE: usize = 256;

/// Upper bound on a single history page (computational bound on store scans).
pub const MAX_HISTORY_PAGE: usize = 1024;

// =============================================================================
// ENTITY IDENTIFIERS
// =============================================================================

/// Identifier of a business object within its entity kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of an entity type that attributes are attached to
/// (e.g. `contract_version`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKind(String);

impl EntityKind {
    /// Create a new entity kind.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The kind name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for EntityKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A concrete record: one business object of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// The entity kind this record belongs to.
    pub kind: EntityKind,
    /// The record id within that kind.
    pub id: EntityId,
}

impl EntityRef {
    /// Create a reference to one record.
    pub fn new(kind: impl Into<EntityKind>, id: u64) -> Self {
        Self {
            kind: kind.into(),
            id: EntityId(id),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

// =============================================================================
// ATTRIBUTE NAMES
// =============================================================================

/// Name of an extended attribute, unique within its entity kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttrName(String);

impl AttrName {
    /// Create a new attribute name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the name against the engine bounds: non-empty, at most
    /// [`MAX_NAME_LEN`] bytes.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= MAX_NAME_LEN
    }
}

impl fmt::Display for AttrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttrName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for AttrName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// An opaque access token a caller either holds or lacks (e.g. `hr_user`).
///
/// The engine only consumes capabilities; assigning them to callers belongs
/// to the surrounding identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capability(String);

impl Capability {
    /// Create a new capability token.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The set of capabilities a caller holds, passed explicitly into every
/// gated operation. Never ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// An empty capability set (holds nothing, is denied everything gated).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from anything iterable as capability names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(|n| Capability::new(n)).collect())
    }

    /// Insert one capability.
    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    /// Exact membership test. No hierarchy: a broader capability never
    /// implies a narrower one.
    #[must_use]
    pub fn holds(&self, capability: &Capability) -> bool {
        self.0.contains(capability)
    }

    /// Number of capabilities held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the caller holds no capabilities at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the held capabilities in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
