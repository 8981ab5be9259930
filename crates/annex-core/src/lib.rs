//! # Annex Core - THE LOGIC
//!
//! Deterministic attribute-extension engine: attach named, typed attributes
//! to pre-existing entity kinds, gate every read and write by an explicit
//! capability, and append an immutable change record for every successful
//! write to a trackable attribute.
//!
//! ## Components
//!
//! - [`registry::ExtensionRegistry`]: catalog of definitions plus the
//!   `register`/`get`/`set`/`history` operations
//! - [`gate`]: pure capability check, deny by default, exact membership
//! - [`change`]: append-only change records and their paged replay
//! - [`storage`]: the store seam shared by registry and tracker, with
//!   in-memory and redb-backed implementations
//! - [`contract`]: the built-in contract-version analytics profile
//!
//! ## Design constraints
//!
//! - Pure Rust: no async, no network, no logging in this crate
//! - Deterministic: `BTreeMap`/`BTreeSet` only, logical clock instead of
//!   wall clock
//! - A write and its change record commit in one transaction; a failing
//!   operation leaves the store unchanged

pub mod attribute;
pub mod change;
pub mod contract;
pub mod error;
pub mod formats;
pub mod gate;
pub mod primitives;
pub mod registry;
pub mod storage;

pub use attribute::{AttributeDefinition, AttributeValue, ValueType};
pub use change::{ChangeRecord, History};
pub use error::ExtensionError;
pub use primitives::{
    AttrName, Capability, CapabilitySet, EntityId, EntityKind, EntityRef, DEFAULT_HISTORY_PAGE,
    MAX_HISTORY_PAGE, MAX_NAME_LEN,
};
pub use registry::ExtensionRegistry;
pub use storage::{ExtensionStore, MemoryStore, RedbStore};
