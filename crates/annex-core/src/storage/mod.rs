//! # Storage Module
//!
//! The shared store beneath the registry and the change tracker.
//!
//! Two implementations of the same seam:
//! - [`MemoryStore`]: mutex-guarded `BTreeMap`s, for tests and embedding
//! - [`RedbStore`]: redb embedded database for ACID transactions, crash
//!   safety (copy-on-write B-trees), and MVCC (concurrent readers, single
//!   writer)

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::attribute::AttributeDefinition;
use crate::change::ChangeRecord;
use crate::error::ExtensionError;
use crate::primitives::{AttrName, Capability, EntityKind, EntityRef};
use crate::AttributeValue;

/// The store seam shared by the registry and the change tracker.
///
/// Implementations must serialize concurrent writers: a reader may never
/// observe a committed value without its committed change record, nor the
/// other way around.
pub trait ExtensionStore: Send + Sync {
    /// Read the current value of an attribute. `None` means never set.
    fn read(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
    ) -> Result<Option<AttributeValue>, ExtensionError>;

    /// Write a value and, when `track` is set, append the change record
    /// built from the previous value, both in one atomic transaction.
    ///
    /// Returns the appended record, if any. On failure neither the value
    /// nor the record is persisted.
    fn write_tracked(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
        value: AttributeValue,
        actor: Capability,
        track: bool,
    ) -> Result<Option<ChangeRecord>, ExtensionError>;

    /// Return up to `limit` change records for one attribute with
    /// `seq > after`, ascending by `seq`. `limit` is clamped to
    /// [`crate::primitives::MAX_HISTORY_PAGE`].
    fn changes_page(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
        after: u64,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>, ExtensionError>;

    /// Load every persisted attribute definition, for catalog rebuild.
    fn load_definitions(
        &self,
    ) -> Result<Vec<(EntityKind, AttributeDefinition)>, ExtensionError>;

    /// Persist one attribute definition. The registry guarantees the
    /// (kind, name) pair is not already taken.
    fn persist_definition(
        &self,
        kind: &EntityKind,
        definition: &AttributeDefinition,
    ) -> Result<(), ExtensionError>;
}
