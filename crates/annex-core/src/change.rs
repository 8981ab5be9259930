//! # Change Tracker
//!
//! Append-only audit records for trackable attributes, and the paged
//! iterator that replays them.
//!
//! Records carry a logical timestamp (`seq`): a store-wide monotonic
//! counter, never wall clock. Within one attribute, ascending `seq` is
//! exactly write order, so history replays are deterministic.

use crate::error::ExtensionError;
use crate::primitives::{AttrName, Capability, EntityRef, DEFAULT_HISTORY_PAGE, MAX_HISTORY_PAGE};
use crate::storage::ExtensionStore;
use crate::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// =============================================================================
// CHANGE RECORDS
// =============================================================================

/// One immutable audit entry for a successful tracked write.
///
/// Never mutated or deleted after creation; the store only ever appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// The record whose attribute changed.
    pub entity: EntityRef,
    /// The attribute that changed.
    pub attribute: AttrName,
    /// Value before the write; `None` when the attribute was unset.
    pub old_value: Option<AttributeValue>,
    /// Value after the write.
    pub new_value: AttributeValue,
    /// The capability under which the write was authorized.
    pub actor: Capability,
    /// Logical timestamp: store-wide monotonic counter, strictly
    /// increasing in write order.
    pub seq: u64,
}

impl ChangeRecord {
    /// Build a record for a write that just happened.
    #[must_use]
    pub fn new(
        entity: EntityRef,
        attribute: AttrName,
        old_value: Option<AttributeValue>,
        new_value: AttributeValue,
        actor: Capability,
        seq: u64,
    ) -> Self {
        Self {
            entity,
            attribute,
            old_value,
            new_value,
            actor,
            seq,
        }
    }
}

// =============================================================================
// HISTORY ITERATOR
// =============================================================================

/// Lazy, finite, restartable replay of one attribute's change records,
/// ascending by `seq`.
///
/// Records are pulled from the store in bounded pages so a long history
/// never materializes at once. Restart by asking the registry for a fresh
/// iterator.
pub struct History<'a, S: ExtensionStore + ?Sized> {
    store: &'a S,
    entity: EntityRef,
    attribute: AttrName,
    /// Last `seq` handed out; pages fetch strictly after this.
    cursor: u64,
    page_size: usize,
    buffer: VecDeque<ChangeRecord>,
    exhausted: bool,
}

impl<'a, S: ExtensionStore + ?Sized> History<'a, S> {
    /// Start a replay from the beginning of the attribute's history.
    pub(crate) fn new(store: &'a S, entity: EntityRef, attribute: AttrName) -> Self {
        Self::with_page_size(store, entity, attribute, DEFAULT_HISTORY_PAGE)
    }

    /// Start a replay with a custom page size (clamped to the engine bound).
    pub(crate) fn with_page_size(
        store: &'a S,
        entity: EntityRef,
        attribute: AttrName,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            entity,
            attribute,
            cursor: 0,
            page_size: page_size.clamp(1, MAX_HISTORY_PAGE),
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<(), ExtensionError> {
        let page =
            self.store
                .changes_page(&self.entity, &self.attribute, self.cursor, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = last.seq;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<S: ExtensionStore + ?Sized> Iterator for History<'_, S> {
    type Item = Result<ChangeRecord, ExtensionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.refill() {
                // Surface the store failure once, then stop.
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

// =============================================================================
// TESTS
// =============================================================================
