//! In-memory store.
//!
//! `BTreeMap`s behind one mutex. The mutex is the write serializer: a
//! value update and its change record become visible together because both
//! happen under the same guard.

use super::ExtensionStore;
use crate::attribute::AttributeDefinition;
use crate::change::ChangeRecord;
use crate::error::ExtensionError;
use crate::primitives::{
    AttrName, Capability, EntityId, EntityKind, EntityRef, MAX_HISTORY_PAGE,
};
use crate::AttributeValue;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type ValueKey = (EntityKind, EntityId, AttrName);

#[derive(Debug, Default)]
struct Inner {
    definitions: BTreeMap<(EntityKind, AttrName), AttributeDefinition>,
    values: BTreeMap<ValueKey, AttributeValue>,
    /// Per-attribute logs, each already ascending by `seq`.
    changes: BTreeMap<ValueKey, Vec<ChangeRecord>>,
    /// Store-wide logical clock. Monotonic counter, not wall time.
    next_seq: u64,
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<MutexGuard<'_, Inner>, ExtensionError> {
        self.inner
            .lock()
            .map_err(|_| ExtensionError::Persistence("memory store mutex poisoned".into()))
    }
}

fn value_key(entity: &EntityRef, attribute: &AttrName) -> ValueKey {
    (entity.kind.clone(), entity.id, attribute.clone())
}

impl ExtensionStore for MemoryStore {
    fn read(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
    ) -> Result<Option<AttributeValue>, ExtensionError> {
        let inner = self.locked()?;
        Ok(inner.values.get(&value_key(entity, attribute)).cloned())
    }

    fn write_tracked(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
        value: AttributeValue,
        actor: Capability,
        track: bool,
    ) -> Result<Option<ChangeRecord>, ExtensionError> {
        let mut inner = self.locked()?;
        let key = value_key(entity, attribute);

        let old_value = inner.values.insert(key.clone(), value.clone());

        if !track {
            return Ok(None);
        }

        let seq = inner.next_seq.saturating_add(1);
        inner.next_seq = seq;

        let record = ChangeRecord::new(
            entity.clone(),
            attribute.clone(),
            old_value,
            value,
            actor,
            seq,
        );
        inner.changes.entry(key).or_default().push(record.clone());
        Ok(Some(record))
    }

    fn changes_page(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
        after: u64,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>, ExtensionError> {
        let limit = limit.clamp(1, MAX_HISTORY_PAGE);
        let inner = self.locked()?;

        let Some(log) = inner.changes.get(&value_key(entity, attribute)) else {
            return Ok(Vec::new());
        };

        // Logs are append-only and ascending by seq, so the cursor is a
        // partition point.
        let start = log.partition_point(|record| record.seq <= after);
        Ok(log.iter().skip(start).take(limit).cloned().collect())
    }

    fn load_definitions(
        &self,
    ) -> Result<Vec<(EntityKind, AttributeDefinition)>, ExtensionError> {
        let inner = self.locked()?;
        Ok(inner
            .definitions
            .iter()
            .map(|((kind, _), def)| (kind.clone(), def.clone()))
            .collect())
    }

    fn persist_definition(
        &self,
        kind: &EntityKind,
        definition: &AttributeDefinition,
    ) -> Result<(), ExtensionError> {
        let mut inner = self.locked()?;
        inner
            .definitions
            .insert((kind.clone(), definition.name.clone()), definition.clone());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
