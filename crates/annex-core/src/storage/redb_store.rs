//! redb-backed store.
//!
//! One write transaction covers the value update, the change-record append,
//! and the logical-clock bump, so a crash or commit failure rolls back all
//! three. Readers run on MVCC snapshots and therefore never observe a value
//! without its record.

use super::ExtensionStore;
use crate::attribute::AttributeDefinition;
use crate::change::ChangeRecord;
use crate::error::ExtensionError;
use crate::formats::{
    decode_definition, decode_record, decode_value, encode_definition, encode_record, encode_value,
};
use crate::primitives::{
    AttrName, Capability, EntityKind, EntityRef, MAX_HISTORY_PAGE,
};
use crate::AttributeValue;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

// =============================================================================
// TABLES
// =============================================================================

/// (entity kind, attribute name) -> encoded definition
const DEFINITIONS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("definitions");

/// (entity kind, entity id, attribute name) -> encoded current value
const VALUES: TableDefinition<(&str, u64, &str), &[u8]> = TableDefinition::new("attribute_values");

/// (entity kind, entity id, attribute name, seq) -> encoded change record
const CHANGES: TableDefinition<(&str, u64, &str, u64), &[u8]> =
    TableDefinition::new("attribute_changes");

/// Named counters. Holds the store-wide change sequence.
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const CHANGE_SEQ: &str = "change_seq";

// =============================================================================
// ERROR CONVERSIONS
// =============================================================================

impl From<redb::DatabaseError> for ExtensionError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<redb::TransactionError> for ExtensionError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<redb::TableError> for ExtensionError {
    fn from(err: redb::TableError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<redb::StorageError> for ExtensionError {
    fn from(err: redb::StorageError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<redb::CommitError> for ExtensionError {
    fn from(err: redb::CommitError) -> Self {
        Self::Persistence(err.to_string())
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Durable store backed by a single redb file.
#[derive(Debug)]
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open the database at `path`, creating it if missing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ExtensionError> {
        let db = Database::create(path)?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Open an existing database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtensionError> {
        let db = Database::open(path)?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Open every table once so later read transactions never hit a
    /// missing-table error on a fresh database.
    fn ensure_tables(&self) -> Result<(), ExtensionError> {
        let txn = self.db.begin_write()?;
        {
            txn.open_table(DEFINITIONS)?;
            txn.open_table(VALUES)?;
            txn.open_table(CHANGES)?;
            txn.open_table(COUNTERS)?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl ExtensionStore for RedbStore {
    fn read(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
    ) -> Result<Option<AttributeValue>, ExtensionError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(VALUES)?;
        let key = (entity.kind.as_str(), entity.id.0, attribute.as_str());
        match table.get(key)? {
            Some(guard) => Ok(Some(decode_value(guard.value())?)),
            None => Ok(None),
        }
    }

    fn write_tracked(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
        value: AttributeValue,
        actor: Capability,
        track: bool,
    ) -> Result<Option<ChangeRecord>, ExtensionError> {
        let txn = self.db.begin_write()?;
        let appended = {
            let mut values = txn.open_table(VALUES)?;
            let key = (entity.kind.as_str(), entity.id.0, attribute.as_str());

            let old_value = {
                let existing = values.get(key)?;
                match existing {
                    Some(guard) => Some(decode_value(guard.value())?),
                    None => None,
                }
            };
            values.insert(key, encode_value(&value)?.as_slice())?;

            if track {
                let mut counters = txn.open_table(COUNTERS)?;
                let seq = counters
                    .get(CHANGE_SEQ)?
                    .map_or(0, |guard| guard.value())
                    .saturating_add(1);
                counters.insert(CHANGE_SEQ, seq)?;

                let record = ChangeRecord::new(
                    entity.clone(),
                    attribute.clone(),
                    old_value,
                    value,
                    actor,
                    seq,
                );
                let mut changes = txn.open_table(CHANGES)?;
                changes.insert(
                    (entity.kind.as_str(), entity.id.0, attribute.as_str(), seq),
                    encode_record(&record)?.as_slice(),
                )?;
                Some(record)
            } else {
                None
            }
        };
        // Value, record, and counter commit together or not at all.
        txn.commit()?;
        Ok(appended)
    }

    fn changes_page(
        &self,
        entity: &EntityRef,
        attribute: &AttrName,
        after: u64,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>, ExtensionError> {
        let limit = limit.clamp(1, MAX_HISTORY_PAGE);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CHANGES)?;

        let kind = entity.kind.as_str();
        let name = attribute.as_str();
        let low = (kind, entity.id.0, name, after.saturating_add(1));
        let high = (kind, entity.id.0, name, u64::MAX);

        let mut page = Vec::new();
        for item in table.range(low..=high)? {
            let (_, guard) = item?;
            page.push(decode_record(guard.value())?);
            if page.len() >= limit {
                break;
            }
        }
        Ok(page)
    }

    fn load_definitions(
        &self,
    ) -> Result<Vec<(EntityKind, AttributeDefinition)>, ExtensionError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DEFINITIONS)?;

        let mut definitions = Vec::new();
        for item in table.iter()? {
            let (key, guard) = item?;
            let (kind, _) = key.value();
            definitions.push((EntityKind::new(kind), decode_definition(guard.value())?));
        }
        Ok(definitions)
    }

    fn persist_definition(
        &self,
        kind: &EntityKind,
        definition: &AttributeDefinition,
    ) -> Result<(), ExtensionError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DEFINITIONS)?;
            table.insert(
                (kind.as_str(), definition.name.as_str()),
                encode_definition(definition)?.as_slice(),
            )?;
        }
        txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
