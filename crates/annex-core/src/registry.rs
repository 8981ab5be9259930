//! # Extension Registry
//!
//! The front door of the engine: a catalog of attribute definitions per
//! entity kind, composed with the access gate and a shared store.
//!
//! Control flow for every operation: resolve the definition (unknown names
//! fail first), check the gate, then touch the store. On a write to a
//! trackable attribute the registry explicitly asks the store to append the
//! change record inside the same transaction as the value; tracking is
//! explicit composition and is never silently lost.

use crate::attribute::{AttributeDefinition, AttributeValue};
use crate::change::History;
use crate::error::ExtensionError;
use crate::gate;
use crate::primitives::{AttrName, CapabilitySet, EntityKind, EntityRef};
use crate::storage::ExtensionStore;
use std::collections::BTreeMap;

/// Catalog of registered definitions, grouped by entity kind.
///
/// `BTreeMap` keeps catalog iteration deterministic.
type Catalog = BTreeMap<EntityKind, BTreeMap<AttrName, AttributeDefinition>>;

/// Attribute extension registry over a shared store.
///
/// Registration mutates the catalog and therefore takes `&mut self`; once
/// the catalog is built the registry can be shared (`Arc`) and `get`/`set`/
/// `history` called concurrently, with the store serializing writers.
#[derive(Debug)]
pub struct ExtensionRegistry<S> {
    catalog: Catalog,
    store: S,
}

impl<S: ExtensionStore> ExtensionRegistry<S> {
    /// Create a registry over an empty catalog.
    pub fn new(store: S) -> Self {
        Self {
            catalog: Catalog::new(),
            store,
        }
    }

    /// Create a registry and rebuild the catalog from the definitions the
    /// store already holds.
    pub fn open(store: S) -> Result<Self, ExtensionError> {
        let mut catalog = Catalog::new();
        for (kind, definition) in store.load_definitions()? {
            catalog
                .entry(kind)
                .or_default()
                .insert(definition.name.clone(), definition);
        }
        Ok(Self { catalog, store })
    }

    /// Register a new attribute for an entity kind.
    ///
    /// Fails with [`ExtensionError::DuplicateAttribute`] when the name is
    /// already taken for that kind; the catalog is left unchanged.
    pub fn register(
        &mut self,
        kind: EntityKind,
        definition: AttributeDefinition,
    ) -> Result<(), ExtensionError> {
        if !definition.name.is_valid() {
            return Err(ExtensionError::InvalidName {
                name: definition.name.as_str().to_string(),
            });
        }

        let for_kind = self.catalog.entry(kind.clone()).or_default();
        if for_kind.contains_key(&definition.name) {
            return Err(ExtensionError::DuplicateAttribute {
                kind,
                name: definition.name.clone(),
            });
        }

        // Persist first: if the store fails, the in-memory catalog stays
        // consistent with it.
        self.store.persist_definition(&kind, &definition)?;
        for_kind.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Look up one definition.
    #[must_use]
    pub fn definition(&self, kind: &EntityKind, name: &str) -> Option<&AttributeDefinition> {
        self.catalog.get(kind)?.get(name)
    }

    /// Iterate the definitions registered for a kind, in name order.
    pub fn definitions(
        &self,
        kind: &EntityKind,
    ) -> impl Iterator<Item = &AttributeDefinition> {
        self.catalog.get(kind).into_iter().flat_map(BTreeMap::values)
    }

    /// Resolve a definition and check the caller through the gate.
    fn gated_definition(
        &self,
        kind: &EntityKind,
        name: &str,
        caller: &CapabilitySet,
    ) -> Result<&AttributeDefinition, ExtensionError> {
        let definition =
            self.definition(kind, name)
                .ok_or_else(|| ExtensionError::UnknownAttribute {
                    kind: kind.clone(),
                    name: AttrName::new(name),
                })?;

        if !gate::check(&definition.required_capability, caller) {
            return Err(ExtensionError::AccessDenied {
                name: definition.name.clone(),
                required: definition.required_capability.clone(),
            });
        }
        Ok(definition)
    }

    /// Read an attribute. `Ok(None)` means registered but never set.
    pub fn get(
        &self,
        entity: &EntityRef,
        name: &str,
        caller: &CapabilitySet,
    ) -> Result<Option<AttributeValue>, ExtensionError> {
        let definition = self.gated_definition(&entity.kind, name, caller)?;
        self.store.read(entity, &definition.name)
    }

    /// Write an attribute.
    ///
    /// Checks type conformance against the declared [`crate::ValueType`],
    /// then commits the value (and, for a trackable attribute, its change
    /// record) in one store transaction. Returns the appended record.
    pub fn set(
        &self,
        entity: &EntityRef,
        name: &str,
        value: AttributeValue,
        caller: &CapabilitySet,
    ) -> Result<Option<crate::ChangeRecord>, ExtensionError> {
        let definition = self.gated_definition(&entity.kind, name, caller)?;

        if !value.conforms_to(definition.value_type) {
            return Err(ExtensionError::TypeMismatch {
                name: definition.name.clone(),
                expected: definition.value_type,
                actual: value.value_type(),
            });
        }

        self.store.write_tracked(
            entity,
            &definition.name,
            value,
            definition.required_capability.clone(),
            definition.trackable,
        )
    }

    /// Replay an attribute's change records, ascending by `seq`.
    ///
    /// Gated like [`Self::get`]: records expose values.
    pub fn history(
        &self,
        entity: &EntityRef,
        name: &str,
        caller: &CapabilitySet,
    ) -> Result<History<'_, S>, ExtensionError> {
        let definition = self.gated_definition(&entity.kind, name, caller)?;
        Ok(History::new(
            &self.store,
            entity.clone(),
            definition.name.clone(),
        ))
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::{AttributeValue, Capability, ValueType};
    use serde_json::json;
    use std::sync::Arc;

    fn kind() -> EntityKind {
        EntityKind::new("contract_version")
    }

    fn entity() -> EntityRef {
        EntityRef::new("contract_version", 1)
    }

    fn hr_user() -> CapabilitySet {
        CapabilitySet::from_names(["hr_user"])
    }

    fn registry_with_distribution() -> ExtensionRegistry<MemoryStore> {
        let mut registry = ExtensionRegistry::new(MemoryStore::new());
        registry
            .register(
                kind(),
                AttributeDefinition::new("analytic_distribution", ValueType::Json, "hr_user")
                    .tracked(),
            )
            .expect("register");
        registry
    }

    #[test]
    fn duplicate_registration_fails_and_leaves_catalog_unchanged() {
        let mut registry = registry_with_distribution();
        let before: Vec<_> = registry.definitions(&kind()).cloned().collect();

        let result = registry.register(
            kind(),
            AttributeDefinition::new("analytic_distribution", ValueType::Integer, "hr_user"),
        );

        assert!(matches!(
            result,
            Err(ExtensionError::DuplicateAttribute { .. })
        ));
        let after: Vec<_> = registry.definitions(&kind()).cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn same_name_on_another_kind_is_fine() {
        let mut registry = registry_with_distribution();
        let result = registry.register(
            EntityKind::new("expense_sheet"),
            AttributeDefinition::new("analytic_distribution", ValueType::Json, "hr_user"),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn invalid_name_is_rejected() {
        let mut registry = ExtensionRegistry::new(MemoryStore::new());
        let result = registry.register(
            kind(),
            AttributeDefinition::new("", ValueType::Integer, "hr_user"),
        );
        assert!(matches!(result, Err(ExtensionError::InvalidName { .. })));
    }

    #[test]
    fn unknown_attribute_fails_before_the_gate() {
        let registry = registry_with_distribution();
        let result = registry.get(&entity(), "no_such_attribute", &CapabilitySet::empty());
        assert!(matches!(
            result,
            Err(ExtensionError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn get_without_capability_is_denied() {
        let registry = registry_with_distribution();
        let result = registry.get(&entity(), "analytic_distribution", &CapabilitySet::empty());
        assert!(matches!(result, Err(ExtensionError::AccessDenied { .. })));
    }

    #[test]
    fn set_without_capability_is_denied_and_leaves_no_trace() {
        let registry = registry_with_distribution();
        let caller = CapabilitySet::from_names(["sales_user"]);

        let result = registry.set(
            &entity(),
            "analytic_distribution",
            AttributeValue::Json(json!({"10": 100.0})),
            &caller,
        );
        assert!(matches!(result, Err(ExtensionError::AccessDenied { .. })));

        // No partial effect: no value, no change record.
        assert_eq!(
            registry
                .get(&entity(), "analytic_distribution", &hr_user())
                .expect("get"),
            None
        );
        let records: Vec<_> = registry
            .history(&entity(), "analytic_distribution", &hr_user())
            .expect("history")
            .collect();
        assert!(records.is_empty());
    }

    #[test]
    fn type_mismatch_is_rejected_with_no_partial_effect() {
        let registry = registry_with_distribution();

        let result = registry.set(
            &entity(),
            "analytic_distribution",
            AttributeValue::Integer(2),
            &hr_user(),
        );
        assert!(matches!(
            result,
            Err(ExtensionError::TypeMismatch {
                expected: ValueType::Json,
                actual: ValueType::Integer,
                ..
            })
        ));
        assert_eq!(
            registry
                .get(&entity(), "analytic_distribution", &hr_user())
                .expect("get"),
            None
        );
    }

    #[test]
    fn set_then_get_roundtrips() {
        let registry = registry_with_distribution();
        let value = AttributeValue::Json(json!({"10": 60.0, "21": 40.0}));

        registry
            .set(&entity(), "analytic_distribution", value.clone(), &hr_user())
            .expect("set");

        assert_eq!(
            registry
                .get(&entity(), "analytic_distribution", &hr_user())
                .expect("get"),
            Some(value)
        );
    }

    #[test]
    fn each_tracked_set_appends_exactly_one_record() {
        let registry = registry_with_distribution();

        let first = registry
            .set(
                &entity(),
                "analytic_distribution",
                AttributeValue::Json(json!({"10": 100.0})),
                &hr_user(),
            )
            .expect("set")
            .expect("record");
        assert_eq!(first.old_value, None);
        assert_eq!(first.new_value, AttributeValue::Json(json!({"10": 100.0})));
        assert_eq!(first.actor, Capability::new("hr_user"));

        let records: Result<Vec<_>, _> = registry
            .history(&entity(), "analytic_distribution", &hr_user())
            .expect("history")
            .collect();
        assert_eq!(records.expect("records").len(), 1);
    }

    #[test]
    fn setting_the_same_value_twice_records_both_attempts() {
        let registry = registry_with_distribution();
        let value = AttributeValue::Json(json!({"10": 100.0}));

        for _ in 0..2 {
            registry
                .set(&entity(), "analytic_distribution", value.clone(), &hr_user())
                .expect("set");
        }

        let records: Result<Vec<_>, _> = registry
            .history(&entity(), "analytic_distribution", &hr_user())
            .expect("history")
            .collect();
        let records = records.expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].old_value, Some(value.clone()));
        assert_eq!(records[1].new_value, value);
    }

    #[test]
    fn untracked_attribute_writes_leave_no_history() {
        let mut registry = ExtensionRegistry::new(MemoryStore::new());
        registry
            .register(
                kind(),
                AttributeDefinition::new("analytic_precision", ValueType::Integer, "hr_user"),
            )
            .expect("register");

        registry
            .set(
                &entity(),
                "analytic_precision",
                AttributeValue::Integer(2),
                &hr_user(),
            )
            .expect("set");

        let records: Vec<_> = registry
            .history(&entity(), "analytic_precision", &hr_user())
            .expect("history")
            .collect();
        assert!(records.is_empty());
    }

    #[test]
    fn history_is_gated_like_get() {
        let registry = registry_with_distribution();
        let result = registry.history(&entity(), "analytic_distribution", &CapabilitySet::empty());
        assert!(matches!(result, Err(ExtensionError::AccessDenied { .. })));
    }

    #[test]
    fn catalog_survives_reopen_on_the_same_store() {
        let store = {
            let mut registry = registry_with_distribution();
            registry
                .register(
                    kind(),
                    AttributeDefinition::new("analytic_precision", ValueType::Integer, "hr_user")
                        .tracked(),
                )
                .expect("register");
            // Hand the store to a fresh registry, as a process restart would.
            let ExtensionRegistry { store, .. } = registry;
            store
        };

        let reopened = ExtensionRegistry::open(store).expect("open");
        assert!(reopened
            .definition(&kind(), "analytic_distribution")
            .is_some());
        assert!(reopened.definition(&kind(), "analytic_precision").is_some());
    }

    #[test]
    fn concurrent_writers_serialize_with_no_lost_update() {
        let registry = Arc::new(registry_with_distribution());

        let writers: Vec<_> = (0..2)
            .map(|w| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        registry
                            .set(
                                &entity(),
                                "analytic_distribution",
                                AttributeValue::Json(json!({"writer": w, "i": i})),
                                &hr_user(),
                            )
                            .expect("set");
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("join");
        }

        let records: Result<Vec<_>, _> = registry
            .history(&entity(), "analytic_distribution", &hr_user())
            .expect("history")
            .collect();
        let records = records.expect("records");

        // Both writers' records are present, in one consistent order.
        assert_eq!(records.len(), 100);
        for pair in records.windows(2) {
            assert!(pair[0].seq < pair[1].seq);
            // Each record's old value is exactly the previous record's new
            // value: serialized, no lost update.
            assert_eq!(pair[1].old_value.as_ref(), Some(&pair[0].new_value));
        }

        // The current value is the last recorded write.
        let last = records.last().expect("last");
        assert_eq!(
            registry
                .get(&entity(), "analytic_distribution", &hr_user())
                .expect("get"),
            Some(last.new_value.clone())
        );
    }
}
