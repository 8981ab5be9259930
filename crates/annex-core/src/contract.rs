//! # Contract Analytics Profile
//!
//! The built-in attribute set for employee contract versions: an analytic
//! distribution mapping, its rounding precision, and the many-to-many
//! relation to the analytic accounts the distribution draws from. All three
//! are gated by the HR user capability and change-tracked.

use crate::attribute::AttributeDefinition;
use crate::error::ExtensionError;
use crate::primitives::EntityKind;
use crate::registry::ExtensionRegistry;
use crate::storage::ExtensionStore;
use crate::ValueType;

/// Entity kind the profile extends.
pub const CONTRACT_VERSION: &str = "contract_version";

/// Capability gating all three attributes.
pub const HR_USER: &str = "hr_user";

/// JSON mapping of analytic account id to percentage.
pub const ANALYTIC_DISTRIBUTION: &str = "analytic_distribution";

/// Decimal precision used when splitting amounts across the distribution.
pub const ANALYTIC_PRECISION: &str = "analytic_precision";

/// Analytic accounts referenced by the distribution.
pub const DISTRIBUTION_ANALYTIC_ACCOUNT_IDS: &str = "distribution_analytic_account_ids";

/// Register the contract analytics attributes on a registry.
///
/// Fails with [`ExtensionError::DuplicateAttribute`] if the profile (or a
/// clashing attribute) is already registered.
pub fn register_contract_analytics<S: ExtensionStore>(
    registry: &mut ExtensionRegistry<S>,
) -> Result<(), ExtensionError> {
    let kind = EntityKind::new(CONTRACT_VERSION);

    registry.register(
        kind.clone(),
        AttributeDefinition::new(ANALYTIC_DISTRIBUTION, ValueType::Json, HR_USER).tracked(),
    )?;
    registry.register(
        kind.clone(),
        AttributeDefinition::new(ANALYTIC_PRECISION, ValueType::Integer, HR_USER).tracked(),
    )?;
    registry.register(
        kind,
        AttributeDefinition::new(
            DISTRIBUTION_ANALYTIC_ACCOUNT_IDS,
            ValueType::RelationMany,
            HR_USER,
        )
        .tracked(),
    )?;
    Ok(())
}

/// Shape check for an analytic distribution document: a JSON object whose
/// values are all non-negative numbers (account id -> percentage).
///
/// Percentages are not required to sum to 100; a partial distribution is a
/// valid business state.
#[must_use]
pub fn validate_distribution(value: &serde_json::Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    object.values().all(|entry| {
        entry
            .as_f64()
            .is_some_and(|percentage| percentage.is_finite() && percentage >= 0.0)
    })
}

// =============================================================================
// TESTS
// =============================================================================
