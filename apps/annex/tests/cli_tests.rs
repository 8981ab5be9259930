//! Integration tests for Annex CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use annex::cli::{
    cmd_attributes, cmd_get, cmd_history, cmd_init, cmd_register, cmd_seed, cmd_set, parse_caps,
};
use annex_core::{Capability, ValueType};
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Create an initialized store and return its path.
fn create_store(dir: &TempDir) -> PathBuf {
    let db_path = dir.path().join("annex.redb");
    cmd_init(&db_path, false).unwrap();
    db_path
}

/// Create a store with the contract analytics profile registered.
fn create_seeded_store(dir: &TempDir) -> PathBuf {
    let db_path = create_store(dir);
    cmd_seed(&db_path, false).unwrap();
    db_path
}

// =============================================================================
// INIT COMMAND TESTS
// =============================================================================

#[test]
fn test_init_creates_store() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("annex.redb");

    let result = cmd_init(&db_path, false);
    assert!(result.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_init_fails_if_exists_without_force() {
    let temp = create_temp_dir();
    let db_path = create_store(&temp);

    let result = cmd_init(&db_path, false);
    assert!(result.is_err());
}

#[test]
fn test_init_succeeds_with_force() {
    let temp = create_temp_dir();
    let db_path = create_store(&temp);

    let result = cmd_init(&db_path, true);
    assert!(result.is_ok());
}

// =============================================================================
// SEED COMMAND TESTS
// =============================================================================

#[test]
fn test_seed_registers_profile() {
    let temp = create_temp_dir();
    let db_path = create_store(&temp);

    assert!(cmd_seed(&db_path, false).is_ok());
    assert!(cmd_attributes(&db_path, "contract_version", false).is_ok());
}

#[test]
fn test_seed_twice_fails() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_seed(&db_path, false);
    assert!(result.is_err());
}

#[test]
fn test_seed_json_mode() {
    let temp = create_temp_dir();
    let db_path = create_store(&temp);

    let result = cmd_seed(&db_path, true);
    assert!(result.is_ok());
}

// =============================================================================
// REGISTER COMMAND TESTS
// =============================================================================

#[test]
fn test_register_custom_attribute() {
    let temp = create_temp_dir();
    let db_path = create_store(&temp);

    let result = cmd_register(
        &db_path,
        "expense_sheet",
        "analytic_distribution",
        ValueType::Json,
        "account_user",
        true,
        false,
    );
    assert!(result.is_ok());
}

#[test]
fn test_register_duplicate_fails() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_register(
        &db_path,
        "contract_version",
        "analytic_precision",
        ValueType::Integer,
        "hr_user",
        true,
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_registrations_survive_reopen() {
    let temp = create_temp_dir();
    let db_path = create_store(&temp);

    cmd_register(
        &db_path,
        "expense_sheet",
        "cost_center",
        ValueType::Integer,
        "account_user",
        false,
        false,
    )
    .unwrap();

    // A second invocation sees the persisted definition.
    let result = cmd_register(
        &db_path,
        "expense_sheet",
        "cost_center",
        ValueType::Integer,
        "account_user",
        false,
        false,
    );
    assert!(result.is_err());
}

// =============================================================================
// GET/SET COMMAND TESTS
// =============================================================================

#[test]
fn test_set_then_get_roundtrip() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    cmd_set(
        &db_path,
        "contract_version",
        1,
        "analytic_distribution",
        r#"{"10": 100.0}"#,
        "hr_user",
        false,
    )
    .unwrap();

    let result = cmd_get(
        &db_path,
        "contract_version",
        1,
        "analytic_distribution",
        "hr_user",
        false,
    );
    assert!(result.is_ok());
}

#[test]
fn test_get_without_capability_is_denied() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_get(
        &db_path,
        "contract_version",
        1,
        "analytic_distribution",
        "",
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_set_without_capability_is_denied() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_set(
        &db_path,
        "contract_version",
        1,
        "analytic_distribution",
        r#"{"10": 100.0}"#,
        "sales_user",
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_set_unknown_attribute_fails() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_set(
        &db_path,
        "contract_version",
        1,
        "no_such_attribute",
        "1",
        "hr_user",
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_set_integer_attribute() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_set(
        &db_path,
        "contract_version",
        1,
        "analytic_precision",
        "2",
        "hr_user",
        false,
    );
    assert!(result.is_ok());
}

#[test]
fn test_set_relation_attribute() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_set(
        &db_path,
        "contract_version",
        1,
        "distribution_analytic_account_ids",
        "10,21,34",
        "hr_user",
        false,
    );
    assert!(result.is_ok());
}

#[test]
fn test_set_rejects_malformed_integer() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_set(
        &db_path,
        "contract_version",
        1,
        "analytic_precision",
        "two",
        "hr_user",
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_set_rejects_malformed_distribution() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    // Valid JSON, wrong shape: percentages must be non-negative numbers.
    let result = cmd_set(
        &db_path,
        "contract_version",
        1,
        "analytic_distribution",
        r#"{"10": "all"}"#,
        "hr_user",
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_get_json_mode() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    cmd_set(
        &db_path,
        "contract_version",
        1,
        "analytic_precision",
        "2",
        "hr_user",
        false,
    )
    .unwrap();

    let result = cmd_get(
        &db_path,
        "contract_version",
        1,
        "analytic_precision",
        "hr_user",
        true,
    );
    assert!(result.is_ok());
}

// =============================================================================
// HISTORY COMMAND TESTS
// =============================================================================

#[test]
fn test_history_after_writes() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    for precision in ["2", "3", "4"] {
        cmd_set(
            &db_path,
            "contract_version",
            1,
            "analytic_precision",
            precision,
            "hr_user",
            false,
        )
        .unwrap();
    }

    let result = cmd_history(
        &db_path,
        "contract_version",
        1,
        "analytic_precision",
        "hr_user",
        None,
        false,
    );
    assert!(result.is_ok());
}

#[test]
fn test_history_respects_limit() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    for precision in ["2", "3", "4"] {
        cmd_set(
            &db_path,
            "contract_version",
            1,
            "analytic_precision",
            precision,
            "hr_user",
            false,
        )
        .unwrap();
    }

    let result = cmd_history(
        &db_path,
        "contract_version",
        1,
        "analytic_precision",
        "hr_user",
        Some(2),
        false,
    );
    assert!(result.is_ok());
}

#[test]
fn test_history_without_capability_is_denied() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    let result = cmd_history(
        &db_path,
        "contract_version",
        1,
        "analytic_distribution",
        "",
        None,
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_history_json_mode() {
    let temp = create_temp_dir();
    let db_path = create_seeded_store(&temp);

    cmd_set(
        &db_path,
        "contract_version",
        1,
        "analytic_precision",
        "2",
        "hr_user",
        false,
    )
    .unwrap();

    let result = cmd_history(
        &db_path,
        "contract_version",
        1,
        "analytic_precision",
        "hr_user",
        None,
        true,
    );
    assert!(result.is_ok());
}

// =============================================================================
// CAPABILITY PARSING TESTS
// =============================================================================

#[test]
fn test_parse_caps_splits_and_trims() {
    let caps = parse_caps("hr_user, payroll_admin");
    assert!(caps.holds(&Capability::new("hr_user")));
    assert!(caps.holds(&Capability::new("payroll_admin")));
    assert_eq!(caps.len(), 2);
}

#[test]
fn test_parse_caps_empty_is_empty() {
    assert!(parse_caps("").is_empty());
    assert!(parse_caps(" , ").is_empty());
}
