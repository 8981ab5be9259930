//! CLI commands for Annex.
//!
//! Every command opens the redb store named by `--db`, rebuilds the
//! registry catalog from it, and performs one operation. The caller's
//! capabilities arrive explicitly via `--caps` on every gated command;
//! there is no ambient identity.
//!
//! Command bodies live in `cmd_*` functions so integration tests can call
//! them directly without spawning the binary.

use annex_core::contract::{self, ANALYTIC_DISTRIBUTION, CONTRACT_VERSION};
use annex_core::{
    AttributeDefinition, AttributeValue, CapabilitySet, EntityKind, EntityRef, ExtensionError,
    ExtensionRegistry, RedbStore, ValueType,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine-level failure (unknown attribute, access denied, ...).
    #[error(transparent)]
    Extension(#[from] ExtensionError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse or encode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid command-line input.
    #[error("{0}")]
    Usage(String),
}

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "annex",
    version,
    about = "Gated, audited attribute extensions over entity records"
)]
pub struct Cli {
    /// Output machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the redb store file.
    #[arg(long, global = true, default_value = "annex.redb")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new store file.
    Init {
        /// Recreate the store even if the file exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Register the built-in contract analytics attributes.
    Seed,
    /// Register one attribute on an entity kind.
    Register {
        #[arg(long)]
        entity_type: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum)]
        value_type: ValueTypeArg,
        #[arg(long)]
        capability: String,
        #[arg(long, default_value_t = false)]
        tracked: bool,
    },
    /// List the attributes registered for an entity kind.
    Attributes {
        #[arg(long)]
        entity_type: String,
    },
    /// Read one attribute of one record.
    Get {
        #[arg(long)]
        entity_type: String,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        name: String,
        /// Comma-separated capabilities the caller holds.
        #[arg(long, default_value = "")]
        caps: String,
    },
    /// Write one attribute of one record.
    Set {
        #[arg(long)]
        entity_type: String,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        name: String,
        /// Raw value: JSON text, an integer, or a comma-separated id list,
        /// matching the attribute's declared type.
        #[arg(long)]
        value: String,
        #[arg(long, default_value = "")]
        caps: String,
    },
    /// Replay the change records of one attribute.
    History {
        #[arg(long)]
        entity_type: String,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        caps: String,
        /// Stop after this many records.
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Attribute value types accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ValueTypeArg {
    Json,
    Integer,
    RelationMany,
}

impl From<ValueTypeArg> for ValueType {
    fn from(arg: ValueTypeArg) -> Self {
        match arg {
            ValueTypeArg::Json => Self::Json,
            ValueTypeArg::Integer => Self::Integer,
            ValueTypeArg::RelationMany => Self::RelationMany,
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Run one parsed invocation.
pub fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Init { force } => cmd_init(&cli.db, force),
        Commands::Seed => cmd_seed(&cli.db, cli.json),
        Commands::Register {
            entity_type,
            name,
            value_type,
            capability,
            tracked,
        } => cmd_register(
            &cli.db,
            &entity_type,
            &name,
            value_type.into(),
            &capability,
            tracked,
            cli.json,
        ),
        Commands::Attributes { entity_type } => cmd_attributes(&cli.db, &entity_type, cli.json),
        Commands::Get {
            entity_type,
            id,
            name,
            caps,
        } => cmd_get(&cli.db, &entity_type, id, &name, &caps, cli.json),
        Commands::Set {
            entity_type,
            id,
            name,
            value,
            caps,
        } => cmd_set(&cli.db, &entity_type, id, &name, &value, &caps, cli.json),
        Commands::History {
            entity_type,
            id,
            name,
            caps,
            limit,
        } => cmd_history(&cli.db, &entity_type, id, &name, &caps, limit, cli.json),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Parse the `--caps` flag: comma-separated, empty means no capabilities.
#[must_use]
pub fn parse_caps(raw: &str) -> CapabilitySet {
    CapabilitySet::from_names(
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty()),
    )
}

fn open_registry(db: &Path) -> Result<ExtensionRegistry<RedbStore>, CliError> {
    let store = RedbStore::open(db)?;
    Ok(ExtensionRegistry::open(store)?)
}

/// Parse a raw value string against the attribute's declared type.
fn parse_value(declared: ValueType, raw: &str) -> Result<AttributeValue, CliError> {
    match declared {
        ValueType::Json => Ok(AttributeValue::Json(serde_json::from_str(raw)?)),
        ValueType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(AttributeValue::Integer)
            .map_err(|_| CliError::Usage(format!("expected an integer, got `{raw}`"))),
        ValueType::RelationMany => {
            let mut ids = Vec::new();
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let id = part.parse::<u64>().map_err(|_| {
                    CliError::Usage(format!("expected a comma-separated id list, got `{raw}`"))
                })?;
                ids.push(id);
            }
            Ok(AttributeValue::relation_from_ids(ids))
        }
    }
}

fn emit(json_mode: bool, payload: &serde_json::Value, human: &str) -> Result<(), CliError> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(payload)?);
    } else {
        println!("{human}");
    }
    Ok(())
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create the store file. Refuses to clobber an existing one without
/// `force`.
pub fn cmd_init(db: &Path, force: bool) -> Result<(), CliError> {
    if db.exists() {
        if !force {
            return Err(CliError::Usage(format!(
                "store `{}` already exists (use --force to recreate)",
                db.display()
            )));
        }
        std::fs::remove_file(db)?;
    }
    RedbStore::create(db)?;
    info!(db = %db.display(), "store initialized");
    Ok(())
}

/// Register the contract analytics profile.
pub fn cmd_seed(db: &Path, json_mode: bool) -> Result<(), CliError> {
    let mut registry = open_registry(db)?;
    contract::register_contract_analytics(&mut registry)?;
    info!(kind = CONTRACT_VERSION, "contract analytics profile registered");

    let names: Vec<_> = registry
        .definitions(&EntityKind::new(CONTRACT_VERSION))
        .map(|def| def.name.as_str().to_string())
        .collect();
    emit(
        json_mode,
        &json!({"registered": names, "entity_type": CONTRACT_VERSION}),
        &format!("registered {} on {CONTRACT_VERSION}", names.join(", ")),
    )
}

/// Register one attribute.
pub fn cmd_register(
    db: &Path,
    entity_type: &str,
    name: &str,
    value_type: ValueType,
    capability: &str,
    tracked: bool,
    json_mode: bool,
) -> Result<(), CliError> {
    let mut registry = open_registry(db)?;

    let mut definition = AttributeDefinition::new(name, value_type, capability);
    if tracked {
        definition = definition.tracked();
    }
    registry.register(EntityKind::new(entity_type), definition)?;
    info!(entity_type, name, %value_type, "attribute registered");

    emit(
        json_mode,
        &json!({
            "entity_type": entity_type,
            "name": name,
            "value_type": value_type.to_string(),
            "capability": capability,
            "tracked": tracked,
        }),
        &format!("registered `{name}` ({value_type}) on {entity_type}"),
    )
}

/// One row of `attributes` output.
#[derive(Debug, Serialize)]
struct AttributeRow<'a> {
    name: &'a str,
    value_type: String,
    capability: &'a str,
    tracked: bool,
}

/// List the attributes of an entity kind.
pub fn cmd_attributes(db: &Path, entity_type: &str, json_mode: bool) -> Result<(), CliError> {
    let registry = open_registry(db)?;
    let kind = EntityKind::new(entity_type);

    let rows: Vec<_> = registry
        .definitions(&kind)
        .map(|def| AttributeRow {
            name: def.name.as_str(),
            value_type: def.value_type.to_string(),
            capability: def.required_capability.as_str(),
            tracked: def.trackable,
        })
        .collect();

    let human = registry
        .definitions(&kind)
        .map(|def| {
            let tracked = if def.trackable { ", tracked" } else { "" };
            format!(
                "{} ({}, gated by {}{tracked})",
                def.name, def.value_type, def.required_capability
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    emit(
        json_mode,
        &json!({"entity_type": entity_type, "attributes": rows}),
        if human.is_empty() {
            "(no attributes registered)"
        } else {
            &human
        },
    )
}

/// Read one attribute value.
pub fn cmd_get(
    db: &Path,
    entity_type: &str,
    id: u64,
    name: &str,
    caps: &str,
    json_mode: bool,
) -> Result<(), CliError> {
    let registry = open_registry(db)?;
    let entity = EntityRef::new(entity_type, id);
    let caller = parse_caps(caps);

    let value = registry.get(&entity, name, &caller)?;
    emit(
        json_mode,
        &json!({
            "entity": entity.to_string(),
            "name": name,
            "value": value.as_ref().map(|v| v.to_string()),
        }),
        &value.map_or_else(|| "(unset)".to_string(), |v| v.to_string()),
    )
}

/// Write one attribute value.
pub fn cmd_set(
    db: &Path,
    entity_type: &str,
    id: u64,
    name: &str,
    raw_value: &str,
    caps: &str,
    json_mode: bool,
) -> Result<(), CliError> {
    let registry = open_registry(db)?;
    let entity = EntityRef::new(entity_type, id);
    let caller = parse_caps(caps);
    let kind = EntityKind::new(entity_type);

    let declared = registry
        .definition(&kind, name)
        .map(|def| def.value_type)
        .ok_or_else(|| ExtensionError::UnknownAttribute {
            kind: kind.clone(),
            name: name.into(),
        })?;

    let value = parse_value(declared, raw_value)?;

    // The analytic distribution has a known shape; reject malformed
    // documents before they reach the store.
    if entity_type == CONTRACT_VERSION && name == ANALYTIC_DISTRIBUTION {
        if let AttributeValue::Json(ref doc) = value {
            if !contract::validate_distribution(doc) {
                return Err(CliError::Usage(format!(
                    "`{ANALYTIC_DISTRIBUTION}` must be a JSON object of non-negative percentages"
                )));
            }
        }
    }

    let record = registry.set(&entity, name, value, &caller)?;
    let seq = record.as_ref().map(|r| r.seq);
    info!(%entity, name, seq, "attribute written");

    emit(
        json_mode,
        &json!({
            "entity": entity.to_string(),
            "name": name,
            "recorded_seq": seq,
        }),
        &seq.map_or_else(
            || format!("set `{name}` on {entity}"),
            |s| format!("set `{name}` on {entity} (change record #{s})"),
        ),
    )
}

/// Replay change records.
pub fn cmd_history(
    db: &Path,
    entity_type: &str,
    id: u64,
    name: &str,
    caps: &str,
    limit: Option<usize>,
    json_mode: bool,
) -> Result<(), CliError> {
    let registry = open_registry(db)?;
    let entity = EntityRef::new(entity_type, id);
    let caller = parse_caps(caps);

    let mut records = Vec::new();
    for item in registry.history(&entity, name, &caller)? {
        records.push(item?);
        if limit.is_some_and(|max| records.len() >= max) {
            break;
        }
    }

    if json_mode {
        let rows: Vec<_> = records
            .iter()
            .map(|record| {
                json!({
                    "seq": record.seq,
                    "actor": record.actor.as_str(),
                    "old_value": record.old_value.as_ref().map(|v| v.to_string()),
                    "new_value": record.new_value.to_string(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "entity": entity.to_string(),
                "name": name,
                "records": rows,
            }))?
        );
    } else if records.is_empty() {
        println!("(no change records)");
    } else {
        for record in &records {
            let old = record
                .old_value
                .as_ref()
                .map_or_else(|| "(unset)".to_string(), |v| v.to_string());
            println!(
                "#{} [{}] {} -> {}",
                record.seq, record.actor, old, record.new_value
            );
        }
    }
    Ok(())
}
