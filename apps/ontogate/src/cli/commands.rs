//! CLI command implementations.

use super::CliError;
use crate::api::{self, AppState, CommonParams, EntityParams, ValueParams};
use crate::client::SparqlClient;
use crate::config::{
    Config, load_api_keys, load_important_properties, load_prefix_table, load_schema,
    load_version_catalog,
};
use ontogate_core::{Migrator, PrefixTable, Schema, VersionCatalog, compile};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// STATE LOADING
// =============================================================================

/// The immutable tables the offline commands need.
struct Tables {
    config: Config,
    prefixes: PrefixTable,
    schema: Schema,
    catalog: VersionCatalog,
    important: BTreeMap<String, Vec<String>>,
}

/// Load config and data files. The prefix table is required; schema,
/// catalog, and important-properties fall back to empty when their
/// files are absent so the binary stays usable on a bare checkout.
fn load_tables(config_path: &Path) -> Result<Tables, CliError> {
    let config = Config::load(config_path)?;
    let prefixes = load_prefix_table(&config.files.prefixes)?;
    let schema = if config.files.schema.exists() {
        load_schema(&config.files.schema)?
    } else {
        tracing::warn!("no schema file, comparisons stay untyped");
        Schema::empty()
    };
    let catalog = if config.files.versions_dir.exists() {
        load_version_catalog(&config.files.versions_dir)?
    } else {
        tracing::warn!("no versions directory, version migration disabled");
        VersionCatalog::default()
    };
    let important = if config.files.important_properties.exists() {
        load_important_properties(&config.files.important_properties)?
    } else {
        BTreeMap::new()
    };
    Ok(Tables {
        config,
        prefixes,
        schema,
        catalog,
        important,
    })
}

// =============================================================================
// SERVER
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config_path: &Path, host: &str, port: u16) -> Result<(), CliError> {
    let tables = load_tables(config_path)?;
    let client = SparqlClient::new(tables.config.endpoint.url.clone());

    let keys = if tables.config.keys.enabled {
        let registry = Arc::new(api::ApiKeyRegistry::new(
            load_api_keys(&tables.config.files.api_keys)?,
            &tables.config.keys,
        ));
        api::spawn_maintenance(
            Arc::clone(&registry),
            tables.config.keys.clone(),
            tables.config.files.api_keys.clone(),
        );
        Some(registry)
    } else {
        None
    };

    if tables.catalog.is_empty() {
        tracing::warn!("version catalog is empty; every request will be rejected");
    }

    let state = AppState::new(
        tables.config,
        tables.prefixes,
        tables.schema,
        tables.catalog,
        tables.important,
        client,
        keys,
    );
    let addr = format!("{host}:{port}");
    api::run_server(&addr, state).await?;
    Ok(())
}

// =============================================================================
// COMPILE
// =============================================================================

/// Flags of the `compile` subcommand.
pub struct CompileArgs {
    /// Entity local names; non-empty selects the value strategy.
    pub entity: Vec<String>,
    /// Properties to look up.
    pub property: Vec<String>,
    /// Required filter expressions.
    pub filter: Vec<String>,
    /// Optional filter expressions.
    pub ofilter: Vec<String>,
    /// Resource-object filter.
    pub value: Option<String>,
    /// Class local name.
    pub class: Option<String>,
    /// Output style token.
    pub style: Option<String>,
    /// Request version.
    pub request_version: Option<String>,
    /// Allow incompatible migration.
    pub old_version: bool,
    /// Result limit.
    pub limit: Option<i64>,
    /// Result offset.
    pub offset: Option<i64>,
}

/// Compile a request offline and print the SPARQL text.
pub fn cmd_compile(config_path: &Path, args: CompileArgs, json_mode: bool) -> Result<(), CliError> {
    let tables = load_tables(config_path)?;
    let latest = tables
        .catalog
        .latest()
        .map(|v| v.version_string())
        .unwrap_or_else(|| "0.0.0".to_string());

    let common = CommonParams {
        version: args.request_version,
        style: args.style,
        limit: args.limit.map(|l| l.to_string()),
        offset: args.offset.map(|o| o.to_string()),
        old_version: Some(args.old_version.to_string()),
        ..CommonParams::default()
    };

    let request = if args.entity.is_empty() {
        api::build_entity_request(
            &EntityParams {
                filter: join_expressions(&args.filter),
                ofilter: join_expressions(&args.ofilter),
                value: args.value,
                class: args.class,
                important: None,
                common,
            },
            &latest,
            &tables.important,
        )?
    } else {
        api::build_value_request(
            &ValueParams {
                entities: args.entity.join(","),
                property: if args.property.is_empty() {
                    None
                } else {
                    Some(args.property.join(","))
                },
                common,
            },
            &latest,
        )?
    };

    let migrated = if tables.catalog.is_empty() {
        request
    } else {
        Migrator::new(&tables.catalog, &tables.prefixes).migrate(&request)?
    };

    let compiled = compile(&migrated, &tables.schema, &tables.prefixes)?;
    let text = compiled.windowed_text(&migrated.meta().window);

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "query": text,
                "outputVars": compiled.output_vars,
                "usedPrefixes": compiled.used_prefixes,
            }))
            .map_err(|e| std::io::Error::other(e.to_string()))?
        );
    } else {
        println!("{text}");
    }
    Ok(())
}

fn join_expressions(expressions: &[String]) -> Option<String> {
    if expressions.is_empty() {
        None
    } else {
        Some(expressions.join(";"))
    }
}

// =============================================================================
// INTROSPECTION
// =============================================================================

/// List the version catalog.
pub fn cmd_versions(config_path: &Path, json_mode: bool) -> Result<(), CliError> {
    let tables = load_tables(config_path)?;
    if json_mode {
        let listing: Vec<_> = tables
            .catalog
            .as_slice()
            .iter()
            .map(|v| {
                json!({
                    "version": v.version_string(),
                    "resourceReplacements": v.resource_replacements.len(),
                    "prefixReplacements": v.prefix_replacements.len(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&listing)
                .map_err(|e| std::io::Error::other(e.to_string()))?
        );
        return Ok(());
    }

    if tables.catalog.is_empty() {
        println!("version catalog is empty");
        return Ok(());
    }
    for v in tables.catalog.as_slice() {
        println!(
            "{}  ({} resource replacements, {} prefix replacements)",
            v.version_string(),
            v.resource_replacements.len(),
            v.prefix_replacements.len()
        );
    }
    Ok(())
}

/// List the namespace prefix table.
pub fn cmd_prefixes(config_path: &Path, json_mode: bool) -> Result<(), CliError> {
    let tables = load_tables(config_path)?;
    if json_mode {
        let map: BTreeMap<&str, &str> = tables.prefixes.iter().collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&map)
                .map_err(|e| std::io::Error::other(e.to_string()))?
        );
        return Ok(());
    }
    for (prefix, uri) in tables.prefixes.iter() {
        println!("{prefix}: <{uri}>");
    }
    Ok(())
}
