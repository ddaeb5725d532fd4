//! # ontogate CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `compile` - Compile a request to SPARQL offline and print it
//! - `versions` - List the version catalog
//! - `prefixes` - List the namespace prefix table

mod commands;

use crate::config::ConfigError;
use clap::{Parser, Subcommand};
use ontogate_core::OntoError;
use std::path::PathBuf;
use thiserror::Error;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// ontogate - typed gateway over a SPARQL knowledge graph.
///
/// Compiles filterable requests into SPARQL, migrates old requests
/// across schema versions, and re-serializes endpoint results.
#[derive(Parser, Debug)]
#[command(name = "ontogate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short = 'C', long, global = true, default_value = "ontogate.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Compile a request to SPARQL and print the query text
    Compile {
        /// Entity local names (value request); repeatable
        #[arg(short, long)]
        entity: Vec<String>,

        /// Properties to look up, `prefix:name`; repeatable
        #[arg(short = 'P', long)]
        property: Vec<String>,

        /// Required filters, `prefix:name[,op,value]`; repeatable
        #[arg(short, long)]
        filter: Vec<String>,

        /// Optional filters, same shape; repeatable
        #[arg(short = 'o', long)]
        ofilter: Vec<String>,

        /// Resource-object filter, `value[,prefix:name]`
        #[arg(long)]
        value: Option<String>,

        /// Class local name under the ontology namespace
        #[arg(short = 'c', long)]
        class: Option<String>,

        /// Output style (none, prefixed, short, nested)
        #[arg(short, long)]
        style: Option<String>,

        /// Request version; defaults to the catalog's latest
        #[arg(long)]
        request_version: Option<String>,

        /// Allow migration across a major-version boundary
        #[arg(long)]
        old_version: bool,

        /// Result limit
        #[arg(short, long)]
        limit: Option<i64>,

        /// Result offset
        #[arg(long)]
        offset: Option<i64>,
    },

    /// List the version catalog
    Versions,

    /// List the namespace prefix table
    Prefixes,
}

// =============================================================================
// CLI ERRORS
// =============================================================================

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration or data files failed to load.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The core pipeline rejected the request.
    #[error(transparent)]
    Core(#[from] OntoError),

    /// Server socket or serialization I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.clone();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&config_path, &host, port).await,
        Some(Commands::Compile {
            entity,
            property,
            filter,
            ofilter,
            value,
            class,
            style,
            request_version,
            old_version,
            limit,
            offset,
        }) => cmd_compile(
            &config_path,
            CompileArgs {
                entity,
                property,
                filter,
                ofilter,
                value,
                class,
                style,
                request_version,
                old_version,
                limit,
                offset,
            },
            json_mode,
        ),
        Some(Commands::Versions) => cmd_versions(&config_path, json_mode),
        Some(Commands::Prefixes) => cmd_prefixes(&config_path, json_mode),
        None => cmd_versions(&config_path, json_mode),
    }
}
