//! # ontogate-core
//!
//! The deterministic request/query/transform pipeline for ontogate -
//! THE LOGIC.
//!
//! This crate turns typed, filterable requests over a knowledge graph
//! into SPARQL text, migrates old requests forward across schema
//! versions, and re-serializes tabular query results into several output
//! shapes.
//!
//! ## Pipeline
//!
//! ```text
//! Request ──migrate──▶ Request' ──compile──▶ CompiledQuery
//!                                                  │
//!                                 (external SPARQL endpoint)
//!                                                  │
//!                     rendered output ◀──render── ResultTable
//! ```
//!
//! ## Architectural Constraints
//!
//! - Pure Rust: no async, no network, no filesystem access
//! - Deterministic: `BTreeMap`/`BTreeSet` only; compiled query text is a
//!   pure function of the request, schema, and prefix-table snapshots
//! - Immutable: the prefix table, schema, and version catalog are built
//!   once and never mutated; reload means swapping a whole new value

// =============================================================================
// MODULES
// =============================================================================

pub mod compiler;
pub mod prefix;
pub mod schema;
pub mod transform;
pub mod types;
pub mod versioning;

// =============================================================================
// RE-EXPORTS: Request Model
// =============================================================================

pub use types::{
    Combinator, EntityRequest, Filter, FilterOp, OntoError, OutputFormat, Request, RequestMeta,
    Resource, Style, ValueRequest, Window,
};

// =============================================================================
// RE-EXPORTS: Tables & Lookups
// =============================================================================

pub use prefix::{DEFAULT_ONTOLOGY_PREFIX, DEFAULT_RESOURCE_PREFIX, PrefixTable};
pub use schema::Schema;

// =============================================================================
// RE-EXPORTS: Compiler
// =============================================================================

pub use compiler::{CompiledQuery, compile};

// =============================================================================
// RE-EXPORTS: Versioning
// =============================================================================

pub use versioning::{
    ApiVersion, Migrator, VersionCatalog, VersionDescriptor, parse_version_string,
};

// =============================================================================
// RE-EXPORTS: Result Transformation
// =============================================================================

pub use transform::{Cell, CellKind, ResultTable, Row, abbreviate, render};
