//! # Namespace Prefix Table
//!
//! The process-wide `prefix -> namespace URI` binding. Loaded once by the
//! application at startup and passed into compiler and transformer calls
//! as an immutable value; hot reload means building a whole new table and
//! swapping the reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default prefix of the primary resource namespace.
pub const DEFAULT_RESOURCE_PREFIX: &str = "dbr";
/// Default prefix of the ontology namespace.
pub const DEFAULT_ONTOLOGY_PREFIX: &str = "dbo";

/// Immutable `prefix -> URI` table with two reserved entries: the primary
/// resource namespace (entity constants live under it) and the ontology
/// namespace (class names live under it).
///
/// Iteration order is the `BTreeMap` key order; prefix abbreviation's
/// "first containing entry wins" rule is defined over this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixTable {
    map: BTreeMap<String, String>,
    resource_prefix: String,
    ontology_prefix: String,
}

impl PrefixTable {
    /// Build a table with the default reserved prefixes.
    #[must_use]
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self::with_reserved(map, DEFAULT_RESOURCE_PREFIX, DEFAULT_ONTOLOGY_PREFIX)
    }

    /// Build a table naming the reserved resource/ontology prefixes.
    #[must_use]
    pub fn with_reserved(
        map: BTreeMap<String, String>,
        resource_prefix: impl Into<String>,
        ontology_prefix: impl Into<String>,
    ) -> Self {
        Self {
            map,
            resource_prefix: resource_prefix.into(),
            ontology_prefix: ontology_prefix.into(),
        }
    }

    /// The namespace URI bound to `prefix`, if any.
    #[must_use]
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.map.get(prefix).map(String::as_str)
    }

    /// The reserved resource-namespace prefix.
    #[must_use]
    pub fn resource_prefix(&self) -> &str {
        &self.resource_prefix
    }

    /// The reserved ontology-namespace prefix.
    #[must_use]
    pub fn ontology_prefix(&self) -> &str {
        &self.ontology_prefix
    }

    /// The URI of the reserved resource namespace, if bound.
    #[must_use]
    pub fn resource_uri(&self) -> Option<&str> {
        self.uri(&self.resource_prefix)
    }

    /// The URI of the reserved ontology namespace, if bound.
    #[must_use]
    pub fn ontology_uri(&self) -> Option<&str> {
        self.uri(&self.ontology_prefix)
    }

    /// True if `uri` is one of the two reserved namespaces.
    #[must_use]
    pub fn is_reserved_uri(&self, uri: &str) -> bool {
        self.resource_uri() == Some(uri) || self.ontology_uri() == Some(uri)
    }

    /// Iterate `(prefix, uri)` pairs in deterministic key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Number of bound prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no prefixes are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
