//! # Datatype Schema Lookup
//!
//! Maps ontology property local names to the XSD datatype of their range,
//! distilled from the ontology's datatype-property declarations. The
//! compiler uses it to emit typed-literal comparisons
//! (`"1980-01-01"^^<…#date>`) instead of string comparisons.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable `property local name -> datatype URI` lookup.
///
/// An absent entry means the property has no declared datatype and
/// comparisons against it fall back to `str()` comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    ranges: BTreeMap<String, String>,
}

impl Schema {
    /// Build a schema from a range map.
    #[must_use]
    pub fn new(ranges: BTreeMap<String, String>) -> Self {
        Self { ranges }
    }

    /// An empty schema: every comparison is untyped.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The declared datatype URI of a property, if any.
    #[must_use]
    pub fn range(&self, local: &str) -> Option<&str> {
        self.ranges.get(local).map(String::as_str)
    }

    /// Number of declared ranges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True if no ranges are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
