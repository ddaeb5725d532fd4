//! # Query Compiler
//!
//! Turns a structured [`Request`] into SPARQL text plus variable and
//! prefix metadata. Two strategies, selected by the request variant tag:
//!
//! - value lookup ([`value`]): property values for a fixed entity set
//! - filtered entity search ([`entity`]): entities matching a filter set
//!
//! Compilation is deterministic: filter sets iterate in their `Ord`
//! order, prefixes in table order, and the emitted text is a pure
//! function of the request, schema, and prefix table.

mod entity;
mod value;

use crate::prefix::PrefixTable;
use crate::schema::Schema;
use crate::types::{OntoError, Request, Window};
use std::collections::BTreeMap;

/// Language tag used for all label lookups.
pub const LABEL_LANG: &str = "en";

/// Shared variable name binding the matched entities.
pub const ENTITY_VAR: &str = "entities";

/// Variable names of the generic property/value dump.
pub const PROPERTIES_VAR: &str = "properties";
/// See [`PROPERTIES_VAR`].
pub const VALUES_VAR: &str = "values";

// =============================================================================
// COMPILED QUERY
// =============================================================================

/// The output of compilation: query text plus the metadata the result
/// transformer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    /// Full SPARQL text (prefix declarations + SELECT).
    pub text: String,
    /// Projected variables, in projection order.
    pub output_vars: Vec<String>,
    /// Every namespace the query references, `prefix -> URI`.
    pub used_prefixes: BTreeMap<String, String>,
}

impl CompiledQuery {
    /// The query text with `OFFSET`/`LIMIT` clauses appended.
    ///
    /// A zero offset or limit omits its clause; the `{0,0}` safety
    /// fallback therefore compiles to an unwindowed query.
    #[must_use]
    pub fn windowed_text(&self, window: &Window) -> String {
        let mut text = self.text.clone();
        if window.offset > 0 {
            text.push_str(&format!("OFFSET {}\n", window.offset));
        }
        if window.limit > 0 {
            text.push_str(&format!("LIMIT {}\n", window.limit));
        }
        text
    }
}

// =============================================================================
// COMPILATION ENTRY POINT
// =============================================================================

/// Compile a request with the matching strategy.
///
/// Fails with `UnknownPrefix` if any referenced prefix is absent from the
/// table, before any query text is finalized.
pub fn compile(
    request: &Request,
    schema: &Schema,
    prefixes: &PrefixTable,
) -> Result<CompiledQuery, OntoError> {
    match request {
        Request::Value(req) => value::compile(req, prefixes),
        Request::Entity(req) => entity::compile(req, schema, prefixes),
    }
}

// =============================================================================
// SHARED BUILDING BLOCKS
// =============================================================================

/// Resolve `prefix` against the table and record it in `used`.
pub(crate) fn declare_prefix(
    used: &mut BTreeMap<String, String>,
    prefixes: &PrefixTable,
    prefix: &str,
) -> Result<(), OntoError> {
    match prefixes.uri(prefix) {
        Some(uri) => {
            used.insert(prefix.to_string(), uri.to_string());
            Ok(())
        }
        None => Err(OntoError::UnknownPrefix(prefix.to_string())),
    }
}

/// Declare the prefixes every query needs: `rdf`, `rdfs`, and the two
/// reserved namespaces.
pub(crate) fn declare_default_prefixes(
    used: &mut BTreeMap<String, String>,
    prefixes: &PrefixTable,
) -> Result<(), OntoError> {
    declare_prefix(used, prefixes, "rdf")?;
    declare_prefix(used, prefixes, "rdfs")?;
    declare_prefix(used, prefixes, prefixes.resource_prefix())?;
    declare_prefix(used, prefixes, prefixes.ontology_prefix())?;
    Ok(())
}

/// `PREFIX` declarations in table order.
pub(crate) fn prefix_block(used: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (prefix, uri) in used {
        out.push_str(&format!("PREFIX {prefix}: <{uri}>\n"));
    }
    out.push('\n');
    out
}

/// `SELECT DISTINCT ?a ?b … WHERE {`.
pub(crate) fn query_head(output_vars: &[String]) -> String {
    let mut out = String::from("SELECT DISTINCT");
    for var in output_vars {
        out.push_str(&format!(" ?{var}"));
    }
    out.push_str("\nWHERE {\n");
    out
}

/// `VALUES ?entities { <uri1> <uri2> … }` binding the entity constants.
pub(crate) fn values_clause(entities: impl Iterator<Item = String>) -> String {
    let mut out = format!("  VALUES ?{ENTITY_VAR} {{");
    for entity in entities {
        out.push_str(&format!(" {entity}"));
    }
    out.push_str(" }\n");
    out
}

/// Append `var` to the projection unless already present.
///
/// Two filters on the same property must not project the variable twice.
pub(crate) fn push_var(output_vars: &mut Vec<String>, var: String) -> bool {
    if output_vars.contains(&var) {
        false
    } else {
        output_vars.push(var);
        true
    }
}

/// An optional label lookup on `?{var}`, filtered to [`LABEL_LANG`].
pub(crate) fn label_block(var: &str, indent: &str) -> String {
    format!(
        "{indent}OPTIONAL {{ ?{var} rdfs:label ?{var}Label .\n\
         {indent}  FILTER ( lang(?{var}Label) = \"{LABEL_LANG}\" ) }}\n"
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windowing_omits_zero_clauses() {
        let q = CompiledQuery {
            text: "SELECT ?x WHERE { }\n".to_string(),
            output_vars: vec!["x".to_string()],
            used_prefixes: BTreeMap::new(),
        };
        assert_eq!(q.windowed_text(&Window::new(0, 0)), q.text);
        let windowed = q.windowed_text(&Window::new(5, 10));
        assert!(windowed.contains("OFFSET 5"));
        assert!(windowed.contains("LIMIT 10"));
    }

    #[test]
    fn push_var_deduplicates() {
        let mut vars = vec!["entities".to_string()];
        assert!(push_var(&mut vars, "dbobirthDate".to_string()));
        assert!(!push_var(&mut vars, "dbobirthDate".to_string()));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn head_lists_vars_in_order() {
        let head = query_head(&["entities".to_string(), "dbochild".to_string()]);
        assert!(head.starts_with("SELECT DISTINCT ?entities ?dbochild\nWHERE {"));
    }
}
