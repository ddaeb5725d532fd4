//! # Result Transformer
//!
//! Re-serializes a tabular query result into the requested output shape:
//! - SPARQL results JSON (plain or prefix-abbreviated)
//! - TSV (plain or prefix-abbreviated)
//! - nested JSON (one object per entity, deduplicated fields)
//! - RDF syntaxes over the W3C result-set vocabulary graph
//!
//! Every transform is a pure function of the table, the style/format
//! pair, and the prefix table snapshot.

mod nested;
mod rdf;
mod tabular;

use crate::prefix::PrefixTable;
use crate::types::{OntoError, OutputFormat, Style};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

// =============================================================================
// TABLE MODEL
// =============================================================================

/// Whether a cell holds a graph node reference or a literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// An absolute URI (or blank node reference).
    Uri,
    /// A literal, possibly typed or language-tagged.
    Literal,
}

/// One bound value in a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Node reference or literal.
    pub kind: CellKind,
    /// The lexical value.
    pub value: String,
    /// Datatype URI for typed literals.
    pub datatype: Option<String>,
    /// Language tag for language-tagged literals.
    pub lang: Option<String>,
}

impl Cell {
    /// A URI cell.
    #[must_use]
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Uri,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// An untyped literal cell.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Literal,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// A typed literal cell.
    #[must_use]
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Literal,
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    /// A language-tagged literal cell.
    #[must_use]
    pub fn lang_literal(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Literal,
            value: value.into(),
            datatype: None,
            lang: Some(lang.into()),
        }
    }
}

/// One result row: variable name to bound cell. Unbound variables are
/// simply absent.
pub type Row = BTreeMap<String, Cell>;

/// An ordered tabular query result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    /// Projected variables, in projection order.
    pub vars: Vec<String>,
    /// Rows in endpoint order.
    pub rows: Vec<Row>,
}

impl ResultTable {
    /// Parse the `application/sparql-results+json` body an endpoint
    /// returns.
    ///
    /// Fails with `TransportFailure`: a malformed body is a transport
    /// problem, not a client-input problem.
    pub fn from_sparql_json(body: &str) -> Result<Self, OntoError> {
        let malformed =
            |what: &str| OntoError::TransportFailure(format!("malformed result body: {what}"));

        let root: Value =
            serde_json::from_str(body).map_err(|e| malformed(&format!("invalid json: {e}")))?;
        let vars = root
            .pointer("/head/vars")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("missing head.vars"))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let bindings = root
            .pointer("/results/bindings")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("missing results.bindings"))?;

        let mut rows = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let obj = binding
                .as_object()
                .ok_or_else(|| malformed("binding is not an object"))?;
            let mut row = Row::new();
            for (var, cell) in obj {
                let value = cell
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("binding without value"))?;
                let kind = match cell.get("type").and_then(Value::as_str) {
                    Some("uri" | "bnode") => CellKind::Uri,
                    Some("literal" | "typed-literal") => CellKind::Literal,
                    other => {
                        return Err(malformed(&format!("unknown binding type {other:?}")));
                    }
                };
                row.insert(
                    var.clone(),
                    Cell {
                        kind,
                        value: value.to_string(),
                        datatype: cell
                            .get("datatype")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        lang: cell
                            .get("xml:lang")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    },
                );
            }
            rows.push(row);
        }
        Ok(Self { vars, rows })
    }

    /// The table as a SPARQL results JSON value, with abbreviation
    /// applied for the `Prefixed`/`Short` styles (URI values and literal
    /// datatypes are rewritten in place).
    #[must_use]
    pub fn to_sparql_json(&self, style: Style, prefixes: &PrefixTable) -> Value {
        let abbreviating = matches!(style, Style::Prefixed | Style::Short);
        let bindings: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (var, cell) in row {
                    let mut entry = Map::new();
                    match cell.kind {
                        CellKind::Uri => {
                            entry.insert("type".to_string(), json!("uri"));
                            let value = if abbreviating {
                                abbreviate(&cell.value, style, prefixes)
                            } else {
                                cell.value.clone()
                            };
                            entry.insert("value".to_string(), json!(value));
                        }
                        CellKind::Literal => {
                            entry.insert("type".to_string(), json!("literal"));
                            entry.insert("value".to_string(), json!(cell.value));
                            if let Some(datatype) = &cell.datatype {
                                let datatype = if abbreviating {
                                    abbreviate(datatype, style, prefixes)
                                } else {
                                    datatype.clone()
                                };
                                entry.insert("datatype".to_string(), json!(datatype));
                            }
                            if let Some(lang) = &cell.lang {
                                entry.insert("xml:lang".to_string(), json!(lang));
                            }
                        }
                    }
                    obj.insert(var.clone(), Value::Object(entry));
                }
                Value::Object(obj)
            })
            .collect();

        json!({
            "head": { "vars": self.vars },
            "results": { "bindings": bindings }
        })
    }
}

// =============================================================================
// PREFIX ABBREVIATION
// =============================================================================

/// Replace the first known namespace URI contained in `value`.
///
/// `Prefixed` substitutes `prefix:`; `Short` strips the two reserved
/// namespaces entirely (bare local name) and prefixes all others. The
/// scan runs in prefix-table order; the first containing entry wins.
#[must_use]
pub fn abbreviate(value: &str, style: Style, prefixes: &PrefixTable) -> String {
    for (prefix, uri) in prefixes.iter() {
        if value.contains(uri) {
            let replacement = if style == Style::Short && prefixes.is_reserved_uri(uri) {
                String::new()
            } else {
                format!("{prefix}:")
            };
            return value.replace(uri, &replacement);
        }
    }
    value.to_string()
}

// =============================================================================
// RENDER DISPATCH
// =============================================================================

/// Render a result table in the requested format and style.
///
/// Invalid style/format combinations were normalized away at request
/// construction; a style reaching an RDF syntax here is simply ignored.
pub fn render(
    table: &ResultTable,
    format: OutputFormat,
    style: Style,
    prefixes: &PrefixTable,
) -> Result<String, OntoError> {
    match format {
        OutputFormat::Tsv => Ok(tabular::to_tsv(table, style, prefixes)),
        OutputFormat::Json => match style {
            Style::Nested => nested::render(table, prefixes),
            _ => to_pretty(&table.to_sparql_json(style, prefixes)),
        },
        OutputFormat::JsonLd => rdf::to_jsonld(table),
        OutputFormat::RdfJson => rdf::to_rdfjson(table),
        OutputFormat::Turtle => Ok(rdf::to_turtle(table)),
        OutputFormat::NTriples => Ok(rdf::to_ntriples(table)),
        OutputFormat::RdfXml => Ok(rdf::to_rdfxml(table)),
    }
}

pub(crate) fn to_pretty(value: &Value) -> Result<String, OntoError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| OntoError::CompilationFailure(format!("cannot serialize result: {e}")))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PrefixTable {
        let mut map = BTreeMap::new();
        map.insert("dbr".to_string(), "http://dbpedia.org/resource/".to_string());
        map.insert("dbo".to_string(), "http://dbpedia.org/ontology/".to_string());
        map.insert(
            "xsd".to_string(),
            "http://www.w3.org/2001/XMLSchema#".to_string(),
        );
        PrefixTable::new(map)
    }

    #[test]
    fn abbreviate_prefixed_and_short() {
        let t = table();
        assert_eq!(
            abbreviate("http://dbpedia.org/ontology/birthDate", Style::Prefixed, &t),
            "dbo:birthDate"
        );
        assert_eq!(
            abbreviate("http://dbpedia.org/ontology/birthDate", Style::Short, &t),
            "birthDate"
        );
        // non-reserved namespaces keep their prefix even in short style
        assert_eq!(
            abbreviate("http://www.w3.org/2001/XMLSchema#date", Style::Short, &t),
            "xsd:date"
        );
        // unknown namespaces pass through untouched
        assert_eq!(
            abbreviate("http://example.org/x", Style::Prefixed, &t),
            "http://example.org/x"
        );
    }

    #[test]
    fn parses_sparql_results_json() {
        let body = r#"{
            "head": {"vars": ["entities", "dbobirthDate"]},
            "results": {"bindings": [{
                "entities": {"type": "uri", "value": "http://dbpedia.org/resource/Albert_Einstein"},
                "dbobirthDate": {"type": "literal", "value": "1879-03-14",
                                 "datatype": "http://www.w3.org/2001/XMLSchema#date"}
            }]}
        }"#;
        let parsed = ResultTable::from_sparql_json(body).expect("parses");
        assert_eq!(parsed.vars, vec!["entities", "dbobirthDate"]);
        assert_eq!(parsed.rows.len(), 1);
        let cell = &parsed.rows[0]["dbobirthDate"];
        assert_eq!(cell.kind, CellKind::Literal);
        assert_eq!(
            cell.datatype.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#date")
        );
    }

    #[test]
    fn malformed_body_is_a_transport_failure() {
        let err = ResultTable::from_sparql_json("{}");
        assert!(matches!(err, Err(OntoError::TransportFailure(_))));
    }

    #[test]
    fn sparql_json_abbreviates_uri_values_and_datatypes() {
        let mut row = Row::new();
        row.insert(
            "entities".to_string(),
            Cell::uri("http://dbpedia.org/resource/Moon"),
        );
        row.insert(
            "dbobirthDate".to_string(),
            Cell::typed_literal("1879-03-14", "http://www.w3.org/2001/XMLSchema#date"),
        );
        let result = ResultTable {
            vars: vec!["entities".to_string(), "dbobirthDate".to_string()],
            rows: vec![row],
        };
        let value = result.to_sparql_json(Style::Prefixed, &table());
        assert_eq!(
            value.pointer("/results/bindings/0/entities/value"),
            Some(&json!("dbr:Moon"))
        );
        assert_eq!(
            value.pointer("/results/bindings/0/dbobirthDate/datatype"),
            Some(&json!("xsd:date"))
        );
    }
}
