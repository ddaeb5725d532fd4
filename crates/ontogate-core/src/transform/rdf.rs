//! RDF serializations of a result table.
//!
//! The table is encoded as a graph in the W3C result-set vocabulary
//! (one `rs:ResultSet` node, a `rs:solution` blank node per row, a
//! `rs:binding` blank node per bound cell) and serialized as N-Triples,
//! Turtle, RDF/XML, RDF/JSON, or JSON-LD.

use super::{CellKind, ResultTable, to_pretty};
use crate::types::OntoError;
use serde_json::{Map, Value, json};

const RS_NS: &str = "http://www.w3.org/2001/sw/DataAccess/tests/result-set#";
const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

// =============================================================================
// GRAPH MODEL
// =============================================================================

/// A node or literal in the encoded graph.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: Option<String>,
        lang: Option<String>,
    },
}

/// One triple; the subject is always a blank node here and the predicate
/// always an absolute IRI.
#[derive(Debug, Clone)]
struct Triple {
    subject: String,
    predicate: String,
    object: Term,
}

fn plain(value: &str) -> Term {
    Term::Literal {
        value: value.to_string(),
        datatype: None,
        lang: None,
    }
}

/// Encode the table in the result-set vocabulary.
fn result_set_graph(table: &ResultTable) -> Vec<Triple> {
    let rs = "rs".to_string();
    let mut triples = vec![Triple {
        subject: rs.clone(),
        predicate: format!("{RDF_NS}type"),
        object: Term::Iri(format!("{RS_NS}ResultSet")),
    }];

    for var in &table.vars {
        triples.push(Triple {
            subject: rs.clone(),
            predicate: format!("{RS_NS}resultVariable"),
            object: plain(var),
        });
    }

    // All rs-subject triples first, so each serializer sees every
    // subject as one contiguous run.
    for i in 0..table.rows.len() {
        triples.push(Triple {
            subject: rs.clone(),
            predicate: format!("{RS_NS}solution"),
            object: Term::Blank(format!("sol{i}")),
        });
    }

    for (i, row) in table.rows.iter().enumerate() {
        let solution = format!("sol{i}");
        for k in 0..row.len() {
            triples.push(Triple {
                subject: solution.clone(),
                predicate: format!("{RS_NS}binding"),
                object: Term::Blank(format!("b{i}x{k}")),
            });
        }
        for (k, (var, cell)) in row.iter().enumerate() {
            let binding = format!("b{i}x{k}");
            triples.push(Triple {
                subject: binding.clone(),
                predicate: format!("{RS_NS}variable"),
                object: plain(var),
            });
            let value = match cell.kind {
                CellKind::Uri => Term::Iri(cell.value.clone()),
                CellKind::Literal => Term::Literal {
                    value: cell.value.clone(),
                    datatype: cell.datatype.clone(),
                    lang: cell.lang.clone(),
                },
            };
            triples.push(Triple {
                subject: binding,
                predicate: format!("{RS_NS}value"),
                object: value,
            });
        }
    }

    triples
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn qname(iri: &str) -> Option<String> {
    iri.strip_prefix(RS_NS)
        .map(|local| format!("rs:{local}"))
        .or_else(|| iri.strip_prefix(RDF_NS).map(|local| format!("rdf:{local}")))
}

// =============================================================================
// N-TRIPLES & TURTLE
// =============================================================================

fn term_ntriples(term: &Term) -> String {
    match term {
        Term::Iri(iri) => format!("<{iri}>"),
        Term::Blank(label) => format!("_:{label}"),
        Term::Literal {
            value,
            datatype,
            lang,
        } => {
            let quoted = format!("\"{}\"", escape_literal(value));
            match (datatype, lang) {
                (Some(dt), _) => format!("{quoted}^^<{dt}>"),
                (None, Some(lang)) => format!("{quoted}@{lang}"),
                (None, None) => quoted,
            }
        }
    }
}

/// One triple per line, absolute IRIs.
pub(crate) fn to_ntriples(table: &ResultTable) -> String {
    let mut out = String::new();
    for triple in result_set_graph(table) {
        out.push_str(&format!(
            "_:{} <{}> {} .\n",
            triple.subject,
            triple.predicate,
            term_ntriples(&triple.object)
        ));
    }
    out
}

/// Turtle with `rs:`/`rdf:` prefix declarations, grouped by subject.
pub(crate) fn to_turtle(table: &ResultTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("@prefix rs:  <{RS_NS}> .\n"));
    out.push_str(&format!("@prefix rdf: <{RDF_NS}> .\n\n"));

    let triples = result_set_graph(table);
    let mut i = 0;
    while i < triples.len() {
        let subject = &triples[i].subject;
        out.push_str(&format!("_:{subject}"));
        let mut first = true;
        while i < triples.len() && triples[i].subject == *subject {
            let t = &triples[i];
            let predicate = qname(&t.predicate).unwrap_or_else(|| format!("<{}>", t.predicate));
            let separator = if first { "\n  " } else { " ;\n  " };
            out.push_str(&format!(
                "{separator}{predicate} {}",
                term_ntriples(&t.object)
            ));
            first = false;
            i += 1;
        }
        out.push_str(" .\n\n");
    }
    out
}

// =============================================================================
// RDF/XML
// =============================================================================

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// RDF/XML as one `rdf:Description` per subject.
pub(crate) fn to_rdfxml(table: &ResultTable) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<rdf:RDF xmlns:rdf=\"{RDF_NS}\" xmlns:rs=\"{RS_NS}\">\n"
    ));

    let triples = result_set_graph(table);
    let mut i = 0;
    while i < triples.len() {
        let subject = &triples[i].subject;
        out.push_str(&format!("  <rdf:Description rdf:nodeID=\"{subject}\">\n"));
        while i < triples.len() && triples[i].subject == *subject {
            let t = &triples[i];
            let element = qname(&t.predicate).unwrap_or_else(|| t.predicate.clone());
            match &t.object {
                Term::Iri(iri) => {
                    out.push_str(&format!(
                        "    <{element} rdf:resource=\"{}\"/>\n",
                        escape_xml(iri)
                    ));
                }
                Term::Blank(label) => {
                    out.push_str(&format!("    <{element} rdf:nodeID=\"{label}\"/>\n"));
                }
                Term::Literal {
                    value,
                    datatype,
                    lang,
                } => {
                    let attrs = match (datatype, lang) {
                        (Some(dt), _) => format!(" rdf:datatype=\"{}\"", escape_xml(dt)),
                        (None, Some(lang)) => format!(" xml:lang=\"{lang}\""),
                        (None, None) => String::new(),
                    };
                    out.push_str(&format!(
                        "    <{element}{attrs}>{}</{element}>\n",
                        escape_xml(value)
                    ));
                }
            }
            i += 1;
        }
        out.push_str("  </rdf:Description>\n");
    }

    out.push_str("</rdf:RDF>\n");
    out
}

// =============================================================================
// RDF/JSON & JSON-LD
// =============================================================================

fn term_rdfjson(term: &Term) -> Value {
    match term {
        Term::Iri(iri) => json!({ "type": "uri", "value": iri }),
        Term::Blank(label) => json!({ "type": "bnode", "value": format!("_:{label}") }),
        Term::Literal {
            value,
            datatype,
            lang,
        } => {
            let mut obj = Map::new();
            obj.insert("type".to_string(), json!("literal"));
            obj.insert("value".to_string(), json!(value));
            if let Some(dt) = datatype {
                obj.insert("datatype".to_string(), json!(dt));
            }
            if let Some(lang) = lang {
                obj.insert("lang".to_string(), json!(lang));
            }
            Value::Object(obj)
        }
    }
}

/// RDF/JSON: `{subject: {predicate: [object, …]}}`.
pub(crate) fn to_rdfjson(table: &ResultTable) -> Result<String, OntoError> {
    let mut subjects: Map<String, Value> = Map::new();
    for triple in result_set_graph(table) {
        let subject = subjects
            .entry(format!("_:{}", triple.subject))
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(predicates) = subject {
            let objects = predicates
                .entry(triple.predicate.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = objects {
                list.push(term_rdfjson(&triple.object));
            }
        }
    }
    to_pretty(&Value::Object(subjects))
}

fn term_jsonld(term: &Term) -> Value {
    match term {
        Term::Iri(iri) => json!({ "@id": iri }),
        Term::Blank(label) => json!({ "@id": format!("_:{label}") }),
        Term::Literal {
            value,
            datatype,
            lang,
        } => match (datatype, lang) {
            (Some(dt), _) => json!({ "@value": value, "@type": dt }),
            (None, Some(lang)) => json!({ "@value": value, "@language": lang }),
            (None, None) => json!(value),
        },
    }
}

/// JSON-LD: a `@graph` of per-subject objects under an `rs:` context.
pub(crate) fn to_jsonld(table: &ResultTable) -> Result<String, OntoError> {
    let mut graph: Vec<Value> = Vec::new();
    let mut current: Option<(String, Map<String, Value>)> = None;

    for triple in result_set_graph(table) {
        let subject_id = format!("_:{}", triple.subject);
        let needs_new = current.as_ref().is_none_or(|(id, _)| *id != subject_id);
        if needs_new {
            if let Some((_, obj)) = current.take() {
                graph.push(Value::Object(obj));
            }
            let mut obj = Map::new();
            obj.insert("@id".to_string(), json!(subject_id));
            current = Some((subject_id, obj));
        }
        if let Some((_, obj)) = current.as_mut() {
            let rdf_type = format!("{RDF_NS}type");
            if triple.predicate == rdf_type {
                if let Term::Iri(iri) = &triple.object {
                    obj.insert("@type".to_string(), json!(iri));
                    continue;
                }
            }
            let key = qname(&triple.predicate).unwrap_or_else(|| triple.predicate.clone());
            let entry = obj.entry(key).or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entry {
                list.push(term_jsonld(&triple.object));
            }
        }
    }
    if let Some((_, obj)) = current.take() {
        graph.push(Value::Object(obj));
    }

    to_pretty(&json!({
        "@context": { "rs": RS_NS, "rdf": RDF_NS },
        "@graph": graph
    }))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Cell, Row};

    fn sample() -> ResultTable {
        let mut row = Row::new();
        row.insert(
            "entities".to_string(),
            Cell::uri("http://dbpedia.org/resource/Moon"),
        );
        row.insert("label".to_string(), Cell::lang_literal("Moon", "en"));
        ResultTable {
            vars: vec!["entities".to_string(), "label".to_string()],
            rows: vec![row],
        }
    }

    #[test]
    fn ntriples_lines_end_with_period() {
        let nt = to_ntriples(&sample());
        assert!(!nt.is_empty());
        for line in nt.lines() {
            assert!(line.ends_with(" ."), "line does not end with ' .': {line}");
        }
        assert!(nt.contains(&format!("<{RS_NS}ResultSet>")));
        assert!(nt.contains("<http://dbpedia.org/resource/Moon>"));
        assert!(nt.contains("\"Moon\"@en"));
    }

    #[test]
    fn turtle_declares_prefixes_and_groups_subjects() {
        let ttl = to_turtle(&sample());
        assert!(ttl.starts_with("@prefix rs:"));
        assert!(ttl.contains("rs:resultVariable \"entities\""));
        assert!(ttl.contains("rs:solution _:sol0"));
        assert!(ttl.contains(" ;\n"));
    }

    #[test]
    fn rdfxml_is_description_based() {
        let xml = to_rdfxml(&sample());
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<rdf:Description rdf:nodeID=\"rs\">"));
        assert!(xml.contains("rdf:resource=\"http://dbpedia.org/resource/Moon\""));
        assert!(xml.contains("xml:lang=\"en\">Moon</rs:value>"));
        assert!(xml.trim_end().ends_with("</rdf:RDF>"));
    }

    #[test]
    fn rdfjson_groups_by_subject_and_predicate() {
        let rendered = to_rdfjson(&sample()).expect("renders");
        let parsed: Value = serde_json::from_str(&rendered).expect("valid json");
        let variables = parsed
            .pointer("/_:rs")
            .and_then(|subject| subject.get(format!("{RS_NS}resultVariable")))
            .and_then(Value::as_array)
            .expect("result variables");
        assert_eq!(variables.len(), 2);
    }

    #[test]
    fn jsonld_carries_context_and_graph() {
        let rendered = to_jsonld(&sample()).expect("renders");
        let parsed: Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(parsed.pointer("/@context/rs"), Some(&json!(RS_NS)));
        let graph = parsed.pointer("/@graph").and_then(Value::as_array).expect("graph");
        assert_eq!(graph[0]["@id"], json!("_:rs"));
        assert_eq!(graph[0]["@type"], json!(format!("{RS_NS}ResultSet")));
    }
}
