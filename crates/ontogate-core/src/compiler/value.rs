//! Value-lookup compilation: property values for a fixed entity set.

use super::{
    CompiledQuery, ENTITY_VAR, PROPERTIES_VAR, VALUES_VAR, declare_default_prefixes,
    declare_prefix, label_block, prefix_block, push_var, query_head, values_clause,
};
use crate::prefix::PrefixTable;
use crate::types::{OntoError, Style, ValueRequest};
use std::collections::BTreeMap;

/// Compile a [`ValueRequest`].
///
/// Emits one `VALUES` clause binding the entity constants, then either
/// one optional pattern per requested property or, when no properties
/// are given, a single generic property/value dump with a label lookup.
pub(crate) fn compile(
    req: &ValueRequest,
    prefixes: &PrefixTable,
) -> Result<CompiledQuery, OntoError> {
    let mut used = BTreeMap::new();
    declare_default_prefixes(&mut used, prefixes)?;
    for prop in &req.properties {
        declare_prefix(&mut used, prefixes, &prop.prefix)?;
    }

    let resource_uri = prefixes
        .resource_uri()
        .ok_or_else(|| OntoError::UnknownPrefix(prefixes.resource_prefix().to_string()))?;

    let mut output_vars = vec![ENTITY_VAR.to_string()];
    let mut body = values_clause(
        req.entities
            .iter()
            .map(|entity| format!("<{resource_uri}{entity}>")),
    );

    if !req.properties.is_empty() {
        for prop in &req.properties {
            let var = prop.var_name();
            push_var(&mut output_vars, var.clone());
            body.push_str(&format!(
                "  OPTIONAL {{ ?{ENTITY_VAR} {prop} ?{var} .\n"
            ));
            if req.meta.style == Style::Nested {
                body.push_str(&label_block(&var, "    "));
                push_var(&mut output_vars, format!("{var}Label"));
            }
            body.push_str("  }\n");
        }
    } else {
        // Full dump of all properties of each entity. The label lookup is
        // always emitted: nested aggregation reads ?valuesLabel as the
        // label companion of the values cell.
        push_var(&mut output_vars, PROPERTIES_VAR.to_string());
        push_var(&mut output_vars, VALUES_VAR.to_string());
        push_var(&mut output_vars, format!("{VALUES_VAR}Label"));
        body.push_str(&format!(
            "  OPTIONAL {{ ?{ENTITY_VAR} ?{PROPERTIES_VAR} ?{VALUES_VAR} .\n"
        ));
        body.push_str(&label_block(VALUES_VAR, "    "));
        body.push_str("  }\n");
    }

    let mut text = prefix_block(&used);
    text.push_str(&query_head(&output_vars));
    text.push_str(&body);
    text.push_str("}\n");

    Ok(CompiledQuery {
        text,
        output_vars,
        used_prefixes: used,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RequestMeta, Resource};
    use std::collections::{BTreeMap, BTreeSet};

    fn table() -> PrefixTable {
        let mut map = BTreeMap::new();
        map.insert("dbr".to_string(), "http://dbpedia.org/resource/".to_string());
        map.insert("dbo".to_string(), "http://dbpedia.org/ontology/".to_string());
        map.insert(
            "rdf".to_string(),
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#".to_string(),
        );
        map.insert(
            "rdfs".to_string(),
            "http://www.w3.org/2000/01/rdf-schema#".to_string(),
        );
        PrefixTable::new(map)
    }

    fn request(entities: &[&str], properties: &[(&str, &str)]) -> ValueRequest {
        ValueRequest::new(
            RequestMeta::new("1.0.0"),
            entities.iter().map(|e| e.to_string()).collect(),
            properties
                .iter()
                .map(|(p, l)| Resource::new(*p, *l))
                .collect::<BTreeSet<_>>(),
        )
        .expect("valid request")
    }

    #[test]
    fn binds_entities_as_constants() {
        let q = compile(&request(&["Albert_Einstein", "Kurt_Godel"], &[]), &table())
            .expect("compiles");
        assert!(q.text.contains(
            "VALUES ?entities { <http://dbpedia.org/resource/Albert_Einstein> \
             <http://dbpedia.org/resource/Kurt_Godel> }"
        ));
    }

    #[test]
    fn one_optional_pattern_per_property() {
        let q = compile(
            &request(&["Albert_Einstein"], &[("dbo", "birthDate"), ("dbo", "spouse")]),
            &table(),
        )
        .expect("compiles");
        assert_eq!(
            q.output_vars,
            vec!["entities", "dbobirthDate", "dbospouse"]
        );
        assert!(q.text.contains("OPTIONAL { ?entities dbo:birthDate ?dbobirthDate ."));
        assert!(q.text.contains("OPTIONAL { ?entities dbo:spouse ?dbospouse ."));
    }

    #[test]
    fn empty_properties_compiles_generic_dump() {
        let q = compile(&request(&["Albert_Einstein"], &[]), &table()).expect("compiles");
        assert_eq!(q.output_vars, vec!["entities", "properties", "values", "valuesLabel"]);
        assert!(q.text.contains("OPTIONAL { ?entities ?properties ?values ."));
        assert!(q.text.contains("?values rdfs:label ?valuesLabel"));
    }

    #[test]
    fn nested_style_adds_label_lookup() {
        let mut req = request(&["Albert_Einstein"], &[("dbo", "spouse")]);
        req.meta = req.meta.with_style(Style::Nested);
        let q = compile(&req, &table()).expect("compiles");
        assert_eq!(
            q.output_vars,
            vec!["entities", "dbospouse", "dbospouseLabel"]
        );
        assert!(q.text.contains("?dbospouse rdfs:label ?dbospouseLabel"));
        assert!(q.text.contains("lang(?dbospouseLabel) = \"en\""));
    }

    #[test]
    fn unknown_property_prefix_fails() {
        let err = compile(&request(&["Albert_Einstein"], &[("nope", "thing")]), &table());
        assert_eq!(err, Err(OntoError::UnknownPrefix("nope".to_string())));
    }
}
