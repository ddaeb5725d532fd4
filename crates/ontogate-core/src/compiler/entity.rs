//! Filtered-entity compilation: entities matching a filter set.

use super::{
    CompiledQuery, ENTITY_VAR, PROPERTIES_VAR, declare_default_prefixes, declare_prefix,
    label_block, prefix_block, push_var, query_head,
};
use crate::prefix::PrefixTable;
use crate::schema::Schema;
use crate::types::{EntityRequest, Filter, FilterOp, OntoError, Style};
use std::collections::BTreeMap;

/// Compile an [`EntityRequest`].
///
/// Filters are consumed in their `Ord` order (required before optional,
/// grouped by value then property), which makes the emitted pattern and
/// clause order deterministic and lets AND filters sharing a property
/// merge into one pattern with one conjoined comparison clause.
pub(crate) fn compile(
    req: &EntityRequest,
    schema: &Schema,
    prefixes: &PrefixTable,
) -> Result<CompiledQuery, OntoError> {
    let mut used = BTreeMap::new();
    declare_default_prefixes(&mut used, prefixes)?;
    for filter in &req.filters {
        if let Some(prop) = &filter.property {
            declare_prefix(&mut used, prefixes, &prop.prefix)?;
        }
    }

    let nested = req.meta.style == Style::Nested;
    let resource_prefix = prefixes.resource_prefix();
    let ontology_prefix = prefixes.ontology_prefix();

    let mut output_vars = vec![ENTITY_VAR.to_string()];
    let mut required = String::new();
    let mut optional = String::new();
    let mut conjunction: Vec<String> = Vec::new();

    if let Some(class) = &req.class_name {
        required.push_str(&format!(
            "  ?{ENTITY_VAR} rdf:type {ontology_prefix}:{class} .\n"
        ));
    }

    // BTreeSet iteration is the filter sort order.
    for filter in &req.filters {
        match filter.combinator {
            crate::types::Combinator::And => {
                if let Some(pattern) =
                    triple_pattern(filter, &mut output_vars, resource_prefix, "  ", true)?
                {
                    required.push_str(&pattern);
                }
                if let Some(op) = filter.op {
                    conjunction.push(comparison(filter, op, schema)?);
                }
                if nested && binds_variable(filter) {
                    if let Some(prop) = &filter.property {
                        let var = prop.var_name();
                        optional.push_str(&label_block(&var, "  "));
                        push_var(&mut output_vars, format!("{var}Label"));
                    }
                }
            }
            crate::types::Combinator::Or => {
                let Some(pattern) =
                    triple_pattern(filter, &mut output_vars, resource_prefix, " ", false)?
                else {
                    continue;
                };
                optional.push_str(&format!("  OPTIONAL {{{pattern}"));
                if nested && binds_variable(filter) {
                    if let Some(prop) = &filter.property {
                        let var = prop.var_name();
                        optional.push_str(&label_block(&var, "    "));
                        push_var(&mut output_vars, format!("{var}Label"));
                    }
                }
                optional.push_str("  }\n");
                if let Some(op) = filter.op {
                    let var = property_var(filter)?;
                    let expr = comparison(filter, op, schema)?;
                    optional.push_str(&format!(
                        "  FILTER ( bound(?{var})=false || bound(?{var})=true && {expr} )\n"
                    ));
                }
            }
        }
    }

    let mut text = prefix_block(&used);
    text.push_str(&query_head(&output_vars));
    text.push_str(&required);
    if !conjunction.is_empty() {
        text.push_str(&format!("  FILTER ( {} )\n", conjunction.join(" && ")));
    }
    text.push_str(&optional);
    text.push_str("}\n");

    Ok(CompiledQuery {
        text,
        output_vars,
        used_prefixes: used,
    })
}

/// True if the filter's pattern binds a property variable (as opposed to
/// matching a resource-valued object directly). Only variable-binding
/// filters get a label lookup in nested style.
fn binds_variable(filter: &Filter) -> bool {
    filter.value.is_none() || filter.op.is_some()
}

/// The variable name a property-carrying filter binds.
fn property_var(filter: &Filter) -> Result<String, OntoError> {
    filter
        .property
        .as_ref()
        .map(|p| p.var_name())
        .ok_or_else(|| {
            OntoError::CompilationFailure(
                "operator filter without a property cannot be rendered".to_string(),
            )
        })
}

/// The triple pattern for one filter, or `None` when the filter emits no
/// new pattern (a second AND filter on an already-bound property; OR
/// blocks are never merged, so `merge_shared` is false for them).
///
/// Shapes:
/// - no property: `?entities ?properties dbr:Value .` ("has this value
///   under any property")
/// - property + resource value: `?entities dbo:prop dbr:Value .`
/// - property (+ optional comparison): `?entities dbo:prop ?dboprop .`
fn triple_pattern(
    filter: &Filter,
    output_vars: &mut Vec<String>,
    resource_prefix: &str,
    indent: &str,
    merge_shared: bool,
) -> Result<Option<String>, OntoError> {
    match (&filter.property, &filter.value) {
        (None, Some(value)) => {
            push_var(output_vars, PROPERTIES_VAR.to_string());
            Ok(Some(format!(
                "{indent}?{ENTITY_VAR} ?{PROPERTIES_VAR} {resource_prefix}:{value} .\n"
            )))
        }
        (Some(prop), Some(value)) if filter.op.is_none() => Ok(Some(format!(
            "{indent}?{ENTITY_VAR} {prop} {resource_prefix}:{value} .\n"
        ))),
        (Some(prop), _) => {
            let var = prop.var_name();
            let newly_bound = push_var(output_vars, var.clone());
            if newly_bound || !merge_shared {
                Ok(Some(format!("{indent}?{ENTITY_VAR} {prop} ?{var} .\n")))
            } else {
                // Property already bound by an earlier AND filter: the
                // comparison joins the shared conjunction instead.
                Ok(None)
            }
        }
        (None, None) => Err(OntoError::CompilationFailure(
            "filter carries neither property nor value".to_string(),
        )),
    }
}

/// One comparison expression for the shared conjunction or an OR guard.
///
/// `StartsWith` is the marker case: always a `STRSTARTS` call, never an
/// infix operator, never typed. The infix operators compare typed
/// literals when the schema declares a datatype for the property, and
/// fall back to `str()` comparison otherwise.
fn comparison(filter: &Filter, op: FilterOp, schema: &Schema) -> Result<String, OntoError> {
    let var = property_var(filter)?;
    let value = filter.value.as_deref().ok_or_else(|| {
        OntoError::CompilationFailure(format!(
            "operator filter on ?{var} carries no value to compare against"
        ))
    })?;

    let Some(symbol) = op.infix() else {
        return Ok(format!("STRSTARTS ( str( ?{var} ), \"{value}\" )"));
    };

    let local = filter.property.as_ref().map(|p| p.local.as_str());
    match local.and_then(|l| schema.range(l)) {
        Some(datatype) => Ok(format!("?{var} {symbol} \"{value}\"^^<{datatype}>")),
        None => Ok(format!("str( ?{var} ) {symbol} str(\"{value}\")")),
    }
}

// =============================================================================
// TESTS
// =============================================================================
