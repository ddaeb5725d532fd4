//! Nested JSON aggregation: one object per entity, multi-valued fields,
//! deduplicated by structural equality.

use super::{ResultTable, Row, abbreviate, to_pretty};
use crate::compiler::{ENTITY_VAR, PROPERTIES_VAR, VALUES_VAR};
use crate::prefix::PrefixTable;
use crate::types::{OntoError, Style};
use serde_json::{Map, Value, json};

/// Group rows by entity (first-seen order) and aggregate every
/// non-entity, non-label variable into a list field on the entity's
/// object. A bound `<var>Label` companion turns the appended value into
/// an `{@id, label}` object. When the projection is the generic
/// property/value dump, the abbreviated `properties` cell names the
/// field dynamically and the `values` cell provides the appended value
/// (with `valuesLabel` as its companion).
pub(crate) fn render(table: &ResultTable, prefixes: &PrefixTable) -> Result<String, OntoError> {
    let real_vars: Vec<&String> = table
        .vars
        .iter()
        .filter(|v| !v.contains("Label") && v.as_str() != ENTITY_VAR)
        .collect();
    let generic_dump = real_vars.iter().any(|v| v.as_str() == PROPERTIES_VAR)
        && real_vars.iter().any(|v| v.as_str() == VALUES_VAR);

    // (entity id, object) pairs in first-seen order.
    let mut entities: Vec<(String, Map<String, Value>)> = Vec::new();

    for row in &table.rows {
        let Some(entity_cell) = row.get(ENTITY_VAR) else {
            continue;
        };
        let entity_id = strip_resource_namespace(&entity_cell.value, prefixes);

        let index = match entities.iter().position(|(id, _)| *id == entity_id) {
            Some(i) => i,
            None => {
                let mut obj = Map::new();
                obj.insert("@id".to_string(), json!(entity_id));
                entities.push((entity_id.clone(), obj));
                entities.len() - 1
            }
        };
        let object = &mut entities[index].1;

        if generic_dump {
            let (Some(property_cell), Some(value_cell)) =
                (row.get(PROPERTIES_VAR), row.get(VALUES_VAR))
            else {
                continue;
            };
            let field = abbreviate(&property_cell.value, Style::Short, prefixes);
            let item = item_for(row, &value_cell.value, &format!("{VALUES_VAR}Label"), prefixes);
            append_unique(object, &field, item);
        } else {
            for var in &real_vars {
                let Some(cell) = row.get(*var) else {
                    continue;
                };
                let item = item_for(row, &cell.value, &format!("{var}Label"), prefixes);
                append_unique(object, var, item);
            }
        }
    }

    let output: Vec<Value> = entities
        .into_iter()
        .map(|(_, obj)| Value::Object(obj))
        .collect();
    to_pretty(&Value::Array(output))
}

/// The value appended for one cell: a `{@id, label}` object when the
/// row binds the companion label variable, the abbreviated scalar
/// otherwise.
fn item_for(row: &Row, value: &str, label_var: &str, prefixes: &PrefixTable) -> Value {
    let abbreviated = abbreviate(value, Style::Short, prefixes);
    match row.get(label_var) {
        Some(label) => json!({ "@id": abbreviated, "label": label.value }),
        None => json!(abbreviated),
    }
}

/// Append `item` to the array field unless a structurally equal value is
/// already present.
fn append_unique(object: &mut Map<String, Value>, field: &str, item: Value) {
    match object.get_mut(field) {
        Some(Value::Array(existing)) => {
            if !existing.contains(&item) {
                existing.push(item);
            }
        }
        _ => {
            object.insert(field.to_string(), Value::Array(vec![item]));
        }
    }
}

/// Entity identifiers render with the resource namespace stripped.
fn strip_resource_namespace(value: &str, prefixes: &PrefixTable) -> String {
    match prefixes.resource_uri() {
        Some(uri) if value.contains(uri) => value.replace(uri, ""),
        _ => value.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
