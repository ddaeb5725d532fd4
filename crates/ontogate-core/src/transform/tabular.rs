//! TSV rendering of a result table.

use super::{Cell, CellKind, ResultTable, abbreviate};
use crate::prefix::PrefixTable;
use crate::types::Style;

/// Render the table as TSV: a `?var` header row, then one line per
/// solution. URIs are bracketed absolute references unless an
/// abbreviation style is active; literals carry their datatype or
/// language suffix.
pub(crate) fn to_tsv(table: &ResultTable, style: Style, prefixes: &PrefixTable) -> String {
    let mut out = String::new();

    for (i, var) in table.vars.iter().enumerate() {
        out.push('?');
        out.push_str(var);
        out.push(if i == table.vars.len() - 1 { '\n' } else { '\t' });
    }

    for row in &table.rows {
        for (i, var) in table.vars.iter().enumerate() {
            if let Some(cell) = row.get(var) {
                out.push_str(&render_cell(cell, style, prefixes));
            }
            out.push(if i == table.vars.len() - 1 { '\n' } else { '\t' });
        }
    }

    out
}

fn render_cell(cell: &Cell, style: Style, prefixes: &PrefixTable) -> String {
    let abbreviating = matches!(style, Style::Prefixed | Style::Short);
    match cell.kind {
        CellKind::Uri => {
            if abbreviating {
                abbreviate(&cell.value, style, prefixes)
            } else {
                format!("<{}>", cell.value)
            }
        }
        CellKind::Literal => match (&cell.datatype, &cell.lang) {
            (Some(datatype), _) => {
                if abbreviating {
                    format!(
                        "\"{}\"^^{}",
                        cell.value,
                        abbreviate(datatype, style, prefixes)
                    )
                } else {
                    format!("\"{}\"^^<{}>", cell.value, datatype)
                }
            }
            (None, Some(lang)) => format!("\"{}\"@\"{}\"", cell.value, lang),
            (None, None) => format!("\"{}\"", cell.value),
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Row;
    use std::collections::BTreeMap;

    fn prefix_table() -> PrefixTable {
        let mut map = BTreeMap::new();
        map.insert("dbr".to_string(), "http://dbpedia.org/resource/".to_string());
        map.insert(
            "xsd".to_string(),
            "http://www.w3.org/2001/XMLSchema#".to_string(),
        );
        PrefixTable::new(map)
    }

    fn sample() -> ResultTable {
        let mut row = Row::new();
        row.insert(
            "entities".to_string(),
            Cell::uri("http://dbpedia.org/resource/Moon"),
        );
        row.insert(
            "dbobirthDate".to_string(),
            Cell::typed_literal("1879-03-14", "http://www.w3.org/2001/XMLSchema#date"),
        );
        let mut sparse = Row::new();
        sparse.insert(
            "entities".to_string(),
            Cell::uri("http://dbpedia.org/resource/Sun"),
        );
        ResultTable {
            vars: vec!["entities".to_string(), "dbobirthDate".to_string()],
            rows: vec![row, sparse],
        }
    }

    #[test]
    fn plain_tsv_brackets_uris_and_types_literals() {
        let tsv = to_tsv(&sample(), Style::None, &prefix_table());
        let mut lines = tsv.lines();
        assert_eq!(lines.next(), Some("?entities\t?dbobirthDate"));
        assert_eq!(
            lines.next(),
            Some(
                "<http://dbpedia.org/resource/Moon>\t\
                 \"1879-03-14\"^^<http://www.w3.org/2001/XMLSchema#date>"
            )
        );
        // unbound cell renders as an empty column
        assert_eq!(lines.next(), Some("<http://dbpedia.org/resource/Sun>\t"));
    }

    #[test]
    fn abbreviated_tsv_unbrackets_and_prefixes() {
        let tsv = to_tsv(&sample(), Style::Prefixed, &prefix_table());
        assert!(tsv.contains("dbr:Moon\t\"1879-03-14\"^^xsd:date"));
        let tsv_short = to_tsv(&sample(), Style::Short, &prefix_table());
        assert!(tsv_short.contains("Moon\t\"1879-03-14\"^^xsd:date"));
    }

    #[test]
    fn language_tagged_literal_suffix() {
        let mut row = Row::new();
        row.insert("label".to_string(), Cell::lang_literal("Mond", "de"));
        let table = ResultTable {
            vars: vec!["label".to_string()],
            rows: vec![row],
        };
        let tsv = to_tsv(&table, Style::None, &prefix_table());
        assert!(tsv.contains("\"Mond\"@\"de\""));
    }
}
