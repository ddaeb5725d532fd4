//! # API Parameter Types & Request Decoding
//!
//! Query-parameter structs for the two request endpoints and the pure
//! decoding functions that turn them into validated core requests.
//!
//! ## Parameter syntax
//!
//! - `entities`: comma-separated entity local names
//! - `property`: comma-separated `prefix:name` tokens
//! - `filter` / `ofilter`: semicolon-separated filter expressions,
//!   each `prefix:name` or `prefix:name,op,value` with
//!   `op` one of `eq,gt,lt,ge,le,sw`
//! - `value`: a resource object the entity must carry under any
//!   property (`Berlin`), optionally pinned to one (`Berlin,dbo:capital`)
//! - common: `version`, `format`, `style`, `key`, `limit`, `offset`,
//!   `oldVersion`

use ontogate_core::{
    Combinator, EntityRequest, Filter, FilterOp, OntoError, OutputFormat, Request, RequestMeta,
    Resource, Style, ValueRequest, Window,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Separator between the prefix and local name of a property token.
const PROPERTY_SEPARATOR: char = ':';

// =============================================================================
// PARAMETER STRUCTS
// =============================================================================

/// Parameters shared by every request endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonParams {
    /// API version the request targets; defaults to the latest.
    pub version: Option<String>,
    /// Output format token.
    pub format: Option<String>,
    /// Output style token.
    pub style: Option<String>,
    /// API key.
    pub key: Option<String>,
    /// Result limit (decimal string; flattened query params decode as
    /// strings).
    pub limit: Option<String>,
    /// Result offset (decimal string).
    pub offset: Option<String>,
    /// Allow migration across a major-version boundary
    /// (`true`/`false`).
    #[serde(rename = "oldVersion")]
    pub old_version: Option<String>,
}

/// `GET /values` parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueParams {
    /// Comma-separated entity local names (required).
    pub entities: String,
    /// Comma-separated `prefix:name` property tokens.
    pub property: Option<String>,
    /// Shared parameters.
    #[serde(flatten)]
    pub common: CommonParams,
}

/// `GET /entities` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityParams {
    /// Semicolon-separated required filter expressions.
    pub filter: Option<String>,
    /// Semicolon-separated optional filter expressions.
    pub ofilter: Option<String>,
    /// Resource-object filter, `value[,prefix:name]`.
    pub value: Option<String>,
    /// Class local name under the ontology namespace.
    pub class: Option<String>,
    /// Expand the class's important properties into optional filters
    /// (`true`/`false`).
    pub important: Option<String>,
    /// Shared parameters.
    #[serde(flatten)]
    pub common: CommonParams,
}

// =============================================================================
// DECODING
// =============================================================================

/// Build the request metadata from the common parameters.
pub fn build_meta(common: &CommonParams, latest_version: &str) -> Result<RequestMeta, OntoError> {
    let mut meta = RequestMeta::new(
        common
            .version
            .clone()
            .unwrap_or_else(|| latest_version.to_string()),
    );
    if let Some(format) = &common.format {
        meta = meta.with_format(OutputFormat::parse(format)?);
    }
    if let Some(style) = &common.style {
        meta = meta.with_style(Style::parse(style)?);
    }
    if let Some(key) = &common.key {
        meta = meta.with_key(key.clone());
    }
    meta = meta.with_window(Window::new(
        parse_number(common.offset.as_deref(), "offset")?,
        parse_number(common.limit.as_deref(), "limit")?,
    ));
    meta = meta.with_allow_incompatible(parse_flag(common.old_version.as_deref(), "oldVersion")?);
    Ok(meta)
}

fn parse_number(raw: Option<&str>, name: &str) -> Result<i64, OntoError> {
    match raw {
        None => Ok(0),
        Some(s) => s.parse().map_err(|_| {
            OntoError::MalformedFilter(format!("{name} must be an integer, got '{s}'"))
        }),
    }
}

fn parse_flag(raw: Option<&str>, name: &str) -> Result<bool, OntoError> {
    match raw {
        None => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(OntoError::MalformedFilter(format!(
            "{name} must be true or false, got '{other}'"
        ))),
    }
}

/// Decode `/values` parameters into a value request.
pub fn build_value_request(
    params: &ValueParams,
    latest_version: &str,
) -> Result<Request, OntoError> {
    let meta = build_meta(&params.common, latest_version)?;
    let entities: BTreeSet<String> = split_list(&params.entities, ',').collect();
    let mut properties = BTreeSet::new();
    if let Some(tokens) = &params.property {
        for token in split_list(tokens, ',') {
            properties.insert(parse_property(&token)?);
        }
    }
    Ok(Request::Value(ValueRequest::new(meta, entities, properties)?))
}

/// Decode `/entities` parameters into an entity request, expanding the
/// class's important properties into optional filters when asked.
pub fn build_entity_request(
    params: &EntityParams,
    latest_version: &str,
    important: &BTreeMap<String, Vec<String>>,
) -> Result<Request, OntoError> {
    let meta = build_meta(&params.common, latest_version)?;
    let mut filters = BTreeSet::new();

    if let Some(expressions) = &params.filter {
        for expr in split_list(expressions, ';') {
            filters.insert(parse_filter_expr(&expr, Combinator::And)?);
        }
    }
    if let Some(expressions) = &params.ofilter {
        for expr in split_list(expressions, ';') {
            filters.insert(parse_filter_expr(&expr, Combinator::Or)?);
        }
    }
    if let Some(expr) = &params.value {
        filters.insert(parse_value_expr(expr)?);
    }

    let only_important = parse_flag(params.important.as_deref(), "important")?;
    if only_important {
        if let Some(class) = &params.class {
            for token in important.get(class).into_iter().flatten() {
                filters.insert(Filter::new(
                    Some(parse_property(token)?),
                    None,
                    None,
                    Combinator::Or,
                )?);
            }
        }
    }

    Ok(Request::Entity(EntityRequest::new(
        meta,
        filters,
        params.class.clone(),
        only_important,
    )?))
}

/// Parse a `prefix:name` token.
pub fn parse_property(token: &str) -> Result<Resource, OntoError> {
    let mut parts = token.splitn(2, PROPERTY_SEPARATOR);
    match (parts.next(), parts.next()) {
        (Some(prefix), Some(local)) if !prefix.is_empty() && !local.is_empty() => {
            Ok(Resource::new(prefix, local))
        }
        _ => Err(OntoError::MalformedFilter(format!(
            "property must be prefix:name, got '{token}'"
        ))),
    }
}

/// Parse one filter expression: `prefix:name` (pure binding) or
/// `prefix:name,op,value`. Two or more than three segments are invalid.
pub fn parse_filter_expr(expr: &str, combinator: Combinator) -> Result<Filter, OntoError> {
    let segments: Vec<&str> = expr.split(',').collect();
    match segments.as_slice() {
        [property] => Filter::new(Some(parse_property(property)?), None, None, combinator),
        [property, op, value] => Filter::new(
            Some(parse_property(property)?),
            Some((*value).to_string()),
            Some(FilterOp::parse(op)?),
            combinator,
        ),
        _ => Err(OntoError::MalformedFilter(format!(
            "filter must be a property or property,operator,value - got '{expr}'"
        ))),
    }
}

/// Parse a resource-object filter: `value` matches under any property,
/// `value,prefix:name` pins the property.
pub fn parse_value_expr(expr: &str) -> Result<Filter, OntoError> {
    let segments: Vec<&str> = expr.split(',').collect();
    match segments.as_slice() {
        [value] => Filter::new(None, Some((*value).to_string()), None, Combinator::And),
        [value, property] => Filter::new(
            Some(parse_property(property)?),
            Some((*value).to_string()),
            None,
            Combinator::And,
        ),
        _ => Err(OntoError::MalformedFilter(format!(
            "value must be value or value,property - got '{expr}'"
        ))),
    }
}

fn split_list(raw: &str, separator: char) -> impl Iterator<Item = String> + '_ {
    raw.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// =============================================================================
// TESTS
// =============================================================================
