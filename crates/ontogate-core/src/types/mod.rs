//! # Core Type Definitions
//!
//! This module contains the request data model for the ontogate pipeline:
//! - Namespaced identifiers (`Resource`)
//! - Filter conditions (`Filter`, `FilterOp`, `Combinator`)
//! - Request envelopes (`RequestMeta`, `ValueRequest`, `EntityRequest`, `Request`)
//! - Result windowing (`Window`)
//! - Output selection (`OutputFormat`, `Style`)
//! - Error types (`OntoError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Are immutable once constructed; every update produces a new value
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Validate their invariants in the constructor, not at use sites

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// RESOURCE
// =============================================================================

/// A namespaced identifier referencing a graph node or predicate.
///
/// The prefix maps to a namespace URI via the [`PrefixTable`](crate::PrefixTable);
/// the resource itself never carries the URI. Equality and ordering are by
/// `(prefix, local)` value, which makes `Resource` usable as a key in
/// replacement maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Namespace prefix (e.g. `"dbo"`).
    pub prefix: String,
    /// Local name within the namespace (e.g. `"birthDate"`).
    pub local: String,
}

impl Resource {
    /// Create a new resource identifier.
    #[must_use]
    pub fn new(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            local: local.into(),
        }
    }

    /// The SPARQL variable name bound for this resource: `{prefix}{local}`.
    #[must_use]
    pub fn var_name(&self) -> String {
        format!("{}{}", self.prefix, self.local)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local)
    }
}

// =============================================================================
// FILTER OPERATORS
// =============================================================================

/// Comparison operator carried by a filter.
///
/// The first five variants render as infix SPARQL operators. `StartsWith`
/// is a marker, not an infix operator: it compiles to a `STRSTARTS` call
/// and never participates in typed-literal comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// String-prefix match; compiles to `STRSTARTS`, never infix.
    StartsWith,
}

impl FilterOp {
    /// Parse a URI operator token (`eq`, `gt`, `lt`, `ge`, `le`, `sw`).
    ///
    /// Returns `MalformedFilter` for any other token so that an unknown
    /// operator dies at the request boundary, never inside the compiler.
    pub fn parse(token: &str) -> Result<Self, OntoError> {
        match token {
            "eq" => Ok(Self::Eq),
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "ge" => Ok(Self::Ge),
            "le" => Ok(Self::Le),
            "sw" => Ok(Self::StartsWith),
            other => Err(OntoError::MalformedFilter(format!(
                "filter operator must be one of gt,lt,eq,ge,le or sw, got '{other}'"
            ))),
        }
    }

    /// The infix SPARQL symbol, or `None` for the `STRSTARTS` marker.
    #[must_use]
    pub fn infix(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("="),
            Self::Gt => Some(">"),
            Self::Lt => Some("<"),
            Self::Ge => Some(">="),
            Self::Le => Some("<="),
            Self::StartsWith => None,
        }
    }
}

/// Whether a filter's pattern is required or optional.
///
/// `And` filters exclude non-matching entities; `Or` filters are compiled
/// into `OPTIONAL` blocks guarded by a bound-check, so entities lacking
/// the property are still included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Combinator {
    /// Required pattern.
    And,
    /// Optional pattern.
    Or,
}

// =============================================================================
// FILTER
// =============================================================================

/// A single matching condition over a property/value/operator triple.
///
/// Invariant: at least one of `property` and `value` is present
/// (enforced by [`Filter::new`]). `op == None` together with
/// `value != None` means the value is itself a graph node identifier;
/// `value == None` means a pure existence/binding filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    /// The property to match, or `None` for "any property".
    pub property: Option<Resource>,
    /// The value to match or compare against.
    pub value: Option<String>,
    /// Comparison operator; `None` means the value is a resource object.
    pub op: Option<FilterOp>,
    /// Required (`And`) or optional (`Or`) pattern.
    pub combinator: Combinator,
}

impl Filter {
    /// Create a validated filter.
    ///
    /// Fails with `MalformedFilter` if both `property` and `value` are
    /// absent.
    pub fn new(
        property: Option<Resource>,
        value: Option<String>,
        op: Option<FilterOp>,
        combinator: Combinator,
    ) -> Result<Self, OntoError> {
        if property.is_none() && value.is_none() {
            return Err(OntoError::MalformedFilter(
                "filter must carry a property or a value".to_string(),
            ));
        }
        Ok(Self {
            property,
            value,
            op,
            combinator,
        })
    }

    /// True if the value is a graph node identifier rather than a literal.
    #[must_use]
    pub fn value_is_resource(&self) -> bool {
        self.op.is_none()
    }

    /// The filter value as a resource under the reserved resource prefix.
    ///
    /// Only meaningful when [`value_is_resource`](Self::value_is_resource)
    /// holds and a value is present.
    #[must_use]
    pub fn value_as_resource(&self, resource_prefix: &str) -> Option<Resource> {
        self.value
            .as_ref()
            .map(|v| Resource::new(resource_prefix, v.clone()))
    }

    /// Structural update: same filter with a replaced property.
    #[must_use]
    pub fn with_property(&self, property: Resource) -> Self {
        Self {
            property: Some(property),
            ..self.clone()
        }
    }

    /// Structural update: same filter with a replaced resource value.
    /// The prefix of the resource is dropped; filter values are always
    /// interpreted under the reserved resource namespace.
    #[must_use]
    pub fn with_resource_value(&self, value: &Resource) -> Self {
        Self {
            value: Some(value.local.clone()),
            ..self.clone()
        }
    }
}

/// Total order, consistent with `Eq`, driving compiled-query shape:
/// `And` filters sort before `Or` filters; within equal combinator,
/// filters compare by value, then property local name. Prefix and
/// operator are tie-breakers so the order stays total.
impl Ord for Filter {
    fn cmp(&self, other: &Self) -> Ordering {
        let key = |f: &Self| {
            (
                f.combinator,
                f.value.clone(),
                f.property.as_ref().map(|p| p.local.clone()),
                f.property.as_ref().map(|p| p.prefix.clone()),
                f.op,
            )
        };
        key(self).cmp(&key(other))
    }
}

impl PartialOrd for Filter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Filter {{ property={:?} value={:?} combinator={:?} }}",
            self.property, self.value, self.combinator
        )
    }
}

// =============================================================================
// WINDOW
// =============================================================================

/// Result windowing: `OFFSET`/`LIMIT` applied to the compiled query.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Window {
    /// Number of solutions to skip.
    pub offset: u64,
    /// Maximum number of solutions; 0 means "no limit clause".
    pub limit: u64,
}

impl Window {
    /// Create a window from possibly-negative inputs.
    ///
    /// If either value is negative, BOTH fields snap to 0. This is a
    /// safety fallback, not a clamp: a request that got one bound wrong
    /// is served unwindowed rather than half-windowed.
    #[must_use]
    pub fn new(offset: i64, limit: i64) -> Self {
        if offset >= 0 && limit >= 0 {
            Self {
                offset: offset.unsigned_abs(),
                limit: limit.unsigned_abs(),
            }
        } else {
            Self {
                offset: 0,
                limit: 0,
            }
        }
    }

    /// Structural update: same offset with the limit capped at `max`.
    #[must_use]
    pub fn capped(self, max: u64) -> Self {
        Self {
            offset: self.offset,
            limit: self.limit.min(max),
        }
    }
}

// =============================================================================
// OUTPUT FORMAT & STYLE
// =============================================================================

/// Serialized output shapes a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// SPARQL results JSON (the default).
    Json,
    /// JSON-LD over the result-set vocabulary graph.
    JsonLd,
    /// Tab-separated values.
    Tsv,
    /// RDF/JSON over the result-set vocabulary graph.
    RdfJson,
    /// Turtle over the result-set vocabulary graph.
    Turtle,
    /// N-Triples over the result-set vocabulary graph.
    NTriples,
    /// RDF/XML over the result-set vocabulary graph.
    RdfXml,
}

impl OutputFormat {
    /// Parse a format token, case-insensitive. `rdf` is accepted as an
    /// alias for RDF/JSON.
    pub fn parse(token: &str) -> Result<Self, OntoError> {
        match token.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonld" => Ok(Self::JsonLd),
            "tsv" => Ok(Self::Tsv),
            "rdf" | "rdfjson" => Ok(Self::RdfJson),
            "turtle" => Ok(Self::Turtle),
            "ntriples" => Ok(Self::NTriples),
            "rdfxml" => Ok(Self::RdfXml),
            other => Err(OntoError::MalformedFilter(format!(
                "unknown output format '{other}'"
            ))),
        }
    }

    /// The HTTP content type served for this format.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/sparql-results+json",
            Self::JsonLd => "application/ld+json",
            Self::Tsv => "text/tab-separated-values",
            Self::RdfJson => "application/rdf+json",
            Self::Turtle => "text/turtle",
            Self::NTriples => "application/n-triples",
            Self::RdfXml => "application/rdf+xml",
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Json
    }
}

/// Output styling applied on top of the format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Style {
    /// Absolute URIs, unabbreviated literals.
    #[default]
    None,
    /// Known namespace URIs replaced by `prefix:`.
    Prefixed,
    /// Like `Prefixed`, but the reserved resource/ontology namespaces
    /// are stripped entirely, yielding bare local names.
    Short,
    /// One JSON object per entity with multi-valued, deduplicated
    /// fields. JSON only.
    Nested,
}

impl Style {
    /// Parse a style token, case-insensitive.
    pub fn parse(token: &str) -> Result<Self, OntoError> {
        match token.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "prefixed" => Ok(Self::Prefixed),
            "short" => Ok(Self::Short),
            "nested" => Ok(Self::Nested),
            other => Err(OntoError::MalformedFilter(format!(
                "unknown style '{other}'"
            ))),
        }
    }
}

// =============================================================================
// REQUEST ENVELOPE
// =============================================================================

/// Fields shared by every request variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// API version the request targets, `"major.minor.patch"`.
    pub version: String,
    /// Requested output format.
    pub format: OutputFormat,
    /// Requested output style (normalized against the format).
    pub style: Style,
    /// API key, if the deployment uses keys.
    pub key: Option<String>,
    /// Result windowing.
    pub window: Window,
    /// Allow migration across a major-version boundary.
    pub allow_incompatible_version: bool,
}

impl RequestMeta {
    /// Create request metadata with defaults (JSON format, no style).
    ///
    /// The style/format combination is normalized here: `Nested` is only
    /// meaningful for JSON, and abbreviation styles only apply to the
    /// JSON and TSV surfaces. Invalid combinations downgrade to
    /// `Style::None` rather than being rejected.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            format: OutputFormat::default(),
            style: Style::default(),
            key: None,
            window: Window::default(),
            allow_incompatible_version: false,
        }
    }

    /// Structural update: set format and re-normalize the style.
    #[must_use]
    pub fn with_format(self, format: OutputFormat) -> Self {
        Self { format, ..self }.normalized()
    }

    /// Structural update: set style and re-normalize it against the format.
    #[must_use]
    pub fn with_style(self, style: Style) -> Self {
        Self { style, ..self }.normalized()
    }

    /// Structural update: restamp the version.
    #[must_use]
    pub fn with_version(self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self
        }
    }

    /// Structural update: set the window.
    #[must_use]
    pub fn with_window(self, window: Window) -> Self {
        Self { window, ..self }
    }

    /// Structural update: set the API key.
    #[must_use]
    pub fn with_key(self, key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..self
        }
    }

    /// Structural update: allow incompatible-version migration.
    #[must_use]
    pub fn with_allow_incompatible(self, allow: bool) -> Self {
        Self {
            allow_incompatible_version: allow,
            ..self
        }
    }

    fn normalized(self) -> Self {
        let style = match (self.style, self.format) {
            (Style::Nested, OutputFormat::Json) => Style::Nested,
            (Style::Nested, _) => Style::None,
            (s, OutputFormat::Json | OutputFormat::Tsv) => s,
            (_, _) => Style::None,
        };
        Self { style, ..self }
    }
}

/// Lookup of property values for a fixed set of entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRequest {
    /// Shared request fields.
    pub meta: RequestMeta,
    /// Entity local names under the reserved resource namespace.
    pub entities: BTreeSet<String>,
    /// Properties to look up; empty means "dump all properties".
    pub properties: BTreeSet<Resource>,
}

impl ValueRequest {
    /// Create a validated value request. Fails if `entities` is empty.
    pub fn new(
        meta: RequestMeta,
        entities: BTreeSet<String>,
        properties: BTreeSet<Resource>,
    ) -> Result<Self, OntoError> {
        if entities.is_empty() {
            return Err(OntoError::MalformedFilter(
                "value request requires at least one entity".to_string(),
            ));
        }
        Ok(Self {
            meta: meta.normalized(),
            entities,
            properties,
        })
    }
}

/// Search for entities matching a filter set and/or a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRequest {
    /// Shared request fields.
    pub meta: RequestMeta,
    /// Filter conditions; the set ordering is the compilation ordering.
    pub filters: BTreeSet<Filter>,
    /// Class local name under the reserved ontology namespace.
    pub class_name: Option<String>,
    /// Expand the class's important properties into optional filters.
    pub only_important: bool,
}

impl EntityRequest {
    /// Create a validated entity request. Fails if there is neither a
    /// filter nor a class name.
    pub fn new(
        meta: RequestMeta,
        filters: BTreeSet<Filter>,
        class_name: Option<String>,
        only_important: bool,
    ) -> Result<Self, OntoError> {
        if filters.is_empty() && class_name.is_none() {
            return Err(OntoError::MalformedFilter(
                "entity request requires a filter or a class name".to_string(),
            ));
        }
        Ok(Self {
            meta: meta.normalized(),
            filters,
            class_name,
            only_important,
        })
    }
}

/// A parsed request; the variant tag selects the compiler strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Value lookup over fixed entities.
    Value(ValueRequest),
    /// Filtered entity search.
    Entity(EntityRequest),
}

impl Request {
    /// The shared request fields of either variant.
    #[must_use]
    pub fn meta(&self) -> &RequestMeta {
        match self {
            Self::Value(v) => &v.meta,
            Self::Entity(e) => &e.meta,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the ontogate core.
///
/// The first four variants are client-input errors and are surfaced
/// distinctly; `CompilationFailure` and `TransportFailure` are downstream
/// errors, logged with full request context and surfaced generically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OntoError {
    /// The filter shape is invalid: wrong field arity or unknown token.
    #[error("invalid filter: {0}")]
    MalformedFilter(String),

    /// An identifier references a prefix absent from the namespace table.
    #[error("prefix '{0}' not found")]
    UnknownPrefix(String),

    /// The version string is unparsable or absent from the catalog.
    #[error("version '{0}' not found")]
    VersionNotFound(String),

    /// Major-version mismatch without the explicit override.
    #[error(
        "version {requested} is not compatible with the current version {latest} of the api"
    )]
    IncompatibleVersion {
        /// Version the request was built against.
        requested: String,
        /// Current catalog version.
        latest: String,
    },

    /// The compiler cannot render a received construct.
    #[error("compilation failed: {0}")]
    CompilationFailure(String),

    /// External query execution failed.
    #[error("query execution failed: {0}")]
    TransportFailure(String),
}

impl OntoError {
    /// True for errors caused by client input (vs. downstream failures).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::CompilationFailure(_) | Self::TransportFailure(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(
        property: Option<Resource>,
        value: Option<&str>,
        op: Option<FilterOp>,
        combinator: Combinator,
    ) -> Filter {
        Filter::new(property, value.map(str::to_string), op, combinator).expect("valid filter")
    }

    #[test]
    fn filter_requires_property_or_value() {
        let err = Filter::new(None, None, None, Combinator::And);
        assert!(matches!(err, Err(OntoError::MalformedFilter(_))));
    }

    #[test]
    fn filter_sort_and_before_or() {
        let and = filter(
            Some(Resource::new("dbo", "birthDate")),
            Some("1980-01-01"),
            Some(FilterOp::Lt),
            Combinator::And,
        );
        let or = filter(
            Some(Resource::new("dbo", "almaMater")),
            Some("0000-01-01"),
            Some(FilterOp::Gt),
            Combinator::Or,
        );
        assert!(and < or);
    }

    #[test]
    fn filter_sort_by_value_then_local_name() {
        let a = filter(
            Some(Resource::new("dbo", "starring")),
            Some("Bud_Spencer"),
            None,
            Combinator::And,
        );
        let b = filter(
            Some(Resource::new("dbo", "starring")),
            Some("Terence_Hill"),
            None,
            Combinator::And,
        );
        let c = filter(
            Some(Resource::new("dbo", "author")),
            Some("Terence_Hill"),
            None,
            Combinator::And,
        );
        assert!(a < b);
        assert!(c < b); // equal value, "author" < "starring"
    }

    #[test]
    fn window_negative_input_snaps_both_to_zero() {
        assert_eq!(Window::new(-1, 50), Window::new(0, 0));
        assert_eq!(Window::new(10, -3), Window::new(0, 0));
        let w = Window::new(10, 50);
        assert_eq!((w.offset, w.limit), (10, 50));
    }

    #[test]
    fn nested_style_downgrades_for_non_json() {
        let meta = RequestMeta::new("1.0.0")
            .with_style(Style::Nested)
            .with_format(OutputFormat::Turtle);
        assert_eq!(meta.style, Style::None);

        let meta = RequestMeta::new("1.0.0")
            .with_format(OutputFormat::Json)
            .with_style(Style::Nested);
        assert_eq!(meta.style, Style::Nested);
    }

    #[test]
    fn abbreviation_styles_survive_tsv() {
        let meta = RequestMeta::new("1.0.0")
            .with_format(OutputFormat::Tsv)
            .with_style(Style::Prefixed);
        assert_eq!(meta.style, Style::Prefixed);
    }

    #[test]
    fn operator_token_round_trip() {
        assert_eq!(FilterOp::parse("eq"), Ok(FilterOp::Eq));
        assert_eq!(FilterOp::parse("sw"), Ok(FilterOp::StartsWith));
        assert!(FilterOp::parse("between").is_err());
        assert_eq!(FilterOp::Ge.infix(), Some(">="));
        assert_eq!(FilterOp::StartsWith.infix(), None);
    }

    #[test]
    fn value_request_requires_entities() {
        let err = ValueRequest::new(RequestMeta::new("1.0.0"), BTreeSet::new(), BTreeSet::new());
        assert!(err.is_err());
    }

    #[test]
    fn entity_request_accepts_class_only() {
        let req = EntityRequest::new(
            RequestMeta::new("1.0.0"),
            BTreeSet::new(),
            Some("Person".to_string()),
            false,
        );
        assert!(req.is_ok());
    }

    #[test]
    fn resource_display_and_var_name() {
        let r = Resource::new("dbo", "birthDate");
        assert_eq!(r.to_string(), "dbo:birthDate");
        assert_eq!(r.var_name(), "dbobirthDate");
    }
}
