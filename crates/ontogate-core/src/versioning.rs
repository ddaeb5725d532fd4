//! # Version Model & Migration Engine
//!
//! Each API version carries the identifier rewrites that happened since
//! the previous version: a resource replacement map (e.g.
//! `dbo:numOfEmployees -> dbo:numberOfEmployees`) and a prefix
//! replacement map for namespaces that changed their name wholesale.
//!
//! Migration rewrites every resource-bearing field of an old request,
//! stepping through each catalog version strictly after the request's
//! version up to the latest, and restamps the request. Within one
//! version step all replacements are computed against a snapshot of the
//! pre-step collection and applied as one batch, so a rule set
//! containing both `A -> B` and `B -> A` swaps cleanly instead of
//! collapsing through iteration-order artifacts.

use crate::prefix::PrefixTable;
use crate::types::{EntityRequest, Filter, OntoError, Request, Resource, ValueRequest};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// API VERSION
// =============================================================================

/// One version of the API schema with the rewrites leading into it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    /// Semantic version major component.
    pub major: u32,
    /// Semantic version minor component.
    pub minor: u32,
    /// Semantic version patch component.
    pub patch: u32,
    /// Resource rewrites from the previous version into this one.
    pub resource_replacements: BTreeMap<Resource, Resource>,
    /// Namespace-prefix rewrites applying to all resources.
    pub prefix_replacements: BTreeMap<String, String>,
}

impl ApiVersion {
    /// Create a version with its replacement maps.
    #[must_use]
    pub fn new(
        major: u32,
        minor: u32,
        patch: u32,
        resource_replacements: BTreeMap<Resource, Resource>,
        prefix_replacements: BTreeMap<String, String>,
    ) -> Self {
        Self {
            major,
            minor,
            patch,
            resource_replacements,
            prefix_replacements,
        }
    }

    /// `"major.minor.patch"`.
    #[must_use]
    pub fn version_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "version {}", self.version_string())
    }
}

/// Parse `"major.minor.patch"`; `None` for anything else.
#[must_use]
pub fn parse_version_string(s: &str) -> Option<(u32, u32, u32)> {
    let mut parts = s.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

// =============================================================================
// VERSION DESCRIPTOR (wire format)
// =============================================================================

/// The JSON descriptor a version file deserializes into.
///
/// The application's version loader reads one of these per
/// `*.version.json` file; [`into_version`](Self::into_version) lifts it
/// into the model type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDescriptor {
    /// Semantic version major component.
    pub major: u32,
    /// Semantic version minor component.
    pub minor: u32,
    /// Semantic version patch component.
    pub patch: u32,
    /// Resource rewrites, `[{prefixBefore, identifierBefore, prefixNow, identifierNow}]`.
    #[serde(default, rename = "resourceReplacements")]
    pub resource_replacements: Vec<ResourceReplacement>,
    /// Prefix rewrites, `{old: new}`.
    #[serde(default, rename = "prefixReplacements")]
    pub prefix_replacements: BTreeMap<String, String>,
}

/// One resource rewrite entry in a version descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceReplacement {
    /// Prefix of the replaced resource.
    #[serde(rename = "prefixBefore")]
    pub prefix_before: String,
    /// Local name of the replaced resource.
    #[serde(rename = "identifierBefore")]
    pub identifier_before: String,
    /// Prefix of the replacement.
    #[serde(rename = "prefixNow")]
    pub prefix_now: String,
    /// Local name of the replacement.
    #[serde(rename = "identifierNow")]
    pub identifier_now: String,
}

impl VersionDescriptor {
    /// Lift the descriptor into an [`ApiVersion`].
    #[must_use]
    pub fn into_version(self) -> ApiVersion {
        let resource_replacements = self
            .resource_replacements
            .into_iter()
            .map(|r| {
                (
                    Resource::new(r.prefix_before, r.identifier_before),
                    Resource::new(r.prefix_now, r.identifier_now),
                )
            })
            .collect();
        ApiVersion::new(
            self.major,
            self.minor,
            self.patch,
            resource_replacements,
            self.prefix_replacements,
        )
    }
}

// =============================================================================
// VERSION CATALOG
// =============================================================================

/// An ascending-sorted collection of versions with a string lookup index.
///
/// Built once at startup; a reload constructs a complete new catalog and
/// swaps the reference, never mutating a version in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    versions: Vec<ApiVersion>,
    index: BTreeMap<String, usize>,
}

impl VersionCatalog {
    /// Build a catalog; versions are sorted ascending internally.
    #[must_use]
    pub fn from_versions(mut versions: Vec<ApiVersion>) -> Self {
        versions.sort();
        let index = versions
            .iter()
            .enumerate()
            .map(|(i, v)| (v.version_string(), i))
            .collect();
        Self { versions, index }
    }

    /// The most recent version, or `None` for an empty catalog.
    #[must_use]
    pub fn latest(&self) -> Option<&ApiVersion> {
        self.versions.last()
    }

    /// Exact lookup by version string.
    ///
    /// Fails with `VersionNotFound` when the string does not parse as
    /// `major.minor.patch` or no such version exists.
    pub fn get(&self, version: &str) -> Result<&ApiVersion, OntoError> {
        let not_found = || OntoError::VersionNotFound(version.to_string());
        let (major, minor, patch) = parse_version_string(version).ok_or_else(not_found)?;
        let key = format!("{major}.{minor}.{patch}");
        let idx = self.index.get(&key).ok_or_else(not_found)?;
        self.versions.get(*idx).ok_or_else(not_found)
    }

    /// True if the exact version number exists.
    #[must_use]
    pub fn contains(&self, major: u32, minor: u32, patch: u32) -> bool {
        self.index.contains_key(&format!("{major}.{minor}.{patch}"))
    }

    /// Iterate every version strictly after `from`, ascending, up to and
    /// including the latest.
    pub fn after<'a>(&'a self, from: &ApiVersion) -> impl Iterator<Item = &'a ApiVersion> {
        let key = (from.major, from.minor, from.patch);
        self.versions
            .iter()
            .skip_while(move |v| (v.major, v.minor, v.patch) <= key)
    }

    /// All versions, ascending.
    #[must_use]
    pub fn as_slice(&self) -> &[ApiVersion] {
        &self.versions
    }

    /// Number of versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// True if the catalog holds no versions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

// =============================================================================
// MIGRATOR
// =============================================================================

/// Forward-migrates requests to the catalog's latest version.
#[derive(Debug, Clone, Copy)]
pub struct Migrator<'a> {
    catalog: &'a VersionCatalog,
    prefixes: &'a PrefixTable,
}

impl<'a> Migrator<'a> {
    /// Create a migrator over a catalog and prefix table.
    #[must_use]
    pub fn new(catalog: &'a VersionCatalog, prefixes: &'a PrefixTable) -> Self {
        Self { catalog, prefixes }
    }

    /// True if the request's major version matches the latest major.
    pub fn is_compatible(&self, request: &Request) -> Result<bool, OntoError> {
        let version = self.catalog.get(&request.meta().version)?;
        let latest = self.latest(&request.meta().version)?;
        Ok(version.major == latest.major)
    }

    /// Migrate a request to the latest version.
    ///
    /// Fails with `VersionNotFound` when the request's version string is
    /// unparsable or absent, and with `IncompatibleVersion` when the
    /// major version differs from the latest and the request does not
    /// carry the explicit override. A request already at the latest
    /// version comes back with all fields unchanged, only restamped.
    pub fn migrate(&self, request: &Request) -> Result<Request, OntoError> {
        let meta = request.meta();
        let version = self.catalog.get(&meta.version)?.clone();
        let latest = self.latest(&meta.version)?.clone();

        if version.major != latest.major && !meta.allow_incompatible_version {
            return Err(OntoError::IncompatibleVersion {
                requested: meta.version.clone(),
                latest: latest.version_string(),
            });
        }

        let migrated = match request {
            Request::Value(req) => Request::Value(self.migrate_value(req, &version, &latest)),
            Request::Entity(req) => Request::Entity(self.migrate_entity(req, &version, &latest)),
        };
        Ok(migrated)
    }

    fn latest(&self, requested: &str) -> Result<&ApiVersion, OntoError> {
        self.catalog
            .latest()
            .ok_or_else(|| OntoError::VersionNotFound(requested.to_string()))
    }

    fn migrate_value(
        &self,
        req: &ValueRequest,
        from: &ApiVersion,
        latest: &ApiVersion,
    ) -> ValueRequest {
        let mut entities = req.entities.clone();
        let mut properties = req.properties.clone();
        for step in self.catalog.after(from) {
            entities = self.rewrite_entity_set(&entities, step);
            properties = rewrite_resource_set(&properties, step);
        }
        ValueRequest {
            meta: req.meta.clone().with_version(latest.version_string()),
            entities,
            properties,
        }
    }

    fn migrate_entity(
        &self,
        req: &EntityRequest,
        from: &ApiVersion,
        latest: &ApiVersion,
    ) -> EntityRequest {
        let mut filters = req.filters.clone();
        let mut class_name = req.class_name.clone();
        for step in self.catalog.after(from) {
            filters = self.rewrite_filter_set(&filters, step);
            class_name = class_name.map(|c| self.rewrite_class_name(c, step));
        }
        EntityRequest {
            meta: req.meta.clone().with_version(latest.version_string()),
            filters,
            class_name,
            only_important: req.only_important,
        }
    }

    /// Entity local names are resources under the reserved resource
    /// namespace; only the local name of a replacement survives.
    fn rewrite_entity_set(&self, set: &BTreeSet<String>, step: &ApiVersion) -> BTreeSet<String> {
        let prefix = self.prefixes.resource_prefix();
        set.iter()
            .map(|entity| {
                let as_resource = Resource::new(prefix, entity.clone());
                match rewrite_resource(&as_resource, step) {
                    Some(replacement) => replacement.local,
                    None => entity.clone(),
                }
            })
            .collect()
    }

    /// The class name is a resource under the reserved ontology namespace.
    fn rewrite_class_name(&self, class_name: String, step: &ApiVersion) -> String {
        let as_resource = Resource::new(self.prefixes.ontology_prefix(), class_name.clone());
        match rewrite_resource(&as_resource, step) {
            Some(replacement) => replacement.local,
            None => class_name,
        }
    }

    fn rewrite_filter_set(&self, set: &BTreeSet<Filter>, step: &ApiVersion) -> BTreeSet<Filter> {
        set.iter()
            .map(|filter| self.rewrite_filter(filter, step))
            .collect()
    }

    /// Rewrite one filter's property and, when the value is a resource
    /// object, its value. An untouched filter is returned as-is.
    fn rewrite_filter(&self, filter: &Filter, step: &ApiVersion) -> Filter {
        let updated_value = if filter.value_is_resource() {
            filter
                .value_as_resource(self.prefixes.resource_prefix())
                .and_then(|r| rewrite_resource(&r, step))
        } else {
            None
        };
        let updated_property = filter
            .property
            .as_ref()
            .and_then(|p| rewrite_resource(p, step));

        let mut updated = filter.clone();
        if let Some(property) = updated_property {
            updated = updated.with_property(property);
        }
        if let Some(value) = updated_value {
            updated = updated.with_resource_value(&value);
        }
        updated
    }
}

/// Rewrite one resource against a version step.
///
/// Exact resource replacement wins over prefix replacement. `None` means
/// no rule applied, distinguishable from a replacement that happens to
/// equal the input.
fn rewrite_resource(old: &Resource, step: &ApiVersion) -> Option<Resource> {
    if let Some(replacement) = step.resource_replacements.get(old) {
        return Some(replacement.clone());
    }
    if let Some(new_prefix) = step.prefix_replacements.get(&old.prefix) {
        return Some(Resource::new(new_prefix.clone(), old.local.clone()));
    }
    None
}

/// Rewrite every resource in a set against one version step.
///
/// The new set is constructed in one pass from a snapshot of the old
/// one; removals and insertions land together, so mutually-referential
/// rules cannot corrupt the set mid-iteration.
fn rewrite_resource_set(set: &BTreeSet<Resource>, step: &ApiVersion) -> BTreeSet<Resource> {
    set.iter()
        .map(|r| rewrite_resource(r, step).unwrap_or_else(|| r.clone()))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn version(major: u32, minor: u32, patch: u32) -> ApiVersion {
        ApiVersion::new(major, minor, patch, BTreeMap::new(), BTreeMap::new())
    }

    #[test]
    fn version_string_round_trip() {
        assert_eq!(version(1, 2, 3).version_string(), "1.2.3");
        assert_eq!(parse_version_string("1.2.3"), Some((1, 2, 3)));
        assert_eq!(parse_version_string("1.2"), None);
        assert_eq!(parse_version_string("1.2.3.4"), None);
        assert_eq!(parse_version_string("a.b.c"), None);
    }

    #[test]
    fn catalog_sorts_and_indexes() {
        let catalog = VersionCatalog::from_versions(vec![
            version(2, 0, 1),
            version(1, 0, 0),
            version(1, 1, 3),
        ]);
        assert_eq!(
            catalog.latest().map(ApiVersion::version_string),
            Some("2.0.1".to_string())
        );
        assert!(catalog.contains(1, 1, 3));
        assert!(!catalog.contains(0, 0, 0));
        assert!(matches!(
            catalog.get("0.0.0"),
            Err(OntoError::VersionNotFound(_))
        ));
        assert!(matches!(
            catalog.get("not-a-version"),
            Err(OntoError::VersionNotFound(_))
        ));
    }

    #[test]
    fn after_iterates_strictly_after_through_latest() {
        let catalog = VersionCatalog::from_versions(vec![
            version(1, 0, 0),
            version(1, 1, 0),
            version(1, 1, 3),
            version(1, 2, 0),
            version(2, 0, 1),
        ]);
        let from = version(1, 1, 0);
        let steps: Vec<String> = catalog.after(&from).map(|v| v.version_string()).collect();
        assert_eq!(steps, vec!["1.1.3", "1.2.0", "2.0.1"]);
    }

    #[test]
    fn descriptor_lifts_into_version() {
        let descriptor: VersionDescriptor = serde_json::from_str(
            r#"{
                "major": 1, "minor": 1, "patch": 0,
                "resourceReplacements": [{
                    "prefixBefore": "dbp", "identifierBefore": "numOfEmployees",
                    "prefixNow": "dbp", "identifierNow": "numberOfEmployees"
                }],
                "prefixReplacements": {"old-dbo": "dbo"}
            }"#,
        )
        .expect("valid descriptor");
        let v = descriptor.into_version();
        assert_eq!(v.version_string(), "1.1.0");
        assert_eq!(
            v.resource_replacements
                .get(&Resource::new("dbp", "numOfEmployees")),
            Some(&Resource::new("dbp", "numberOfEmployees"))
        );
        assert_eq!(v.prefix_replacements.get("old-dbo"), Some(&"dbo".to_string()));
    }
}
