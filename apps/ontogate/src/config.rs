//! # Configuration & Data-File Loading
//!
//! The TOML config file names the SPARQL endpoint and the data files
//! (prefix map, version descriptors, datatype schema, API keys,
//! important-properties map). Every loader runs once at startup and
//! produces an immutable core structure; a reload builds a whole new
//! value and swaps the reference.

use ontogate_core::{PrefixTable, Schema, VersionCatalog, VersionDescriptor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File-name suffix of version descriptor files.
pub const VERSION_FILE_SUFFIX: &str = ".version.json";

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors raised while loading configuration or data files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("cannot read {path}: {reason}")]
    Unreadable {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        reason: String,
    },

    /// A file did not parse.
    #[error("cannot parse {path}: {reason}")]
    Unparsable {
        /// Offending path.
        path: PathBuf,
        /// Underlying parse error.
        reason: String,
    },
}

impl ConfigError {
    fn unreadable(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    fn unparsable(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Unparsable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// CONFIG MODEL
// =============================================================================

/// Top-level application configuration (`ontogate.toml`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SPARQL endpoint settings.
    pub endpoint: EndpointConfig,
    /// Data file locations.
    pub files: FilesConfig,
    /// API-key system settings.
    pub keys: KeysConfig,
    /// Result windowing settings.
    pub window: WindowConfig,
}

/// SPARQL endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Endpoint URL queries are POSTed to.
    pub url: String,
}

/// Data file locations, relative to the working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// JSON object `prefix -> namespace URI`.
    pub prefixes: PathBuf,
    /// Directory of `*.version.json` descriptors.
    pub versions_dir: PathBuf,
    /// JSON object `property local name -> datatype URI`.
    pub schema: PathBuf,
    /// One API key per line; `_ADMIN`-suffixed keys are quota-exempt.
    pub api_keys: PathBuf,
    /// JSON object `class name -> [property]` backing the
    /// important-properties expansion.
    pub important_properties: PathBuf,
}

/// API-key system settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Master switch; disabled deployments serve anonymously.
    pub enabled: bool,
    /// Starting per-day quota.
    pub quota_day: i64,
    /// Starting per-hour quota.
    pub quota_hour: i64,
    /// Starting per-minute quota.
    pub quota_minute: i64,
    /// Key-file reload interval in seconds.
    pub reload_secs: u64,
}

/// Result windowing settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Server-side cap on the requested limit.
    pub max_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            files: FilesConfig::default(),
            keys: KeysConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "https://dbpedia.org/sparql".to_string(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            prefixes: PathBuf::from("config/prefixes.json"),
            versions_dir: PathBuf::from("config/versions"),
            schema: PathBuf::from("config/schema.json"),
            api_keys: PathBuf::from("config/api-keys.txt"),
            important_properties: PathBuf::from("config/important-properties.json"),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            quota_day: 10_000,
            quota_hour: 1_000,
            quota_minute: 100,
            reload_secs: 600,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { max_limit: 10_000 }
    }
}

impl Config {
    /// Load the TOML config file. A missing file yields the defaults,
    /// so the binary runs without any configuration at all.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw =
            std::fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
        let config = toml::from_str(&raw).map_err(|e| ConfigError::unparsable(path, e))?;
        tracing::info!("config loaded from {}", path.display());
        Ok(config)
    }
}

// =============================================================================
// DATA-FILE LOADERS
// =============================================================================

/// Load the prefix table from a JSON object `prefix -> URI`.
pub fn load_prefix_table(path: &Path) -> Result<PrefixTable, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
    let map: BTreeMap<String, String> =
        serde_json::from_str(&raw).map_err(|e| ConfigError::unparsable(path, e))?;
    tracing::info!("prefix mapping loaded from {}", path.display());
    Ok(PrefixTable::new(map))
}

/// Load the version catalog from every `*.version.json` file in a
/// directory. A malformed descriptor fails the whole load, naming the
/// offending file.
pub fn load_version_catalog(dir: &Path) -> Result<VersionCatalog, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::unreadable(dir, e))?;
    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::unreadable(dir, e))?;
        let path = entry.path();
        let is_version_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(VERSION_FILE_SUFFIX));
        if !is_version_file {
            continue;
        }
        let raw =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::unreadable(&path, e))?;
        let descriptor: VersionDescriptor =
            serde_json::from_str(&raw).map_err(|e| ConfigError::unparsable(&path, e))?;
        versions.push(descriptor.into_version());
    }
    tracing::info!("{} version descriptors loaded from {}", versions.len(), dir.display());
    Ok(VersionCatalog::from_versions(versions))
}

/// Load the datatype schema from a JSON object `local name -> datatype`.
pub fn load_schema(path: &Path) -> Result<Schema, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
    let ranges: BTreeMap<String, String> =
        serde_json::from_str(&raw).map_err(|e| ConfigError::unparsable(path, e))?;
    tracing::info!("datatype schema loaded from {}", path.display());
    Ok(Schema::new(ranges))
}

/// Load API keys, one per line; blank lines are skipped.
pub fn load_api_keys(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
    let keys = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    tracing::info!("{} api keys loaded from {}", keys.len(), path.display());
    Ok(keys)
}

/// Load the important-properties map: `class name -> [prefix:name]`.
pub fn load_important_properties(
    path: &Path,
) -> Result<BTreeMap<String, Vec<String>>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
    let map =
        serde_json::from_str(&raw).map_err(|e| ConfigError::unparsable(path, e))?;
    tracing::info!("important-properties map loaded from {}", path.display());
    Ok(map)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_config_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/ontogate.toml")).expect("defaults");
        assert!(!config.keys.enabled);
        assert_eq!(config.window.max_limit, 10_000);
    }

    #[test]
    fn parses_partial_config() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[endpoint]\nurl = \"http://localhost:8890/sparql\"\n\n[keys]\nenabled = true\n"
        )
        .expect("write");
        let config = Config::load(file.path()).expect("parses");
        assert_eq!(config.endpoint.url, "http://localhost:8890/sparql");
        assert!(config.keys.enabled);
        // untouched sections keep their defaults
        assert_eq!(config.keys.quota_minute, 100);
    }

    #[test]
    fn version_catalog_loader_reads_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("1_1_0.version.json"),
            r#"{
                "major": 1, "minor": 1, "patch": 0,
                "resourceReplacements": [{
                    "prefixBefore": "dbp", "identifierBefore": "numOfEmployees",
                    "prefixNow": "dbp", "identifierNow": "numberOfEmployees"
                }],
                "prefixReplacements": {"old-dbo": "dbo"}
            }"#,
        )
        .expect("write");
        std::fs::write(dir.path().join("1_0_0.version.json"), r#"{"major":1,"minor":0,"patch":0}"#)
            .expect("write");
        std::fs::write(dir.path().join("README.md"), "not a version file").expect("write");

        let catalog = load_version_catalog(dir.path()).expect("loads");
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(1, 1, 0));
        let v = catalog.get("1.1.0").expect("present");
        assert_eq!(v.prefix_replacements.get("old-dbo"), Some(&"dbo".to_string()));
    }

    #[test]
    fn malformed_version_file_names_the_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bad = dir.path().join("bad.version.json");
        std::fs::write(&bad, "{ not json").expect("write");
        let err = load_version_catalog(dir.path()).expect_err("must fail");
        assert!(matches!(err, ConfigError::Unparsable { ref path, .. } if *path == bad));
    }

    #[test]
    fn api_key_loader_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "alpha\n\nbeta_ADMIN\n  \ngamma").expect("write");
        let keys = load_api_keys(file.path()).expect("loads");
        assert_eq!(keys, vec!["alpha", "beta_ADMIN", "gamma"]);
    }
}
