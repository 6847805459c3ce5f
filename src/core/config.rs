//! Run configuration.
//!
//! Read from `repackage.json` in the project root when present, then overridden
//! by command-line flags. Every field has a default so an empty file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rewrite::DEFAULT_DECLARATION_KEYWORD;

pub const CONFIG_FILE: &str = "repackage.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory walked for sources, relative to the project root.
    pub source_dir: String,
    /// File extensions rewritten under `source_dir`.
    pub extensions: Vec<String>,
    /// Singleton files rewritten when they exist.
    pub manifests: Vec<String>,
    /// `filePath|oldNamespace|newNamespace` records. Required when set.
    pub package_mapping: Option<String>,
    /// `oldQualifiedName|newQualifiedName` records. Required when set.
    pub symbol_mapping: Option<String>,
    /// Keyword that opens a namespace declaration line.
    pub declaration_keyword: String,
    /// Glob patterns (relative paths) never rewritten.
    pub exclude: Vec<String>,
    /// Declared names never turned into symbol rules.
    pub exclude_symbols: Vec<String>,
    pub allow_ambiguous: bool,
    pub parallel: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            source_dir: "app/src/main/java".to_string(),
            extensions: vec!["kt".to_string()],
            manifests: vec!["app/src/main/AndroidManifest.xml".to_string()],
            package_mapping: Some("package_mismatches.txt".to_string()),
            symbol_mapping: Some("symbol_renames.txt".to_string()),
            declaration_keyword: DEFAULT_DECLARATION_KEYWORD.to_string(),
            exclude: Vec::new(),
            exclude_symbols: Vec::new(),
            allow_ambiguous: false,
            parallel: false,
        }
    }
}

/// Command-line values layered over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_dir: Option<String>,
    pub extensions: Vec<String>,
    pub package_mapping: Option<String>,
    pub symbol_mapping: Option<String>,
    pub no_symbol_mapping: bool,
    pub allow_ambiguous: bool,
    pub parallel: bool,
}

impl MigrationConfig {
    /// Load `explicit` when given (it must exist), otherwise `<root>/repackage.json`
    /// if present, otherwise defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string()),
            None => {
                let candidate = root.join(CONFIG_FILE);
                if !candidate.is_file() {
                    return Ok(MigrationConfig::default());
                }
                candidate
            }
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| {
            Error::config_invalid_value(
                "config",
                Some(path.display().to_string()),
                format!("Cannot read config file: {}", e),
            )
        })?;

        Self::from_json(&raw, &path.display().to_string())
    }

    pub fn from_json(raw: &str, source: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::config_invalid_json(source, e))
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(source_dir) = overrides.source_dir {
            self.source_dir = source_dir;
        }
        if !overrides.extensions.is_empty() {
            self.extensions = overrides.extensions;
        }
        if let Some(path) = overrides.package_mapping {
            self.package_mapping = Some(path);
        }
        if let Some(path) = overrides.symbol_mapping {
            self.symbol_mapping = Some(path);
        }
        if overrides.no_symbol_mapping {
            self.symbol_mapping = None;
        }
        self.allow_ambiguous |= overrides.allow_ambiguous;
        self.parallel |= overrides.parallel;
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_dir.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "source_dir",
                None,
                "Source directory must not be empty",
            ));
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(Error::config_invalid_value(
                "extensions",
                Some(format!("{:?}", self.extensions)),
                "At least one file extension is required",
            ));
        }
        if self.declaration_keyword.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "declaration_keyword",
                None,
                "Declaration keyword must not be empty",
            ));
        }
        if self.package_mapping.is_none() && self.symbol_mapping.is_none() {
            return Err(Error::config_invalid_value(
                "package_mapping",
                None,
                "Nothing to migrate: no package or symbol mapping configured",
            )
            .with_hint("Set package_mapping or symbol_mapping in repackage.json"));
        }
        Ok(())
    }

    pub fn package_mapping_path(&self, root: &Path) -> Option<PathBuf> {
        self.package_mapping.as_deref().map(|p| resolve_path(root, p))
    }

    pub fn symbol_mapping_path(&self, root: &Path) -> Option<PathBuf> {
        self.symbol_mapping.as_deref().map(|p| resolve_path(root, p))
    }
}

/// Expand `~` and anchor relative paths at the project root.
pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(path).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = MigrationConfig::from_json("{}", "repackage.json").unwrap();
        assert_eq!(config, MigrationConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let raw = r#"{"source_dir": "src", "extensions": ["kt", "java"], "symbol_mapping": null}"#;
        let config = MigrationConfig::from_json(raw, "repackage.json").unwrap();

        assert_eq!(config.source_dir, "src");
        assert_eq!(config.extensions, vec!["kt", "java"]);
        assert!(config.symbol_mapping.is_none());
        assert_eq!(config.package_mapping.as_deref(), Some("package_mismatches.txt"));
    }

    #[test]
    fn invalid_json_is_config_error() {
        let err = MigrationConfig::from_json("{not json", "repackage.json").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
    }

    #[test]
    fn validate_rejects_empty_extensions_and_no_mappings() {
        let mut config = MigrationConfig {
            extensions: vec![".".to_string()],
            ..Default::default()
        };
        assert_eq!(
            config.validate().unwrap_err().code.as_str(),
            "config.invalid_value"
        );

        config.extensions = vec!["kt".to_string()];
        config.package_mapping = None;
        config.symbol_mapping = None;
        assert_eq!(
            config.validate().unwrap_err().code.as_str(),
            "config.invalid_value"
        );
    }

    #[test]
    fn overrides_layer_on_top() {
        let mut config = MigrationConfig::default();
        config.apply(ConfigOverrides {
            source_dir: Some("src".to_string()),
            extensions: vec!["java".to_string()],
            package_mapping: Some("maps/pkgs.txt".to_string()),
            no_symbol_mapping: true,
            parallel: true,
            ..Default::default()
        });

        assert_eq!(config.source_dir, "src");
        assert_eq!(config.extensions, vec!["java"]);
        assert_eq!(config.package_mapping.as_deref(), Some("maps/pkgs.txt"));
        assert!(config.symbol_mapping.is_none());
        assert!(config.parallel);
        assert!(!config.allow_ambiguous);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::load(dir.path(), None).unwrap();
        assert_eq!(config, MigrationConfig::default());
    }

    #[test]
    fn load_reads_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"parallel": true}"#).unwrap();

        let config = MigrationConfig::load(dir.path(), None).unwrap();
        assert!(config.parallel);
    }

    #[test]
    fn missing_explicit_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");

        let err = MigrationConfig::load(dir.path(), Some(&missing)).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ConfigInvalidValue);
        assert_eq!(err.details["key"], "config");
    }

    #[test]
    fn resolve_path_anchors_relative_paths() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, "maps/a.txt"), PathBuf::from("/project/maps/a.txt"));
        assert_eq!(resolve_path(root, "/abs/a.txt"), PathBuf::from("/abs/a.txt"));
    }
}
