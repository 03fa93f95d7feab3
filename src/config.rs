//! TOML configuration for the `alai` CLI: where the write-ahead log and
//! built packages live, and the placeholder values the exporter writes into
//! `desc` stanzas until per-package metadata is tracked.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::export::Placeholders;

/// Top-level configuration document (`[repo]` and `[export]` tables).
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Repository location and layout.
    pub repo: RepoConfig,
    /// Export-time placeholder metadata, optional: every field defaults.
    #[serde(default)]
    pub export: ExportConfig,
}

/// `[repo]` table.
#[derive(Clone, Debug, Deserialize)]
pub struct RepoConfig {
    /// Repository name, used as the exported archive's basename.
    pub name: String,
    /// Path to the write-ahead log file.
    pub wal: PathBuf,
    /// Directory containing build recipes (`<name>/PKGBUILD`).
    pub recipe_dir: PathBuf,
    /// Directory containing built `.pkg.tar.zst` files, also the exporter's
    /// output directory.
    pub target_dir: PathBuf,
    /// Names of upstream databases (e.g. `core`, `extra`) consulted by
    /// external-package lookup. Currently informational: v1 resolves
    /// external packages against the pacman local database only.
    #[serde(default)]
    pub dep_databases: Vec<String>,
}

/// `[export]` table: placeholder values for fields this repository engine
/// does not yet track per-package.
#[derive(Clone, Debug, Deserialize)]
pub struct ExportConfig {
    /// `%DESC%`.
    #[serde(default = "default_description")]
    pub description: String,
    /// `%URL%`.
    #[serde(default = "default_url")]
    pub url: String,
    /// `%LICENSE%`.
    #[serde(default = "default_license")]
    pub license: String,
    /// `%PACKAGER%`.
    #[serde(default = "default_packager")]
    pub packager: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            description: default_description(),
            url: default_url(),
            license: default_license(),
            packager: default_packager(),
        }
    }
}

impl From<ExportConfig> for Placeholders {
    fn from(cfg: ExportConfig) -> Self {
        Self {
            desc: cfg.description,
            url: cfg.url,
            license: cfg.license,
            packager: cfg.packager,
        }
    }
}

fn default_description() -> String {
    "TODO".to_string()
}

fn default_url() -> String {
    "https://example.org".to_string()
}

fn default_license() -> String {
    "TODO".to_string()
}

fn default_packager() -> String {
    "unknown".to_string()
}

impl Config {
    /// Load and parse a configuration document from `path`.
    ///
    /// # Errors
    /// [`Error::Io`] if `path` cannot be read; [`Error::Config`] if it does
    /// not parse as the expected TOML schema.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let doc = r#"
            [repo]
            name = "alai"
            wal = "/var/lib/alai/alai.wal"
            recipe_dir = "/srv/alai/recipes"
            target_dir = "/srv/alai/pkgs"
        "#;
        let cfg: Config = toml::from_str(doc).expect("parses");
        assert_eq!(cfg.repo.name, "alai");
        assert_eq!(cfg.export.license, "TODO");
        assert!(cfg.repo.dep_databases.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let doc = r#"
            [repo]
            name = "alai"
            wal = "/var/lib/alai/alai.wal"
            recipe_dir = "/srv/alai/recipes"
            target_dir = "/srv/alai/pkgs"
            dep_databases = ["core", "extra"]

            [export]
            description = "Alai source repository"
            url = "https://example.org"
            license = "TODO"
            packager = "Alai Repository Robot"
        "#;
        let cfg: Config = toml::from_str(doc).expect("parses");
        assert_eq!(cfg.repo.dep_databases, vec!["core".to_string(), "extra".to_string()]);
        assert_eq!(cfg.export.packager, "Alai Repository Robot");
    }

    #[test]
    fn missing_required_field_errors() {
        let doc = r#"
            [repo]
            name = "alai"
        "#;
        let err: std::result::Result<Config, _> = toml::from_str(doc);
        assert!(err.is_err());
    }
}
