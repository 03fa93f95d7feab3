//! Lookup of packages supplied by the host distribution rather than built
//! by this repository engine.
//!
//! `add-package`'s dependency check only requires a name to be present in
//! [`crate::state::State`]; an [`ExternalLookup`] is how a caller decides
//! whether an as-yet-unknown dependency should be registered as an
//! [`Package::external`] placeholder before the add proceeds.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::package::Package;

/// What: Resolve a package name against packages the host system already
/// provides.
///
/// Inputs: None (trait definition).
///
/// Output: Trait implemented by concrete lookup backends.
///
/// Details:
/// - A `None` result means the name is not provided externally, not an
///   error; the caller treats that as "this must be a repository package".
/// - Implementations must not mutate any [`crate::wal::Wal`] state; the WAL
///   records an external package only once a caller calls `add_package`
///   with the returned value.
pub trait ExternalLookup: Send + Sync {
    /// Look up `name`, returning its recorded [`Package`] if the host
    /// distribution provides it.
    ///
    /// # Errors
    /// Implementations may return an error for I/O or parse failures; a
    /// simple absence of the name must return `Ok(None)`, never an error.
    fn find(&self, name: &str) -> Result<Option<Package>>;
}

/// Resolves names against a pacman local database directory
/// (`/var/lib/pacman/local` by convention), the flat `NAME-VERSION/desc`
/// layout pacman itself maintains for installed packages.
#[derive(Clone, Debug)]
pub struct PacmanLocalDb {
    local_dir: PathBuf,
}

impl PacmanLocalDb {
    /// Point at a pacman local database directory.
    #[must_use]
    pub fn new(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
        }
    }
}

impl ExternalLookup for PacmanLocalDb {
    fn find(&self, name: &str) -> Result<Option<Package>> {
        let Ok(entries) = fs::read_dir(&self.local_dir) else {
            return Ok(None);
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let Some(dirname) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !matches_package_name(dirname, name) {
                continue;
            }
            let desc_path = path.join("desc");
            if let Some(pkg) = parse_desc(&desc_path)? {
                return Ok(Some(pkg));
            }
        }
        Ok(None)
    }
}

/// A pacman local-db directory name is `NAME-VERSION-RELEASE`; strip the
/// two trailing hyphen-delimited fields to recover `NAME` without assuming
/// version components contain no hyphens.
fn matches_package_name(dirname: &str, name: &str) -> bool {
    let mut parts: Vec<&str> = dirname.rsplitn(3, '-').collect();
    parts.reverse();
    parts.first().is_some_and(|n| *n == name)
}

fn parse_desc(path: &Path) -> Result<Option<Package>> {
    let Ok(contents) = fs::read_to_string(path) else {
        return Ok(None);
    };

    let mut name = None;
    let mut version = None;
    let mut depends = Vec::new();
    let mut lines = contents.lines().peekable();
    while let Some(line) = lines.next() {
        match line {
            "%NAME%" => name = lines.next().map(str::to_string),
            "%VERSION%" => version = lines.next().map(str::to_string),
            "%DEPENDS%" => {
                while let Some(dep_line) = lines.peek() {
                    if dep_line.is_empty() || dep_line.starts_with('%') {
                        break;
                    }
                    depends.push((*dep_line).to_string());
                    lines.next();
                }
            }
            _ => {}
        }
    }

    match (name, version) {
        (Some(name), Some(version)) => Ok(Some(Package::new(name, version, depends, true, "any"))),
        _ => Ok(None),
    }
}

/// A fixed in-memory lookup table for tests.
#[derive(Clone, Debug, Default)]
pub struct MockExternalLookup {
    packages: Vec<Package>,
}

impl MockExternalLookup {
    /// Build a mock from a fixed package list.
    #[must_use]
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }
}

impl ExternalLookup for MockExternalLookup {
    fn find(&self, name: &str) -> Result<Option<Package>> {
        Ok(self.packages.iter().find(|p| p.name == name).cloned())
    }
}
