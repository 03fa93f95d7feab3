//! Build recipe loading: extracts name/version/dependency metadata from a
//! PKGBUILD by shelling out to bash rather than re-implementing its
//! evaluation semantics.

mod declare;

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};
use crate::package::Package;

/// The helper script that sources a PKGBUILD and dumps the variables this
/// module cares about via `declare -p`, relative to the crate's manifest
/// directory.
const LOADER_SCRIPT: &str = "scripts/pkginfo.sh";

/// Metadata extracted from one PKGBUILD.
///
/// Only the fields needed to produce a [`Package`] and to drive dependency
/// resolution are kept; a PKGBUILD carries many more (`source`, checksum
/// arrays, `options`, …) that this repository engine has no use for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipeInfo {
    /// `pkgname`.
    pub pkgname: String,
    /// `pkgver`.
    pub pkgver: String,
    /// `pkgrel`.
    pub pkgrel: String,
    /// `epoch`, if declared.
    pub epoch: Option<String>,
    /// `arch` (first entry, or `"any"` if absent).
    pub arch: String,
    /// `depends`, verbatim (version constraints not yet stripped).
    pub depends: Vec<String>,
    /// `makedepends`.
    pub makedepends: Vec<String>,
    /// `checkdepends`.
    pub checkdepends: Vec<String>,
    /// `optdepends`.
    pub optdepends: Vec<String>,
}

impl RecipeInfo {
    /// The package name, equal to `pkgname`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.pkgname
    }

    /// The rendered `[epoch:]pkgver-pkgrel` version string accepted by
    /// [`crate::version::Version::parse`].
    #[must_use]
    pub fn version(&self) -> String {
        match &self.epoch {
            Some(epoch) => format!("{epoch}:{}-{}", self.pkgver, self.pkgrel),
            None => format!("{}-{}", self.pkgver, self.pkgrel),
        }
    }

    /// Project this recipe onto the [`Package`] record that `add-package`
    /// or `update-package` would record, given already-resolved dependency
    /// names.
    #[must_use]
    pub fn to_package(&self) -> Package {
        Package::new(self.name(), self.version(), self.depends.clone(), false, &self.arch)
    }
}

/// Run the PKGBUILD loader helper over `path` and parse its `declare -p`
/// dump into a [`RecipeInfo`].
///
/// # Errors
/// [`Error::Io`] if the helper script cannot be run; [`Error::RecipeParseError`]
/// if it exits non-zero or its output does not match the expected dump
/// format or is missing a required field.
pub fn load(path: &Path) -> Result<RecipeInfo> {
    load_with_script(path, Path::new(LOADER_SCRIPT))
}

fn load_with_script(path: &Path, script: &Path) -> Result<RecipeInfo> {
    debug!(path = %path.display(), "loading build recipe");
    let output = Command::new("/usr/bin/bash")
        .arg(script)
        .arg(path)
        .output()?;

    if !output.status.success() {
        return Err(Error::RecipeParseError(format!(
            "{}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let dump = String::from_utf8(output.stdout)
        .map_err(|e| Error::RecipeParseError(format!("helper output is not UTF-8: {e}")))?;
    parse_recipe(&dump)
}

fn parse_recipe(dump: &str) -> Result<RecipeInfo> {
    let vars = declare::parse(dump)?;

    let scalar = |name: &str| -> Result<String> {
        vars.get(name)
            .and_then(declare::Value::as_scalar)
            .map(ToString::to_string)
            .ok_or_else(|| Error::RecipeParseError(format!("missing field `{name}`")))
    };
    let array = |name: &str| -> Vec<String> {
        vars.get(name).map(declare::Value::as_array).map(<[String]>::to_vec).unwrap_or_default()
    };

    let arch = array("arch").into_iter().next().unwrap_or_else(|| "any".to_string());
    let epoch = vars.get("epoch").and_then(declare::Value::as_scalar).map(ToString::to_string);

    Ok(RecipeInfo {
        pkgname: scalar("pkgname")?,
        pkgver: scalar("pkgver")?,
        pkgrel: scalar("pkgrel")?,
        epoch,
        arch,
        depends: array("depends"),
        makedepends: array("makedepends"),
        checkdepends: array("checkdepends"),
        optdepends: array("optdepends"),
    })
}

/// Recursively discover every `PKGBUILD` under `repo_dir`, returning package
/// directory names sorted lexicographically.
///
/// # Errors
/// [`Error::Io`] if `repo_dir` cannot be read.
pub fn discover(repo_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    collect_pkgbuilds(repo_dir, &mut names)?;
    names.sort();
    Ok(names)
}

fn collect_pkgbuilds(dir: &Path, names: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if path.join("PKGBUILD").is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            } else {
                collect_pkgbuilds(&path, names)?;
            }
        }
    }
    Ok(())
}

/// Join a discovered package name with its recipe directory, the shape
/// `export_database` and `bootstrap` consume when walking a whole
/// repository checkout.
#[must_use]
pub fn recipe_path(repo_dir: &Path, package_name: &str) -> PathBuf {
    repo_dir.join(package_name).join("PKGBUILD")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_dump() {
        let dump = concat!(
            "declare -- pkgname=\"example\"\n",
            "declare -- pkgver=\"1.2.3\"\n",
            "declare -- pkgrel=\"1\"\n",
            "declare -a arch=([0]=\"x86_64\")\n",
            "declare -a depends=([0]=\"glibc\")\n",
        );
        let info = parse_recipe(dump).expect("parses");
        assert_eq!(info.name(), "example");
        assert_eq!(info.version(), "1.2.3-1");
        assert_eq!(info.arch, "x86_64");
        assert_eq!(info.depends, vec!["glibc".to_string()]);
    }

    #[test]
    fn epoch_is_rendered_in_version() {
        let dump = concat!(
            "declare -- pkgname=\"example\"\n",
            "declare -- pkgver=\"1.2.3\"\n",
            "declare -- pkgrel=\"1\"\n",
            "declare -- epoch=\"2\"\n",
        );
        let info = parse_recipe(dump).expect("parses");
        assert_eq!(info.version(), "2:1.2.3-1");
    }

    #[test]
    fn missing_required_field_errors() {
        let dump = "declare -- pkgver=\"1.0\"\n";
        let err = parse_recipe(dump).expect_err("missing pkgname");
        assert!(matches!(err, Error::RecipeParseError(_)));
    }

    #[test]
    fn missing_arch_defaults_to_any() {
        let dump = concat!(
            "declare -- pkgname=\"example\"\n",
            "declare -- pkgver=\"1.0\"\n",
            "declare -- pkgrel=\"1\"\n",
        );
        let info = parse_recipe(dump).expect("parses");
        assert_eq!(info.arch, "any");
    }

    #[test]
    fn discover_finds_nested_pkgbuilds() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("foo")).expect("mkdir");
        std::fs::write(dir.path().join("foo/PKGBUILD"), "pkgname=foo").expect("write");
        std::fs::create_dir_all(dir.path().join("bar")).expect("mkdir");
        std::fs::write(dir.path().join("bar/PKGBUILD"), "pkgname=bar").expect("write");

        let names = discover(dir.path()).expect("discovers");
        assert_eq!(names, vec!["bar".to_string(), "foo".to_string()]);
    }
}
