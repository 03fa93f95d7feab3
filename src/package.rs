//! The package record: an immutable, freely-cloneable value describing one
//! database entry.

use serde::{Deserialize, Serialize};

/// One repository database entry.
///
/// A `Package` is a plain value with structural equality and no method side
/// effects; it is created by `add-package`, mutated only by
/// `update-package` (under the monotone-version invariant enforced by
/// [`crate::wal::Wal`]), and destroyed by `remove-package`.
///
/// Field order (`name`, `version`, `depends`, `external`, `arch`) matches
/// the WAL wire schema and must not be reordered: `serde_json` preserves
/// struct field declaration order when serializing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Non-empty name, unique within a given [`crate::state::State`].
    pub name: String,
    /// Parseable version string (see [`crate::version::Version`]).
    pub version: String,
    /// Direct dependency names, verbatim (version constraints, if any, are
    /// stripped only at graph-build time — see [`crate::graph`]).
    pub depends: Vec<String>,
    /// `true` when the package is supplied by the host distribution rather
    /// than built by this repository.
    #[serde(default)]
    pub external: bool,
    /// Target architecture tag, `"any"` by default.
    #[serde(default = "default_arch")]
    pub arch: String,
}

fn default_arch() -> String {
    "any".to_string()
}

impl Package {
    /// Construct a new package record.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        depends: Vec<String>,
        external: bool,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            depends,
            external,
            arch: arch.into(),
        }
    }

    /// Construct a non-external package with the default `"any"`
    /// architecture, the common case for locally-built packages.
    #[must_use]
    pub fn built(name: impl Into<String>, version: impl Into<String>, depends: Vec<String>) -> Self {
        Self::new(name, version, depends, false, "any")
    }

    /// Construct an external package: no dependency tracking, and a
    /// provisional `"0.0.0-1"` version until the real version is resolved
    /// through an [`crate::external::ExternalLookup`].
    #[must_use]
    pub fn external(name: impl Into<String>) -> Self {
        Self::new(name, "0.0.0-1", Vec::new(), true, "any")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_arch_is_any() {
        let json = r#"{"name":"a","version":"1.0-1","depends":[]}"#;
        let pkg: Package = serde_json::from_str(json).expect("deserializes");
        assert_eq!(pkg.arch, "any");
        assert!(!pkg.external);
    }

    #[test]
    fn field_order_matches_wire_schema() {
        let pkg = Package::built("a", "1.0-1", vec!["b".to_string()]);
        let encoded = serde_json::to_string(&pkg).expect("serializes");
        assert_eq!(
            encoded,
            r#"{"name":"a","version":"1.0-1","depends":["b"],"external":false,"arch":"any"}"#
        );
    }
}
