//! In-memory repository state: a name→record map plus a monotonic revision
//! counter. All mutation goes through [`crate::wal::Wal`]; this type exposes
//! only read-only access.

use std::collections::HashMap;

use crate::package::Package;

/// The current, consistent repository state.
///
/// Invariants (always hold after any successful WAL operation):
/// 1. Every package's `depends` entries are themselves present in `packages`
///    (closed under dependency).
/// 2. No two entries share a name (enforced by the map key).
/// 3. `revision` equals the count of WAL records applied so far.
#[derive(Clone, Debug, Default)]
pub struct State {
    revision: u64,
    packages: HashMap<String, Package>,
}

impl State {
    /// An empty state at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a package by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Whether a package with this name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Iterate over all packages (insertion order is not defined).
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Number of packages currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether no packages are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Current revision: the count of WAL records applied since file
    /// creation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Insert or replace a package and bump the revision. Only called by
    /// [`crate::wal::Wal`] after its own precondition checks pass.
    pub(crate) fn put(&mut self, package: Package) {
        self.packages.insert(package.name.clone(), package);
        self.revision += 1;
    }

    /// Remove a package and bump the revision. Only called by
    /// [`crate::wal::Wal`] after its own precondition checks pass.
    pub(crate) fn remove(&mut self, name: &str) {
        self.packages.remove(name);
        self.revision += 1;
    }

    /// Packages that list `name` in their `depends`, used by
    /// `remove-package`'s referential-integrity check.
    pub(crate) fn dependents_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.packages
            .values()
            .filter(move |p| p.depends.iter().any(|d| d == name))
            .map(|p| p.name.as_str())
    }
}
