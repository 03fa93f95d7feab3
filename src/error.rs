//! Unified error type for alai-repo.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for all repository-engine operations.
///
/// This error type covers the write-ahead log, the version algebra, the
/// recipe loader, and the exporter, providing clear, actionable error
/// messages and stable error kinds that the CLI layer renders as one-line
/// messages.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure underlying a WAL, recipe, or export operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A WAL record failed to decode as JSON, or (during replay) decoded
    /// but violated its own precondition.
    #[error("write-ahead log is corrupt: {0}")]
    WalCorrupt(String),

    /// The WAL file is held by another process's advisory lock.
    #[error("write-ahead log is busy: {0}")]
    WalBusy(PathBuf),

    /// `add-package` named a package that already exists.
    #[error("package already exists: {0}")]
    Duplicate(String),

    /// `update-package`, `remove-package`, or `get` named a package that
    /// does not exist.
    #[error("package not found: {0}")]
    NotFound(String),

    /// `add-package` or `update-package` named a dependency that is not
    /// (yet) present in the database.
    #[error("unknown package dependency: {0}")]
    MissingDependency(String),

    /// `remove-package` named a package that other packages still depend
    /// on.
    #[error("package {name} is depended upon by: {}", .held_by.join(", "))]
    DependencyHeld {
        /// Package that was requested for removal.
        name: String,
        /// Names of the packages whose `depends` list still references it.
        held_by: Vec<String>,
    },

    /// `update-package` supplied a version that does not strictly exceed
    /// the currently recorded version.
    #[error("version must strictly increase: {old} >= {new}")]
    VersionNotStrictlyIncreasing {
        /// Previously recorded version string.
        old: String,
        /// Rejected replacement version string.
        new: String,
    },

    /// A version string could not be parsed under the `[epoch:]c.c-rel`
    /// grammar.
    #[error("invalid version syntax: {0}")]
    VersionSyntax(String),

    /// The recipe loader's shell helper produced output that does not match
    /// the expected `declare -p` dump format.
    #[error("failed to parse build recipe: {0}")]
    RecipeParseError(String),

    /// A non-external package has no corresponding `.pkg.tar.zst` on disk.
    #[error("package file missing on disk: {0}")]
    PackageFileMissing(PathBuf),

    /// The inner `.pkg.tar.zst` archive could not be decoded as zstd or as
    /// a tar stream.
    #[error("inner package archive is corrupt: {0}")]
    InnerArchiveCorrupt(String),

    /// A TOML configuration document failed to parse or was missing a
    /// required key.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for alai-repo operations.
pub type Result<T> = std::result::Result<T, Error>;
