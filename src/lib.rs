//! Write-ahead-logged package repository database for a source-based Linux
//! distribution.
//!
//! This crate is the storage and query engine behind a repository of
//! locally-built packages: every mutation (`add-package`, `update-package`,
//! `remove-package`) is appended to a crash-consistent write-ahead log
//! before being applied to in-memory state, the resulting dependency graph
//! can be walked forward or backward to size the blast radius of a change,
//! and the current state can be exported as a pacman-compatible database
//! archive that `pacman -Sy` can consume directly.
//!
//! # Example
//!
//! ```no_run
//! use alai_repo::package::Package;
//! use alai_repo::wal::Wal;
//!
//! # fn example() -> alai_repo::error::Result<()> {
//! let mut wal = Wal::open("/var/lib/alai/alai.wal")?;
//! wal.add_package(Package::built("example", "1.0-1", Vec::new()))?;
//! println!("revision {}", wal.state().revision());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod external;
pub mod graph;
pub mod package;
pub mod recipe;
pub mod state;
pub mod version;
pub mod wal;

pub use error::{Error, Result};
pub use package::Package;
pub use state::State;
pub use version::Version;
pub use wal::Wal;
