//! Write-ahead log: the sole source of truth for repository state.
//!
//! A [`Wal`] owns exactly one log file for its lifetime. The file begins
//! with an 8-byte magic header followed by a sequence of newline-terminated
//! JSON records, one per applied mutation. Opening an existing file replays
//! every record into a fresh [`State`] before accepting new operations;
//! opening a missing path creates it. See the module-level invariants in
//! [`State`] for what must hold after every successful call.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::package::Package;
use crate::state::State;
use crate::version::Version;

/// First 8 bytes of every WAL file: `ALAI` followed by four zero bytes.
pub const MAGIC: [u8; 8] = *b"ALAI\0\0\0\0";

/// Lifecycle mode of an open [`Wal`]. Appends are suppressed outside
/// `Ready` so that replay never re-logs the records it is replaying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Init,
    Replaying,
    Ready,
}

/// An open write-ahead log plus the [`State`] it has replayed or is
/// accumulating.
#[derive(Debug)]
pub struct Wal {
    file: File,
    path: PathBuf,
    state: State,
    mode: Mode,
}

#[derive(serde::Deserialize)]
struct RemoveArgs {
    name: String,
}

#[derive(Serialize)]
struct RemoveArgsRef<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct Record<'a, T> {
    op: &'a str,
    args: T,
}

impl Wal {
    /// Open (creating if absent) the WAL at `path`, replaying any existing
    /// records, and taking an exclusive advisory lock for the lifetime of
    /// the returned handle.
    ///
    /// # Errors
    /// [`Error::WalBusy`] if another process holds the lock;
    /// [`Error::WalCorrupt`] if the file exists but its magic header, JSON
    /// framing, or a replayed record's own precondition is invalid;
    /// [`Error::Io`] for other filesystem failures.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            let file = OpenOptions::new().read(true).write(true).open(&path)?;
            file.try_lock_exclusive()
                .map_err(|_| Error::WalBusy(path.clone()))?;
            let mut wal = Self {
                file,
                path,
                state: State::new(),
                mode: Mode::Init,
            };
            wal.replay()?;
            Ok(wal)
        } else {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path)?;
            file.try_lock_exclusive()
                .map_err(|_| Error::WalBusy(path.clone()))?;
            file.write_all(&MAGIC)?;
            file.flush()?;
            info!(path = %path.display(), "created new write-ahead log");
            Ok(Self {
                file,
                path,
                state: State::new(),
                mode: Mode::Ready,
            })
        }
    }

    /// The path this log was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The replayed/accumulated repository state.
    #[must_use]
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Flush buffered writes to the OS without releasing the handle.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Flush and release the file handle and advisory lock.
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        let _ = self.file.unlock();
        Ok(())
    }

    /// Look up a package by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.state.get(name)
    }

    /// Insert a new package.
    ///
    /// Preconditions: `package.name` must not already be present, and every
    /// entry in `package.depends` must already be present.
    ///
    /// # Errors
    /// [`Error::Duplicate`] if the name exists; [`Error::MissingDependency`]
    /// if a dependency is absent. No partial mutation occurs on failure.
    pub fn add_package(&mut self, package: Package) -> Result<()> {
        info!(name = %package.name, "add package");
        self.apply_add(package, true)
    }

    /// Replace an existing package with a strictly newer version.
    ///
    /// Preconditions: `package.name` must already be present; `package`'s
    /// version must strictly exceed the recorded version under
    /// [`Version`]'s total order; every entry in `package.depends` must be
    /// present.
    ///
    /// # Errors
    /// [`Error::NotFound`], [`Error::VersionNotStrictlyIncreasing`], or
    /// [`Error::MissingDependency`].
    pub fn update_package(&mut self, package: Package) -> Result<()> {
        info!(name = %package.name, "update package");
        self.apply_update(package, true)
    }

    /// Remove a package by name.
    ///
    /// Preconditions: `name` must be present; no remaining package's
    /// `depends` may reference it.
    ///
    /// # Errors
    /// [`Error::NotFound`] or [`Error::DependencyHeld`].
    pub fn remove_package(&mut self, name: &str) -> Result<()> {
        info!(%name, "remove package");
        self.apply_remove(name, true)
    }

    fn apply_add(&mut self, package: Package, log: bool) -> Result<()> {
        if self.state.contains(&package.name) {
            return Err(Error::Duplicate(package.name));
        }
        for dep in &package.depends {
            if !self.state.contains(dep) {
                return Err(Error::MissingDependency(dep.clone()));
            }
        }
        self.state.put(package.clone());
        if log {
            self.append("add-package", &package)?;
        }
        Ok(())
    }

    fn apply_update(&mut self, package: Package, log: bool) -> Result<()> {
        let prev = self
            .state
            .get(&package.name)
            .ok_or_else(|| Error::NotFound(package.name.clone()))?;
        let prev_version = Version::parse(&prev.version)?;
        let next_version = Version::parse(&package.version)?;
        if next_version <= prev_version {
            return Err(Error::VersionNotStrictlyIncreasing {
                old: prev.version.clone(),
                new: package.version.clone(),
            });
        }
        for dep in &package.depends {
            if !self.state.contains(dep) {
                return Err(Error::MissingDependency(dep.clone()));
            }
        }
        self.state.put(package.clone());
        if log {
            self.append("update-package", &package)?;
        }
        Ok(())
    }

    fn apply_remove(&mut self, name: &str, log: bool) -> Result<()> {
        if !self.state.contains(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        let held_by: Vec<String> = self.state.dependents_of(name).map(str::to_string).collect();
        if !held_by.is_empty() {
            return Err(Error::DependencyHeld {
                name: name.to_string(),
                held_by,
            });
        }
        self.state.remove(name);
        if log {
            self.append("remove-package", &RemoveArgsRef { name })?;
        }
        Ok(())
    }

    fn append<T: Serialize>(&mut self, op: &str, args: &T) -> Result<()> {
        if self.mode != Mode::Ready {
            return Ok(());
        }
        let record = Record { op, args };
        let mut line = serde_json::to_vec(&record).map_err(|e| Error::WalCorrupt(e.to_string()))?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }

    fn replay(&mut self) -> Result<()> {
        self.mode = Mode::Replaying;
        info!(path = %self.path.display(), "replaying write-ahead log");

        let mut magic = [0u8; 8];
        self.file
            .read_exact(&mut magic)
            .map_err(|e| Error::WalCorrupt(format!("truncated magic header: {e}")))?;
        if magic != MAGIC {
            return Err(Error::WalCorrupt("wrong file signature".to_string()));
        }

        let mut rest = Vec::new();
        self.file.read_to_end(&mut rest)?;

        let mut valid_end: u64 = MAGIC.len() as u64;
        let mut offset = 0usize;
        let mut applied = 0u64;
        while offset < rest.len() {
            match rest[offset..].iter().position(|&b| b == b'\n') {
                Some(nl) => {
                    let line_end = offset + nl;
                    let line = &rest[offset..line_end];
                    self.apply_record(line)?;
                    valid_end += (line.len() + 1) as u64;
                    offset = line_end + 1;
                    applied += 1;
                }
                None => {
                    debug!(
                        bytes = rest.len() - offset,
                        "dropping truncated final WAL record"
                    );
                    break;
                }
            }
        }

        self.file.set_len(valid_end)?;
        self.file.seek(SeekFrom::Start(valid_end))?;
        self.mode = Mode::Ready;
        info!(records = applied, "replay complete");
        Ok(())
    }

    fn apply_record(&mut self, line: &[u8]) -> Result<()> {
        let value: serde_json::Value = serde_json::from_slice(line)
            .map_err(|e| Error::WalCorrupt(format!("invalid JSON record: {e}")))?;
        let op = value
            .get("op")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::WalCorrupt("record missing `op`".to_string()))?
            .to_string();
        let args = value
            .get("args")
            .cloned()
            .ok_or_else(|| Error::WalCorrupt("record missing `args`".to_string()))?;

        match op.as_str() {
            "add-package" => {
                let package: Package = serde_json::from_value(args).map_err(|e| {
                    Error::WalCorrupt(format!("invalid add-package args: {e}"))
                })?;
                self.apply_add(package, false)
                    .map_err(|e| Error::WalCorrupt(e.to_string()))
            }
            "update-package" => {
                let package: Package = serde_json::from_value(args).map_err(|e| {
                    Error::WalCorrupt(format!("invalid update-package args: {e}"))
                })?;
                self.apply_update(package, false)
                    .map_err(|e| Error::WalCorrupt(e.to_string()))
            }
            "remove-package" => {
                let remove: RemoveArgs = serde_json::from_value(args).map_err(|e| {
                    Error::WalCorrupt(format!("invalid remove-package args: {e}"))
                })?;
                self.apply_remove(&remove.name, false)
                    .map_err(|e| Error::WalCorrupt(e.to_string()))
            }
            other => Err(Error::WalCorrupt(format!("unknown op `{other}`"))),
        }
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        let _ = self.file.flush();
        let _ = self.file.unlock();
    }
}
