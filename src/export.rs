//! Pacman-compatible database exporter.
//!
//! Produces a `{name}-r{revision}.db.tar.gz` archive: a gzip-compressed tar
//! containing one directory entry and one `desc` file per non-external
//! package, matching the stanza format `repo-add` consumes.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tar::{Builder, EntryType, Header};
use tracing::info;

use crate::error::{Error, Result};
use crate::package::Package;
use crate::wal::Wal;

/// Archive member names excluded from a package's installed-size total.
const ISIZE_EXCLUDED: [&str; 3] = [".BUILDINFO", ".MTREE", ".PKGINFO"];

/// Placeholder values written into `desc` until the repository carries real
/// per-package metadata for these fields.
#[derive(Clone, Debug)]
pub struct Placeholders {
    /// Package base description (`%DESC%`).
    pub desc: String,
    /// Upstream or repository URL (`%URL%`).
    pub url: String,
    /// SPDX or free-form license string (`%LICENSE%`).
    pub license: String,
    /// Packager identity (`%PACKAGER%`).
    pub packager: String,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            desc: "TODO".to_string(),
            url: "https://example.org".to_string(),
            license: "TODO".to_string(),
            packager: "unknown".to_string(),
        }
    }
}

/// Write the pacman-compatible database archive for `wal`'s current state
/// into `output_dir`, reading built package files from `package_dir`.
///
/// The archive is staged under a temporary name in `output_dir` and renamed
/// into place only once fully written, so a reader never observes a
/// partially-written database file.
///
/// # Errors
/// [`Error::PackageFileMissing`] if a non-external package's `.pkg.tar.zst`
/// is absent from `package_dir`; [`Error::InnerArchiveCorrupt`] if that file
/// fails to decode as zstd-compressed tar; [`Error::Io`] for other
/// filesystem failures.
pub fn export_database(
    wal: &Wal,
    package_dir: &Path,
    output_dir: &Path,
    name: &str,
    placeholders: &Placeholders,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let final_path = output_dir.join(format!("{name}-r{}.db.tar.gz", wal.state().revision()));
    let staging_path = output_dir.join(format!(".{name}-r{}.db.tar.gz.tmp", wal.state().revision()));

    {
        let file = File::create(&staging_path)?;
        let encoder = GzEncoder::new(file, Compression::best());
        let mut tar = Builder::new(encoder);

        let mut packages: Vec<&Package> = wal.state().iter().filter(|p| !p.external).collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        for pkg in packages {
            write_package_entry(&mut tar, pkg, package_dir, placeholders)?;
        }

        let encoder = tar.into_inner()?;
        encoder.finish()?;
    }

    fs::rename(&staging_path, &final_path)?;
    info!(path = %final_path.display(), "exported database");
    Ok(final_path)
}

fn write_package_entry<W: Write>(
    tar: &mut Builder<W>,
    pkg: &Package,
    package_dir: &Path,
    placeholders: &Placeholders,
) -> Result<()> {
    let basename = format!("{}-{}", pkg.name, pkg.version);
    let filename = format!("{basename}-{}.pkg.tar.zst", pkg.arch);
    let pkg_path = package_dir.join(&filename);

    if !pkg_path.is_file() {
        return Err(Error::PackageFileMissing(pkg_path));
    }

    let csize = fs::metadata(&pkg_path)?.len();
    let isize = installed_size(&pkg_path)?;
    let sha256sum = sha256_hex(&pkg_path)?;
    let builddate = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let mut desc = Vec::new();
    write_stanza(&mut desc, "FILENAME", Field::Str(&filename));
    write_stanza(&mut desc, "NAME", Field::Str(&pkg.name));
    write_stanza(&mut desc, "BASE", Field::Str(&pkg.name));
    write_stanza(&mut desc, "VERSION", Field::Str(&pkg.version));
    write_stanza(&mut desc, "DESC", Field::Str(&placeholders.desc));
    write_stanza(&mut desc, "CSIZE", Field::Int(csize));
    write_stanza(&mut desc, "ISIZE", Field::Int(isize));
    write_stanza(&mut desc, "SHA256SUM", Field::Str(&sha256sum));
    write_stanza(&mut desc, "URL", Field::Str(&placeholders.url));
    write_stanza(&mut desc, "LICENSE", Field::Str(&placeholders.license));
    write_stanza(&mut desc, "ARCH", Field::Str(&pkg.arch));
    write_stanza(&mut desc, "BUILDDATE", Field::Int(builddate));
    write_stanza(&mut desc, "PACKAGER", Field::Str(&placeholders.packager));
    write_stanza(&mut desc, "DEPENDS", Field::List(&pkg.depends));
    write_stanza(&mut desc, "MAKEDEPENDS", Field::List(&[]));

    let mut dir_header = Header::new_gnu();
    dir_header.set_entry_type(EntryType::Directory);
    dir_header.set_path(&basename)?;
    dir_header.set_size(0);
    dir_header.set_mode(0o755);
    dir_header.set_cksum();
    tar.append(&dir_header, std::io::empty())?;

    let mut file_header = Header::new_gnu();
    file_header.set_entry_type(EntryType::Regular);
    file_header.set_path(format!("{basename}/desc"))?;
    file_header.set_size(desc.len() as u64);
    file_header.set_mode(0o644);
    file_header.set_cksum();
    tar.append(&file_header, desc.as_slice())?;

    Ok(())
}

enum Field<'a> {
    Str(&'a str),
    Int(u64),
    List(&'a [String]),
}

fn write_stanza(buf: &mut Vec<u8>, key: &str, value: Field<'_>) {
    buf.extend_from_slice(b"%");
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b"%\n");
    match value {
        Field::Str(s) => {
            buf.extend_from_slice(s.as_bytes());
            buf.push(b'\n');
        }
        Field::Int(n) => {
            buf.extend_from_slice(n.to_string().as_bytes());
            buf.push(b'\n');
        }
        Field::List(items) => {
            for item in items {
                buf.extend_from_slice(item.as_bytes());
                buf.push(b'\n');
            }
        }
    }
    buf.push(b'\n');
}

fn sha256_hex(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Sum the uncompressed size of every inner archive member except the
/// bookkeeping files pacman itself writes (`.BUILDINFO`, `.MTREE`,
/// `.PKGINFO`).
fn installed_size(pkg_path: &Path) -> Result<u64> {
    let file = File::open(pkg_path)?;
    let decoder = zstd::Decoder::new(file)
        .map_err(|e| Error::InnerArchiveCorrupt(format!("{}: {e}", pkg_path.display())))?;
    let mut inner = tar::Archive::new(decoder);
    let mut total = 0u64;
    let entries = inner
        .entries()
        .map_err(|e| Error::InnerArchiveCorrupt(format!("{}: {e}", pkg_path.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::InnerArchiveCorrupt(format!("{}: {e}", pkg_path.display())))?;
        let path = entry.path().map_err(|e| Error::InnerArchiveCorrupt(e.to_string()))?;
        let name = path.to_string_lossy();
        if ISIZE_EXCLUDED.iter().any(|excluded| name == *excluded) {
            continue;
        }
        total += entry.size();
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Read;

    fn build_test_package(dir: &Path, name: &str, version: &str, arch: &str, inner_files: &[(&str, &[u8])]) -> PathBuf {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = Builder::new(&mut tar_bytes);
            for (entry_name, contents) in inner_files {
                let mut header = Header::new_gnu();
                header.set_size(contents.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, entry_name, Cursor::new(contents)).expect("append");
            }
            builder.finish().expect("finish inner tar");
        }
        let compressed = zstd::encode_all(tar_bytes.as_slice(), 0).expect("zstd encode");
        let filename = format!("{name}-{version}-{arch}.pkg.tar.zst");
        let path = dir.join(&filename);
        fs::write(&path, compressed).expect("write pkg file");
        path
    }

    #[test]
    fn installed_size_excludes_bookkeeping_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = build_test_package(
            dir.path(),
            "foo",
            "1.0-1",
            "any",
            &[(".PKGINFO", b"ignored"), ("usr/bin/foo", b"hello world")],
        );
        let size = installed_size(&path).expect("computes size");
        assert_eq!(size, "hello world".len() as u64);
    }

    #[test]
    fn export_writes_desc_stanzas_for_each_package() {
        let dir = tempfile::tempdir().expect("tempdir");
        let wal_path = dir.path().join("test.wal");
        let package_dir = dir.path().join("pkgs");
        fs::create_dir_all(&package_dir).expect("mkdir");
        let output_dir = dir.path().join("out");

        let mut wal = Wal::open(&wal_path).expect("opens");
        wal.add_package(Package::built("foo", "1.0-1", Vec::new())).expect("adds");
        wal.add_package(Package::external("bar")).expect("adds external");

        build_test_package(&package_dir, "foo", "1.0-1", "any", &[("usr/bin/foo", b"hi")]);

        let archive_path = export_database(&wal, &package_dir, &output_dir, "test-repo", &Placeholders::default())
            .expect("exports");
        assert_eq!(archive_path.file_name().unwrap().to_str().unwrap(), "test-repo-r2.db.tar.gz");

        let file = File::open(&archive_path).expect("opens archive");
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        let mut desc_contents = String::new();
        let mut saw_dir = false;
        for entry in archive.entries().expect("entries") {
            let mut entry = entry.expect("entry");
            let path = entry.path().expect("path").to_string_lossy().to_string();
            if path == "foo-1.0-1" {
                saw_dir = true;
            } else if path == "foo-1.0-1/desc" {
                entry.read_to_string(&mut desc_contents).expect("reads desc");
            }
        }
        assert!(saw_dir, "expected a directory entry for foo-1.0-1");
        let mut lines = desc_contents.lines();
        assert_eq!(lines.next(), Some("%FILENAME%"));
        assert_eq!(lines.next(), Some("foo-1.0-1-any.pkg.tar.zst"));
        assert_eq!(lines.next(), Some(""));
        assert!(desc_contents.contains("%NAME%\nfoo\n"));
        assert!(!desc_contents.contains("bar"));
    }

    #[test]
    fn export_missing_package_file_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let wal_path = dir.path().join("test.wal");
        let package_dir = dir.path().join("pkgs");
        fs::create_dir_all(&package_dir).expect("mkdir");
        let output_dir = dir.path().join("out");

        let mut wal = Wal::open(&wal_path).expect("opens");
        wal.add_package(Package::built("foo", "1.0-1", Vec::new())).expect("adds");

        let err = export_database(&wal, &package_dir, &output_dir, "test-repo", &Placeholders::default())
            .expect_err("missing package file");
        assert!(matches!(err, Error::PackageFileMissing(_)));
    }
}
