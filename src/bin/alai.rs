//! Command-line front end for the repository engine: the operations a
//! build pipeline invokes directly (`bootstrap`, `add-package`,
//! `update-package`, `remove-package`, `export-database`, `query`,
//! `build-graph`).

use std::path::PathBuf;
use std::process::ExitCode;

use alai_repo::config::Config;
use alai_repo::error::{Error, Result};
use alai_repo::export::{export_database, Placeholders};
use alai_repo::external::{ExternalLookup, PacmanLocalDb};
use alai_repo::graph::Graph;
use alai_repo::recipe;
use alai_repo::wal::Wal;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "alai", version, about = "Source repository database engine")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the write-ahead log if it does not already exist.
    Bootstrap {
        /// Path to repo configuration.
        config: PathBuf,
    },
    /// Add a package, loading its metadata from a recipe directory.
    AddPackage {
        /// Path to repo configuration.
        config: PathBuf,
        /// Path to a directory containing `PKGBUILD`, or a bare name when
        /// `--external` is given.
        package: PathBuf,
        /// Register as a host-provided package rather than a built one.
        #[arg(short, long)]
        external: bool,
    },
    /// Replace an existing package with a strictly newer version, loading
    /// metadata from a recipe directory.
    UpdatePackage {
        /// Path to repo configuration.
        config: PathBuf,
        /// Path to a directory containing `PKGBUILD`.
        package: PathBuf,
    },
    /// Remove a package by name.
    RemovePackage {
        /// Path to repo configuration.
        config: PathBuf,
        /// Package name.
        name: String,
    },
    /// Look up one package's recorded metadata.
    Query {
        /// Path to repo configuration.
        config: PathBuf,
        /// Package name.
        name: String,
    },
    /// Export the pacman-compatible database archive.
    ExportDatabase {
        /// Path to repo configuration.
        config: PathBuf,
        /// Destination directory for the archive.
        output_dir: PathBuf,
    },
    /// Print dependency or impact-layer information.
    BuildGraph {
        /// Path to repo configuration.
        config: PathBuf,
        /// Print impact layers from this package instead of the whole
        /// edge list.
        #[arg(long)]
        origin: Option<String>,
        /// Walk the reverse (dependents) graph instead of the forward
        /// (dependencies) graph.
        #[arg(long)]
        inverse: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Bootstrap { config } => bootstrap(&config),
        Command::AddPackage {
            config,
            package,
            external,
        } => add_package(&config, &package, external),
        Command::UpdatePackage { config, package } => update_package(&config, &package),
        Command::RemovePackage { config, name } => remove_package(&config, &name),
        Command::Query { config, name } => query(&config, &name),
        Command::ExportDatabase { config, output_dir } => export(&config, &output_dir),
        Command::BuildGraph {
            config,
            origin,
            inverse,
        } => build_graph(&config, origin.as_deref(), inverse),
    }
}

fn bootstrap(config_path: &std::path::Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let wal = Wal::open(&config.repo.wal)?;
    info!(path = %config.repo.wal.display(), revision = wal.state().revision(), "bootstrap complete");
    wal.close()
}

fn add_package(config_path: &std::path::Path, package: &std::path::Path, external: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let mut wal = Wal::open(&config.repo.wal)?;

    let pkg = if external {
        let name = package
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("invalid external package name: {}", package.display())))?;
        let db = PacmanLocalDb::new("/var/lib/pacman/local");
        db.find(name)?
            .ok_or_else(|| Error::NotFound(format!("{name} not found in pacman local database")))?
    } else {
        let info = recipe::load(&package.join("PKGBUILD"))?;
        resolve_dependencies(&mut wal, &info.depends)?;
        info.to_package()
    };

    wal.add_package(pkg)?;
    wal.close()
}

fn update_package(config_path: &std::path::Path, package: &std::path::Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let mut wal = Wal::open(&config.repo.wal)?;
    let info = recipe::load(&package.join("PKGBUILD"))?;
    resolve_dependencies(&mut wal, &info.depends)?;
    wal.update_package(info.to_package())?;
    wal.close()
}

/// Auto-register any dependency not yet known, by resolving it against the
/// host's pacman local database, matching the distilled spec's "insert
/// known missing external dependencies" bootstrap step.
fn resolve_dependencies(wal: &mut Wal, depends: &[String]) -> Result<()> {
    let db = PacmanLocalDb::new("/var/lib/pacman/local");
    for dep in depends {
        if wal.get(dep).is_some() {
            continue;
        }
        let resolved = db
            .find(dep)?
            .ok_or_else(|| Error::MissingDependency(dep.clone()))?;
        wal.add_package(resolved)?;
    }
    Ok(())
}

fn remove_package(config_path: &std::path::Path, name: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let mut wal = Wal::open(&config.repo.wal)?;
    wal.remove_package(name)?;
    wal.close()
}

fn query(config_path: &std::path::Path, name: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let wal = Wal::open(&config.repo.wal)?;
    match wal.get(name) {
        Some(pkg) => println!("{pkg:#?}"),
        None => return Err(Error::NotFound(name.to_string())),
    }
    wal.close()
}

fn export(config_path: &std::path::Path, output_dir: &std::path::Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let wal = Wal::open(&config.repo.wal)?;
    let placeholders: Placeholders = config.export.into();
    let path = export_database(&wal, &config.repo.target_dir, output_dir, &config.repo.name, &placeholders)?;
    println!("{}", path.display());
    wal.close()
}

fn build_graph(config_path: &std::path::Path, origin: Option<&str>, inverse: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let wal = Wal::open(&config.repo.wal)?;
    let graph = Graph::build(wal.state());
    let graph = if inverse { graph.inverse() } else { graph };

    if let Some(origin) = origin {
        for (depth, level) in graph.layers(origin).into_iter().enumerate() {
            println!("{depth}: {}", level.join(", "));
        }
    } else {
        let mut names = graph.nodes().to_vec();
        names.sort();
        for name in names {
            println!("{name}: {}", graph.edges_of(&name).join(", "));
        }
    }

    wal.close()
}
