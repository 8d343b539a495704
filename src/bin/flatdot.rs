// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use flatdot::{
    catalog::{Catalog, PackageEntry, CATALOG_FILE},
    checkpoint::{Checkpoint, Git2Checkpoint, NullCheckpoint},
    migrate::{MigrateError, MigrateOptions, MigrationOutcome, Migrator},
    path::{default_backup_dir, dotfiles_dir},
    safety::{preflight, AssumeYes, InquireConfirmation},
    verify::verify,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::{fs, path::Path, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  flatdot migrate [options]\n  flatdot verify",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Migrate(opts) => run_migrate(opts),
            Command::Verify => run_verify(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Migrate catalog packages to the flat layout.
    #[command(override_usage = "flatdot migrate [options]")]
    Migrate(MigrateCliOptions),

    /// Check which expected symlink paths resolve.
    #[command(override_usage = "flatdot verify")]
    Verify,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MigrateCliOptions {
    /// Report intended actions, perform none of them.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Restrict the run to one catalog package.
    #[arg(short, long, value_name = "name", conflicts_with = "continue_from")]
    pub package: Option<String>,

    /// Skip catalog entries before the named one.
    #[arg(short, long, value_name = "name")]
    pub continue_from: Option<String>,

    /// Answer yes to every confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_migrate(opts: MigrateCliOptions) -> Result<()> {
    let root = dotfiles_dir()?;
    let catalog = load_catalog(&root)?;

    match Git2Checkpoint::try_open(&root) {
        Ok(checkpoint) => migrate_all(&root, &catalog, checkpoint, &opts),
        Err(err) => {
            warn!("version control unavailable, falling back to plain file moves: {err}");
            migrate_all(&root, &catalog, NullCheckpoint, &opts)
        }
    }
}

fn migrate_all<C>(
    root: &Path,
    catalog: &Catalog,
    checkpoint: C,
    opts: &MigrateCliOptions,
) -> Result<()>
where
    C: Checkpoint,
{
    let entries = select_entries(catalog, opts)?;
    let options = MigrateOptions {
        dry_run: opts.dry_run,
    };

    if !opts.dry_run {
        let backup_dir = default_backup_dir()?;
        if opts.yes {
            preflight(&checkpoint, &AssumeYes, &backup_dir)?;
        } else {
            preflight(&checkpoint, &InquireConfirmation, &backup_dir)?;
        }
    }

    let migrator = Migrator::new(root, checkpoint);
    let mut migrated = 0usize;
    let mut skipped = 0usize;
    let mut conflicts = 0usize;
    for entry in entries {
        match migrator.migrate_package(entry, &options) {
            Ok(MigrationOutcome::Skipped(_)) => skipped += 1,
            Ok(MigrationOutcome::Planned(_)) | Ok(MigrationOutcome::Migrated { .. }) => {
                migrated += 1
            }
            Err(MigrateError::DestinationConflict { from, to }) => {
                // Recoverable only by operator intervention. Skip this
                // package, keep going, fail the run at the end.
                error!(
                    "conflict in {}: {} already exists, refusing to overwrite {}",
                    entry.name,
                    to.display(),
                    from.display()
                );
                conflicts += 1;
            }
            Err(err) => {
                // I/O-level failure aborts the remaining loop. Checkpoints
                // of earlier packages stay in place, so a later invocation
                // can resume with --continue-from.
                error!("migration of {} failed, aborting run", entry.name);
                return Err(err.into());
            }
        }
    }

    info!("{migrated} migrated, {skipped} skipped, {conflicts} conflicts");
    if conflicts > 0 {
        bail!("{conflicts} package(s) hit destination conflicts");
    }

    Ok(())
}

fn select_entries<'c>(
    catalog: &'c Catalog,
    opts: &MigrateCliOptions,
) -> Result<Vec<&'c PackageEntry>> {
    if let Some(name) = &opts.package {
        let entry = match catalog.find(name) {
            Some(entry) => entry,
            None => bail!("no package named {name:?} in catalog"),
        };
        return Ok(vec![entry]);
    }

    if let Some(name) = &opts.continue_from {
        if catalog.find(name).is_none() {
            bail!("no package named {name:?} in catalog");
        }

        return Ok(catalog
            .packages
            .iter()
            .skip_while(|entry| entry.name != *name)
            .collect());
    }

    Ok(catalog.packages.iter().collect())
}

fn run_verify() -> Result<()> {
    let root = dotfiles_dir()?;
    let catalog = load_catalog(&root)?;
    let paths = catalog
        .verify_paths()
        .into_iter()
        .map(|path| shellexpand::tilde(&path).into_owned());

    let report = verify(paths);
    for (path, status) in report.entries() {
        info!("{:<12} {}", status.to_string(), path.display());
    }
    info!("{report}");

    if !report.is_success() {
        bail!("verification failed: broken symlinks found");
    }

    Ok(())
}

fn load_catalog(root: &Path) -> Result<Catalog> {
    let path = root.join(CATALOG_FILE);
    if !path.exists() {
        return Ok(Catalog::default());
    }

    Ok(fs::read_to_string(&path)?.parse()?)
}
