// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package layout migration.
//!
//! Utilities to move a stow package from the nested layout to the flat
//! layout without breaking any symlink that stow already planted in the
//! user's home directory.
//!
//! # Nested Versus Flat Layouts
//!
//! A stow package mirrors the directory structure it deploys, so an
//! application reading `$XDG_CONFIG_HOME/nvim` traditionally gets a package
//! shaped like `nvim/.config/nvim/init.lua`. That extra `.config/<name>/`
//! level exists purely for stow's benefit, and living two directories away
//! from the package root makes day-to-day editing tedious. The __flat__
//! layout drops the nesting and keeps files directly under the package root,
//! e.g., `nvim/init.lua`.
//!
//! # Proxy Symlinks
//!
//! Stow's own links under the home directory were created independently and
//! are out of this tool's control, so they must keep resolving after files
//! move. The migrator guarantees that by leaving a __proxy symlink__ at the
//! vacated nested path pointing back at the package root. The direction is
//! always old path to new path, with a relative target, which gives external
//! consumers backward path compatibility through one added indirection level.
//!
//! # Planning Before Execution
//!
//! Each package is first inspected to derive its [`LayoutState`], then a
//! complete list of [`Action`] values is drafted before anything touches the
//! disk. Conflicts surface at plan time, so a conflicting package moves
//! nothing at all, and a dry run echoes exactly the actions a live run would
//! perform. Every successful migration ends with one version-control
//! checkpoint labeled with the package name, which leaves the working tree
//! self-consistent at every commit boundary.

use crate::{
    catalog::PackageEntry,
    checkpoint::{Checkpoint, CheckpointError, CommitOutcome, Git2Checkpoint},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Behavior switches for one migration run.
#[derive(Debug, Default, Clone)]
pub struct MigrateOptions {
    /// Report intended actions, perform none of them.
    pub dry_run: bool,
}

/// Current on-disk shape of a package.
///
/// Derived by filesystem inspection at migration time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    /// Package directory or nested payload does not exist.
    Absent,

    /// Proxy symlink already present, nothing left to do.
    AlreadyFlat,

    /// Nested payload is a directory of configuration files.
    NestedDirectory,

    /// Nested payload is one file, not a directory.
    NestedSingleFile,
}

impl LayoutState {
    /// Inspect the filesystem to derive the layout state of a package.
    ///
    /// A package directory that exists but carries neither nested structure
    /// nor a proxy symlink counts as [`LayoutState::Absent`], since there is
    /// nothing to move.
    pub fn detect(root: impl AsRef<Path>, entry: &PackageEntry) -> Self {
        let package_dir = root.as_ref().join(&entry.name);
        if !package_dir.exists() {
            return Self::Absent;
        }

        let dotconfig = package_dir.join(".config");
        let nested = dotconfig.join(entry.target());
        if dotconfig.is_symlink() || nested.is_symlink() {
            return Self::AlreadyFlat;
        }

        if nested.is_dir() {
            return Self::NestedDirectory;
        }

        if nested.is_file() {
            return Self::NestedSingleFile;
        }

        Self::Absent
    }
}

/// Why a package was skipped instead of migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Package directory or nested payload does not exist.
    SourceNotFound,

    /// Proxy symlink already in place from an earlier run.
    AlreadyMigrated,
}

impl Display for SkipReason {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::SourceNotFound => write!(fmt, "source not found"),
            Self::AlreadyMigrated => write!(fmt, "already migrated"),
        }
    }
}

/// One planned filesystem or version-control effect.
///
/// Echoed before execution so a dry run reads identically to the preview of
/// a live run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Move a file or directory to its flat location.
    Move { from: PathBuf, to: PathBuf },

    /// Remove an emptied nested directory tree.
    RemoveDir { path: PathBuf },

    /// Create a proxy symlink at the vacated nested path.
    Symlink { link: PathBuf, target: PathBuf },

    /// Commit the package's changes as one checkpoint.
    Commit { message: String },
}

impl Display for Action {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Move { from, to } => {
                write!(fmt, "move {} -> {}", from.display(), to.display())
            }
            Self::RemoveDir { path } => write!(fmt, "remove directory {}", path.display()),
            Self::Symlink { link, target } => {
                write!(fmt, "symlink {} -> {}", link.display(), target.display())
            }
            Self::Commit { message } => write!(fmt, "commit {message:?}"),
        }
    }
}

/// Result of migrating one package.
#[derive(Debug)]
pub enum MigrationOutcome {
    /// Nothing to do for this package.
    Skipped(SkipReason),

    /// Dry run: the actions a live run would perform, none executed.
    Planned(Vec<Action>),

    /// All actions executed, checkpoint attempted.
    Migrated {
        actions: Vec<Action>,
        commit: CommitOutcome,
    },
}

/// Migrate packages from the nested layout to the flat layout.
pub struct Migrator<C = Git2Checkpoint>
where
    C: Checkpoint,
{
    root: PathBuf,
    checkpoint: C,
}

impl<C> Migrator<C>
where
    C: Checkpoint,
{
    /// Construct new migrator rooted at the dotfiles repository.
    pub fn new(root: impl Into<PathBuf>, checkpoint: C) -> Self {
        Self {
            root: root.into(),
            checkpoint,
        }
    }

    /// Migrate one package to the flat layout.
    ///
    /// Detects the package's [`LayoutState`], drafts the full action plan,
    /// echoes it, and executes it unless dry-run mode is active. Running the
    /// operation a second time on the same package yields
    /// [`SkipReason::AlreadyMigrated`] with no further filesystem change.
    ///
    /// # Errors
    ///
    /// - Return [`MigrateError::DestinationConflict`] if a move destination
    ///   already exists. Detected at plan time, so nothing has moved.
    /// - Return [`MigrateError::MoveFailed`],
    ///   [`MigrateError::RemoveFailed`], or
    ///   [`MigrateError::SymlinkCreationFailed`] on I/O-level failure.
    ///   Checkpoints of earlier packages remain intact.
    /// - Return [`MigrateError::Checkpoint`] if the commit itself fails.
    ///   An empty commit is not a failure.
    #[instrument(skip(self, entry, options), fields(package = %entry.name), level = "debug")]
    pub fn migrate_package(
        &self,
        entry: &PackageEntry,
        options: &MigrateOptions,
    ) -> Result<MigrationOutcome> {
        let state = LayoutState::detect(&self.root, entry);
        let actions = match state {
            LayoutState::Absent => {
                info!("skip {}: {}", entry.name, SkipReason::SourceNotFound);
                return Ok(MigrationOutcome::Skipped(SkipReason::SourceNotFound));
            }
            LayoutState::AlreadyFlat => {
                info!("skip {}: {}", entry.name, SkipReason::AlreadyMigrated);
                return Ok(MigrationOutcome::Skipped(SkipReason::AlreadyMigrated));
            }
            LayoutState::NestedDirectory => self.plan_nested_directory(entry)?,
            LayoutState::NestedSingleFile => self.plan_nested_single_file(entry)?,
        };

        for action in &actions {
            info!("{action}");
        }

        if options.dry_run {
            return Ok(MigrationOutcome::Planned(actions));
        }

        let mut commit = CommitOutcome::NothingToCommit;
        for action in &actions {
            match action {
                Action::Move { from, to } => move_entry(from, to)?,
                Action::RemoveDir { path } => {
                    fs::remove_dir_all(path).map_err(|source| MigrateError::RemoveFailed {
                        source,
                        path: path.clone(),
                    })?;
                }
                Action::Symlink { link, target } => {
                    symlink(target, link).map_err(|source| {
                        MigrateError::SymlinkCreationFailed {
                            source,
                            link: link.clone(),
                            target: target.clone(),
                        }
                    })?;
                }
                Action::Commit { message } => {
                    commit = self
                        .checkpoint
                        .commit_paths(Path::new(&entry.name), message)?;
                }
            }
        }

        Ok(MigrationOutcome::Migrated { actions, commit })
    }

    /// Draft the plan for a package whose nested payload is a directory.
    ///
    /// Each immediate entry of the nested directory moves up to the package
    /// root. Empty directories are skipped, since version control cannot
    /// represent them anyway. The emptied nested tree is then removed and
    /// replaced with a proxy symlink pointing one level up at the package
    /// root.
    fn plan_nested_directory(&self, entry: &PackageEntry) -> Result<Vec<Action>> {
        let package_dir = self.root.join(&entry.name);
        let nested = package_dir.join(".config").join(entry.target());

        let mut items = list_dir(&nested)?;
        items.sort();

        let mut actions = Vec::new();
        for from in items {
            if from.is_dir() && dir_is_empty(&from)? {
                info!("skip empty directory {}", from.display());
                continue;
            }

            let to = match from.file_name() {
                Some(name) => package_dir.join(name),
                None => continue,
            };
            ensure_vacant(&from, &to)?;
            actions.push(Action::Move { from, to });
        }

        actions.push(Action::RemoveDir {
            path: nested.clone(),
        });
        actions.push(Action::Symlink {
            link: nested,
            target: PathBuf::from(".."),
        });
        actions.push(Action::Commit {
            message: format!("chore: flatten {} layout", entry.name),
        });

        Ok(actions)
    }

    /// Draft the plan for a package whose nested payload is a single file.
    ///
    /// The file moves up to the package root. When that leaves `.config`
    /// empty, the whole directory is replaced with a proxy symlink to the
    /// package root, so the old path resolves through it. When `.config`
    /// still holds unrelated entries, the proxy lands at the vacated file
    /// path instead.
    fn plan_nested_single_file(&self, entry: &PackageEntry) -> Result<Vec<Action>> {
        let package_dir = self.root.join(&entry.name);
        let dotconfig = package_dir.join(".config");
        let nested = dotconfig.join(entry.target());

        let to = package_dir.join(entry.target());
        ensure_vacant(&nested, &to)?;

        let mut actions = vec![Action::Move {
            from: nested.clone(),
            to,
        }];

        let siblings = list_dir(&dotconfig)?
            .into_iter()
            .filter(|path| *path != nested)
            .count();
        if siblings == 0 {
            actions.push(Action::RemoveDir {
                path: dotconfig.clone(),
            });
            actions.push(Action::Symlink {
                link: dotconfig,
                target: PathBuf::from("."),
            });
        } else {
            actions.push(Action::Symlink {
                link: nested,
                target: PathBuf::from("..").join(entry.target()),
            });
        }

        actions.push(Action::Commit {
            message: format!("chore: flatten {} layout", entry.name),
        });

        Ok(actions)
    }
}

fn list_dir(path: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(path).map_err(|source| MigrateError::Inspect {
        source,
        path: path.to_path_buf(),
    })?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| MigrateError::Inspect {
            source,
            path: path.to_path_buf(),
        })?;
        items.push(entry.path());
    }

    Ok(items)
}

fn dir_is_empty(path: &Path) -> Result<bool> {
    Ok(list_dir(path)?.is_empty())
}

fn ensure_vacant(from: &Path, to: &Path) -> Result<()> {
    // INVARIANT: Never silently overwrite a move destination.
    if to.exists() || to.is_symlink() {
        return Err(MigrateError::DestinationConflict {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
    }

    Ok(())
}

fn move_entry(from: &Path, to: &Path) -> Result<()> {
    let map_err = |source| MigrateError::MoveFailed {
        source,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    };

    if let Some(parent) = to.parent() {
        mkdirp::mkdirp(parent).map_err(map_err)?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // INVARIANT: Rename cannot cross filesystems, so fall back to a
        // plain copy for regular files.
        Err(_) if from.is_file() => fs::copy(from, to)
            .and_then(|_| fs::remove_file(from))
            .map(|_| ())
            .map_err(map_err),
        Err(source) => Err(map_err(source)),
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}
#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Migration error types.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Move destination already exists.
    #[error("destination {:?} already exists, refusing to overwrite {:?}", to.display(), from.display())]
    DestinationConflict { from: PathBuf, to: PathBuf },

    /// Directory contents cannot be enumerated.
    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File or directory cannot be moved to its flat location.
    #[error("failed to move {:?} to {:?}", from.display(), to.display())]
    MoveFailed {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Emptied nested directory cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    RemoveFailed {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Proxy symlink cannot be created.
    #[error("failed to symlink {:?} to {:?}", link.display(), target.display())]
    SymlinkCreationFailed {
        #[source]
        source: std::io::Error,
        link: PathBuf,
        target: PathBuf,
    },

    /// Version-control checkpoint fails.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Friendly result alias :3
pub type Result<T, E = MigrateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, write};

    fn entry(name: &str) -> PackageEntry {
        PackageEntry::new(name)
    }

    #[sealed_test]
    fn detect_absent_when_package_dir_missing() {
        let state = LayoutState::detect(".", &entry("nvim"));
        assert_eq!(state, LayoutState::Absent);
    }

    #[sealed_test]
    fn detect_absent_when_package_already_has_flat_files() -> anyhow::Result<()> {
        create_dir_all("nvim")?;
        write("nvim/init.lua", "print('hi')")?;

        let state = LayoutState::detect(".", &entry("nvim"));
        assert_eq!(state, LayoutState::Absent);

        Ok(())
    }

    #[sealed_test]
    fn detect_nested_directory() -> anyhow::Result<()> {
        create_dir_all("nvim/.config/nvim")?;
        write("nvim/.config/nvim/init.lua", "print('hi')")?;

        let state = LayoutState::detect(".", &entry("nvim"));
        assert_eq!(state, LayoutState::NestedDirectory);

        Ok(())
    }

    #[sealed_test]
    fn detect_nested_single_file() -> anyhow::Result<()> {
        create_dir_all("dolphinrc/.config")?;
        write("dolphinrc/.config/dolphinrc", "[General]")?;

        let state = LayoutState::detect(".", &entry("dolphinrc"));
        assert_eq!(state, LayoutState::NestedSingleFile);

        Ok(())
    }

    #[sealed_test]
    fn detect_already_flat_through_proxy_symlink() -> anyhow::Result<()> {
        create_dir_all("nvim/.config")?;
        write("nvim/init.lua", "print('hi')")?;
        symlink(Path::new(".."), Path::new("nvim/.config/nvim"))?;

        let state = LayoutState::detect(".", &entry("nvim"));
        assert_eq!(state, LayoutState::AlreadyFlat);

        Ok(())
    }

    #[sealed_test]
    fn detect_already_flat_when_dotconfig_is_symlink() -> anyhow::Result<()> {
        create_dir_all("dolphinrc")?;
        write("dolphinrc/dolphinrc", "[General]")?;
        symlink(Path::new("."), Path::new("dolphinrc/.config"))?;

        let state = LayoutState::detect(".", &entry("dolphinrc"));
        assert_eq!(state, LayoutState::AlreadyFlat);

        Ok(())
    }

    #[sealed_test]
    fn detect_already_flat_when_proxy_is_broken() -> anyhow::Result<()> {
        // A broken proxy still marks the package migrated. Breakage is the
        // verifier's job to report, not the migrator's to redo.
        create_dir_all("nvim/.config")?;
        symlink(Path::new("bogus"), Path::new("nvim/.config/nvim"))?;

        let state = LayoutState::detect(".", &entry("nvim"));
        assert_eq!(state, LayoutState::AlreadyFlat);

        Ok(())
    }

    #[sealed_test]
    fn plan_surfaces_destination_conflict() -> anyhow::Result<()> {
        create_dir_all("nvim/.config/nvim")?;
        write("nvim/.config/nvim/init.lua", "new")?;
        write("nvim/init.lua", "old")?;

        let migrator = Migrator::new(".", crate::checkpoint::NullCheckpoint);
        let result = migrator.migrate_package(&entry("nvim"), &MigrateOptions::default());

        assert!(matches!(
            result,
            Err(MigrateError::DestinationConflict { .. })
        ));
        // Plan-time detection, so the nested payload is untouched.
        assert!(Path::new("nvim/.config/nvim/init.lua").is_file());
        assert_eq!(std::fs::read_to_string("nvim/init.lua")?, "old");

        Ok(())
    }

    #[test]
    fn action_display_is_a_readable_preview() {
        let action = Action::Move {
            from: PathBuf::from("nvim/.config/nvim/init.lua"),
            to: PathBuf::from("nvim/init.lua"),
        };
        assert_eq!(
            action.to_string(),
            "move nvim/.config/nvim/init.lua -> nvim/init.lua"
        );

        let action = Action::Symlink {
            link: PathBuf::from("nvim/.config/nvim"),
            target: PathBuf::from(".."),
        };
        assert_eq!(action.to_string(), "symlink nvim/.config/nvim -> ..");
    }
}
