// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version-control checkpointing.
//!
//! Utilities to record each package migration as one self-consistent commit,
//! so that any checkpoint can serve as a rollback point. Given that the
//! migrator only rearranges files that Git already tracks, any piece of logic
//! that must interact with the repository's history is generally considered
//! to be checkpoint logic, e.g., staging moved files, committing them,
//! archiving the committed state, switching branches, etc.
//!
//! The [`Checkpoint`] trait keeps the migrator itself agnostic of Git. When
//! the repository cannot be opened, the caller swaps in [`NullCheckpoint`] so
//! that file moves still happen while every history operation degrades to a
//! warning no-op.

use git2::{BranchType, IndexAddOption, Repository, StatusOptions};
use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Command,
};
use tracing::{debug, instrument, warn};

/// Record-keeping seam between the migrator and version control.
pub trait Checkpoint {
    /// Check that the working tree holds no uncommitted or untracked changes.
    fn is_clean(&self) -> Result<bool>;

    /// Create or reuse a local branch with target name, and move HEAD to it.
    fn switch_branch(&self, name: &str) -> Result<()>;

    /// Write an immutable tar archive of the committed state to target path.
    fn archive_to(&self, dest: &Path) -> Result<()>;

    /// Stage and commit all changes under target pathspec as one checkpoint.
    fn commit_paths(&self, pathspec: &Path, message: &str) -> Result<CommitOutcome>;
}

/// Result of one checkpoint attempt.
///
/// A checkpoint with nothing staged is not an error. The migrator treats it
/// as a skip, per the rule that failure to commit must never undo completed
/// file moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// New commit recorded on HEAD.
    Committed,

    /// Pathspec produced no change against the parent tree.
    NothingToCommit,
}

/// Checkpoint access through libgit2.
pub struct Git2Checkpoint {
    repository: Repository,
}

impl Git2Checkpoint {
    /// Open repository at target path.
    ///
    /// # Errors
    ///
    /// - Return [`CheckpointError::Git2`] if no repository exists at target
    ///   path, or if it is bare.
    pub fn try_open(path: impl AsRef<Path>) -> Result<Self> {
        let repository = Repository::open(path.as_ref())?;
        if repository.is_bare() {
            return Err(git2::Error::from_str("repository has no working tree").into());
        }

        Ok(Self { repository })
    }

    fn workdir(&self) -> Result<&Path> {
        self.repository
            .workdir()
            .ok_or_else(|| git2::Error::from_str("repository has no working tree").into())
    }
}

impl Checkpoint for Git2Checkpoint {
    fn is_clean(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options.include_untracked(true).include_ignored(false);
        let statuses = self.repository.statuses(Some(&mut options))?;

        Ok(statuses.is_empty())
    }

    #[instrument(skip(self), level = "debug")]
    fn switch_branch(&self, name: &str) -> Result<()> {
        let head = self.repository.head()?.peel_to_commit()?;
        let branch = match self.repository.find_branch(name, BranchType::Local) {
            Ok(branch) => branch,
            Err(_) => self.repository.branch(name, &head, false)?,
        };

        let refname = branch
            .get()
            .name()
            .ok_or_else(|| git2::Error::from_str("branch name is not valid utf-8"))?
            .to_owned();
        debug!("move HEAD to {refname}");
        self.repository.set_head(&refname)?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn archive_to(&self, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            mkdirp::mkdirp(parent)?;
        }

        syscall_non_interactive(
            "git",
            [
                OsString::from("-C"),
                self.workdir()?.as_os_str().to_os_string(),
                "archive".into(),
                "--format=tar".into(),
                "--output".into(),
                dest.as_os_str().to_os_string(),
                "HEAD".into(),
            ],
        )?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn commit_paths(&self, pathspec: &Path, message: &str) -> Result<CommitOutcome> {
        let mut index = self.repository.index()?;
        // INVARIANT: add_all picks up new entries, update_all records
        // removals, so together they stage a move in full.
        index.add_all([pathspec], IndexAddOption::DEFAULT, None)?;
        index.update_all([pathspec], None)?;
        index.write()?;
        let tree_oid = index.write_tree()?;

        // INVARIANT: Always determine latest parent commit to append to.
        let parent = self
            .repository
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        if let Some(parent) = &parent {
            if parent.tree_id() == tree_oid {
                warn!("nothing staged under {:?}", pathspec.display());
                return Ok(CommitOutcome::NothingToCommit);
            }
        }

        let tree = self.repository.find_tree(tree_oid)?;
        let signature = self.repository.signature()?;
        let parents = parent.iter().collect::<Vec<_>>();
        self.repository
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        Ok(CommitOutcome::Committed)
    }
}

/// Checkpoint fallback for when version control is unavailable.
///
/// File moves proceed as plain filesystem operations, while every history
/// operation becomes a warning no-op.
#[derive(Debug, Default)]
pub struct NullCheckpoint;

impl Checkpoint for NullCheckpoint {
    fn is_clean(&self) -> Result<bool> {
        Ok(true)
    }

    fn switch_branch(&self, name: &str) -> Result<()> {
        warn!("version control unavailable, cannot switch to branch {name}");
        Ok(())
    }

    fn archive_to(&self, dest: &Path) -> Result<()> {
        warn!(
            "version control unavailable, no backup archive at {:?}",
            dest.display()
        );
        Ok(())
    }

    fn commit_paths(&self, pathspec: &Path, _message: &str) -> Result<CommitOutcome> {
        warn!(
            "version control unavailable, no checkpoint for {:?}",
            pathspec.display()
        );
        Ok(CommitOutcome::NothingToCommit)
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(CheckpointError::Syscall(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        ))));
    }

    Ok(message)
}

/// Checkpoint error types.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// External process invocation fails.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = CheckpointError> = std::result::Result<T, E>;
