// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pre-migration safety sequence.
//!
//! Before the first package moves, the run must be made reversible: confirm
//! the working tree is clean (or that the user accepts migrating on top of
//! uncommitted changes), archive the committed state to an immutable backup,
//! and move the migration's commits onto an isolated branch that can be
//! discarded wholesale. These are simple preconditions sequenced in front of
//! the migrator, not part of it.
//!
//! Confirmation goes through the [`Confirmation`] trait so the sequence
//! stays testable without a terminal. Dry runs bypass this module entirely,
//! since they mutate nothing worth protecting.

use crate::checkpoint::{Checkpoint, CheckpointError};

use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{info, warn};

/// Name of the isolated branch that receives migration checkpoints.
pub const MIGRATION_BRANCH: &str = "layout-migration";

/// Ask the user to confirm a risky step.
pub trait Confirmation {
    /// Prompt with target message, return whether the user accepted.
    ///
    /// # Errors
    ///
    /// - Return [`SafetyError::Prompt`] if the prompt itself fails, e.g.,
    ///   no terminal is attached.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Interactive confirmation through an inquire prompt.
#[derive(Debug, Default)]
pub struct InquireConfirmation;

impl Confirmation for InquireConfirmation {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        inquire::Confirm::new(prompt)
            .with_default(false)
            .prompt()
            .map_err(|err| SafetyError::Prompt(err.to_string()))
    }
}

/// Non-interactive confirmation that always accepts.
#[derive(Debug, Default)]
pub struct AssumeYes;

impl Confirmation for AssumeYes {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Run the full safety sequence in front of a live migration.
///
/// Order matters: the clean-tree confirmation comes first so a declined run
/// leaves no artifact behind, then the backup archive, then the branch
/// switch.
///
/// # Errors
///
/// - Return [`SafetyError::Aborted`] if the user declines to migrate on top
///   of uncommitted changes.
/// - Return [`SafetyError::Checkpoint`] if archiving or branching fails.
pub fn preflight<C, P>(checkpoint: &C, confirm: &P, backup_dir: &Path) -> Result<PathBuf>
where
    C: Checkpoint,
    P: Confirmation,
{
    if !checkpoint.is_clean()? {
        warn!("working tree has uncommitted changes");
        let accepted = confirm.confirm("Working tree is not clean. Migrate anyway?")?;
        if !accepted {
            return Err(SafetyError::Aborted);
        }
    }

    let backup_path = backup_dir.join(format!("backup-{}.tar", unix_timestamp()));
    info!("archive committed state to {}", backup_path.display());
    checkpoint.archive_to(&backup_path)?;

    info!("switch to branch {MIGRATION_BRANCH}");
    checkpoint.switch_branch(MIGRATION_BRANCH)?;

    Ok(backup_path)
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Safety sequence error types.
#[derive(Debug, thiserror::Error)]
pub enum SafetyError {
    /// User declined to migrate on top of uncommitted changes.
    #[error("migration aborted by user")]
    Aborted,

    /// Confirmation prompt fails.
    #[error("confirmation prompt failed: {0}")]
    Prompt(String),

    /// Archiving or branching fails.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Friendly result alias :3
pub type Result<T, E = SafetyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CommitOutcome, NullCheckpoint};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    struct Dirty;

    impl Checkpoint for Dirty {
        fn is_clean(&self) -> crate::checkpoint::Result<bool> {
            Ok(false)
        }

        fn switch_branch(&self, _name: &str) -> crate::checkpoint::Result<()> {
            Ok(())
        }

        fn archive_to(&self, _dest: &Path) -> crate::checkpoint::Result<()> {
            Ok(())
        }

        fn commit_paths(
            &self,
            _pathspec: &Path,
            _message: &str,
        ) -> crate::checkpoint::Result<CommitOutcome> {
            Ok(CommitOutcome::NothingToCommit)
        }
    }

    struct Scripted {
        answer: bool,
        prompts: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl Confirmation for Scripted {
        fn confirm(&self, prompt: &str) -> Result<bool> {
            self.prompts.borrow_mut().push(prompt.to_owned());
            Ok(self.answer)
        }
    }

    #[test]
    fn declined_confirmation_aborts_before_any_artifact() {
        let confirm = Scripted::new(false);
        let result = preflight(&Dirty, &confirm, Path::new("backups"));

        assert!(matches!(result, Err(SafetyError::Aborted)));
        assert_eq!(confirm.prompts.borrow().len(), 1);
        assert!(!Path::new("backups").exists());
    }

    #[test]
    fn clean_tree_skips_the_prompt() -> anyhow::Result<()> {
        let confirm = Scripted::new(false);
        preflight(&NullCheckpoint, &confirm, Path::new("backups"))?;

        assert!(confirm.prompts.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn accepted_confirmation_continues() -> anyhow::Result<()> {
        let confirm = Scripted::new(true);
        let backup = preflight(&Dirty, &confirm, Path::new("backups"))?;

        assert!(backup.starts_with("backups"));
        assert_eq!(confirm.prompts.borrow().len(), 1);

        Ok(())
    }
}
