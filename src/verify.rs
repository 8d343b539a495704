// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink health verification.
//!
//! After a migration run, every symlink that stow planted in the user's home
//! directory must still resolve through the proxy symlinks the migrator left
//! behind. The verifier walks the catalog's expected final paths and
//! classifies each one, producing a structured [`VerificationReport`] rather
//! than printed text so the result stays testable.
//!
//! A plain file or directory at an expected path is informational, not a
//! failure. Some machines deploy a handful of configurations by copy instead
//! of stow, and that is fine. Only a broken symlink marks the run as failed.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

/// Classification of one expected final path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    /// Symlink whose target exists.
    ResolvedSymlink,

    /// Symlink whose target is missing. The only failure state.
    BrokenSymlink,

    /// Exists, but is not a symlink. Informational.
    DirectEntry,

    /// Nothing at this path.
    Missing,
}

impl PathStatus {
    /// Classify a single path.
    pub fn classify(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.is_symlink() {
            // Path::exists follows the link chain to the final target.
            if path.exists() {
                Self::ResolvedSymlink
            } else {
                Self::BrokenSymlink
            }
        } else if path.exists() {
            Self::DirectEntry
        } else {
            Self::Missing
        }
    }
}

impl Display for PathStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ResolvedSymlink => write!(fmt, "ok"),
            Self::BrokenSymlink => write!(fmt, "broken"),
            Self::DirectEntry => write!(fmt, "direct entry"),
            Self::Missing => write!(fmt, "missing"),
        }
    }
}

/// Aggregate classification of all expected final paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    entries: Vec<(PathBuf, PathStatus)>,
}

impl VerificationReport {
    /// Per-path classifications, in catalog order.
    pub fn entries(&self) -> &[(PathBuf, PathStatus)] {
        &self.entries
    }

    /// Count entries with target status.
    pub fn count(&self, status: PathStatus) -> usize {
        self.entries
            .iter()
            .filter(|(_, entry)| *entry == status)
            .count()
    }

    /// Overall success means zero broken symlinks.
    pub fn is_success(&self) -> bool {
        self.count(PathStatus::BrokenSymlink) == 0
    }
}

impl Display for VerificationReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(
            fmt,
            "{} resolved, {} broken, {} direct, {} missing",
            self.count(PathStatus::ResolvedSymlink),
            self.count(PathStatus::BrokenSymlink),
            self.count(PathStatus::DirectEntry),
            self.count(PathStatus::Missing),
        )
    }
}

/// Classify every expected final path.
pub fn verify(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> VerificationReport {
    let entries = paths
        .into_iter()
        .map(Into::into)
        .map(|path| {
            let status = PathStatus::classify(&path);
            (path, status)
        })
        .collect();

    VerificationReport { entries }
}
