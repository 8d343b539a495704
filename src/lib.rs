// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Flatten stow package layouts without breaking existing symlinks.
//!
//! Flatdot migrates a stow-managed dotfiles repository from the nested
//! `<pkg>/.config/<pkg>/file` layout to a flat `<pkg>/file` layout. Each
//! vacated nested path receives a __proxy symlink__ back to the new
//! location, so every link that stow already planted in the home directory
//! keeps resolving with zero restow. Each package lands as one
//! version-control checkpoint, and a verifier reports on the symlink health
//! of the expected home-directory paths afterwards.
//!
//! Packages are migrated strictly one at a time. The tool assumes exclusive
//! use of the working tree for the duration of the run.

pub mod catalog;
pub mod checkpoint;
pub mod migrate;
pub mod path;
pub mod safety;
pub mod verify;
