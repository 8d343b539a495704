// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package catalog layout.
//!
//! Specify the layout for the catalog file that Flatdot uses to simplify the
//! process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! A catalog is composed of two basic parts: a package listing and verify
//! settings. The package listing names every stow package that the migrator
//! should visit, in order. The verify settings list every home-directory path
//! whose symlink health the verifier should classify after a migration run.
//!
//! Packages are defined statically at program start and never created or
//! destroyed at runtime. A repository without its own catalog file falls back
//! to the built-in default catalog.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Name of the optional catalog file at the top-level of the repository.
pub const CATALOG_FILE: &str = "flatdot.toml";

/// Immutable catalog of packages to migrate and paths to verify.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Catalog {
    /// Package listing, visited in declaration order.
    #[serde(rename = "package")]
    pub packages: Vec<PackageEntry>,

    /// Verifier settings.
    pub verify: Option<VerifySettings>,
}

impl Catalog {
    /// Find catalog entry by package name.
    pub fn find(&self, name: impl AsRef<str>) -> Option<&PackageEntry> {
        self.packages
            .iter()
            .find(|entry| entry.name == name.as_ref())
    }

    /// Expected final symlink paths for the verifier.
    pub fn verify_paths(&self) -> Vec<String> {
        self.verify
            .as_ref()
            .map(|settings| settings.paths.clone())
            .unwrap_or_default()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let packages = ["zsh", "nvim", "kitty", "rofi", "dunst", "mpv", "dolphinrc"]
            .into_iter()
            .map(PackageEntry::new)
            .collect();

        let paths = [
            "~/.config/nvim",
            "~/.config/kitty",
            "~/.config/rofi",
            "~/.config/dunst",
            "~/.config/mpv",
            "~/.config/dolphinrc",
            "~/.zshrc",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            packages,
            verify: Some(VerifySettings { paths }),
        }
    }
}

impl FromStr for Catalog {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut catalog: Catalog = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on all verify paths.
        if let Some(verify) = &mut catalog.verify {
            for path in &mut verify.paths {
                *path = shellexpand::full(path.as_str())
                    .map_err(ConfigError::ShellExpansion)?
                    .into_owned();
            }
        }

        Ok(catalog)
    }
}

impl Display for Catalog {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// One stow package to migrate.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageEntry {
    /// Name of the package directory at the top-level of the repository.
    pub name: String,

    /// Name of the nested payload under `<name>/.config/`, if it differs
    /// from the package name.
    pub target: Option<String>,
}

impl PackageEntry {
    /// Construct new catalog entry whose target matches its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }

    /// Nested payload name, defaulting to the package name.
    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.name)
    }
}

/// Verifier settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct VerifySettings {
    /// Expected final symlink paths, shell expanded during parsing.
    pub paths: Vec<String>,
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize catalog.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize catalog.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on catalog.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("DOTS", "/home/blah/dotfiles")])]
    fn deserialize_catalog() -> anyhow::Result<()> {
        let result: Catalog = r#"
            [[package]]
            name = "nvim"

            [[package]]
            name = "dolphin"
            target = "dolphinrc"

            [verify]
            paths = ["$DOTS/nvim", "/etc/zsh/zshrc"]
        "#
        .parse()?;

        let expect = Catalog {
            packages: vec![
                PackageEntry::new("nvim"),
                PackageEntry {
                    name: "dolphin".into(),
                    target: Some("dolphinrc".into()),
                },
            ],
            verify: Some(VerifySettings {
                paths: vec!["/home/blah/dotfiles/nvim".into(), "/etc/zsh/zshrc".into()],
            }),
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_catalog() {
        let result = Catalog {
            packages: vec![
                PackageEntry::new("nvim"),
                PackageEntry {
                    name: "dolphin".into(),
                    target: Some("dolphinrc".into()),
                },
            ],
            verify: Some(VerifySettings {
                paths: vec![
                    "/home/blah/.config/nvim".into(),
                    "/home/blah/.config/kitty".into(),
                    "/home/blah/.zshrc".into(),
                ],
            }),
        }
        .to_string();

        let expect = indoc! {r#"
            [[package]]
            name = "nvim"

            [[package]]
            name = "dolphin"
            target = "dolphinrc"

            [verify]
            paths = [
                "/home/blah/.config/nvim",
                "/home/blah/.config/kitty",
                "/home/blah/.zshrc",
            ]
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn target_falls_back_to_name() {
        let entry = PackageEntry::new("nvim");
        assert_eq!(entry.target(), "nvim");

        let entry = PackageEntry {
            name: "dolphin".into(),
            target: Some("dolphinrc".into()),
        };
        assert_eq!(entry.target(), "dolphinrc");
    }

    #[test]
    fn find_catalog_entry() {
        let catalog = Catalog::default();
        assert!(catalog.find("nvim").is_some());
        assert!(catalog.find("emacs").is_none());
    }
}
