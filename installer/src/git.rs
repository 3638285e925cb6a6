//! Git operations for syncing a product checkout to its latest release.
//!
//! A checkout is cloned into an empty directory, or updated in place with a
//! pull that prefers incoming changes. Release tags are then fetched, the
//! newest tag reachable from the remote default branch is resolved, and the
//! working tree is checked out at that tag.

use crate::error::{InstallerError, Result};
use crate::process::CommandExecutor;
use camino::Utf8Path;
use log::{debug, info};
use std::fmt;

/// A release tag name, e.g. `v0.4.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag(String);

impl ReleaseTag {
    /// Wraps a tag name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The tag name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How [`Repository::clone_or_pull`] brought the checkout up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The directory was empty and the repository was cloned into it.
    Cloned,
    /// An existing checkout was updated.
    Pulled,
}

/// A git checkout rooted at a fixed directory.
pub struct Repository<'a> {
    executor: &'a dyn CommandExecutor,
    dir: &'a Utf8Path,
}

impl<'a> Repository<'a> {
    /// Creates a handle for the checkout at `dir`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, dir: &'a Utf8Path) -> Self {
        Self { executor, dir }
    }

    /// Confirms git can be run at all.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Git`] when git is missing or broken.
    pub fn ensure_git_available(&self) -> Result<()> {
        let result = self
            .executor
            .run("git", &["--version"], self.dir)
            .map_err(|err| InstallerError::Git {
                operation: "--version",
                message: format!("{err} (is git installed?)"),
            })?;
        if !result.success() {
            return Err(InstallerError::git("--version", &result));
        }
        debug!("{}", result.stdout_trimmed());
        Ok(())
    }

    /// Clones `url` into the directory when it is empty, otherwise pulls
    /// `branch` from `origin` preferring incoming changes on conflict.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ReadDirectory`] when the directory cannot
    /// be listed and [`InstallerError::Git`] when git fails.
    pub fn clone_or_pull(&self, url: &str, branch: &str) -> Result<SyncOutcome> {
        if self.is_empty()? {
            info!("cloning {url} into {}", self.dir);
            self.git("clone", &["clone", url, "."])?;
            Ok(SyncOutcome::Cloned)
        } else {
            info!("pulling {branch} into {}", self.dir);
            self.git(
                "pull",
                &[
                    "pull",
                    "--no-rebase",
                    "--no-edit",
                    "--allow-unrelated-histories",
                    "-X",
                    "theirs",
                    "origin",
                    branch,
                ],
            )?;
            Ok(SyncOutcome::Pulled)
        }
    }

    /// Fetches every tag from `origin`, overwriting moved local tags.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Git`] when the fetch fails.
    pub fn fetch_tags(&self) -> Result<()> {
        self.git("fetch", &["fetch", "--tags", "--force", "origin"])
            .map(drop)
    }

    /// Resolves the most recent tag reachable from `origin/<branch>`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::NoReleaseTags`] when git finds no tag and
    /// [`InstallerError::Git`] for any other failure.
    pub fn latest_tag(&self, branch: &str) -> Result<ReleaseTag> {
        let rev = format!("origin/{branch}");
        let result = self
            .executor
            .run("git", &["describe", "--tags", "--abbrev=0", &rev], self.dir)
            .map_err(|err| InstallerError::Git {
                operation: "describe",
                message: err.to_string(),
            })?;

        let name = result.stdout_trimmed();
        if !result.success() {
            if result.stderr.contains("No names found") || result.stderr.contains("No tags") {
                return Err(InstallerError::NoReleaseTags {
                    branch: branch.to_owned(),
                });
            }
            return Err(InstallerError::git("describe", &result));
        }
        if name.is_empty() {
            return Err(InstallerError::NoReleaseTags {
                branch: branch.to_owned(),
            });
        }
        Ok(ReleaseTag::new(name))
    }

    /// Checks out `tag`, discarding local modifications.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Git`] when the checkout fails.
    pub fn checkout(&self, tag: &ReleaseTag) -> Result<()> {
        self.git("checkout", &["checkout", "--force", tag.as_str()])
            .map(drop)
    }

    fn is_empty(&self) -> Result<bool> {
        let mut entries =
            std::fs::read_dir(self.dir).map_err(|source| InstallerError::ReadDirectory {
                path: self.dir.to_owned(),
                source,
            })?;
        Ok(entries.next().is_none())
    }

    fn git(&self, operation: &'static str, args: &[&str]) -> Result<String> {
        let result = self
            .executor
            .run("git", args, self.dir)
            .map_err(|err| InstallerError::Git {
                operation,
                message: err.to_string(),
            })?;
        if result.success() {
            Ok(result.stdout_trimmed().to_owned())
        } else {
            Err(InstallerError::git(operation, &result))
        }
    }
}

/// Deletes generated files that would block a pull, ignoring absent ones.
///
/// # Errors
///
/// Returns [`InstallerError::Io`] when an existing file cannot be removed.
pub fn remove_presync_files(dir: &Utf8Path, files: &[String]) -> Result<()> {
    for file in files {
        let path = dir.join(file);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("removed {path}"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
