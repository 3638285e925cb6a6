//! Test support utilities for installer behavioural tests.
//!
//! Scenarios run against a scratch directory standing in for the user's
//! home, so nothing outside the temporary tree is touched.

#![allow(dead_code, reason = "each test binary uses a subset of these helpers")]

use camino::Utf8PathBuf;
use tempfile::TempDir;

/// A temporary home directory that lives as long as the scenario.
pub struct ScratchHome {
    _dir: TempDir,
    /// UTF-8 path of the temporary directory.
    pub root: Utf8PathBuf,
}

impl ScratchHome {
    /// Creates an empty scratch home.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf())
            .expect("temp dir path should be UTF-8");
        Self { _dir: dir, root }
    }

    /// The installation directory for `directory_name`.
    pub fn target(&self, directory_name: &str) -> Utf8PathBuf {
        self.root.join(directory_name)
    }

    /// The shell profile that receives PATH exports.
    pub fn shell_profile(&self) -> Utf8PathBuf {
        self.root.join(".bashrc")
    }
}
