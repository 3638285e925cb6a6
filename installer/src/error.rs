//! Error types for the source installer.
//!
//! Each variant maps onto one class of installation failure: environment,
//! version control, toolchain provisioning, build, PATH registration, and
//! configuration. The `Display` text is the underlying detail; the pipeline
//! prefixes it with the stage description before reporting.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur during the installation process.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The process lacks the elevated privileges the platform requires.
    #[error(
        "you are not running with elevated privileges; restart the installer as an administrator and try again"
    )]
    InsufficientPrivileges,

    /// The installation directory could not be created.
    #[error("failed to create {path} (run as administrator?): {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The installation directory cannot be used as a working directory.
    #[error("cannot use {path} as the working directory (run as administrator?): {reason}")]
    WorkingDirectory {
        /// Offending directory.
        path: Utf8PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// The installation directory could not be listed.
    #[error("failed to read {path} (run as administrator?): {source}")]
    ReadDirectory {
        /// Directory that could not be listed.
        path: Utf8PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A git operation failed.
    #[error("git {operation} failed: {message}")]
    Git {
        /// The git operation that failed (clone, pull, etc.).
        operation: &'static str,
        /// Captured output of the failing command.
        message: String,
    },

    /// The repository has no tag reachable from the default branch.
    #[error("no release tags reachable from origin/{branch}")]
    NoReleaseTags {
        /// Branch the tag lookup started from.
        branch: String,
    },

    /// The package manager needed to install the toolchain is missing.
    #[error("{manager} is not installed: {hint}")]
    PackageManagerMissing {
        /// Name of the package manager.
        manager: String,
        /// What the user can do about it.
        hint: String,
    },

    /// A toolchain install command failed.
    #[error("failed to install {tool}: {message}")]
    ToolchainInstall {
        /// Toolchain or component being installed.
        tool: String,
        /// Captured output of the failing command.
        message: String,
    },

    /// No install strategy exists for the running operating system.
    #[error("no install strategy for {toolchain} on {platform}")]
    UnsupportedPlatform {
        /// Toolchain that could not be installed.
        toolchain: String,
        /// Name of the running platform.
        platform: String,
    },

    /// A dependency install or compile command failed.
    #[error("{step} failed: {message}")]
    Build {
        /// Build step that failed.
        step: String,
        /// Captured output of the failing command.
        message: String,
    },

    /// A package feed must be registered but no credentials were supplied.
    #[error(
        "package source {name} is not configured; pass --feed-username and --feed-token to add it"
    )]
    MissingFeedCredentials {
        /// Name of the package source.
        name: String,
    },

    /// The binary directory could not be added to the PATH.
    #[error("failed to update {target}: {reason}")]
    PathRegistration {
        /// Profile file or environment scope that was being updated.
        target: String,
        /// Description of the failure.
        reason: String,
    },

    /// A product profile file could not be read or parsed.
    #[error("invalid product profile {path}: {reason}")]
    InvalidProfile {
        /// Path to the profile file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// The installation target is not an absolute path.
    #[error("installation path {path} must be absolute")]
    TargetNotAbsolute {
        /// The rejected path.
        path: Utf8PathBuf,
    },

    /// A platform directory (home, data) could not be determined.
    #[error("could not determine {what}")]
    DirectoryUnavailable {
        /// Which directory was being resolved.
        what: &'static str,
    },

    /// The background installation thread terminated abnormally.
    #[error("installation thread panicked")]
    WorkerPanicked,

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl InstallerError {
    /// Builds a [`InstallerError::Git`] from a failed command result.
    #[must_use]
    pub fn git(operation: &'static str, result: &crate::process::CommandResult) -> Self {
        Self::Git {
            operation,
            message: result.failure_detail(),
        }
    }
}

// Lossy for io errors: only the kind and formatted message survive, since
// std::io::Error cannot be cloned.
fn clone_io(source: &std::io::Error) -> std::io::Error {
    std::io::Error::new(source.kind(), source.to_string())
}

impl Clone for InstallerError {
    fn clone(&self) -> Self {
        match self {
            Self::InsufficientPrivileges => Self::InsufficientPrivileges,
            Self::CreateDirectory { path, source } => Self::CreateDirectory {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::WorkingDirectory { path, reason } => Self::WorkingDirectory {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ReadDirectory { path, source } => Self::ReadDirectory {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::Io(source) => Self::Io(clone_io(source)),
            Self::Git { operation, message } => Self::Git {
                operation: *operation,
                message: message.clone(),
            },
            Self::NoReleaseTags { branch } => Self::NoReleaseTags {
                branch: branch.clone(),
            },
            Self::PackageManagerMissing { manager, hint } => Self::PackageManagerMissing {
                manager: manager.clone(),
                hint: hint.clone(),
            },
            Self::ToolchainInstall { tool, message } => Self::ToolchainInstall {
                tool: tool.clone(),
                message: message.clone(),
            },
            Self::UnsupportedPlatform {
                toolchain,
                platform,
            } => Self::UnsupportedPlatform {
                toolchain: toolchain.clone(),
                platform: platform.clone(),
            },
            Self::Build { step, message } => Self::Build {
                step: step.clone(),
                message: message.clone(),
            },
            Self::MissingFeedCredentials { name } => Self::MissingFeedCredentials {
                name: name.clone(),
            },
            Self::PathRegistration { target, reason } => Self::PathRegistration {
                target: target.clone(),
                reason: reason.clone(),
            },
            Self::InvalidProfile { path, reason } => Self::InvalidProfile {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::TargetNotAbsolute { path } => Self::TargetNotAbsolute { path: path.clone() },
            Self::DirectoryUnavailable { what } => Self::DirectoryUnavailable { what: *what },
            Self::WorkerPanicked => Self::WorkerPanicked,
            Self::WriteFailed { source } => Self::WriteFailed {
                source: clone_io(source),
            },
            #[cfg(any(test, feature = "test-support"))]
            Self::StubMismatch { message } => Self::StubMismatch {
                message: message.clone(),
            },
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn git_error_includes_operation_and_message() {
        let err = InstallerError::Git {
            operation: "clone",
            message: "could not resolve host".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("clone"));
        assert!(msg.contains("could not resolve host"));
    }

    #[test]
    fn package_manager_missing_includes_hint() {
        let err = InstallerError::PackageManagerMissing {
            manager: "scoop".to_owned(),
            hint: "install Crystal manually".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("scoop"));
        assert!(msg.contains("install Crystal manually"));
    }

    #[test]
    fn create_directory_keeps_os_message_and_source() {
        let err = InstallerError::CreateDirectory {
            path: Utf8PathBuf::from("/opt/cosmo"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert!(err.to_string().contains("permission denied"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[rstest]
    #[case::io(InstallerError::Io(std::io::Error::other("disk full")))]
    #[case::build(InstallerError::Build {
        step: "shards build".to_owned(),
        message: "undefined constant".to_owned(),
    })]
    #[case::path(InstallerError::PathRegistration {
        target: "/home/user/.bashrc".to_owned(),
        reason: "read-only file system".to_owned(),
    })]
    fn clone_preserves_display_text(#[case] err: InstallerError) {
        assert_eq!(err.clone().to_string(), err.to_string());
    }

    #[test]
    fn missing_feed_credentials_names_flags() {
        let err = InstallerError::MissingFeedCredentials {
            name: "rbxcs".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rbxcs"));
        assert!(msg.contains("--feed-token"));
    }
}
