//! Directory resolution abstraction for platform-specific paths.
//!
//! The installer needs the user's home directory (for the shell profile)
//! and a default installation root. Both are resolved through [`BaseDirs`]
//! so tests can point them at temporary directories.

use crate::platform::Platform;
use camino::Utf8PathBuf;

/// Shell profile the POSIX PATH export is appended to, relative to home.
pub const DEFAULT_SHELL_PROFILE: &str = ".bashrc";

/// Resolves per-user and per-platform directories.
pub trait BaseDirs {
    /// The user's home directory.
    fn home_dir(&self) -> Option<Utf8PathBuf>;

    /// The directory under which products are installed by default.
    ///
    /// - Windows: `%ProgramFiles%` (falling back to `C:\Program Files`)
    /// - Linux: the home directory
    /// - macOS: `/Applications`
    fn install_root(&self, platform: Platform) -> Option<Utf8PathBuf>;

    /// The shell profile that receives the PATH export on POSIX systems.
    fn shell_profile(&self) -> Option<Utf8PathBuf> {
        self.home_dir().map(|home| home.join(DEFAULT_SHELL_PROFILE))
    }
}

/// Resolves directories with `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<Utf8PathBuf> {
        directories_next::BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::try_from(dirs.home_dir().to_path_buf()).ok())
    }

    fn install_root(&self, platform: Platform) -> Option<Utf8PathBuf> {
        match platform {
            Platform::Windows => Some(
                std::env::var("ProgramFiles")
                    .map_or_else(|_| Utf8PathBuf::from(r"C:\Program Files"), Utf8PathBuf::from),
            ),
            Platform::Linux => self.home_dir(),
            Platform::MacOs => Some(Utf8PathBuf::from("/Applications")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHome(Utf8PathBuf);

    impl BaseDirs for FixedHome {
        fn home_dir(&self) -> Option<Utf8PathBuf> {
            Some(self.0.clone())
        }

        fn install_root(&self, _platform: Platform) -> Option<Utf8PathBuf> {
            self.home_dir()
        }
    }

    #[test]
    fn shell_profile_defaults_to_bashrc() {
        let dirs = FixedHome(Utf8PathBuf::from("/home/ada"));
        assert_eq!(
            dirs.shell_profile(),
            Some(Utf8PathBuf::from("/home/ada/.bashrc"))
        );
    }

    #[test]
    fn macos_install_root_is_applications() {
        assert_eq!(
            SystemBaseDirs.install_root(Platform::MacOs),
            Some(Utf8PathBuf::from("/Applications"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn linux_install_root_follows_home() {
        temp_env::with_var("HOME", Some("/tmp/installer-home"), || {
            assert_eq!(
                SystemBaseDirs.install_root(Platform::Linux),
                Some(Utf8PathBuf::from("/tmp/installer-home"))
            );
        });
    }
}
