//! Operating system families the installer distinguishes between.

use std::fmt;

/// Operating system family with its own toolchain and PATH strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Microsoft Windows.
    Windows,
    /// Linux distributions.
    Linux,
    /// Apple macOS.
    MacOs,
}

impl Platform {
    /// Returns the platform the installer was compiled for, if supported.
    #[must_use]
    pub const fn current() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else {
            None
        }
    }

    /// Whether installation must run with administrator rights.
    ///
    /// Windows installs write the machine-scope PATH, which needs elevation.
    #[must_use]
    pub const fn requires_elevation(self) -> bool {
        matches!(self, Self::Windows)
    }

    /// Separator between entries of the `PATH` variable.
    #[must_use]
    pub const fn path_separator(self) -> char {
        match self {
            Self::Windows => ';',
            Self::Linux | Self::MacOs => ':',
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Windows => "Windows",
            Self::Linux => "Linux",
            Self::MacOs => "macOS",
        };
        f.write_str(name)
    }
}
