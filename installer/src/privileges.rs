//! Elevated-privilege detection.
//!
//! Windows installs need administrator rights to write the machine PATH, so
//! the pipeline refuses to start there unless the process is elevated. On
//! POSIX systems a root run is allowed but warned about, since the checkout
//! and build output would end up owned by root.

use crate::error::{InstallerError, Result};
use crate::platform::Platform;
use log::warn;

/// Reports whether the current process runs with elevated privileges.
pub trait PrivilegeProbe {
    /// Returns `true` for an administrator (Windows) or root (Unix) process.
    fn is_elevated(&self) -> bool;
}

/// Queries the operating system for the current process token.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPrivileges;

impl PrivilegeProbe for SystemPrivileges {
    #[cfg(windows)]
    fn is_elevated(&self) -> bool {
        // SAFETY: IsUserAnAdmin takes no arguments and only inspects the
        // calling thread's token.
        unsafe { windows_sys::Win32::UI::Shell::IsUserAnAdmin() != 0 }
    }

    #[cfg(unix)]
    fn is_elevated(&self) -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(any(unix, windows)))]
    fn is_elevated(&self) -> bool {
        false
    }
}

/// Fails when `platform` requires elevation and the process lacks it.
///
/// A root run on a platform without that requirement is logged at warn.
///
/// # Errors
///
/// Returns [`InstallerError::InsufficientPrivileges`] in that case.
pub fn check_privileges(platform: Platform, probe: &dyn PrivilegeProbe) -> Result<()> {
    let elevated = probe.is_elevated();
    if platform.requires_elevation() {
        if !elevated {
            return Err(InstallerError::InsufficientPrivileges);
        }
    } else if elevated {
        warn!("running as root; files in the installation directory will be owned by root");
    }
    Ok(())
}
