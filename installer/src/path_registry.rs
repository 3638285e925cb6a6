//! Registration of a product's binary directory on the PATH.
//!
//! POSIX systems get an `export` line appended to the user's shell profile.
//! Windows gets the directory appended to the machine-scope `Path` value,
//! followed by a broadcast so running shells pick up the change. Both are
//! idempotent: an entry that is already present is left alone.

use crate::error::{InstallerError, Result};
use crate::platform::Platform;
use camino::Utf8Path;
use log::info;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};

/// Whether a registration changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The directory was added.
    Registered,
    /// The directory was already on the PATH.
    AlreadyPresent,
}

/// Where the binary directory is persisted.
pub enum PathTarget<'a> {
    /// A POSIX shell profile such as `~/.bashrc`.
    ShellProfile(&'a Utf8Path),
    /// The Windows machine-scope `Path` value.
    MachinePath(&'a dyn MachinePath),
}

/// Read and write access to the machine-scope `Path` value.
pub trait MachinePath {
    /// Returns the current value, or an empty string when it is unset.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::PathRegistration`] if the value cannot be
    /// read.
    fn read(&self) -> Result<String>;

    /// Persists `value` and notifies running processes.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::PathRegistration`] if the value cannot be
    /// written.
    fn write(&self, value: &str) -> Result<()>;
}

/// Registers `bin_dir` with `target`.
///
/// # Errors
///
/// Returns [`InstallerError::PathRegistration`] when the target cannot be
/// read or updated.
pub fn register(target: &PathTarget<'_>, bin_dir: &Utf8Path) -> Result<RegistrationOutcome> {
    match target {
        PathTarget::ShellProfile(profile) => register_in_profile(profile, bin_dir),
        PathTarget::MachinePath(store) => register_in_machine_path(*store, bin_dir),
    }
}

/// The profile line that prepends `bin_dir` to `PATH`.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use source_installer::path_registry::export_line;
///
/// assert_eq!(
///     export_line(Utf8Path::new("/home/ada/.cosmo/bin")),
///     r#"export PATH="/home/ada/.cosmo/bin:$PATH""#
/// );
/// ```
#[must_use]
pub fn export_line(bin_dir: &Utf8Path) -> String {
    format!("export PATH=\"{bin_dir}:$PATH\"")
}

/// Appends the export line for `bin_dir` to `profile`, creating the file if
/// needed. Skips the append when the exact line is already there.
///
/// # Errors
///
/// Returns [`InstallerError::PathRegistration`] if the profile cannot be
/// read, opened, or written.
pub fn register_in_profile(profile: &Utf8Path, bin_dir: &Utf8Path) -> Result<RegistrationOutcome> {
    let line = export_line(bin_dir);
    let to_error = |err: std::io::Error| InstallerError::PathRegistration {
        target: profile.to_string(),
        reason: err.to_string(),
    };

    if profile_contains(profile, &line).map_err(to_error)? {
        info!("{profile} already exports {bin_dir}");
        return Ok(RegistrationOutcome::AlreadyPresent);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(profile)
        .map_err(to_error)?;
    writeln!(file, "{line}").map_err(to_error)?;
    file.flush().map_err(to_error)?;

    info!("added {bin_dir} to {profile}");
    Ok(RegistrationOutcome::Registered)
}

fn profile_contains(profile: &Utf8Path, line: &str) -> std::io::Result<bool> {
    let file = match std::fs::File::open(profile) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    for existing in BufReader::new(file).lines() {
        if existing?.trim_end() == line {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Returns `current` with `entry` appended, or `None` if `entry` is already
/// one of its `separator`-delimited members.
///
/// # Examples
///
/// ```
/// use source_installer::path_registry::append_path_entry;
///
/// assert_eq!(
///     append_path_entry(r"C:\Windows", r"C:\cosmo\bin", ';'),
///     Some(r"C:\Windows;C:\cosmo\bin".to_owned())
/// );
/// assert_eq!(append_path_entry(r"C:\Windows;C:\cosmo\bin", r"C:\cosmo\bin", ';'), None);
/// ```
#[must_use]
pub fn append_path_entry(current: &str, entry: &str, separator: char) -> Option<String> {
    if current.split(separator).any(|existing| existing == entry) {
        return None;
    }
    if current.is_empty() {
        return Some(entry.to_owned());
    }
    if current.ends_with(separator) {
        return Some(format!("{current}{entry}"));
    }
    Some(format!("{current}{separator}{entry}"))
}

/// Appends `bin_dir` to the machine `Path` unless it is already a member.
///
/// # Errors
///
/// Propagates read and write failures from `store`.
pub fn register_in_machine_path(
    store: &dyn MachinePath,
    bin_dir: &Utf8Path,
) -> Result<RegistrationOutcome> {
    let current = store.read()?;
    match append_path_entry(&current, bin_dir.as_str(), Platform::Windows.path_separator()) {
        None => {
            info!("machine PATH already contains {bin_dir}");
            Ok(RegistrationOutcome::AlreadyPresent)
        }
        Some(updated) => {
            store.write(&updated)?;
            info!("added {bin_dir} to the machine PATH");
            Ok(RegistrationOutcome::Registered)
        }
    }
}

#[cfg(windows)]
pub use registry::RegistryMachinePath;

#[cfg(windows)]
mod registry {
    use super::MachinePath;
    use crate::error::{InstallerError, Result};
    use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
    use windows_sys::Win32::System::Registry::{
        HKEY, HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_EXPAND_SZ, RegCloseKey,
        RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        HWND_BROADCAST, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_SETTINGCHANGE,
    };

    const ENVIRONMENT_KEY: &str = r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";
    const TARGET: &str = "machine PATH";

    fn wide(text: &str) -> Vec<u16> {
        text.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn failure(reason: impl Into<String>) -> InstallerError {
        InstallerError::PathRegistration {
            target: TARGET.to_owned(),
            reason: reason.into(),
        }
    }

    fn os_failure(what: &str, code: u32) -> InstallerError {
        let err = std::io::Error::from_raw_os_error(code as i32);
        failure(format!("{what}: {err} (run as administrator?)"))
    }

    /// Closes the key when dropped.
    struct Key(HKEY);

    impl Key {
        fn open(access: u32) -> Result<Self> {
            let subkey = wide(ENVIRONMENT_KEY);
            let mut handle: HKEY = std::ptr::null_mut();
            // SAFETY: `subkey` is NUL-terminated and outlives the call;
            // `handle` is a valid out pointer.
            let status = unsafe {
                RegOpenKeyExW(HKEY_LOCAL_MACHINE, subkey.as_ptr(), 0, access, &raw mut handle)
            };
            if status != ERROR_SUCCESS {
                return Err(os_failure("opening the environment key", status));
            }
            Ok(Self(handle))
        }
    }

    impl Drop for Key {
        fn drop(&mut self) {
            // SAFETY: the handle came from a successful RegOpenKeyExW.
            unsafe {
                RegCloseKey(self.0);
            }
        }
    }

    /// The `Path` value under `HKLM\...\Session Manager\Environment`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RegistryMachinePath;

    impl MachinePath for RegistryMachinePath {
        fn read(&self) -> Result<String> {
            let key = Key::open(KEY_QUERY_VALUE)?;
            let name = wide("Path");

            let mut size: u32 = 0;
            // SAFETY: a null data pointer asks only for the size.
            let status = unsafe {
                RegQueryValueExW(
                    key.0,
                    name.as_ptr(),
                    std::ptr::null(),
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    &raw mut size,
                )
            };
            if status == ERROR_FILE_NOT_FOUND {
                return Ok(String::new());
            }
            if status != ERROR_SUCCESS {
                return Err(os_failure("reading Path", status));
            }

            let mut buffer = vec![0u16; (size as usize).div_ceil(2)];
            // SAFETY: `buffer` holds at least `size` bytes.
            let status = unsafe {
                RegQueryValueExW(
                    key.0,
                    name.as_ptr(),
                    std::ptr::null(),
                    std::ptr::null_mut(),
                    buffer.as_mut_ptr().cast(),
                    &raw mut size,
                )
            };
            if status != ERROR_SUCCESS {
                return Err(os_failure("reading Path", status));
            }

            buffer.truncate((size as usize) / 2);
            while buffer.last() == Some(&0) {
                buffer.pop();
            }
            String::from_utf16(&buffer).map_err(|err| failure(err.to_string()))
        }

        fn write(&self, value: &str) -> Result<()> {
            let key = Key::open(KEY_SET_VALUE)?;
            let name = wide("Path");
            let data = wide(value);
            let byte_len = u32::try_from(data.len() * 2)
                .map_err(|_| failure("PATH value is too long"))?;

            // SAFETY: `data` is NUL-terminated UTF-16 of `byte_len` bytes.
            let status = unsafe {
                RegSetValueExW(
                    key.0,
                    name.as_ptr(),
                    0,
                    REG_EXPAND_SZ,
                    data.as_ptr().cast(),
                    byte_len,
                )
            };
            if status != ERROR_SUCCESS {
                return Err(os_failure("writing Path", status));
            }
            drop(key);

            broadcast_environment_change();
            Ok(())
        }
    }

    fn broadcast_environment_change() {
        let area = wide("Environment");
        let mut result: usize = 0;
        // SAFETY: `area` is NUL-terminated and outlives the call; the
        // timeout bounds how long unresponsive windows can block us.
        unsafe {
            SendMessageTimeoutW(
                HWND_BROADCAST,
                WM_SETTINGCHANGE,
                0,
                area.as_ptr() as isize,
                SMTO_ABORTIFHUNG,
                5000,
                &raw mut result,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryMachinePath;
    use camino::Utf8PathBuf;
    use rstest::rstest;

    fn scratch_profile() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let profile = Utf8PathBuf::try_from(dir.path().join(".bashrc")).expect("utf8 path");
        (dir, profile)
    }

    #[rstest]
    #[case::empty("", Some("C:\\bin"))]
    #[case::append("C:\\Windows", Some("C:\\Windows;C:\\bin"))]
    #[case::trailing_separator("C:\\Windows;", Some("C:\\Windows;C:\\bin"))]
    #[case::present("C:\\Windows;C:\\bin;C:\\Tools", None)]
    #[case::prefix_only("C:\\bin2", Some("C:\\bin2;C:\\bin"))]
    fn append_path_entry_cases(#[case] current: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            append_path_entry(current, "C:\\bin", ';'),
            expected.map(str::to_owned)
        );
    }

    #[test]
    fn profile_is_created_and_appended() {
        let (_guard, profile) = scratch_profile();
        let bin = Utf8Path::new("/home/ada/.cosmo/bin");

        let outcome = register_in_profile(&profile, bin).expect("append should succeed");

        assert_eq!(outcome, RegistrationOutcome::Registered);
        let contents = std::fs::read_to_string(&profile).expect("read profile");
        assert_eq!(contents, "export PATH=\"/home/ada/.cosmo/bin:$PATH\"\n");
    }

    #[test]
    fn profile_registration_is_idempotent() {
        let (_guard, profile) = scratch_profile();
        std::fs::write(&profile, "alias ll='ls -l'\n").expect("seed profile");
        let bin = Utf8Path::new("/opt/roblox-cs/bin");

        register_in_profile(&profile, bin).expect("first append");
        let second = register_in_profile(&profile, bin).expect("second append");

        assert_eq!(second, RegistrationOutcome::AlreadyPresent);
        let contents = std::fs::read_to_string(&profile).expect("read profile");
        assert_eq!(contents.matches("roblox-cs/bin").count(), 1);
        assert!(contents.starts_with("alias ll='ls -l'\n"));
    }

    #[test]
    fn unwritable_profile_is_fatal() {
        let (guard, _) = scratch_profile();
        let profile = Utf8PathBuf::try_from(guard.path().join("missing").join(".bashrc"))
            .expect("utf8 path");

        let err = register_in_profile(&profile, Utf8Path::new("/opt/cosmo/bin"))
            .expect_err("missing parent must fail");

        assert!(matches!(err, InstallerError::PathRegistration { .. }));
    }

    #[test]
    fn machine_path_registration_is_idempotent() {
        let store = MemoryMachinePath::new(r"C:\Windows;C:\Windows\System32");
        let bin = Utf8Path::new(r"C:\Program Files\roblox-cs\bin");

        let first = register_in_machine_path(&store, bin).expect("first");
        let second = register_in_machine_path(&store, bin).expect("second");

        assert_eq!(first, RegistrationOutcome::Registered);
        assert_eq!(second, RegistrationOutcome::AlreadyPresent);
        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.value(),
            r"C:\Windows;C:\Windows\System32;C:\Program Files\roblox-cs\bin"
        );
    }

    #[test]
    fn register_dispatches_on_target() {
        let store = MemoryMachinePath::new("");
        let outcome = register(
            &PathTarget::MachinePath(&store),
            Utf8Path::new(r"C:\cosmo\bin"),
        )
        .expect("register");

        assert_eq!(outcome, RegistrationOutcome::Registered);
        assert_eq!(store.value(), r"C:\cosmo\bin");
    }
}
