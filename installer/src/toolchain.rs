//! Toolchain detection and provisioning.
//!
//! A product needs an external compiler toolchain (Crystal, the .NET SDK)
//! before it can be built. [`Provisioner`] probes for it, installs it through
//! the platform's package manager when absent, and makes a best-effort update
//! attempt when it is already present.

use crate::error::{InstallerError, Result};
use crate::platform::Platform;
use crate::process::{CommandExecutor, CommandSpec};
use camino::Utf8Path;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Describes a toolchain and how to obtain it on each platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainSpec {
    /// Human-readable toolchain name, e.g. `Crystal`.
    pub name: String,
    /// Version command whose success means the toolchain is installed.
    pub probe: CommandSpec,
    /// Windows strategy.
    #[serde(default)]
    pub windows: Option<PlatformToolchain>,
    /// Linux strategy.
    #[serde(default)]
    pub linux: Option<PlatformToolchain>,
    /// macOS strategy.
    #[serde(default)]
    pub macos: Option<PlatformToolchain>,
}

/// Install and update commands for a single platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformToolchain {
    /// Package manager the install steps rely on.
    pub manager: PackageManager,
    /// Ordered install steps.
    pub install: Vec<InstallStep>,
    /// Commands run when the toolchain is already present. Failures are
    /// ignored.
    #[serde(default)]
    pub update: Vec<CommandSpec>,
}

/// A package manager and how to detect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManager {
    /// Package manager name, e.g. `scoop`.
    pub name: String,
    /// Command whose success means the package manager is available.
    pub probe: CommandSpec,
    /// Guidance shown when the package manager is missing.
    pub missing_hint: String,
}

/// One install command, optionally skipped when a probe already succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallStep {
    /// What the step installs, used in titles and error messages.
    pub description: String,
    /// The install command.
    pub command: CommandSpec,
    /// Skip the step when this command succeeds.
    #[serde(default)]
    pub unless: Option<CommandSpec>,
}

/// Result of [`Provisioner::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainStatus {
    /// The toolchain was already installed.
    AlreadyInstalled,
    /// The toolchain was installed and is usable from this process.
    Installed,
    /// The toolchain was installed but is not visible until the user starts
    /// a new session.
    RestartRequired,
}

impl ToolchainSpec {
    /// Returns the strategy for `platform`, if one is defined.
    #[must_use]
    pub const fn for_platform(&self, platform: Platform) -> Option<&PlatformToolchain> {
        match platform {
            Platform::Windows => self.windows.as_ref(),
            Platform::Linux => self.linux.as_ref(),
            Platform::MacOs => self.macos.as_ref(),
        }
    }
}

/// Probes, installs, and updates a toolchain.
pub struct Provisioner<'a> {
    executor: &'a dyn CommandExecutor,
    spec: &'a ToolchainSpec,
    platform: Platform,
    cwd: &'a Utf8Path,
}

impl<'a> Provisioner<'a> {
    /// Creates a provisioner running commands in `cwd`.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        spec: &'a ToolchainSpec,
        platform: Platform,
        cwd: &'a Utf8Path,
    ) -> Self {
        Self {
            executor,
            spec,
            platform,
            cwd,
        }
    }

    /// Returns `true` when the toolchain's version probe exits with 0.
    ///
    /// A missing binary counts as "not installed".
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.spec.probe.succeeds(self.executor, self.cwd)
    }

    /// Installs the toolchain with the platform package manager.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::UnsupportedPlatform`] without a strategy,
    /// [`InstallerError::PackageManagerMissing`] when the package manager
    /// probe fails, and [`InstallerError::ToolchainInstall`] when a step
    /// fails.
    pub fn install(&self) -> Result<()> {
        let strategy = self.strategy()?;
        let manager = &strategy.manager;

        if !manager.probe.succeeds(self.executor, self.cwd) {
            return Err(InstallerError::PackageManagerMissing {
                manager: manager.name.clone(),
                hint: manager.missing_hint.clone(),
            });
        }

        for step in &strategy.install {
            self.run_install_step(step)?;
        }

        Ok(())
    }

    /// Runs the platform's update commands, logging and ignoring failures.
    pub fn update(&self) {
        let Some(strategy) = self.spec.for_platform(self.platform) else {
            return;
        };

        for command in &strategy.update {
            match command.run(self.executor, self.cwd) {
                Ok(result) if result.success() => info!("ran `{command}`"),
                Ok(result) => warn!(
                    "ignoring failed update `{command}`: {}",
                    result.failure_detail()
                ),
                Err(err) => warn!("ignoring failed update `{command}`: {err}"),
            }
        }
    }

    /// Makes sure the toolchain is present.
    ///
    /// Updates an existing installation, otherwise installs it and re-probes
    /// to find out whether the current process can already see it.
    ///
    /// # Errors
    ///
    /// Propagates [`Provisioner::install`] failures.
    pub fn ensure(&self) -> Result<ToolchainStatus> {
        if self.is_installed() {
            info!("{} is already installed", self.spec.name);
            self.update();
            return Ok(ToolchainStatus::AlreadyInstalled);
        }

        info!("installing {}", self.spec.name);
        self.install()?;

        if self.is_installed() {
            Ok(ToolchainStatus::Installed)
        } else {
            Ok(ToolchainStatus::RestartRequired)
        }
    }

    fn strategy(&self) -> Result<&'a PlatformToolchain> {
        self.spec
            .for_platform(self.platform)
            .ok_or_else(|| InstallerError::UnsupportedPlatform {
                toolchain: self.spec.name.clone(),
                platform: self.platform.to_string(),
            })
    }

    fn run_install_step(&self, step: &InstallStep) -> Result<()> {
        if step
            .unless
            .as_ref()
            .is_some_and(|probe| probe.succeeds(self.executor, self.cwd))
        {
            info!("skipping {}: already present", step.description);
            return Ok(());
        }

        let result = step.command.run(self.executor, self.cwd).map_err(|err| {
            InstallerError::ToolchainInstall {
                tool: step.description.clone(),
                message: err.to_string(),
            }
        })?;

        if result.success() {
            Ok(())
        } else {
            Err(InstallerError::ToolchainInstall {
                tool: step.description.clone(),
                message: result.failure_detail(),
            })
        }
    }
}
