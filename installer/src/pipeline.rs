//! Installation pipeline orchestration.
//!
//! An installation is a fixed sequence of [`Stage`]s. Each completed stage
//! advances progress by the same fraction. The first failure latches the
//! error flag, is reported once through the [`Reporter`], and turns every
//! remaining stage into a no-op.
//!
//! [`run_installation`] drives the sequence on the calling thread;
//! [`spawn_installation`] runs it on a background thread and hands back a
//! channel of [`InstallEvent`]s for the caller to render.

use crate::builder::{Builder, FeedCredentials};
use crate::dirs::{BaseDirs, SystemBaseDirs};
use crate::error::{InstallerError, Result};
use crate::events::{ChannelReporter, InstallEvent, Reporter};
use crate::git::{ReleaseTag, Repository, remove_presync_files};
use crate::path_registry::{MachinePath, PathTarget, register};
use crate::platform::Platform;
use crate::privileges::{PrivilegeProbe, SystemPrivileges, check_privileges};
use crate::process::{CommandExecutor, SystemCommandExecutor};
use crate::product::ProductProfile;
use crate::toolchain::{Provisioner, ToolchainStatus};
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use serde::Serialize;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

/// Title reported when the run fails.
pub const ERROR_TITLE: &str = "Error!";

/// The work stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Create the installation directory if it is missing.
    CreatingDirectory,
    /// Check the directory and pin it for every later command.
    SettingWorkingDirectory,
    /// Clone into an empty directory or pull into an existing checkout.
    SyncingRepository,
    /// Fetch release tags from the remote.
    FetchingTags,
    /// Find the newest release tag.
    ResolvingLatestTag,
    /// Check out the release tag.
    CheckingOutRelease,
    /// Install or update the build toolchain.
    ProvisioningToolchain,
    /// Register package sources and install dependencies.
    InstallingDependencies,
    /// Compile in release mode.
    Building,
    /// Put the binary directory on the PATH.
    RegisteringPath,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Self; 10] = [
        Self::CreatingDirectory,
        Self::SettingWorkingDirectory,
        Self::SyncingRepository,
        Self::FetchingTags,
        Self::ResolvingLatestTag,
        Self::CheckingOutRelease,
        Self::ProvisioningToolchain,
        Self::InstallingDependencies,
        Self::Building,
        Self::RegisteringPath,
    ];

    /// The title shown while the stage runs.
    #[must_use]
    pub fn title(self, product: &ProductProfile) -> String {
        match self {
            Self::CreatingDirectory => "Creating installation environment...".to_owned(),
            Self::SettingWorkingDirectory => "Changing environment directory...".to_owned(),
            Self::SyncingRepository => "Pulling repository...".to_owned(),
            Self::FetchingTags => "Fetching tags...".to_owned(),
            Self::ResolvingLatestTag => "Fetching latest release...".to_owned(),
            Self::CheckingOutRelease => "Checking out latest release...".to_owned(),
            Self::ProvisioningToolchain => {
                format!("Checking for {} installation...", product.toolchain.name)
            }
            Self::InstallingDependencies => "Installing dependencies...".to_owned(),
            Self::Building => "Compiling... (this may take a while)".to_owned(),
            Self::RegisteringPath => format!("Adding {} to PATH...", product.name),
        }
    }

    /// The prefix of the error message when the stage fails.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::CreatingDirectory => "Failed to create the installation directory",
            Self::SettingWorkingDirectory => "Failed to change to the installation directory",
            Self::SyncingRepository => "Failed to sync the repository",
            Self::FetchingTags => "Failed to fetch release tags",
            Self::ResolvingLatestTag => "Failed to get the latest release tag",
            Self::CheckingOutRelease => "Failed to check out the latest release",
            Self::ProvisioningToolchain => "Failed to provision the toolchain",
            Self::InstallingDependencies => "Failed to install dependencies",
            Self::Building => "Failed to build",
            Self::RegisteringPath => "Failed to add the binaries to PATH",
        }
    }
}

/// Mutable state of one run. Only the pipeline writes it.
#[derive(Debug, Clone)]
pub struct PipelineState {
    completed: usize,
    total: usize,
    errored: bool,
    finished: bool,
    latest_tag: Option<ReleaseTag>,
    restart_toolchain: Option<String>,
    error: Option<InstallerError>,
}

impl PipelineState {
    /// Creates the state for a run of `total` stages.
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            errored: false,
            finished: false,
            latest_tag: None,
            restart_toolchain: None,
            error: None,
        }
    }

    /// Completion percentage, rounded to the nearest integer.
    ///
    /// # Examples
    ///
    /// ```
    /// use source_installer::pipeline::PipelineState;
    ///
    /// let mut state = PipelineState::new(3);
    /// assert_eq!(state.percent(), 0);
    /// state.advance();
    /// assert_eq!(state.percent(), 33);
    /// state.advance();
    /// assert_eq!(state.percent(), 67);
    /// state.advance();
    /// assert_eq!(state.percent(), 100);
    /// ```
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let rounded = (self.completed * 100 + self.total / 2) / self.total;
        u8::try_from(rounded.min(100)).unwrap_or(100)
    }

    /// Marks one more stage as completed. Never exceeds the total.
    pub fn advance(&mut self) {
        if self.completed < self.total {
            self.completed += 1;
        }
    }

    /// Sets the error flag, returning `false` if it was already set.
    pub fn latch(&mut self, error: InstallerError) -> bool {
        if self.errored {
            return false;
        }
        self.errored = true;
        self.error = Some(error);
        true
    }

    /// Whether the run failed.
    #[must_use]
    pub const fn is_errored(&self) -> bool {
        self.errored
    }

    /// Whether the run stopped early without failing.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stages completed so far.
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    /// The resolved release tag, once known.
    #[must_use]
    pub const fn latest_tag(&self) -> Option<&ReleaseTag> {
        self.latest_tag.as_ref()
    }

    const fn is_halted(&self) -> bool {
        self.errored || self.finished
    }
}

/// Options that vary per run rather than per product.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Shell profile for the POSIX PATH export; defaults to `~/.bashrc`.
    pub shell_profile: Option<Utf8PathBuf>,
    /// Credentials for the product's package feed, if it has one.
    pub credentials: Option<FeedCredentials>,
}

/// What to install and where.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Absolute installation directory.
    pub target_dir: Utf8PathBuf,
    /// The product to install.
    pub product: ProductProfile,
    /// Per-run options.
    pub options: InstallOptions,
}

/// The host services a run uses.
pub struct Environment {
    /// Runs external commands.
    pub executor: Box<dyn CommandExecutor + Send>,
    /// Answers whether the process is elevated.
    pub privileges: Box<dyn PrivilegeProbe + Send>,
    /// Resolves the home directory for the default shell profile.
    pub base_dirs: Box<dyn BaseDirs + Send>,
    /// The Windows machine PATH; `None` elsewhere.
    pub machine_path: Option<Box<dyn MachinePath + Send>>,
    /// The platform being installed on.
    pub platform: Platform,
}

impl Environment {
    /// The real host.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::UnsupportedPlatform`] on an operating
    /// system the installer does not know.
    pub fn system() -> Result<Self> {
        let platform = Platform::current().ok_or_else(|| InstallerError::UnsupportedPlatform {
            toolchain: "the installer".to_owned(),
            platform: std::env::consts::OS.to_owned(),
        })?;
        Ok(Self {
            executor: Box::new(SystemCommandExecutor),
            privileges: Box::new(SystemPrivileges),
            base_dirs: Box::new(SystemBaseDirs),
            machine_path: system_machine_path(),
            platform,
        })
    }
}

#[cfg(windows)]
fn system_machine_path() -> Option<Box<dyn MachinePath + Send>> {
    Some(Box::new(crate::path_registry::RegistryMachinePath))
}

#[cfg(not(windows))]
fn system_machine_path() -> Option<Box<dyn MachinePath + Send>> {
    None
}

/// How a run without fatal errors ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Every stage completed.
    Installed {
        /// Product name.
        product: String,
        /// Release that was built.
        tag: String,
        /// Directory registered on the PATH.
        bin_dir: Utf8PathBuf,
    },
    /// The toolchain was just installed and is not visible yet; the user
    /// must restart the installer from a new session.
    RestartRequired {
        /// Product name.
        product: String,
        /// Toolchain that was installed.
        toolchain: String,
    },
}

impl PipelineOutcome {
    /// The final title for this outcome.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Installed { product, tag, .. } => {
                format!("Successfully installed {product} ({tag}).")
            }
            Self::RestartRequired { toolchain, .. } => format!(
                "{toolchain} has been successfully installed. Please restart the installer and try again; you may need to restart your shell, or even your machine."
            ),
        }
    }
}

/// Everything the stages share during one run.
pub struct PipelineContext<'a> {
    request: &'a InstallRequest,
    env: &'a Environment,
    reporter: &'a dyn Reporter,
    state: PipelineState,
    work_dir: Option<Utf8PathBuf>,
}

impl<'a> PipelineContext<'a> {
    /// Creates the context for a fresh run.
    #[must_use]
    pub fn new(
        request: &'a InstallRequest,
        env: &'a Environment,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            request,
            env,
            reporter,
            state: PipelineState::new(Stage::ALL.len()),
            work_dir: None,
        }
    }

    /// The run's state.
    #[must_use]
    pub const fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Fails before any stage when the run cannot start at all.
    pub fn preflight(&mut self) {
        if !self.request.target_dir.is_absolute() {
            self.fail(
                "Cannot install",
                InstallerError::TargetNotAbsolute {
                    path: self.request.target_dir.clone(),
                },
            );
            return;
        }
        if let Err(err) = check_privileges(self.env.platform, self.env.privileges.as_ref()) {
            self.fail("Cannot install", err);
        }
    }

    /// Runs one stage unless the run has already failed or finished.
    pub fn execute(&mut self, stage: Stage) {
        if self.state.is_halted() {
            return;
        }
        info!("stage {stage:?}");
        self.reporter.title(&stage.title(&self.request.product));
        match self.perform(stage) {
            Ok(()) => {
                self.state.advance();
                self.reporter.progress(self.state.percent());
            }
            Err(err) => self.fail(stage.description(), err),
        }
    }

    /// Latches the error and reports it. Later calls are ignored.
    pub fn fail(&mut self, description: &str, err: InstallerError) {
        let message = format!("{description}: {err}");
        if self.state.latch(err) {
            log::error!("{message}");
            self.reporter.title(ERROR_TITLE);
            self.reporter.error(&message);
        }
    }

    /// Ends the run, reporting the final title on success.
    ///
    /// # Errors
    ///
    /// Returns the latched error when the run failed.
    pub fn finish(self) -> Result<PipelineOutcome> {
        if let Some(err) = self.state.error {
            return Err(err);
        }

        let product = &self.request.product;
        let outcome = if let Some(toolchain) = self.state.restart_toolchain {
            PipelineOutcome::RestartRequired {
                product: product.name.clone(),
                toolchain,
            }
        } else {
            let tag = self
                .state
                .latest_tag
                .ok_or_else(|| InstallerError::NoReleaseTags {
                    branch: product.default_branch.clone(),
                })?;
            PipelineOutcome::Installed {
                product: product.name.clone(),
                tag: tag.to_string(),
                bin_dir: product.bin_dir(&self.request.target_dir),
            }
        };
        self.reporter.title(&outcome.title());
        Ok(outcome)
    }

    fn perform(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::CreatingDirectory => self.create_directory(),
            Stage::SettingWorkingDirectory => self.pin_working_directory(),
            Stage::SyncingRepository => self.sync_repository(),
            Stage::FetchingTags => self.repository().and_then(|repo| repo.fetch_tags()),
            Stage::ResolvingLatestTag => self.resolve_latest_tag(),
            Stage::CheckingOutRelease => self.check_out_release(),
            Stage::ProvisioningToolchain => self.provision_toolchain(),
            Stage::InstallingDependencies => self.install_dependencies(),
            Stage::Building => self.builder().and_then(|builder| builder.build_release()),
            Stage::RegisteringPath => self.register_path(),
        }
    }

    fn create_directory(&self) -> Result<()> {
        let target = &self.request.target_dir;
        if target.is_dir() {
            info!("{target} exists, skipping creation");
            return Ok(());
        }
        std::fs::create_dir_all(target).map_err(|source| InstallerError::CreateDirectory {
            path: target.clone(),
            source,
        })
    }

    fn pin_working_directory(&mut self) -> Result<()> {
        let target = &self.request.target_dir;
        let to_error = |reason: String| InstallerError::WorkingDirectory {
            path: target.clone(),
            reason,
        };

        let metadata = std::fs::metadata(target).map_err(|err| to_error(err.to_string()))?;
        if !metadata.is_dir() {
            return Err(to_error("not a directory".to_owned()));
        }
        std::fs::read_dir(target).map_err(|err| to_error(err.to_string()))?;

        self.work_dir = Some(target.clone());
        Ok(())
    }

    fn work_dir(&self) -> Result<&Utf8Path> {
        self.work_dir
            .as_deref()
            .ok_or_else(|| InstallerError::WorkingDirectory {
                path: self.request.target_dir.clone(),
                reason: "working directory was not set".to_owned(),
            })
    }

    fn repository(&self) -> Result<Repository<'_>> {
        Ok(Repository::new(self.env.executor.as_ref(), self.work_dir()?))
    }

    fn builder(&self) -> Result<Builder<'_>> {
        Ok(Builder::new(
            self.env.executor.as_ref(),
            &self.request.product.build,
            self.work_dir()?,
            self.env.platform,
        ))
    }

    fn sync_repository(&self) -> Result<()> {
        let product = &self.request.product;
        let repo = self.repository()?;
        repo.ensure_git_available()?;
        remove_presync_files(self.work_dir()?, &product.presync_cleanup)?;
        let outcome = repo.clone_or_pull(&product.repository_url, &product.default_branch)?;
        info!("repository sync: {outcome:?}");
        Ok(())
    }

    fn resolve_latest_tag(&mut self) -> Result<()> {
        let tag = self
            .repository()?
            .latest_tag(&self.request.product.default_branch)?;
        info!("latest release is {tag}");
        self.state.latest_tag = Some(tag);
        Ok(())
    }

    fn check_out_release(&self) -> Result<()> {
        let tag = self
            .state
            .latest_tag
            .as_ref()
            .ok_or_else(|| InstallerError::NoReleaseTags {
                branch: self.request.product.default_branch.clone(),
            })?;
        self.repository()?.checkout(tag)
    }

    fn provision_toolchain(&mut self) -> Result<()> {
        let toolchain = &self.request.product.toolchain;
        let status = Provisioner::new(
            self.env.executor.as_ref(),
            toolchain,
            self.env.platform,
            self.work_dir()?,
        )
        .ensure()?;

        if status == ToolchainStatus::RestartRequired {
            info!("{} is installed but not yet visible", toolchain.name);
            self.state.finished = true;
            self.state.restart_toolchain = Some(toolchain.name.clone());
        }
        Ok(())
    }

    fn install_dependencies(&self) -> Result<()> {
        let builder = self.builder()?;
        builder.add_package_source(self.request.options.credentials.as_ref())?;
        builder.install_dependencies()
    }

    fn register_path(&self) -> Result<()> {
        let bin_dir = self.request.product.bin_dir(&self.request.target_dir);
        let outcome = if self.env.platform == Platform::Windows {
            let store =
                self.env
                    .machine_path
                    .as_deref()
                    .ok_or_else(|| InstallerError::PathRegistration {
                        target: "machine PATH".to_owned(),
                        reason: "no machine PATH store is available".to_owned(),
                    })?;
            register(&PathTarget::MachinePath(store), &bin_dir)?
        } else {
            let profile = match &self.request.options.shell_profile {
                Some(profile) => profile.clone(),
                None => self
                    .env
                    .base_dirs
                    .shell_profile()
                    .ok_or(InstallerError::DirectoryUnavailable {
                        what: "home directory",
                    })?,
            };
            register(&PathTarget::ShellProfile(&profile), &bin_dir)?
        };
        info!("PATH registration: {outcome:?}");
        Ok(())
    }
}

/// Runs the whole installation on the calling thread.
///
/// # Errors
///
/// Returns the first fatal error after it has been reported through
/// `reporter`.
pub fn run_installation(
    request: &InstallRequest,
    env: &Environment,
    reporter: &dyn Reporter,
) -> Result<PipelineOutcome> {
    let mut context = PipelineContext::new(request, env, reporter);
    context.preflight();
    for stage in Stage::ALL {
        context.execute(stage);
    }
    context.finish()
}

/// A run on a background thread.
pub struct InstallHandle {
    /// Events from the pipeline thread, ending when the run ends.
    pub events: Receiver<InstallEvent>,
    worker: JoinHandle<Result<PipelineOutcome>>,
}

impl InstallHandle {
    /// Waits for the pipeline thread and returns its result.
    ///
    /// # Errors
    ///
    /// Returns the run's error, or [`InstallerError::WorkerPanicked`].
    pub fn join(self) -> Result<PipelineOutcome> {
        self.worker
            .join()
            .map_err(|_| InstallerError::WorkerPanicked)?
    }
}

/// Starts the installation on a dedicated thread.
///
/// The thread sends every callback as an [`InstallEvent`], followed by
/// [`InstallEvent::Finished`] when the run did not fail.
///
/// # Errors
///
/// Returns [`InstallerError::Io`] if the thread cannot be spawned.
pub fn spawn_installation(request: InstallRequest, env: Environment) -> Result<InstallHandle> {
    let (sender, events) = mpsc::channel();
    let worker = thread::Builder::new()
        .name("installer".to_owned())
        .spawn(move || {
            let reporter = ChannelReporter::new(sender);
            let result = run_installation(&request, &env, &reporter);
            if let Ok(outcome) = &result {
                reporter.send(InstallEvent::Finished {
                    outcome: outcome.clone(),
                });
            }
            result
        })?;
    Ok(InstallHandle { events, worker })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
