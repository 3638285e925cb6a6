//! Build orchestration for a checked-out product.
//!
//! Building is three fail-fast steps run in the checkout: register a private
//! package feed when the product needs one, install dependencies, and
//! compile in release mode.

use crate::error::{InstallerError, Result};
use crate::platform::Platform;
use crate::process::{CommandExecutor, CommandSpec};
use camino::Utf8Path;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A NuGet package source the build restores packages from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSourceSpec {
    /// Source name passed to `-n`, e.g. `rbxcs`.
    pub name: String,
    /// Feed index URL.
    pub url: String,
}

/// Username and token for an authenticated package feed.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedCredentials {
    /// Feed account name.
    pub username: String,
    /// Personal access token.
    pub token: String,
}

impl fmt::Debug for FeedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Dependency and compile commands for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Package source registered before dependencies are installed.
    #[serde(default)]
    pub package_source: Option<PackageSourceSpec>,
    /// Installs the project's dependencies.
    pub dependencies: CommandSpec,
    /// Compiles the project in release mode.
    pub build: CommandSpec,
}

/// Whether [`Builder::add_package_source`] changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// The plan has no package source.
    NotRequired,
    /// A source with the same name and URL was already configured.
    AlreadyConfigured,
    /// The source was added.
    Added,
}

/// Runs a [`BuildPlan`] in a working directory.
pub struct Builder<'a> {
    executor: &'a dyn CommandExecutor,
    plan: &'a BuildPlan,
    work_dir: &'a Utf8Path,
    platform: Platform,
}

impl<'a> Builder<'a> {
    /// Creates a builder for the checkout at `work_dir`.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        plan: &'a BuildPlan,
        work_dir: &'a Utf8Path,
        platform: Platform,
    ) -> Self {
        Self {
            executor,
            plan,
            work_dir,
            platform,
        }
    }

    /// Registers the plan's package source unless it is already present.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::MissingFeedCredentials`] when the source
    /// must be added and `credentials` is `None`, and
    /// [`InstallerError::Build`] when `dotnet nuget` fails.
    pub fn add_package_source(
        &self,
        credentials: Option<&FeedCredentials>,
    ) -> Result<SourceStatus> {
        let Some(source) = &self.plan.package_source else {
            return Ok(SourceStatus::NotRequired);
        };

        let listed = self
            .executor
            .run("dotnet", &["nuget", "list", "source"], self.work_dir)?;
        if listed.success()
            && listed.stdout.contains(&source.name)
            && listed.stdout.contains(&source.url)
        {
            info!("package source {} is already configured", source.name);
            return Ok(SourceStatus::AlreadyConfigured);
        }

        let credentials = credentials.ok_or_else(|| InstallerError::MissingFeedCredentials {
            name: source.name.clone(),
        })?;

        let mut args = vec![
            "nuget",
            "add",
            "source",
            source.url.as_str(),
            "-u",
            credentials.username.as_str(),
            "-p",
            credentials.token.as_str(),
            "-n",
            source.name.as_str(),
        ];
        if self.platform != Platform::Windows {
            // Encrypted credential storage is only available on Windows.
            args.push("--store-password-in-clear-text");
        }

        let result = self.executor.run("dotnet", &args, self.work_dir)?;
        if !result.success() {
            return Err(InstallerError::Build {
                step: format!("adding package source {}", source.name),
                message: result.failure_detail(),
            });
        }
        info!("added package source {}", source.name);
        Ok(SourceStatus::Added)
    }

    /// Installs the project's dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Build`] when the command fails.
    pub fn install_dependencies(&self) -> Result<()> {
        self.run_step(&self.plan.dependencies)
    }

    /// Compiles the project in release mode.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Build`] when the command fails.
    pub fn build_release(&self) -> Result<()> {
        self.run_step(&self.plan.build)
    }

    fn run_step(&self, command: &CommandSpec) -> Result<()> {
        info!("running `{command}` in {}", self.work_dir);
        let result = command.run(self.executor, self.work_dir)?;
        if result.success() {
            Ok(())
        } else {
            Err(InstallerError::Build {
                step: command.to_string(),
                message: result.failure_detail(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::ProductProfile;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, stdout_output};
    use rstest::rstest;

    const FEED: &str = "https://nuget.pkg.github.com/roblox-csharp/index.json";

    fn credentials() -> FeedCredentials {
        FeedCredentials {
            username: "ada".to_owned(),
            token: "ghp_secret".to_owned(),
        }
    }

    #[test]
    fn plan_without_source_skips_registration() {
        let plan = ProductProfile::cosmo().build;
        let executor = StubExecutor::default();

        let status = Builder::new(&executor, &plan, Utf8Path::new("/opt/cosmo"), Platform::Linux)
            .add_package_source(None)
            .expect("nothing to do");

        assert_eq!(status, SourceStatus::NotRequired);
        executor.assert_finished();
    }

    #[test]
    fn configured_source_is_not_added_again() {
        let plan = ProductProfile::roblox_cs().build;
        let listing = format!("Registered Sources:\n  1.  rbxcs [Enabled]\n      {FEED}\n");
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "dotnet",
            &["nuget", "list", "source"],
            Ok(stdout_output(&listing)),
        )]);

        let status = Builder::new(&executor, &plan, Utf8Path::new("/opt/rbxcs"), Platform::Linux)
            .add_package_source(None)
            .expect("already configured");

        assert_eq!(status, SourceStatus::AlreadyConfigured);
        executor.assert_finished();
    }

    #[test]
    fn missing_source_without_credentials_fails() {
        let plan = ProductProfile::roblox_cs().build;
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "dotnet",
            &["nuget", "list", "source"],
            Ok(stdout_output("No sources found.")),
        )]);

        let err = Builder::new(&executor, &plan, Utf8Path::new("/opt/rbxcs"), Platform::Linux)
            .add_package_source(None)
            .expect_err("credentials are required");

        assert!(matches!(err, InstallerError::MissingFeedCredentials { name } if name == "rbxcs"));
        executor.assert_finished();
    }

    #[rstest]
    #[case::linux(Platform::Linux, true)]
    #[case::windows(Platform::Windows, false)]
    fn missing_source_is_added_with_credentials(
        #[case] platform: Platform,
        #[case] clear_text: bool,
    ) {
        let plan = ProductProfile::roblox_cs().build;
        let mut add_args = vec![
            "nuget", "add", "source", FEED, "-u", "ada", "-p", "ghp_secret", "-n", "rbxcs",
        ];
        if clear_text {
            add_args.push("--store-password-in-clear-text");
        }
        let executor = StubExecutor::new(vec![
            ExpectedCall::new(
                "dotnet",
                &["nuget", "list", "source"],
                Ok(stdout_output("No sources found.")),
            ),
            ExpectedCall::ok("dotnet", &add_args),
        ]);

        let status = Builder::new(&executor, &plan, Utf8Path::new("/opt/rbxcs"), platform)
            .add_package_source(Some(&credentials()))
            .expect("source should be added");

        assert_eq!(status, SourceStatus::Added);
        executor.assert_finished();
    }

    #[test]
    fn dependency_and_build_steps_run_in_order() {
        let plan = ProductProfile::cosmo().build;
        let executor = StubExecutor::new(vec![
            ExpectedCall::ok("shards", &["install"]),
            ExpectedCall::ok("shards", &["build", "--release"]),
        ]);
        let builder = Builder::new(&executor, &plan, Utf8Path::new("/opt/cosmo"), Platform::MacOs);

        builder.install_dependencies().expect("deps");
        builder.build_release().expect("build");

        executor.assert_finished();
        assert!(
            executor
                .calls()
                .iter()
                .all(|(_, _, cwd)| cwd.as_str() == "/opt/cosmo")
        );
    }

    #[test]
    fn failing_build_reports_the_command() {
        let plan = ProductProfile::roblox_cs().build;
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "dotnet",
            &["build", "-c", "Release"],
            Ok(failure_output("error CS0246: type not found")),
        )]);

        let err = Builder::new(&executor, &plan, Utf8Path::new("/opt/rbxcs"), Platform::Linux)
            .build_release()
            .expect_err("build must fail");

        match err {
            InstallerError::Build { step, message } => {
                assert_eq!(step, "dotnet build -c Release");
                assert_eq!(message, "error CS0246: type not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn credentials_debug_hides_token() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("ada"));
        assert!(!rendered.contains("ghp_secret"));
    }
}
