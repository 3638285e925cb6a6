//! CLI argument definitions for the source installer.
//!
//! This module defines the command-line interface using clap and turns the
//! parsed arguments into an [`InstallRequest`]. It is separated from the
//! main entrypoint to keep the binary small and focused on orchestration.

use crate::builder::FeedCredentials;
use crate::dirs::BaseDirs;
use crate::error::{InstallerError, Result};
use crate::pipeline::{InstallOptions, InstallRequest};
use crate::platform::Platform;
use crate::product::{Product, ProductProfile};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};

/// Environment variable holding the package feed token.
pub const FEED_TOKEN_ENV: &str = "SOURCE_INSTALLER_FEED_TOKEN";

/// Build Cosmo or roblox-cs from their latest release tags.
#[derive(Parser, Debug)]
#[command(name = "source-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build Cosmo or roblox-cs from their latest release tags.\n\n",
    "The installer clones (or updates) the product's repository, checks out ",
    "the newest release tag, makes sure the required toolchain is installed, ",
    "builds the project in release mode, and adds its bin directory to your ",
    "PATH.\n\n",
    "On Windows the installer must run from an elevated prompt, because the ",
    "machine-wide PATH is updated.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Install Cosmo into the default location:\n",
    "    $ source-installer\n\n",
    "  Install roblox-cs with feed credentials:\n",
    "    $ SOURCE_INSTALLER_FEED_TOKEN=ghp_... source-installer -p roblox-cs --feed-username ada\n\n",
    "  Install into a custom directory and preview the plan:\n",
    "    $ source-installer --path /opt/cosmo --dry-run\n\n",
    "  List the built-in products:\n",
    "    $ source-installer products",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Install arguments (used when no subcommand is given).
    #[command(flatten)]
    pub install: InstallArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Install a product (default when no subcommand given).
    Install(InstallArgs),

    /// List the built-in products.
    Products(ProductsArgs),
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone)]
pub struct InstallArgs {
    /// Product to install.
    #[arg(short, long, value_enum, default_value_t = Product::Cosmo)]
    pub product: Product,

    /// Installation directory [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub path: Option<Utf8PathBuf>,

    /// Load the product profile from a TOML file instead.
    #[arg(long, value_name = "FILE")]
    pub profile: Option<Utf8PathBuf>,

    /// Shell profile that receives the PATH export [default: ~/.bashrc].
    #[arg(long, value_name = "FILE")]
    pub shell_profile: Option<Utf8PathBuf>,

    /// Username for the product's package feed.
    #[arg(long, value_name = "NAME", requires = "feed_token")]
    pub feed_username: Option<String>,

    /// Token for the product's package feed.
    #[arg(long, value_name = "TOKEN", env = FEED_TOKEN_ENV, hide_env_values = true)]
    pub feed_token: Option<String>,

    /// Emit events as JSON lines on stdout.
    #[arg(long)]
    pub json: bool,

    /// Show the installation plan and exit without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Arguments for the products command.
#[derive(Parser, Debug, Clone, Default)]
pub struct ProductsArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl Default for InstallArgs {
    /// Installs Cosmo into the default location with every flag off.
    fn default() -> Self {
        Self {
            product: Product::Cosmo,
            path: None,
            profile: None,
            shell_profile: None,
            feed_username: None,
            feed_token: None,
            json: false,
            dry_run: false,
            verbosity: 0,
            quiet: false,
        }
    }
}

impl InstallArgs {
    /// The selected profile: the `--profile` file when given, otherwise the
    /// built-in profile for `--product`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidProfile`] if the file is unusable.
    pub fn resolve_profile(&self) -> Result<ProductProfile> {
        match &self.profile {
            Some(path) => ProductProfile::from_toml_file(path),
            None => Ok(self.product.profile()),
        }
    }

    /// Feed credentials, when both parts were supplied.
    ///
    /// # Examples
    ///
    /// ```
    /// use source_installer::cli::InstallArgs;
    ///
    /// let args = InstallArgs {
    ///     feed_username: Some("ada".to_owned()),
    ///     feed_token: Some("ghp_token".to_owned()),
    ///     ..InstallArgs::default()
    /// };
    /// assert_eq!(args.credentials().map(|c| c.username), Some("ada".to_owned()));
    ///
    /// assert!(InstallArgs::default().credentials().is_none());
    /// ```
    #[must_use]
    pub fn credentials(&self) -> Option<FeedCredentials> {
        match (&self.feed_username, &self.feed_token) {
            (Some(username), Some(token)) => Some(FeedCredentials {
                username: username.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }

    /// The installation directory.
    ///
    /// An explicit relative `--path` is resolved against `cwd`; without one,
    /// the product's directory name is joined onto the platform install
    /// root.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::DirectoryUnavailable`] when no install root
    /// can be determined.
    pub fn resolve_target(
        &self,
        profile: &ProductProfile,
        dirs: &dyn BaseDirs,
        platform: Platform,
        cwd: &Utf8Path,
    ) -> Result<Utf8PathBuf> {
        match &self.path {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) => Ok(cwd.join(path)),
            None => dirs
                .install_root(platform)
                .map(|root| root.join(&profile.directory_name))
                .ok_or(InstallerError::DirectoryUnavailable {
                    what: "install root",
                }),
        }
    }

    /// Builds the pipeline request from the parsed arguments.
    ///
    /// # Errors
    ///
    /// Propagates profile and directory resolution failures.
    pub fn to_request(
        &self,
        dirs: &dyn BaseDirs,
        platform: Platform,
        cwd: &Utf8Path,
    ) -> Result<InstallRequest> {
        let product = self.resolve_profile()?;
        let target_dir = self.resolve_target(&product, dirs, platform, cwd)?;
        Ok(InstallRequest {
            target_dir,
            product,
            options: InstallOptions {
                shell_profile: self.shell_profile.clone(),
                credentials: self.credentials(),
            },
        })
    }
}

impl Cli {
    /// Returns the effective install arguments.
    ///
    /// If an `Install` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened install arguments.
    #[must_use]
    pub fn install_args(&self) -> &InstallArgs {
        match &self.command {
            Some(Command::Install(args)) => args,
            Some(Command::Products(_)) | None => &self.install,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
