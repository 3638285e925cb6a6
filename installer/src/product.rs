//! Product profiles.
//!
//! A profile carries everything that differs between the products the
//! installer can build: where the source lives, what must be cleaned up
//! before syncing, which toolchain is needed and how to obtain it, and how
//! the project is built. Cosmo and roblox-cs ship as built-in profiles; a
//! custom profile can be loaded from a TOML file with the same shape.

use crate::builder::{BuildPlan, PackageSourceSpec};
use crate::error::{InstallerError, Result};
use crate::process::CommandSpec;
use crate::toolchain::{InstallStep, PackageManager, PlatformToolchain, ToolchainSpec};
use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const DEFAULT_BRANCH: &str = "master";
const DEFAULT_BIN_SUBDIR: &str = "bin";

fn default_branch() -> String {
    DEFAULT_BRANCH.to_owned()
}

fn default_bin_subdir() -> String {
    DEFAULT_BIN_SUBDIR.to_owned()
}

/// Built-in products selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Product {
    /// The Cosmo language, built with Crystal.
    Cosmo,
    /// The roblox-cs compiler, built with the .NET SDK.
    RobloxCs,
}

impl Product {
    /// Every built-in product, in listing order.
    pub const ALL: [Self; 2] = [Self::Cosmo, Self::RobloxCs];

    /// Returns the profile for this product.
    #[must_use]
    pub fn profile(self) -> ProductProfile {
        match self {
            Self::Cosmo => ProductProfile::cosmo(),
            Self::RobloxCs => ProductProfile::roblox_cs(),
        }
    }
}

/// Everything the pipeline needs to know about one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductProfile {
    /// Display name used in titles, e.g. `Cosmo`.
    pub name: String,
    /// Directory created under the install root, e.g. `.cosmo`.
    pub directory_name: String,
    /// Public clone URL.
    pub repository_url: String,
    /// Branch whose tags identify releases.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Generated files removed before pulling into an existing checkout.
    #[serde(default)]
    pub presync_cleanup: Vec<String>,
    /// Directory holding the built binaries, relative to the checkout.
    #[serde(default = "default_bin_subdir")]
    pub bin_subdir: String,
    /// Toolchain needed to build the product.
    pub toolchain: ToolchainSpec,
    /// Dependency and compile commands.
    pub build: BuildPlan,
}

impl ProductProfile {
    /// The Cosmo profile: a Crystal project built with `shards`.
    #[must_use]
    pub fn cosmo() -> Self {
        let hint = "it is required to install Crystal; install it, or install Crystal manually";
        Self {
            name: "Cosmo".to_owned(),
            directory_name: ".cosmo".to_owned(),
            repository_url: "https://github.com/cosmo-lang/cosmo.git".to_owned(),
            default_branch: default_branch(),
            presync_cleanup: vec!["shard.lock".to_owned()],
            bin_subdir: default_bin_subdir(),
            toolchain: ToolchainSpec {
                name: "Crystal".to_owned(),
                probe: CommandSpec::new("crystal", &["-v"]),
                windows: Some(PlatformToolchain {
                    manager: PackageManager {
                        name: "scoop".to_owned(),
                        probe: scoop(&["--version"]),
                        missing_hint: hint.to_owned(),
                    },
                    install: vec![
                        InstallStep {
                            description: "the Crystal bucket".to_owned(),
                            command: scoop(&[
                                "bucket",
                                "add",
                                "crystal-preview",
                                "https://github.com/neatorobito/scoop-crystal",
                            ]),
                            unless: None,
                        },
                        InstallStep {
                            description: "C++ build tools".to_owned(),
                            command: scoop(&["install", "vs_2022_cpp_build_tools"]),
                            unless: Some(CommandSpec::new("where", &["cl.exe"])),
                        },
                        InstallStep {
                            description: "Crystal".to_owned(),
                            command: scoop(&["install", "crystal"]),
                            unless: None,
                        },
                    ],
                    update: vec![scoop(&["update"]), scoop(&["update", "crystal"])],
                }),
                linux: Some(PlatformToolchain {
                    manager: PackageManager {
                        name: "snap".to_owned(),
                        probe: CommandSpec::new("snap", &["--version"]),
                        missing_hint: hint.to_owned(),
                    },
                    install: vec![InstallStep {
                        description: "Crystal".to_owned(),
                        command: CommandSpec::new(
                            "pkexec",
                            &["snap", "install", "crystal", "--classic"],
                        ),
                        unless: None,
                    }],
                    update: Vec::new(),
                }),
                macos: Some(PlatformToolchain {
                    manager: PackageManager {
                        name: "brew".to_owned(),
                        probe: CommandSpec::new("brew", &["--version"]),
                        missing_hint: hint.to_owned(),
                    },
                    install: vec![InstallStep {
                        description: "Crystal".to_owned(),
                        command: CommandSpec::new("brew", &["install", "crystal"]),
                        unless: None,
                    }],
                    update: Vec::new(),
                }),
            },
            build: BuildPlan {
                package_source: None,
                dependencies: CommandSpec::new("shards", &["install"]),
                build: CommandSpec::new("shards", &["build", "--release"]),
            },
        }
    }

    /// The roblox-cs profile: a .NET solution with packages on a private
    /// NuGet feed.
    #[must_use]
    pub fn roblox_cs() -> Self {
        let hint = "it is required to install the .NET SDK; install it, or install the .NET SDK manually";
        Self {
            name: "roblox-cs".to_owned(),
            directory_name: "roblox-cs".to_owned(),
            repository_url: "https://github.com/roblox-csharp/roblox-cs.git".to_owned(),
            default_branch: default_branch(),
            presync_cleanup: Vec::new(),
            bin_subdir: default_bin_subdir(),
            toolchain: ToolchainSpec {
                name: ".NET SDK".to_owned(),
                probe: CommandSpec::new("dotnet", &["--version"]),
                windows: Some(PlatformToolchain {
                    manager: PackageManager {
                        name: "winget".to_owned(),
                        probe: CommandSpec::new("winget", &["--version"]),
                        missing_hint: hint.to_owned(),
                    },
                    install: vec![InstallStep {
                        description: ".NET SDK".to_owned(),
                        command: CommandSpec::new(
                            "winget",
                            &[
                                "install",
                                "--id",
                                "Microsoft.DotNet.SDK.8",
                                "-e",
                                "--accept-source-agreements",
                                "--accept-package-agreements",
                            ],
                        ),
                        unless: None,
                    }],
                    update: vec![CommandSpec::new(
                        "winget",
                        &[
                            "upgrade",
                            "--id",
                            "Microsoft.DotNet.SDK.8",
                            "-e",
                            "--accept-source-agreements",
                            "--accept-package-agreements",
                        ],
                    )],
                }),
                linux: Some(PlatformToolchain {
                    manager: PackageManager {
                        name: "snap".to_owned(),
                        probe: CommandSpec::new("snap", &["--version"]),
                        missing_hint: hint.to_owned(),
                    },
                    install: vec![InstallStep {
                        description: ".NET SDK".to_owned(),
                        command: CommandSpec::new(
                            "pkexec",
                            &["snap", "install", "dotnet-sdk", "--classic"],
                        ),
                        unless: None,
                    }],
                    update: Vec::new(),
                }),
                macos: Some(PlatformToolchain {
                    manager: PackageManager {
                        name: "brew".to_owned(),
                        probe: CommandSpec::new("brew", &["--version"]),
                        missing_hint: hint.to_owned(),
                    },
                    install: vec![InstallStep {
                        description: ".NET SDK".to_owned(),
                        command: CommandSpec::new("brew", &["install", "--cask", "dotnet-sdk"]),
                        unless: None,
                    }],
                    update: Vec::new(),
                }),
            },
            build: BuildPlan {
                package_source: Some(PackageSourceSpec {
                    name: "rbxcs".to_owned(),
                    url: "https://nuget.pkg.github.com/roblox-csharp/index.json".to_owned(),
                }),
                dependencies: CommandSpec::new("dotnet", &["restore"]),
                build: CommandSpec::new("dotnet", &["build", "-c", "Release"]),
            },
        }
    }

    /// Loads a profile from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidProfile`] if the file cannot be read
    /// or does not describe a profile.
    pub fn from_toml_file(path: &Utf8Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|err| InstallerError::InvalidProfile {
                path: path.to_owned(),
                reason: err.to_string(),
            })?;
        Self::from_toml_str(&contents).map_err(|reason| InstallerError::InvalidProfile {
            path: path.to_owned(),
            reason,
        })
    }

    fn from_toml_str(contents: &str) -> std::result::Result<Self, String> {
        let profile: Self = toml::from_str(contents).map_err(|err| err.to_string())?;
        if profile.directory_name.trim().is_empty() {
            return Err("directory_name must not be empty".to_owned());
        }
        Ok(profile)
    }

    /// Directory holding the built binaries for a checkout at `install_dir`.
    #[must_use]
    pub fn bin_dir(&self, install_dir: &Utf8Path) -> Utf8PathBuf {
        install_dir.join(&self.bin_subdir)
    }
}

/// Runs Scoop through its `.cmd` shim so arguments stay an argv list.
fn scoop(args: &[&str]) -> CommandSpec {
    CommandSpec::new("scoop.cmd", args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use rstest::rstest;

    #[rstest]
    #[case::cosmo(Product::Cosmo, "Cosmo", ".cosmo")]
    #[case::roblox_cs(Product::RobloxCs, "roblox-cs", "roblox-cs")]
    fn built_in_profiles_are_named(
        #[case] product: Product,
        #[case] name: &str,
        #[case] directory: &str,
    ) {
        let profile = product.profile();
        assert_eq!(profile.name, name);
        assert_eq!(profile.directory_name, directory);
        assert_eq!(profile.default_branch, "master");
    }

    #[rstest]
    #[case::windows(Platform::Windows)]
    #[case::linux(Platform::Linux)]
    #[case::macos(Platform::MacOs)]
    fn built_in_profiles_cover_every_platform(#[case] platform: Platform) {
        for product in Product::ALL {
            assert!(
                product.profile().toolchain.for_platform(platform).is_some(),
                "{product:?} has no strategy for {platform}"
            );
        }
    }

    #[test]
    fn only_roblox_cs_needs_a_package_source() {
        assert!(ProductProfile::cosmo().build.package_source.is_none());
        let source = ProductProfile::roblox_cs()
            .build
            .package_source
            .expect("roblox-cs uses a private feed");
        assert_eq!(source.name, "rbxcs");
    }

    #[test]
    fn bin_dir_joins_subdirectory() {
        let profile = ProductProfile::cosmo();
        assert_eq!(
            profile.bin_dir(Utf8Path::new("/home/ada/.cosmo")),
            Utf8PathBuf::from("/home/ada/.cosmo/bin")
        );
    }

    #[test]
    fn minimal_toml_profile_uses_defaults() {
        let toml = r#"
            name = "Demo"
            directory_name = "demo"
            repository_url = "https://example.com/demo.git"

            [toolchain]
            name = "Make"
            probe = { program = "make", args = ["--version"] }

            [build]
            dependencies = { program = "true" }
            build = { program = "make", args = ["release"] }
        "#;

        let profile = ProductProfile::from_toml_str(toml).expect("profile should parse");

        assert_eq!(profile.default_branch, "master");
        assert_eq!(profile.bin_subdir, "bin");
        assert!(profile.presync_cleanup.is_empty());
        assert!(profile.toolchain.windows.is_none());
        assert!(profile.build.dependencies.args.is_empty());
    }

    #[test]
    fn built_in_profile_survives_toml_serialisation() {
        let original = ProductProfile::roblox_cs();
        let text = toml::to_string(&original).expect("profile should serialise");
        let parsed = ProductProfile::from_toml_str(&text).expect("profile should parse");
        assert_eq!(parsed, original);
    }

    #[test]
    fn empty_directory_name_is_rejected() {
        let toml = r#"
            name = "Demo"
            directory_name = " "
            repository_url = "https://example.com/demo.git"

            [toolchain]
            name = "Make"
            probe = { program = "make" }

            [build]
            dependencies = { program = "true" }
            build = { program = "make" }
        "#;

        let err = ProductProfile::from_toml_str(toml).expect_err("blank directory must fail");
        assert!(err.contains("directory_name"));
    }

    #[test]
    fn unreadable_profile_names_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Utf8PathBuf::try_from(dir.path().join("missing.toml")).expect("utf8 path");

        let err = ProductProfile::from_toml_file(&path).expect_err("missing file must fail");

        match err {
            InstallerError::InvalidProfile { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
