//! Tests for installer CLI parsing and request construction.

use super::*;
use crate::test_utils::StubBaseDirs;
use rstest::rstest;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["source-installer"]);
    assert!(cli.command.is_none());
    assert_eq!(cli.install.product, Product::Cosmo);
    assert!(cli.install.path.is_none());
    assert!(cli.install.profile.is_none());
    assert!(!cli.install.json);
    assert!(!cli.install.dry_run);
    assert_eq!(cli.install.verbosity, 0);
    assert!(!cli.install.quiet);
}

#[rstest]
#[case::cosmo("cosmo", Product::Cosmo)]
#[case::roblox_cs("roblox-cs", Product::RobloxCs)]
fn cli_parses_product(#[case] value: &str, #[case] expected: Product) {
    let cli = Cli::parse_from(["source-installer", "--product", value]);
    assert_eq!(cli.install.product, expected);
}

#[test]
fn cli_rejects_unknown_product() {
    let result = Cli::try_parse_from(["source-installer", "--product", "zig"]);
    assert!(result.is_err());
}

#[test]
fn cli_parses_install_subcommand() {
    let cli = Cli::parse_from([
        "source-installer",
        "install",
        "-p",
        "roblox-cs",
        "--path",
        "/opt/rbxcs",
    ]);
    let args = cli.install_args();
    assert_eq!(args.product, Product::RobloxCs);
    assert_eq!(args.path, Some(Utf8PathBuf::from("/opt/rbxcs")));
}

#[test]
fn cli_parses_products_subcommand() {
    let cli = Cli::parse_from(["source-installer", "products", "--json"]);
    match cli.command {
        Some(Command::Products(args)) => assert!(args.json),
        _ => panic!("expected Products command"),
    }
}

#[test]
fn cli_counts_verbosity() {
    let cli = Cli::parse_from(["source-installer", "-vv"]);
    assert_eq!(cli.install.verbosity, 2);
}

#[test]
fn cli_rejects_quiet_with_verbose() {
    let result = Cli::try_parse_from(["source-installer", "-q", "-v"]);
    assert!(result.is_err());
}

#[test]
fn feed_username_requires_token() {
    temp_env::with_var_unset(FEED_TOKEN_ENV, || {
        let result = Cli::try_parse_from(["source-installer", "--feed-username", "ada"]);
        assert!(result.is_err());
    });
}

#[test]
fn feed_token_is_read_from_environment() {
    temp_env::with_var(FEED_TOKEN_ENV, Some("ghp_from_env"), || {
        let cli = Cli::parse_from(["source-installer", "--feed-username", "ada"]);
        let credentials = cli.install.credentials().expect("credentials");
        assert_eq!(credentials.username, "ada");
        assert_eq!(credentials.token, "ghp_from_env");
    });
}

#[test]
fn default_target_joins_install_root_and_directory_name() {
    let dirs = StubBaseDirs::new(Utf8Path::new("/home/ada"));
    let args = InstallArgs::default();

    let target = args
        .resolve_target(
            &ProductProfile::cosmo(),
            &dirs,
            Platform::Linux,
            Utf8Path::new("/tmp"),
        )
        .expect("target should resolve");

    assert_eq!(target, Utf8PathBuf::from("/home/ada/.cosmo"));
}

#[rstest]
#[case::absolute("/opt/cosmo", "/opt/cosmo")]
#[case::relative("tools/cosmo", "/work/tools/cosmo")]
fn explicit_path_is_made_absolute(#[case] path: &str, #[case] expected: &str) {
    let args = InstallArgs {
        path: Some(Utf8PathBuf::from(path)),
        ..InstallArgs::default()
    };

    let target = args
        .resolve_target(
            &ProductProfile::cosmo(),
            &StubBaseDirs::default(),
            Platform::Linux,
            Utf8Path::new("/work"),
        )
        .expect("target should resolve");

    assert_eq!(target, Utf8PathBuf::from(expected));
}

#[test]
fn missing_install_root_is_reported() {
    let err = InstallArgs::default()
        .resolve_target(
            &ProductProfile::cosmo(),
            &StubBaseDirs::default(),
            Platform::Linux,
            Utf8Path::new("/work"),
        )
        .expect_err("no home must fail");

    assert!(matches!(err, InstallerError::DirectoryUnavailable { .. }));
}

#[test]
fn request_carries_options() {
    let args = InstallArgs {
        product: Product::RobloxCs,
        path: Some(Utf8PathBuf::from("/opt/rbxcs")),
        shell_profile: Some(Utf8PathBuf::from("/home/ada/.zshrc")),
        feed_username: Some("ada".to_owned()),
        feed_token: Some("ghp_token".to_owned()),
        ..InstallArgs::default()
    };

    let request = args
        .to_request(
            &StubBaseDirs::default(),
            Platform::Linux,
            Utf8Path::new("/"),
        )
        .expect("request should build");

    assert_eq!(request.product.name, "roblox-cs");
    assert_eq!(request.target_dir, Utf8PathBuf::from("/opt/rbxcs"));
    assert_eq!(
        request.options.shell_profile,
        Some(Utf8PathBuf::from("/home/ada/.zshrc"))
    );
    assert!(request.options.credentials.is_some());
}
