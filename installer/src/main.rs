//! Source installer CLI entrypoint.
//!
//! This binary installs Cosmo or roblox-cs from their latest release tags.
//! The installation runs on a background thread; this thread renders the
//! events it sends and turns the result into an exit code.

use camino::Utf8PathBuf;
use clap::Parser;
use log::LevelFilter;
use source_installer::cli::{Cli, Command, InstallArgs, ProductsArgs};
use source_installer::dirs::SystemBaseDirs;
use source_installer::error::{InstallerError, Result};
use source_installer::output::{
    DryRunInfo, EventRenderer, format_product_listing, format_product_listing_json,
    product_summaries, write_stderr_line,
};
use source_installer::pipeline::{Environment, InstallRequest, spawn_installation};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.install_args());
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(args: &InstallArgs) {
    env_logger::Builder::new()
        .filter_level(level_for(args))
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

const fn level_for(args: &InstallArgs) -> LevelFilter {
    if args.quiet {
        return LevelFilter::Error;
    }
    match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<i32> {
    if let Some(Command::Products(args)) = &cli.command {
        return list_products(args, stdout).map(|()| 0);
    }

    let args = cli.install_args();
    let env = Environment::system()?;
    let cwd = Utf8PathBuf::try_from(std::env::current_dir()?).map_err(|err| {
        InstallerError::WorkingDirectory {
            path: Utf8PathBuf::from(err.as_path().to_string_lossy().into_owned()),
            reason: "path is not valid UTF-8".to_owned(),
        }
    })?;
    let request = args.to_request(&SystemBaseDirs, env.platform, &cwd)?;

    if args.dry_run {
        print_dry_run(&request, &env, stderr);
        return Ok(0);
    }

    install(request, env, args, stdout, stderr)
}

fn list_products(args: &ProductsArgs, stdout: &mut dyn Write) -> Result<()> {
    let summaries = product_summaries();
    let text = if args.json {
        format_product_listing_json(&summaries)?
    } else {
        format_product_listing(&summaries)
    };
    writeln!(stdout, "{text}").map_err(|source| InstallerError::WriteFailed { source })
}

fn print_dry_run(request: &InstallRequest, env: &Environment, stderr: &mut dyn Write) {
    let info = DryRunInfo {
        request,
        platform: env.platform,
    };
    write_stderr_line(stderr, info.display_text());
}

/// Runs the pipeline on its own thread and renders events until it ends.
///
/// Returns the exit code. Pipeline failures have already been rendered from
/// the event stream, so only a panicked worker surfaces as an error.
fn install(
    request: InstallRequest,
    env: Environment,
    args: &InstallArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let handle = spawn_installation(request, env)?;
    let mut renderer = EventRenderer::new(args.json, args.quiet);
    for event in handle.events.iter() {
        renderer.render(&event, stdout, stderr)?;
    }

    match handle.join() {
        Ok(outcome) => {
            log::info!("installation ended: {outcome:?}");
            Ok(0)
        }
        Err(InstallerError::WorkerPanicked) => Err(InstallerError::WorkerPanicked),
        Err(err) => {
            log::debug!("installation failed: {err}");
            Ok(1)
        }
    }
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
