//! Output formatting for the installer CLI.
//!
//! Pipeline events are rendered either as human-readable progress lines on
//! stderr or as JSON lines on stdout. This module also formats the dry-run
//! plan and the product listing.

use crate::error::{InstallerError, Result};
use crate::events::InstallEvent;
use crate::path_registry::export_line;
use crate::pipeline::{InstallRequest, Stage};
use crate::platform::Platform;
use crate::product::{Product, ProductProfile};
use serde::Serialize;
use std::io::Write;

/// Writes one line to stderr, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Renders pipeline events as they arrive.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRenderer {
    json: bool,
    quiet: bool,
    percent: u8,
}

impl EventRenderer {
    /// Creates a renderer. `quiet` suppresses everything but errors in
    /// human mode.
    #[must_use]
    pub const fn new(json: bool, quiet: bool) -> Self {
        Self {
            json,
            quiet,
            percent: 0,
        }
    }

    /// Renders one event. Errors always reach stderr, even in JSON mode.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::WriteFailed`] if JSON output cannot be
    /// written to stdout.
    pub fn render(
        &mut self,
        event: &InstallEvent,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<()> {
        if self.json {
            let line = serde_json::to_string(event)
                .map_err(|err| InstallerError::WriteFailed { source: err.into() })?;
            writeln!(stdout, "{line}").map_err(|source| InstallerError::WriteFailed { source })?;
            if let InstallEvent::Error { message } = event {
                write_stderr_line(stderr, format!("error: {message}"));
            }
            return Ok(());
        }

        match event {
            InstallEvent::Progress { percent } => self.percent = *percent,
            InstallEvent::Title { text } if !self.quiet => {
                write_stderr_line(stderr, format!("[{:>3}%] {text}", self.percent));
            }
            InstallEvent::Error { message } => {
                write_stderr_line(stderr, format!("error: {message}"));
            }
            InstallEvent::Title { .. } | InstallEvent::Finished { .. } => {}
        }
        Ok(())
    }
}

/// The installation plan shown by `--dry-run`.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// The request that would be run.
    pub request: &'a InstallRequest,
    /// The platform it would run on.
    pub platform: Platform,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let product = &self.request.product;
        let target = &self.request.target_dir;
        let bin_dir = product.bin_dir(target);

        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Product: {}", product.name),
            format!("Repository: {} ({})", product.repository_url, product.default_branch),
            format!("Target directory: {target}"),
            format!("Platform: {}", self.platform),
            String::new(),
            "Stages:".to_owned(),
        ];
        for (index, stage) in Stage::ALL.iter().enumerate() {
            lines.push(format!("  {:>2}. {}", index + 1, stage.title(product)));
        }

        lines.push(String::new());
        lines.push(format!(
            "Toolchain: {} (probe: {})",
            product.toolchain.name, product.toolchain.probe
        ));
        match product.toolchain.for_platform(self.platform) {
            Some(strategy) => {
                lines.push(format!("  package manager: {}", strategy.manager.name));
                for step in &strategy.install {
                    lines.push(format!("  install: {}", step.command));
                }
                for command in &strategy.update {
                    lines.push(format!("  update: {command}"));
                }
            }
            None => lines.push("  no install strategy for this platform".to_owned()),
        }

        lines.push(String::new());
        lines.push("Build:".to_owned());
        if let Some(source) = &product.build.package_source {
            let credentials = if self.request.options.credentials.is_some() {
                "credentials supplied"
            } else {
                "no credentials"
            };
            lines.push(format!(
                "  package source: {} {} ({credentials})",
                source.name, source.url
            ));
        }
        lines.push(format!("  dependencies: {}", product.build.dependencies));
        lines.push(format!("  release: {}", product.build.build));

        lines.push(String::new());
        if self.platform == Platform::Windows {
            lines.push(format!("PATH: append {bin_dir} to the machine PATH"));
        } else {
            let profile = self
                .request
                .options
                .shell_profile
                .as_ref()
                .map_or_else(|| "~/.bashrc".to_owned(), ToString::to_string);
            lines.push(format!("PATH: append `{}` to {profile}", export_line(&bin_dir)));
        }

        lines.join("\n")
    }
}

/// One row of the product listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    /// Value accepted by `--product`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Clone URL.
    pub repository: String,
    /// Toolchain needed to build it.
    pub toolchain: String,
}

impl ProductSummary {
    fn new(id: &str, profile: &ProductProfile) -> Self {
        Self {
            id: id.to_owned(),
            name: profile.name.clone(),
            repository: profile.repository_url.clone(),
            toolchain: profile.toolchain.name.clone(),
        }
    }
}

/// Summaries of every built-in product.
#[must_use]
pub fn product_summaries() -> Vec<ProductSummary> {
    use clap::ValueEnum;

    Product::ALL
        .iter()
        .filter_map(|product| {
            product
                .to_possible_value()
                .map(|value| ProductSummary::new(value.get_name(), &product.profile()))
        })
        .collect()
}

/// Formats the product listing for humans.
#[must_use]
pub fn format_product_listing(products: &[ProductSummary]) -> String {
    products
        .iter()
        .map(|product| {
            format!(
                "{:<10} {} ({}, needs {})",
                product.id, product.name, product.repository, product.toolchain
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats the product listing as pretty JSON.
///
/// # Errors
///
/// Returns [`InstallerError::WriteFailed`] if serialisation fails.
pub fn format_product_listing_json(products: &[ProductSummary]) -> Result<String> {
    serde_json::to_string_pretty(products)
        .map_err(|err| InstallerError::WriteFailed { source: err.into() })
}
