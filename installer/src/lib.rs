//! Source installer library.
//!
//! This crate installs developer tools that are distributed as source: it
//! syncs a product's repository to its latest release tag, provisions the
//! toolchain the product is built with, builds it, and registers the
//! resulting binaries on the PATH. It is used by the `source-installer` CLI
//! binary and can be driven programmatically through [`pipeline`].
//!
//! # Modules
//!
//! - [`builder`] - Package feed registration, dependency install, and release builds
//! - [`cli`] - Command-line argument definitions
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Error taxonomy for installation failures
//! - [`events`] - Progress reporting across the pipeline thread boundary
//! - [`git`] - Repository syncing and release tag resolution
//! - [`output`] - Event rendering, dry-run plans, and product listings
//! - [`path_registry`] - Shell profile and machine PATH registration
//! - [`pipeline`] - Installation stage sequencing and error latching
//! - [`platform`] - Operating system families
//! - [`privileges`] - Elevated-privilege detection
//! - [`process`] - External command execution
//! - [`product`] - Built-in and file-based product profiles
//! - [`toolchain`] - Toolchain detection and provisioning

pub mod builder;
pub mod cli;
pub mod dirs;
pub mod error;
pub mod events;
pub mod git;
pub mod output;
pub mod path_registry;
pub mod pipeline;
pub mod platform;
pub mod privileges;
pub mod process;
pub mod product;
pub mod toolchain;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
