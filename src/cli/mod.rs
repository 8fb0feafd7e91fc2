//! Command-line interface definitions for the `multihost` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI for the `multihost` binary.
#[derive(Debug, Parser)]
#[command(
    name = "multihost",
    about = "Inspect multihost test environments and collect host artifacts",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List the domains, roles, and hosts of a configuration document.
    #[command(
        name = "inventory",
        about = "List the domains, roles, and hosts of a configuration document"
    )]
    Inventory(InventoryCommand),
    /// Connect to every host and download its declared artifacts.
    #[command(
        name = "collect-artifacts",
        about = "Connect to every host and download its declared artifacts"
    )]
    CollectArtifacts(CollectArtifactsCommand),
}

/// Arguments for the `multihost inventory` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct InventoryCommand {
    /// Path to the JSON configuration document.
    #[arg(value_name = "DOCUMENT")]
    pub(crate) document: PathBuf,
}

/// Arguments for the `multihost collect-artifacts` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CollectArtifactsCommand {
    /// Path to the JSON configuration document.
    #[arg(value_name = "DOCUMENT")]
    pub(crate) document: PathBuf,
    /// Directory receiving one `{role}_{hostname}.tgz` archive per host.
    ///
    /// Defaults to the `artifacts_dir` setting (`MULTIHOST_ARTIFACTS_DIR`).
    #[arg(long, value_name = "DIR")]
    pub(crate) dest: Option<PathBuf>,
}
