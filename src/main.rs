//! Binary entry point for the `multihost` CLI.

use std::io::{self, Write};
use std::process;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use multihost::{
    Config, ConfigContext, ConfigError, InventoryDeployment, MultihostSettings, SessionFactory,
    SettingsError, SshOptions, SshSessionFactory, load_document,
};

mod cli;

use cli::{Cli, CollectArtifactsCommand, InventoryCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("path is not valid UTF-8: {0}")]
    Path(String),
    #[error("artifact collection failed for {failed} host(s)")]
    Artifacts { failed: usize },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, &mut io::stdout().lock()) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

fn dispatch(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    match cli {
        Cli::Inventory(command) => inventory(&command, out),
        Cli::CollectArtifacts(command) => collect_artifacts(&command, out),
    }
}

fn load_settings() -> Result<MultihostSettings, CliError> {
    let settings = MultihostSettings::load_without_cli_args()?;
    settings.validate()?;
    Ok(settings)
}

fn session_factory(settings: &MultihostSettings) -> Rc<dyn SessionFactory> {
    Rc::new(SshSessionFactory::with_process_runner(SshOptions::from(
        settings,
    )))
}

fn utf8_path(path: std::path::PathBuf) -> Result<Utf8PathBuf, CliError> {
    Utf8PathBuf::from_path_buf(path).map_err(|raw| CliError::Path(raw.display().to_string()))
}

fn inventory(command: &InventoryCommand, out: &mut impl Write) -> Result<(), CliError> {
    let settings = load_settings()?;
    let document = load_document(&utf8_path(command.document.clone())?)?;
    let config = Config::new(
        &document,
        InventoryDeployment,
        ConfigContext::new(true, session_factory(&settings)),
    )?;
    render_inventory(&config, out)?;
    Ok(())
}

fn render_inventory(config: &Config<InventoryDeployment>, out: &mut impl Write) -> io::Result<()> {
    for domain in config.domains() {
        writeln!(out, "{}: {}", domain.domain_type(), domain.roles().join(", "))?;
        for host in domain.hosts() {
            writeln!(
                out,
                "  {} {} ({}, {})",
                host.role(),
                host.hostname(),
                host.address(),
                host.os()
            )?;
        }
    }
    Ok(())
}

fn collect_artifacts(command: &CollectArtifactsCommand, out: &mut impl Write) -> Result<(), CliError> {
    let settings = load_settings()?;
    let dest = match command.dest.clone() {
        Some(dir) => utf8_path(dir)?,
        None => Utf8PathBuf::from(&settings.artifacts_dir),
    };
    let document = load_document(&utf8_path(command.document.clone())?)?;
    let config = Config::new(
        &document,
        InventoryDeployment,
        ConfigContext::new(settings.lazy_ssh, session_factory(&settings)),
    )?;
    collect_all(&config, &dest, out)
}

fn collect_all(
    config: &Config<InventoryDeployment>,
    dest: &Utf8Path,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut failed = 0_usize;
    for host in config.domains().iter().flat_map(|domain| domain.hosts()) {
        match host.collect_artifacts(dest) {
            Ok(Some(path)) => writeln!(out, "{path}")?,
            Ok(None) => info!(hostname = %host.hostname(), "no artifacts declared"),
            Err(err) => {
                error!(hostname = %host.hostname(), "artifact collection failed: {err}");
                failed += 1;
            }
        }
    }

    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::Artifacts { failed })
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
