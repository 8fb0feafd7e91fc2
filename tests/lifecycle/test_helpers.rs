//! Shared fixtures for lifecycle BDD scenarios.

use std::rc::Rc;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use multihost::test_support::{CallLog, ScriptedRunner};
use multihost::{Config, ConfigContext, ConfigError, InventoryDeployment};
use rstest::fixture;
use serde_json::{Value, json};
use tempfile::TempDir;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub runner: ScriptedRunner,
    pub document: Value,
    pub lazy: bool,
    pub utilities: Vec<String>,
    pub failing_setup: Vec<String>,
    pub failing_teardown: Vec<String>,
    pub archive: Option<Vec<u8>>,
    pub calls: CallLog,
    pub artifacts_dir: Utf8PathBuf,
    _artifacts_tmp: Rc<TempDir>,
    pub outcome: Option<Outcome>,
}

#[derive(Clone, Debug, Default)]
pub struct Outcome {
    pub domains: usize,
    pub config_error: Option<String>,
    pub setup_error: Option<String>,
    pub teardown_failures: Vec<String>,
    pub collected: Vec<Utf8PathBuf>,
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[from] std::io::Error),
    #[error("temporary path is not valid UTF-8: {0}")]
    Path(String),
}

impl LifecycleContext {
    pub fn new() -> Result<Self, FixtureError> {
        let tmp = TempDir::new()?;
        let artifacts_dir = Utf8PathBuf::from_path_buf(tmp.path().join("artifacts"))
            .map_err(|path| FixtureError::Path(path.display().to_string()))?;

        Ok(Self {
            runner: ScriptedRunner::new(),
            document: lab_document(),
            lazy: false,
            utilities: Vec::new(),
            failing_setup: Vec::new(),
            failing_teardown: Vec::new(),
            archive: None,
            calls: CallLog::default(),
            artifacts_dir,
            _artifacts_tmp: Rc::new(tmp),
            outcome: None,
        })
    }

    pub fn build(&self) -> Result<Config<InventoryDeployment>, ConfigError> {
        Config::new(
            &self.document,
            InventoryDeployment,
            ConfigContext::new(self.lazy, Rc::new(self.runner.session_factory())),
        )
    }
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    LifecycleContext::new()
        .unwrap_or_else(|err| panic!("lifecycle context fixture should initialise: {err}"))
}

pub fn lab_document() -> Value {
    json!({
        "domains": [
            {
                "type": "ldap",
                "hosts": [
                    {
                        "hostname": "master.ldap.test",
                        "role": "ldap",
                        "username": "root",
                        "password": "Secret123",
                    },
                    {
                        "hostname": "client.test",
                        "role": "client",
                        "username": "root",
                        "password": "Secret123",
                        "ip": "192.0.2.20",
                    },
                ],
            },
            {
                "type": "ad",
                "hosts": [{
                    "hostname": "dc.ad.test",
                    "role": "ad",
                    "username": "Administrator@ad.test",
                    "password": "vagrant",
                    "os": "windows",
                }],
            },
        ],
    })
}

pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Builds a gzipped tarball holding a single file.
pub fn tarball(file_name: &str, contents: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let encoder = GzEncoder::new(&mut buffer, Compression::default());
        let mut archive = tar::Builder::new(encoder);

        let mut header = tar::Header::new_gnu();
        header.set_path(file_name)?;
        header.set_size(u64::try_from(contents.len()).unwrap_or(u64::MAX));
        header.set_mode(0o644);
        header.set_cksum();

        archive.append(&header, contents)?;
        archive.finish()?;
        archive.into_inner()?.finish()?;
    }
    Ok(buffer)
}
