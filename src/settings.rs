//! Runtime settings loaded via `ortho-config`.
//!
//! These are the knobs that are not part of the topology document itself:
//! how hosts reach their machines and where collected artifacts land.
//! Values merge defaults, configuration files, and `MULTIHOST_*` environment
//! variables.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default directory receiving collected host artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// Transport and artifact settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "MULTIHOST",
    discovery(
        app_name = "multihost",
        env_var = "MULTIHOST_CONFIG_PATH",
        config_file_name = "multihost.toml",
        dotfile_name = ".multihost.toml",
        project_file_name = "multihost.toml"
    )
)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "configuration struct with user-facing toggle settings that are naturally expressed as booleans"
)]
pub struct MultihostSettings {
    /// Postpone connecting to hosts until a command first needs them.
    #[ortho_config(default = false)]
    pub lazy_ssh: bool,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// TCP port of the remote SSH daemons.
    #[ortho_config(default = 22)]
    pub ssh_port: u16,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking; disabled by default because
    /// test machines are frequently re-provisioned.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null`.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
    /// Path to the SSH private key. Optional; validation rejects blank values.
    pub ssh_identity_file: Option<String>,
    /// Path to `sshpass`, used to supply host passwords non-interactively.
    /// Optional; validation rejects blank values.
    pub sshpass_bin: Option<String>,
    /// Directory receiving collected host artifacts.
    #[ortho_config(default = DEFAULT_ARTIFACTS_DIR.to_owned())]
    pub artifacts_dir: String,
}

/// Errors raised while loading or validating settings.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SettingsError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("multihost settings parsing failed: {0}")]
    Parse(String),
    /// Raised when a required value is blank.
    #[error("missing {field}: set MULTIHOST_{env_suffix} or add {field} to multihost.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Settings field that failed validation.
        field: String,
    },
    /// Raised when the SSH port is zero.
    #[error("ssh_port must be greater than zero")]
    InvalidPort,
}

impl MultihostSettings {
    /// Loads settings from defaults, configuration files, and environment
    /// variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SettingsError> {
        Self::load_from_iter([std::ffi::OsString::from("multihost")])
            .map_err(|err| SettingsError::Parse(err.to_string()))
    }

    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidConfig`] when a required field is
    /// blank, or [`SettingsError::InvalidPort`] for port zero.
    pub fn validate(&self) -> Result<(), SettingsError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.artifacts_dir, "artifacts_dir")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        Self::require_optional_value(self.sshpass_bin.as_deref(), "sshpass_bin")?;
        if self.ssh_port == 0 {
            return Err(SettingsError::InvalidPort);
        }
        Ok(())
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), SettingsError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(SettingsError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), SettingsError> {
        Self::require_optional_value(Some(value), field)
    }
}

impl Default for MultihostSettings {
    fn default() -> Self {
        Self {
            lazy_ssh: false,
            ssh_bin: String::from("ssh"),
            ssh_port: 22,
            ssh_batch_mode: true,
            ssh_strict_host_key_checking: false,
            ssh_known_hosts_file: String::from("/dev/null"),
            ssh_identity_file: None,
            sshpass_bin: None,
            artifacts_dir: String::from(DEFAULT_ARTIFACTS_DIR),
        }
    }
}
