//! Artifact collection from remote hosts.
//!
//! Artifacts are archived remotely and streamed back as base64 text over the
//! shared session, then written to `{role}_{hostname}.tgz` locally.

use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use shell_escape::unix::escape;
use thiserror::Error;
use tracing::info;

use super::{Host, HostOs};
use crate::session::{CommandLog, SessionError};

/// `mktemp` template for the remote archive.
pub const ARTIFACTS_TEMP_TEMPLATE: &str = "/tmp/mh.host.artifacts.XXXXXXXXX";

/// Errors raised while collecting artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The host's operating system cannot produce artifact archives.
    #[error("artifacts are not supported on {os} host {hostname}")]
    Unsupported {
        /// Operating system of the host.
        os: HostOs,
        /// Host that was asked for artifacts.
        hostname: String,
    },
    /// Local file system access failed.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// The archive stream was not valid base64.
    #[error("failed to decode artifacts from {hostname}: {message}")]
    Decode {
        /// Host that produced the stream.
        hostname: String,
        /// Decoder error message.
        message: String,
    },
    /// The remote archive command failed.
    #[error("failed to archive artifacts: {0}")]
    Remote(#[from] SessionError),
}

/// Builds the shell script that archives every path matching `patterns`
/// and prints the archive as base64. Patterns are expanded remotely;
/// patterns that match nothing are skipped.
#[must_use]
pub fn linux_archive_command(patterns: &[String]) -> String {
    let globs = patterns
        .iter()
        .map(|pattern| format!("$(compgen -G {})", escape(pattern.as_str().into())))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "tmp=`mktemp {ARTIFACTS_TEMP_TEMPLATE}`\n\
         tar -czvf \"$tmp\" {globs} &> /dev/null\n\
         base64 \"$tmp\"\n\
         rm -f \"$tmp\" &> /dev/null\n"
    )
}

impl Host {
    /// Name of the archive written by [`Host::collect_artifacts`].
    #[must_use]
    pub fn artifacts_file_name(&self) -> String {
        format!("{}_{}.tgz", self.role, self.hostname)
    }

    /// Collects the host's declared artifacts into `dest`.
    ///
    /// Returns `Ok(None)` without touching the file system or the session
    /// when the host declares no artifacts; otherwise returns the path of the
    /// written archive.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Unsupported`] for Windows hosts,
    /// [`ArtifactError::Remote`] when the archive command fails,
    /// [`ArtifactError::Decode`] for a malformed stream, and
    /// [`ArtifactError::Io`] when the destination cannot be written.
    pub fn collect_artifacts(&self, dest: &Utf8Path) -> Result<Option<Utf8PathBuf>, ArtifactError> {
        if self.artifacts.is_empty() {
            return Ok(None);
        }

        Dir::create_ambient_dir_all(dest, ambient_authority()).map_err(|err| {
            ArtifactError::Io {
                path: dest.to_path_buf(),
                message: err.to_string(),
            }
        })?;

        let command = match self.os {
            HostOs::Linux => linux_archive_command(&self.artifacts),
            HostOs::Windows => {
                return Err(ArtifactError::Unsupported {
                    os: self.os,
                    hostname: self.hostname.clone(),
                });
            }
        };

        let output = self.session.run(&command, CommandLog::Error)?;
        let archive = decode_stream(&output.stdout).map_err(|message| ArtifactError::Decode {
            hostname: self.hostname.clone(),
            message,
        })?;

        let file_name = self.artifacts_file_name();
        let path = dest.join(&file_name);
        let dir = Dir::open_ambient_dir(dest, ambient_authority()).map_err(|err| {
            ArtifactError::Io {
                path: dest.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        dir.write(&file_name, archive)
            .map_err(|err| ArtifactError::Io {
                path: path.clone(),
                message: err.to_string(),
            })?;

        info!(parent: &self.span, path = %path, "collected artifacts");
        Ok(Some(path))
    }
}

fn decode_stream(stdout: &str) -> Result<Vec<u8>, String> {
    let compact: String = stdout.chars().filter(|ch| !ch.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(compact)
        .map_err(|err| err.to_string())
}
