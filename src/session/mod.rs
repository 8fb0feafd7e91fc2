//! Remote command-execution sessions.
//!
//! Hosts talk to their machines through a [`RemoteSession`]. The trait is the
//! seam between the topology model and the transport: deployments may supply
//! their own implementation through a [`SessionFactory`], while the crate
//! ships [`SshSession`], which wraps the system `ssh` client via a
//! [`CommandRunner`] so that tests can script outcomes without spawning
//! processes.

use std::fmt;

use thiserror::Error;

mod runner;
mod shell;
mod ssh;

pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use shell::Shell;
pub use ssh::{SshOptions, SshSession, SshSessionFactory};

/// Controls how much of a remote command is written to the log.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CommandLog {
    /// Log the command, its output, and any failure.
    #[default]
    Full,
    /// Log only when the command fails.
    Error,
    /// Never log the command.
    Silent,
}

/// Output captured from a remote command that exited successfully.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionOutput {
    /// Exit code reported by the remote shell.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Parameters used to open a session against one host.
#[derive(Clone, Debug)]
pub struct SessionParams {
    /// Address to connect to (IP override or hostname).
    pub address: String,
    /// Remote user.
    pub username: String,
    /// Password for the remote user.
    pub password: String,
    /// Shell that interprets commands on the remote side.
    pub shell: Shell,
    /// Span under which session activity is logged.
    pub span: tracing::Span,
}

/// Errors surfaced by remote sessions.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when the local transport program cannot be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the connection probe does not succeed.
    #[error("failed to connect to {username}@{address}: {message}")]
    Connect {
        /// Address that was contacted.
        address: String,
        /// User the connection was attempted as.
        username: String,
        /// Human-readable failure description.
        message: String,
    },
    /// Raised when a remote command exits with a non-zero status.
    #[error("remote command on {address} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Address of the host that ran the command.
        address: String,
        /// Exit status, if the transport reported one.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
}

/// Opaque command-execution channel to one host.
///
/// Sessions are shared between a host and every role bound to it, so all
/// methods take `&self`; implementations keep their connection state behind
/// interior mutability and are not expected to be used across threads.
pub trait RemoteSession: fmt::Debug {
    /// Address the session talks to.
    fn address(&self) -> &str;

    /// Shell used to interpret commands.
    fn shell(&self) -> Shell;

    /// Establishes the connection. Calling it on a connected session is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the host cannot be reached.
    fn connect(&self) -> Result<(), SessionError>;

    /// Reports whether [`RemoteSession::connect`] has succeeded.
    fn is_connected(&self) -> bool;

    /// Runs `command` on the host, connecting first when needed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CommandFailure`] on non-zero exit, or any
    /// transport error.
    fn run(&self, command: &str, log: CommandLog) -> Result<SessionOutput, SessionError>;
}

/// Creates sessions for hosts and for ad-hoc role connections.
pub trait SessionFactory: fmt::Debug {
    /// Opens a new, not yet connected session.
    fn open(&self, params: SessionParams) -> Box<dyn RemoteSession>;
}
