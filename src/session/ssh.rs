//! Session implementation backed by the system `ssh` client.

use std::cell::Cell;
use std::ffi::OsString;
use std::fmt;

use tracing::{debug, trace, warn};

use super::{
    CommandLog, CommandOutput, CommandRunner, ProcessCommandRunner, RemoteSession, SessionError,
    SessionFactory, SessionOutput, SessionParams, Shell,
};
use crate::settings::MultihostSettings;

const CONNECT_PROBE: &str = "exit 0";

/// Client-side options applied to every `ssh` invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshOptions {
    /// Path to the `ssh` executable.
    pub ssh_bin: String,
    /// TCP port of the remote SSH daemon.
    pub port: u16,
    /// Whether to force batch mode when no password helper is configured.
    pub batch_mode: bool,
    /// Whether to enforce host key checking.
    pub strict_host_key_checking: bool,
    /// Known hosts file override.
    pub known_hosts_file: String,
    /// Private key used for authentication, if any.
    pub identity_file: Option<String>,
    /// `sshpass` executable used to supply passwords non-interactively.
    pub sshpass_bin: Option<String>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            ssh_bin: String::from("ssh"),
            port: 22,
            batch_mode: true,
            strict_host_key_checking: false,
            known_hosts_file: String::from("/dev/null"),
            identity_file: None,
            sshpass_bin: None,
        }
    }
}

impl From<&MultihostSettings> for SshOptions {
    fn from(settings: &MultihostSettings) -> Self {
        Self {
            ssh_bin: settings.ssh_bin.clone(),
            port: settings.ssh_port,
            batch_mode: settings.ssh_batch_mode,
            strict_host_key_checking: settings.ssh_strict_host_key_checking,
            known_hosts_file: settings.ssh_known_hosts_file.clone(),
            identity_file: settings.ssh_identity_file.clone(),
            sshpass_bin: settings.sshpass_bin.clone(),
        }
    }
}

/// Remote session that shells out to `ssh` for every command.
///
/// The connection is "established" by a probe command; later calls reuse the
/// recorded state so that lazy sessions connect on first use only.
#[derive(Debug)]
pub struct SshSession<R: CommandRunner> {
    params: SessionParams,
    options: SshOptions,
    runner: R,
    connected: Cell<bool>,
}

impl SshSession<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub const fn with_process_runner(params: SessionParams, options: SshOptions) -> Self {
        Self::new(params, options, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshSession<R> {
    /// Creates a session that has not connected yet.
    #[must_use]
    pub const fn new(params: SessionParams, options: SshOptions, runner: R) -> Self {
        Self {
            params,
            options,
            runner,
            connected: Cell::new(false),
        }
    }

    /// Remote user of this session.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.params.username
    }

    fn program(&self) -> &str {
        match self.password_helper() {
            Some(sshpass) => sshpass,
            None => &self.options.ssh_bin,
        }
    }

    fn password_helper(&self) -> Option<&str> {
        self.options
            .sshpass_bin
            .as_deref()
            .filter(|_| !self.params.password.is_empty())
    }

    fn build_args(&self, remote_command: &str) -> Vec<OsString> {
        let mut args = Vec::new();
        if self.password_helper().is_some() {
            args.push(OsString::from("-p"));
            args.push(OsString::from(&self.params.password));
            args.push(OsString::from(&self.options.ssh_bin));
        }

        args.push(OsString::from("-p"));
        args.push(OsString::from(self.options.port.to_string()));

        if let Some(ref identity_file) = self.options.identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(identity_file));
        }

        if self.options.batch_mode && self.password_helper().is_none() {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.options.strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.options.known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.options.known_hosts_file
            )));
        }

        args.push(OsString::from(format!(
            "{}@{}",
            self.params.username, self.params.address
        )));
        args.push(OsString::from(remote_command));
        args
    }

    fn execute(&self, remote_command: &str) -> Result<CommandOutput, SessionError> {
        let args = self.build_args(remote_command);
        self.runner.run(self.program(), &args)
    }

    fn failure(&self, output: CommandOutput) -> SessionError {
        SessionError::CommandFailure {
            address: self.params.address.clone(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr,
        }
    }
}

impl<R: CommandRunner + fmt::Debug> RemoteSession for SshSession<R> {
    fn address(&self) -> &str {
        &self.params.address
    }

    fn shell(&self) -> Shell {
        self.params.shell
    }

    fn connect(&self) -> Result<(), SessionError> {
        if self.connected.get() {
            return Ok(());
        }

        let _entered = self.params.span.enter();
        debug!(
            address = %self.params.address,
            user = %self.params.username,
            "connecting"
        );
        let output = self.execute(CONNECT_PROBE)?;
        if !output.is_success() {
            return Err(SessionError::Connect {
                address: self.params.address.clone(),
                username: self.params.username.clone(),
                message: format!(
                    "probe exited with status {}: {}",
                    output.status_text(),
                    output.stderr.trim()
                ),
            });
        }

        self.connected.set(true);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn run(&self, command: &str, log: CommandLog) -> Result<SessionOutput, SessionError> {
        self.connect()?;

        let _entered = self.params.span.enter();
        if log == CommandLog::Full {
            debug!(shell = %self.params.shell, "running remote command: {command}");
        }

        let output = self.execute(&self.params.shell.wrap(command))?;
        if !output.is_success() {
            if log != CommandLog::Silent {
                warn!(
                    status = %output.status_text(),
                    stderr = %output.stderr.trim(),
                    "remote command failed: {command}"
                );
            }
            return Err(self.failure(output));
        }

        if log == CommandLog::Full {
            trace!(stdout = %output.stdout, stderr = %output.stderr, "remote command finished");
        }

        Ok(SessionOutput {
            exit_code: 0,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Opens [`SshSession`]s that share one runner and one set of options.
#[derive(Clone, Debug)]
pub struct SshSessionFactory<R: CommandRunner> {
    options: SshOptions,
    runner: R,
}

impl SshSessionFactory<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub const fn with_process_runner(options: SshOptions) -> Self {
        Self::new(options, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshSessionFactory<R> {
    /// Creates a factory from options and a runner.
    #[must_use]
    pub const fn new(options: SshOptions, runner: R) -> Self {
        Self { options, runner }
    }

    /// Options applied to sessions opened by this factory.
    #[must_use]
    pub const fn options(&self) -> &SshOptions {
        &self.options
    }
}

impl<R> SessionFactory for SshSessionFactory<R>
where
    R: CommandRunner + Clone + fmt::Debug + 'static,
{
    fn open(&self, params: SessionParams) -> Box<dyn RemoteSession> {
        Box::new(SshSession::new(
            params,
            self.options.clone(),
            self.runner.clone(),
        ))
    }
}
