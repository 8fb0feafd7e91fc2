//! Hosts: one remote machine plus its live command-execution session.
//!
//! ```json
//! {
//!   "hostname": "dc.ad.test",
//!   "role": "ad",
//!   "username": "Administrator@ad.test",
//!   "password": "vagrant",
//!   "os": "windows",
//!   "config": { "binddn": "Administrator@ad.test" }
//! }
//! ```
//!
//! Required fields are `hostname`, `role`, `username`, and `password`; a
//! [`HostType`] may require more, including nested keys such as
//! `config/binddn`. Optional fields are `ip`, `config`, `artifacts`, and `os`.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info_span};

use crate::command::CommandBuilder;
use crate::config::ConfigError;
use crate::document;
use crate::domain::DomainContext;
use crate::session::{RemoteSession, SessionError, SessionFactory, SessionParams, Shell};

mod artifacts;

pub use artifacts::{ARTIFACTS_TEMP_TEMPLATE, ArtifactError, linux_archive_command};

/// Fields every host document must carry.
pub const BASE_REQUIRED_FIELDS: [&str; 4] = ["hostname", "role", "username", "password"];

const SCOPE: &str = "host";

/// Operating system of a host.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum HostOs {
    /// Linux, driven through `bash`.
    #[default]
    Linux,
    /// Windows, driven through PowerShell.
    Windows,
}

impl HostOs {
    /// Shell used to run commands on this operating system.
    #[must_use]
    pub const fn shell(self) -> Shell {
        match self {
            Self::Linux => Shell::Bash,
            Self::Windows => Shell::PowerShell,
        }
    }
}

impl FromStr for HostOs {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            _ => Err(ConfigError::UnsupportedOs {
                value: value.to_owned(),
            }),
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => f.write_str("linux"),
            Self::Windows => f.write_str("windows"),
        }
    }
}

/// Errors raised by host lifecycle hooks.
#[derive(Debug, Error)]
pub enum HostError {
    /// A remote command issued by the hook failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The hook failed for another reason.
    #[error("host {hostname}: {message}")]
    Hook {
        /// Host whose hook failed.
        hostname: String,
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Behaviour attached to hosts of one role.
///
/// Deployments map roles to host types through
/// [`DomainProvider::host_type`](crate::domain::DomainProvider::host_type).
/// Every hook defaults to a no-op.
pub trait HostType: fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fields the host document must carry. Nested keys use `/` or `.`.
    fn required_fields(&self) -> Vec<&'static str> {
        BASE_REQUIRED_FIELDS.to_vec()
    }

    /// Called once before the first test of the session.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when preparing the host fails.
    fn session_setup(&self, _host: &Host) -> Result<(), HostError> {
        Ok(())
    }

    /// Called once after the last test of the session.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when cleaning up the host fails.
    fn session_teardown(&self, _host: &Host) -> Result<(), HostError> {
        Ok(())
    }

    /// Called before each test.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when preparing the host fails.
    fn setup(&self, _host: &Host) -> Result<(), HostError> {
        Ok(())
    }

    /// Called after each test.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when cleaning up the host fails.
    fn teardown(&self, _host: &Host) -> Result<(), HostError> {
        Ok(())
    }
}

/// Host type used for roles the deployment does not map.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GenericHost;

/// Name reported by [`GenericHost`].
pub const GENERIC_HOST_TYPE: &str = "generic";

impl HostType for GenericHost {
    fn name(&self) -> &str {
        GENERIC_HOST_TYPE
    }
}

/// A remote machine and its shared session.
#[derive(Debug)]
pub struct Host {
    domain_type: String,
    span: tracing::Span,
    hostname: String,
    role: String,
    username: String,
    password: String,
    ip: String,
    config: Map<String, Value>,
    artifacts: Vec<String>,
    os: HostOs,
    session: Rc<dyn RemoteSession>,
    cli: CommandBuilder,
    sessions: Rc<dyn SessionFactory>,
    kind: Box<dyn HostType>,
}

impl Host {
    /// Builds a host from its document and opens its session.
    ///
    /// The session connects immediately unless the domain context requests
    /// lazy connections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required field is missing, a field has
    /// the wrong shape, `os` is unsupported, or the eager connection fails.
    pub fn new(
        ctx: &DomainContext,
        document: &Value,
        kind: Box<dyn HostType>,
    ) -> Result<Self, ConfigError> {
        for field in kind.required_fields() {
            document::require(document, field, SCOPE)?;
        }

        let hostname = document::require_str(document, "hostname", SCOPE)?;
        let role = document::require_str(document, "role", SCOPE)?;
        let username = document::require_str(document, "username", SCOPE)?;
        let password = document::require_str(document, "password", SCOPE)?;
        let ip = document::optional_str(document, "ip", SCOPE)?;
        let config = document::optional_map(document, "config", SCOPE)?;
        let artifacts = document::optional_str_list(document, "artifacts", SCOPE)?;
        let os = parse_os(document)?;

        let span = info_span!(parent: ctx.span(), "host", hostname = %hostname, role = %role);
        let address = if ip.is_empty() { &hostname } else { &ip };
        let session: Rc<dyn RemoteSession> = Rc::from(ctx.sessions().open(SessionParams {
            address: address.clone(),
            username: username.clone(),
            password: password.clone(),
            shell: os.shell(),
            span: span.clone(),
        }));
        let cli = CommandBuilder::new(Rc::clone(&session));

        let host = Self {
            domain_type: ctx.domain_type().to_owned(),
            span,
            hostname,
            role,
            username,
            password,
            ip,
            config,
            artifacts,
            os,
            session,
            cli,
            sessions: Rc::clone(ctx.sessions()),
            kind,
        };

        if ctx.lazy_connect() {
            debug!(parent: &host.span, "deferring connection until first use");
        } else {
            host.session
                .connect()
                .map_err(|source| ConfigError::Connect {
                    hostname: host.hostname.clone(),
                    source,
                })?;
        }

        Ok(host)
    }

    /// Type tag of the owning domain.
    #[must_use]
    pub fn domain_type(&self) -> &str {
        &self.domain_type
    }

    /// Span carrying this host's log context.
    #[must_use]
    pub const fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Host name.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Role tag.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// SSH user.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// SSH password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// IP override; empty when the hostname is used directly.
    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Address sessions connect to: the IP override when set, otherwise the
    /// hostname.
    #[must_use]
    pub fn address(&self) -> &str {
        if self.ip.is_empty() {
            &self.hostname
        } else {
            &self.ip
        }
    }

    /// Free-form host configuration.
    #[must_use]
    pub const fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// Artifact glob patterns collected after tests.
    #[must_use]
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Operating system.
    #[must_use]
    pub const fn os(&self) -> HostOs {
        self.os
    }

    /// Shell that runs remote commands.
    #[must_use]
    pub const fn shell(&self) -> Shell {
        self.os.shell()
    }

    /// Session shared by every role bound to this host. Callers must not
    /// assume exclusive access.
    #[must_use]
    pub fn session(&self) -> &dyn RemoteSession {
        self.session.as_ref()
    }

    /// Command builder bound to the shared session.
    #[must_use]
    pub const fn cli(&self) -> &CommandBuilder {
        &self.cli
    }

    /// Factory used to open additional sessions to this host.
    #[must_use]
    pub fn sessions(&self) -> &dyn SessionFactory {
        self.sessions.as_ref()
    }

    /// Behaviour selected for this host's role.
    #[must_use]
    pub fn kind(&self) -> &dyn HostType {
        self.kind.as_ref()
    }

    /// Runs the host type's session-wide setup hook.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HostError`].
    pub fn session_setup(&self) -> Result<(), HostError> {
        self.kind.session_setup(self)
    }

    /// Runs the host type's session-wide teardown hook.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HostError`].
    pub fn session_teardown(&self) -> Result<(), HostError> {
        self.kind.session_teardown(self)
    }

    /// Runs the host type's per-test setup hook.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HostError`].
    pub fn setup(&self) -> Result<(), HostError> {
        self.kind.setup(self)
    }

    /// Runs the host type's per-test teardown hook.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`HostError`].
    pub fn teardown(&self) -> Result<(), HostError> {
        self.kind.teardown(self)
    }
}

fn parse_os(document: &Value) -> Result<HostOs, ConfigError> {
    match document.get("os") {
        None | Some(Value::Null) => Ok(HostOs::default()),
        Some(Value::String(value)) => value.parse(),
        Some(other) => Err(ConfigError::UnsupportedOs {
            value: other.to_string(),
        }),
    }
}
