//! Top-level multihost configuration.
//!
//! [`Config`] turns a parsed configuration document into domains and hosts.
//! Which concrete domain a `domains` entry becomes is decided by the
//! [`Deployment`] the configuration is built with.

use std::rc::Rc;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::document;
use crate::domain::{Domain, DomainContext};
use crate::session::{SessionError, SessionFactory};
use crate::topology::TopologyMark;

/// Errors raised while building the topology from configuration.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required key is missing or blank.
    #[error("\"{field}\" property is missing in {scope} configuration")]
    MissingField {
        /// Level of the document (`multihost`, `domain`, or `host`).
        scope: String,
        /// Missing key, possibly a nested path.
        field: String,
    },
    /// A key has the wrong shape.
    #[error("\"{field}\" property in {scope} configuration must be {expected}")]
    InvalidField {
        /// Level of the document.
        scope: String,
        /// Offending key.
        field: String,
        /// Description of the expected shape.
        expected: String,
    },
    /// The `os` field names an unsupported operating system.
    #[error("value \"{value}\" is not supported in os field of host configuration")]
    UnsupportedOs {
        /// Value found in the document.
        value: String,
    },
    /// No role type is registered for a host's role.
    #[error("unexpected role: {role}")]
    UnknownRole {
        /// Role tag without a registered role type.
        role: String,
    },
    /// The deployment does not know a domain type.
    #[error("unexpected domain type: {domain_type}")]
    UnknownDomainType {
        /// Domain type tag found in the document.
        domain_type: String,
    },
    /// Connecting to a host during construction failed.
    #[error("failed to connect to host {hostname}: {source}")]
    Connect {
        /// Host that could not be reached.
        hostname: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
    /// The configuration document could not be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Path of the document.
        path: String,
        /// Human-readable error message.
        message: String,
    },
    /// The configuration document is not valid JSON.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path of the document.
        path: String,
        /// Parser error message.
        message: String,
    },
}

impl ConfigError {
    /// Builds a [`ConfigError::MissingField`].
    #[must_use]
    pub fn missing(scope: &str, field: &str) -> Self {
        Self::MissingField {
            scope: scope.to_owned(),
            field: field.to_owned(),
        }
    }

    /// Builds a [`ConfigError::InvalidField`].
    #[must_use]
    pub fn invalid(scope: &str, field: &str, expected: &str) -> Self {
        Self::InvalidField {
            scope: scope.to_owned(),
            field: field.to_owned(),
            expected: expected.to_owned(),
        }
    }
}

/// Deployment-specific choices made while building a configuration.
pub trait Deployment {
    /// Topology mark type the deployment's tests are annotated with.
    type TopologyMark: TopologyMark;

    /// Builds the concrete domain for one `domains` entry.
    ///
    /// Implementations typically read the entry's `type` to pick a
    /// [`DomainProvider`](crate::domain::DomainProvider) and pass it to
    /// [`Domain::new`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the entry is invalid or its type is not
    /// known to the deployment.
    fn create_domain(&self, ctx: &DomainContext, document: &Value) -> Result<Domain, ConfigError>;
}

/// Process-wide inputs to [`Config::new`].
#[derive(Clone, Debug)]
pub struct ConfigContext {
    /// Root span for configuration, domain, and host log events.
    pub span: tracing::Span,
    /// Postpone connecting to hosts until first use.
    pub lazy_connect: bool,
    /// Factory opening host sessions.
    pub sessions: Rc<dyn SessionFactory>,
}

impl ConfigContext {
    /// Creates a context with a `multihost` root span.
    #[must_use]
    pub fn new(lazy_connect: bool, sessions: Rc<dyn SessionFactory>) -> Self {
        Self {
            span: tracing::info_span!("multihost"),
            lazy_connect,
            sessions,
        }
    }
}

/// Multihost configuration: every domain and host of the environment.
#[derive(Debug)]
pub struct Config<D: Deployment> {
    deployment: D,
    span: tracing::Span,
    lazy_connect: bool,
    domains: Vec<Domain>,
}

impl<D: Deployment> Config<D> {
    /// Builds every domain and host described by `document`.
    ///
    /// Hosts connect before this returns unless `ctx.lazy_connect` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `domains` is absent (no
    /// domain is built), or the first error raised while building a domain.
    pub fn new(document: &Value, deployment: D, ctx: ConfigContext) -> Result<Self, ConfigError> {
        let entries = document::require_list(document, "domains", "multihost")?;

        let base = DomainContext::new("", ctx.span.clone(), ctx.lazy_connect, Rc::clone(&ctx.sessions));
        let domains = entries
            .iter()
            .map(|entry| deployment.create_domain(&base, entry))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            parent: &ctx.span,
            domains = domains.len(),
            lazy = ctx.lazy_connect,
            "multihost configuration ready"
        );
        Ok(Self {
            deployment,
            span: ctx.span,
            lazy_connect: ctx.lazy_connect,
            domains,
        })
    }

    /// Deployment the configuration was built with.
    #[must_use]
    pub const fn deployment(&self) -> &D {
        &self.deployment
    }

    /// Root span.
    #[must_use]
    pub const fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Whether hosts postpone connecting until first use.
    #[must_use]
    pub const fn lazy_connect(&self) -> bool {
        self.lazy_connect
    }

    /// Domains in declaration order.
    #[must_use]
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// First domain with the given type tag.
    #[must_use]
    pub fn domain(&self, domain_type: &str) -> Option<&Domain> {
        self.domains
            .iter()
            .find(|domain| domain.domain_type() == domain_type)
    }
}

/// Reads a JSON configuration document from `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] when the file cannot be read, or
/// [`ConfigError::Parse`] when it is not valid JSON.
pub fn load_document(path: &Utf8Path) -> Result<Value, ConfigError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| ConfigError::Read {
        path: path.to_string(),
        message: String::from("configuration path is missing a filename"),
    })?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| ConfigError::Read {
        path: parent.to_string(),
        message: err.to_string(),
    })?;
    let contents = dir.read_to_string(file_name).map_err(|err| ConfigError::Read {
        path: path.to_string(),
        message: err.to_string(),
    })?;

    serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
        path: path.to_string(),
        message: err.to_string(),
    })
}
