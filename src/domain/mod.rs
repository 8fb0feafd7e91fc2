//! Domains: named groups of hosts sharing a declared type.
//!
//! A domain resolves roles to concrete behaviour through an injected
//! [`DomainProvider`]. Unknown roles fall back to [`GenericHost`] when hosts
//! are built, but are fatal when a test asks for a [`Role`] object, so a host
//! may appear in the inventory without every role having a wrapper.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::config::ConfigError;
use crate::document;
use crate::host::{GenericHost, Host, HostType};
use crate::role::{FixtureContext, Role, RoleBase};
use crate::session::SessionFactory;

const SCOPE: &str = "domain";

/// Builds a role object around a prepared [`RoleBase`]. Implementations
/// register their utilities on the base before wrapping it.
pub type RoleConstructor = fn(RoleBase) -> Box<dyn Role>;

/// Deployment-supplied mapping from role tags to host and role types.
pub trait DomainProvider: fmt::Debug {
    /// Host type for `role`, or `None` to use [`GenericHost`].
    fn host_type(&self, role: &str) -> Option<Box<dyn HostType>>;

    /// Role constructor for `role`, or `None` when the role has no wrapper.
    fn role_type(&self, role: &str) -> Option<RoleConstructor>;
}

/// Shared state handed from a configuration to its domains and hosts.
#[derive(Clone, Debug)]
pub struct DomainContext {
    domain_type: String,
    span: tracing::Span,
    lazy_connect: bool,
    sessions: Rc<dyn SessionFactory>,
}

impl DomainContext {
    /// Creates a context for a domain of `domain_type`.
    #[must_use]
    pub fn new(
        domain_type: impl Into<String>,
        span: tracing::Span,
        lazy_connect: bool,
        sessions: Rc<dyn SessionFactory>,
    ) -> Self {
        Self {
            domain_type: domain_type.into(),
            span,
            lazy_connect,
            sessions,
        }
    }

    /// Returns a copy of this context for another domain type.
    #[must_use]
    pub fn for_domain(&self, domain_type: &str) -> Self {
        Self {
            domain_type: domain_type.to_owned(),
            ..self.clone()
        }
    }

    /// Domain type tag.
    #[must_use]
    pub fn domain_type(&self) -> &str {
        &self.domain_type
    }

    /// Parent span for host spans.
    #[must_use]
    pub const fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Whether hosts postpone connecting until first use.
    #[must_use]
    pub const fn lazy_connect(&self) -> bool {
        self.lazy_connect
    }

    /// Factory that opens host sessions.
    #[must_use]
    pub const fn sessions(&self) -> &Rc<dyn SessionFactory> {
        &self.sessions
    }
}

/// A group of hosts of one declared type.
#[derive(Debug)]
pub struct Domain {
    ctx: DomainContext,
    domain_type: String,
    provider: Box<dyn DomainProvider>,
    hosts: Vec<Rc<Host>>,
}

impl Domain {
    /// Builds a domain and every host it declares.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `type` or `hosts` is
    /// missing, or any error raised while building a host.
    pub fn new(
        ctx: &DomainContext,
        document: &Value,
        provider: Box<dyn DomainProvider>,
    ) -> Result<Self, ConfigError> {
        let domain_type = document::require_str(document, "type", SCOPE)?;
        let entries = document::require_list(document, "hosts", SCOPE)?;

        let mut domain = Self {
            ctx: ctx.for_domain(&domain_type),
            domain_type,
            provider,
            hosts: Vec::with_capacity(entries.len()),
        };
        for entry in entries {
            let host = domain.create_host(entry)?;
            domain.hosts.push(Rc::new(host));
        }

        debug!(
            parent: domain.ctx.span(),
            domain = %domain.domain_type,
            hosts = domain.hosts.len(),
            "domain ready"
        );
        Ok(domain)
    }

    /// Domain type tag.
    #[must_use]
    pub fn domain_type(&self) -> &str {
        &self.domain_type
    }

    /// Hosts in declaration order.
    #[must_use]
    pub fn hosts(&self) -> &[Rc<Host>] {
        &self.hosts
    }

    /// Sorted, deduplicated role tags of the domain's hosts.
    #[must_use]
    pub fn roles(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|host| host.role().to_owned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Hosts carrying `role`, in declaration order.
    #[must_use]
    pub fn hosts_by_role(&self, role: &str) -> Vec<Rc<Host>> {
        self.hosts
            .iter()
            .filter(|host| host.role() == role)
            .cloned()
            .collect()
    }

    /// Builds a host of the type mapped to its role, falling back to
    /// [`GenericHost`] for unmapped roles.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `role` is missing or blank,
    /// before any host type is consulted, or any error raised by
    /// [`Host::new`].
    pub fn create_host(&self, document: &Value) -> Result<Host, ConfigError> {
        let role = document::require_str(document, "role", "host")?;
        let kind = self.provider.host_type(&role).unwrap_or_else(|| {
            debug!(parent: self.ctx.span(), role = %role, "no host type mapped, using generic host");
            Box::new(GenericHost)
        });
        Host::new(&self.ctx, document, kind)
    }

    /// Builds the role object for `host`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownRole`] when the provider has no role
    /// type for the host's role.
    pub fn create_role(
        &self,
        fixture: &Rc<FixtureContext>,
        host: &Rc<Host>,
    ) -> Result<Box<dyn Role>, ConfigError> {
        let constructor =
            self.provider
                .role_type(host.role())
                .ok_or_else(|| ConfigError::UnknownRole {
                    role: host.role().to_owned(),
                })?;
        Ok(constructor(RoleBase::new(
            Rc::clone(fixture),
            host.role(),
            Rc::clone(host),
        )))
    }
}

#[cfg(test)]
mod tests;
