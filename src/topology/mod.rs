//! Topologies: which domains and how many hosts per role a test needs.
//!
//! Interpreting test annotations is the test runner's business; this module
//! only models a requested topology and binds it to the hosts of a built
//! [`Config`]. Bound hosts are addressable by path:
//!
//! * `"{domain}.{role}"` selects every chosen host of that role;
//! * `"{domain}.{role}[i]"` selects one of them.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::config::{Config, Deployment};
use crate::domain::Domain;
use crate::host::Host;

/// Hosts requested from one domain, as role → count.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TopologyDomain {
    id: String,
    roles: BTreeMap<String, usize>,
}

impl TopologyDomain {
    /// Requests `count` hosts of each role from the domain of type `id`.
    #[must_use]
    pub fn new<I, S>(id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            roles: roles
                .into_iter()
                .map(|(role, count)| (role.into(), count))
                .collect(),
        }
    }

    /// Domain type the request targets.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Requested role counts.
    #[must_use]
    pub const fn roles(&self) -> &BTreeMap<String, usize> {
        &self.roles
    }

    /// Requested count for `role`.
    #[must_use]
    pub fn count(&self, role: &str) -> Option<usize> {
        self.roles.get(role).copied()
    }

    fn satisfied_by(&self, domain: &Domain) -> bool {
        self.roles
            .iter()
            .all(|(role, count)| domain.hosts_by_role(role).len() >= *count)
    }
}

/// A complete topology request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Topology {
    domains: Vec<TopologyDomain>,
}

impl Topology {
    /// Creates a topology from its domain requests.
    #[must_use]
    pub fn new(domains: impl IntoIterator<Item = TopologyDomain>) -> Self {
        Self {
            domains: domains.into_iter().collect(),
        }
    }

    /// Domain requests in declaration order.
    #[must_use]
    pub fn domains(&self) -> &[TopologyDomain] {
        &self.domains
    }

    /// Request for the domain of type `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TopologyDomain> {
        self.domains.iter().find(|domain| domain.id == id)
    }

    /// Reports whether `config` has every requested domain with enough
    /// hosts of each requested role.
    #[must_use]
    pub fn satisfied_by<D: Deployment>(&self, config: &Config<D>) -> bool {
        self.domains.iter().all(|request| {
            config
                .domain(request.id())
                .is_some_and(|domain| request.satisfied_by(domain))
        })
    }
}

/// A named topology plus the fixture names tests use to reach its hosts.
pub trait TopologyMark: fmt::Debug {
    /// Topology name, used in test identifiers.
    fn name(&self) -> &str;

    /// Requested topology.
    fn topology(&self) -> &Topology;

    /// Fixture name → host path.
    fn fixtures(&self) -> &BTreeMap<String, String>;
}

/// Plain [`TopologyMark`] with no deployment-specific extras.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BasicTopologyMark {
    name: String,
    topology: Topology,
    fixtures: BTreeMap<String, String>,
}

impl BasicTopologyMark {
    /// Creates a mark.
    #[must_use]
    pub fn new<I, K, V>(name: impl Into<String>, topology: Topology, fixtures: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            topology,
            fixtures: fixtures
                .into_iter()
                .map(|(fixture, path)| (fixture.into(), path.into()))
                .collect(),
        }
    }
}

impl TopologyMark for BasicTopologyMark {
    fn name(&self) -> &str {
        &self.name
    }

    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn fixtures(&self) -> &BTreeMap<String, String> {
        &self.fixtures
    }
}

/// Errors raised while binding a topology.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TopologyError {
    /// A fixture refers to a path the topology does not provide.
    #[error("fixture {fixture} refers to unknown path {path}")]
    UnknownPath {
        /// Fixture name.
        fixture: String,
        /// Path that could not be resolved.
        path: String,
    },
}

/// What a topology path resolves to.
#[derive(Clone, Debug)]
pub enum Bound {
    /// A single host (`domain.role[i]`).
    Host(Rc<Host>),
    /// Every selected host of a role (`domain.role`).
    Hosts(Vec<Rc<Host>>),
}

impl Bound {
    /// The single host, if this is a [`Bound::Host`].
    #[must_use]
    pub fn host(&self) -> Option<&Rc<Host>> {
        match self {
            Self::Host(host) => Some(host),
            Self::Hosts(_) => None,
        }
    }

    /// Every host covered by this binding.
    #[must_use]
    pub fn hosts(&self) -> Vec<Rc<Host>> {
        match self {
            Self::Host(host) => vec![Rc::clone(host)],
            Self::Hosts(hosts) => hosts.clone(),
        }
    }
}

/// A topology mark bound to concrete hosts.
#[derive(Clone, Debug)]
pub struct TopologyBinding {
    name: String,
    paths: BTreeMap<String, Bound>,
    fixtures: BTreeMap<String, Bound>,
    hosts: Vec<Rc<Host>>,
}

impl TopologyBinding {
    /// Selects the first `count` hosts of each requested role, in
    /// declaration order, and resolves the mark's fixtures.
    ///
    /// Domains the configuration does not have are skipped; use
    /// [`Topology::satisfied_by`] to reject such configurations up front.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownPath`] when a fixture names a path
    /// that was not bound.
    pub fn bind<D: Deployment>(
        config: &Config<D>,
        mark: &impl TopologyMark,
    ) -> Result<Self, TopologyError> {
        let mut paths = BTreeMap::new();
        let mut hosts = Vec::new();

        for domain in config.domains() {
            let Some(request) = mark.topology().get(domain.domain_type()) else {
                continue;
            };

            for role in domain.roles() {
                let Some(count) = request.count(&role) else {
                    continue;
                };

                let selected: Vec<Rc<Host>> =
                    domain.hosts_by_role(&role).into_iter().take(count).collect();
                for (index, host) in selected.iter().enumerate() {
                    paths.insert(
                        format!("{}.{role}[{index}]", request.id()),
                        Bound::Host(Rc::clone(host)),
                    );
                }
                hosts.extend(selected.iter().cloned());
                paths.insert(format!("{}.{role}", request.id()), Bound::Hosts(selected));
            }
        }

        hosts.sort_by(|a, b| a.hostname().cmp(b.hostname()));
        hosts.dedup_by(|a, b| Rc::ptr_eq(a, b));

        let fixtures = mark
            .fixtures()
            .iter()
            .map(|(fixture, path)| {
                paths
                    .get(path)
                    .cloned()
                    .map(|bound| (fixture.clone(), bound))
                    .ok_or_else(|| TopologyError::UnknownPath {
                        fixture: fixture.clone(),
                        path: path.clone(),
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self {
            name: mark.name().to_owned(),
            paths,
            fixtures,
            hosts,
        })
    }

    /// Name of the bound topology.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a path such as `ldap.client[0]`.
    #[must_use]
    pub fn path(&self, path: &str) -> Option<&Bound> {
        self.paths.get(path)
    }

    /// Resolves a fixture name.
    #[must_use]
    pub fn fixture(&self, name: &str) -> Option<&Bound> {
        self.fixtures.get(name)
    }

    /// Every selected host, sorted by hostname.
    #[must_use]
    pub fn hosts(&self) -> &[Rc<Host>] {
        &self.hosts
    }
}
