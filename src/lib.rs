//! Core library for describing and driving multi-host test environments.
//!
//! A JSON configuration document describes domains of hosts. [`Config`]
//! builds them, opening one shared [`RemoteSession`] per host; deployments
//! plug in host types and role wrappers through [`Deployment`] and
//! [`DomainProvider`]. Roles attach [`Utility`] helpers whose setup and
//! teardown run as a cascade around each test.

pub mod command;
pub mod config;
pub mod document;
pub mod domain;
pub mod host;
pub mod inventory;
pub mod role;
pub mod session;
pub mod settings;
pub mod test_support;
pub mod topology;
pub mod utility;

pub use command::{CliArg, CommandBuilder};
pub use config::{Config, ConfigContext, ConfigError, Deployment, load_document};
pub use domain::{Domain, DomainContext, DomainProvider, RoleConstructor};
pub use host::{ArtifactError, GenericHost, Host, HostError, HostOs, HostType};
pub use inventory::{InventoryDeployment, InventoryProvider};
pub use role::{FixtureContext, PlainRole, Role, RoleBase};
pub use session::{
    CommandLog, CommandOutput, CommandRunner, ProcessCommandRunner, RemoteSession, SessionError,
    SessionFactory, SessionOutput, SessionParams, Shell, SshOptions, SshSession, SshSessionFactory,
};
pub use settings::{MultihostSettings, SettingsError};
pub use topology::{
    BasicTopologyMark, Bound, Topology, TopologyBinding, TopologyDomain, TopologyError,
    TopologyMark,
};
pub use utility::{
    LifecycleError, TeardownErrors, TeardownFailure, Utility, UtilityBase, UtilityError,
    UtilityRegistry,
};
