//! Deployment that accepts any domain type and maps no roles.
//!
//! Used by the `multihost` binary to inspect a configuration document and to
//! collect artifacts without a deployment-specific role catalogue: every
//! host becomes a [`GenericHost`](crate::host::GenericHost).

use serde_json::Value;

use crate::config::{ConfigError, Deployment};
use crate::domain::{Domain, DomainContext, DomainProvider, RoleConstructor};
use crate::host::HostType;
use crate::topology::BasicTopologyMark;

/// Provider that maps no role to a host or role type.
#[derive(Clone, Copy, Debug, Default)]
pub struct InventoryProvider;

impl DomainProvider for InventoryProvider {
    fn host_type(&self, _role: &str) -> Option<Box<dyn HostType>> {
        None
    }

    fn role_type(&self, _role: &str) -> Option<RoleConstructor> {
        None
    }
}

/// Deployment building an [`InventoryProvider`] domain for every entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct InventoryDeployment;

impl Deployment for InventoryDeployment {
    type TopologyMark = BasicTopologyMark;

    fn create_domain(&self, ctx: &DomainContext, document: &Value) -> Result<Domain, ConfigError> {
        Domain::new(ctx, document, Box::new(InventoryProvider))
    }
}
