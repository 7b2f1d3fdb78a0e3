//! Multi-tenancy resolution.
//!
//! A [`MultiTenancyAction`] runs once per request. It asks the configured
//! strategies, in precedence order, to identify the tenant. The first strategy
//! that returns one wins and gets to bind tenant-specific resources into the
//! [`RequestContext`].

pub mod action;
pub mod context;
pub mod middleware;
pub mod registry;
pub mod strategies;

use async_trait::async_trait;

use crate::datasource::{tenant_datasource_key, DATASOURCE_KEY};
use crate::error::Result;

pub use action::{MultiTenancyAction, Tenancy};
pub use context::{CurrentTenant, RequestContext, Tenant};
pub use registry::StrategyRegistry;

/// A pluggable way of deriving the tenant from a request.
#[async_trait]
pub trait MultiTenancyStrategy: Send + Sync {
    /// Name used to enable the strategy in configuration.
    fn name(&self) -> &str;

    /// Returns `Ok(None)` when the request carries no signal for this strategy.
    async fn identify_tenant(&self, ctx: &RequestContext) -> Result<Option<Tenant>>;

    /// Attach tenant-specific resources once this strategy has won.
    ///
    /// By default the shared `datasources.db` key is aliased to the tenant's
    /// own datasource.
    async fn bind_resources(&self, ctx: &mut RequestContext, tenant: &Tenant) -> Result<()> {
        ctx.bind_alias(DATASOURCE_KEY, tenant_datasource_key(tenant));
        Ok(())
    }
}
