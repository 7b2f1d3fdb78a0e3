use async_trait::async_trait;

use crate::error::Result;
use crate::tenancy::{MultiTenancyStrategy, RequestContext, Tenant};

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Uses the `x-tenant-id` header as the tenant id.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderStrategy;

#[async_trait]
impl MultiTenancyStrategy for HeaderStrategy {
    fn name(&self) -> &str {
        "header"
    }

    async fn identify_tenant(&self, ctx: &RequestContext) -> Result<Option<Tenant>> {
        Ok(ctx.header(TENANT_HEADER).map(Tenant::new))
    }
}
