use async_trait::async_trait;
use axum::http::header::HOST;

use crate::error::Result;
use crate::tenancy::{MultiTenancyStrategy, RequestContext, Tenant};

/// Uses the request host (including any port) as the tenant id.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostStrategy;

#[async_trait]
impl MultiTenancyStrategy for HostStrategy {
    fn name(&self) -> &str {
        "host"
    }

    async fn identify_tenant(&self, ctx: &RequestContext) -> Result<Option<Tenant>> {
        // HTTP/2 requests carry the host in the URI authority instead
        let host = ctx
            .header(HOST.as_str())
            .or_else(|| ctx.uri().authority().map(|a| a.as_str()));
        Ok(host.map(Tenant::new))
    }
}
