use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use super::{CurrentTenant, MultiTenancyAction, RequestContext};
use crate::response::json_error;

/// Runs the tenancy action before the request reaches its handler.
///
/// Handlers can extract `Extension<RequestContext>` and, when a tenant was
/// identified, `Extension<CurrentTenant>`.
pub async fn multi_tenancy(
    State(action): State<Arc<MultiTenancyAction>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut ctx = RequestContext::from_request(&req);

    let resolved = action.action(&mut ctx).await;
    match resolved {
        Ok(tenant) => {
            if let Some(tenant) = tenant {
                req.extensions_mut().insert(CurrentTenant(tenant));
            }
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(e) => {
            tracing::error!("Tenant resolution failed for {}: {}", ctx.base_path(), e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
