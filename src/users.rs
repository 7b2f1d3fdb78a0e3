use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Response, StatusCode};
use axum::{Extension, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::datasource::{DataSource, NewUser, DATASOURCE_KEY};
use crate::response::{json_error, json_response};
use crate::tenancy::RequestContext;
use crate::AppState;

/// GET /users
pub async fn find_users(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
) -> Response<Body> {
    match bound_datasource(&state, &ctx) {
        Ok(ds) => json_response(StatusCode::OK, &ds.find_users().await),
        Err(resp) => resp,
    }
}

/// POST /users
///
/// Users created without a `tenantId` take the tenant of the request.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Json(mut new_user): Json<NewUser>,
) -> Response<Body> {
    let ds = match bound_datasource(&state, &ctx) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };

    if new_user.tenant_id.is_none() {
        new_user.tenant_id = ctx.current_tenant().map(|t| t.id.clone());
    }

    let user = ds.create_user(new_user).await;
    json_response(StatusCode::OK, &user)
}

/// GET /users/:id
pub async fn find_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Response<Body> {
    let ds = match bound_datasource(&state, &ctx) {
        Ok(ds) => ds,
        Err(resp) => return resp,
    };

    match ds.find_user(id).await {
        Some(user) => json_response(StatusCode::OK, &user),
        None => json_error(StatusCode::NOT_FOUND, &format!("User {} not found", id)),
    }
}

fn bound_datasource(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<Arc<DataSource>, Response<Body>> {
    state
        .datasources
        .resolve(ctx, DATASOURCE_KEY)
        .map_err(|e| {
            tracing::warn!("{}", e);
            json_error(StatusCode::NOT_FOUND, &e.to_string())
        })
}
