use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use quoteflow_core::access::AccessError;
use quoteflow_core::domain::actor::{Actor, ActorId, Role};

use super::{ApiError, AppState, RequestContext};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/profiles", get(list))
        .route("/api/profiles/me", get(me))
        .route("/api/profiles/{id}/promote", post(promote))
}

#[derive(Debug, Default, Deserialize)]
struct ProfileQuery {
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct PromoteRequest {
    role: Role,
}

async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<Vec<Actor>>, ApiError> {
    let actors =
        state.services.profiles.list(ctx.actor(), query.role).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(actors))
}

async fn me(ctx: RequestContext) -> Result<Json<Actor>, ApiError> {
    let actor = ctx.actor().cloned().ok_or_else(|| ctx.fail(AccessError::Unauthenticated))?;
    Ok(Json(actor))
}

async fn promote(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<PromoteRequest>,
) -> Result<Json<Actor>, ApiError> {
    let actor = state
        .services
        .profiles
        .promote(ctx.actor(), &ActorId(id), request.role, &ctx.correlation_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(actor))
}
