use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use quoteflow_core::domain::notification::NotificationId;

use crate::services::FeedView;

use super::{ApiError, AppState, RequestContext};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(feed))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/{id}/read", post(mark_read))
}

#[derive(Debug, Serialize)]
struct ReadResponse {
    updated: u64,
}

async fn feed(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<FeedView>, ApiError> {
    let feed = state.services.notifications.feed(ctx.actor()).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(feed))
}

async fn mark_read(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ReadResponse>, ApiError> {
    let changed = state
        .services
        .notifications
        .mark_read(ctx.actor(), &NotificationId(id))
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(ReadResponse { updated: u64::from(changed) }))
}

async fn mark_all_read(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<ReadResponse>, ApiError> {
    let updated =
        state.services.notifications.mark_all_read(ctx.actor()).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(ReadResponse { updated }))
}
