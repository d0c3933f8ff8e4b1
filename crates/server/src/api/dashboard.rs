use axum::{extract::State, routing::get, Json, Router};

use crate::services::Dashboard;

use super::{ApiError, AppState, RequestContext};

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/api/dashboard", get(summary))
}

async fn summary(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Dashboard>, ApiError> {
    let dashboard = state.services.dashboard.summary(ctx.actor()).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(dashboard))
}
