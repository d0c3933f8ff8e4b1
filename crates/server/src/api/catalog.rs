use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};

use quoteflow_core::domain::offer::Offer;

use super::{ApiError, AppState, RequestContext};

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/api/offers", get(browse))
}

async fn browse(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<BTreeMap<String, Vec<Offer>>>, ApiError> {
    let catalog = state.services.catalog.browse(ctx.actor()).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(catalog))
}
