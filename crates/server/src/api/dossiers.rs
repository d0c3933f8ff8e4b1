use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use quoteflow_core::domain::dossier::{Comment, Dossier, DossierId, DossierStatus};

use crate::services::{DossierDetail, NewDossier};

use super::{ApiError, AppState, RequestContext};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/dossiers", get(list).post(create))
        .route("/api/dossiers/{id}", get(show).delete(remove))
        .route("/api/dossiers/{id}/status", put(set_status))
        .route("/api/dossiers/{id}/comments", post(add_comment))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: DossierStatus,
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    text: String,
}

async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<NewDossier>,
) -> Result<(StatusCode, Json<Dossier>), ApiError> {
    let dossier = state
        .services
        .dossiers
        .create(ctx.actor(), request, &ctx.correlation_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok((StatusCode::CREATED, Json(dossier)))
}

async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<Dossier>>, ApiError> {
    let dossiers = state.services.dossiers.list(ctx.actor()).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(dossiers))
}

async fn show(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<DossierDetail>, ApiError> {
    let detail =
        state.services.dossiers.get(ctx.actor(), &DossierId(id)).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(detail))
}

async fn set_status(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Dossier>, ApiError> {
    let dossier = state
        .services
        .dossiers
        .set_status(ctx.actor(), &DossierId(id), request.status, &ctx.correlation_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(dossier))
}

async fn add_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state
        .services
        .dossiers
        .add_comment(ctx.actor(), &DossierId(id), &request.text)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn remove(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .dossiers
        .delete(ctx.actor(), &DossierId(id), &ctx.correlation_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}
