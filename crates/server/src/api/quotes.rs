use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use quoteflow_core::domain::actor::ActorId;
use quoteflow_core::domain::dossier::DossierId;
use quoteflow_core::domain::quote::{Quote, QuoteId, QuoteStatus};
use quoteflow_core::pricing::{quote_totals, QuoteTotals};
use quoteflow_db::repositories::QuoteFilter;

use crate::services::{CheckoutRequest, QuoteDocumentView};

use super::{ApiError, AppState, RequestContext};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/quotes", get(list))
        .route("/api/quotes/checkout", post(checkout))
        .route("/api/quotes/{id}", get(show))
        .route("/api/quotes/{id}/approve", post(approve))
        .route("/api/quotes/{id}/reject", post(reject))
        .route("/api/quotes/{id}/sign", post(sign))
        .route("/api/quotes/{id}/document", get(document))
}

#[derive(Debug, Default, Deserialize)]
struct QuoteQuery {
    status: Option<QuoteStatus>,
    dossier_id: Option<String>,
    client_id: Option<String>,
}

impl From<QuoteQuery> for QuoteFilter {
    fn from(query: QuoteQuery) -> Self {
        Self {
            client_id: query.client_id.map(ActorId),
            status: query.status,
            dossier_id: query.dossier_id.map(DossierId),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    reason: String,
}

/// A quote with its display totals (20% VAT).
#[derive(Debug, Serialize)]
struct QuoteView {
    #[serde(flatten)]
    quote: Quote,
    totals: QuoteTotals,
}

impl From<Quote> for QuoteView {
    fn from(quote: Quote) -> Self {
        Self { totals: quote_totals(&quote).for_display(), quote }
    }
}

async fn checkout(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<QuoteView>), ApiError> {
    let quote = state
        .services
        .quotes
        .checkout(ctx.actor(), request, &ctx.correlation_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok((StatusCode::CREATED, Json(quote.into())))
}

async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<Vec<QuoteView>>, ApiError> {
    let quotes =
        state.services.quotes.list(ctx.actor(), query.into()).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(quotes.into_iter().map(QuoteView::from).collect()))
}

async fn show(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<QuoteView>, ApiError> {
    let quote =
        state.services.quotes.get(ctx.actor(), &QuoteId(id)).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(quote.into()))
}

async fn approve(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<QuoteView>, ApiError> {
    let quote = state
        .services
        .quotes
        .approve(ctx.actor(), &QuoteId(id), &ctx.correlation_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(quote.into()))
}

async fn reject(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<QuoteView>, ApiError> {
    let quote = state
        .services
        .quotes
        .reject(ctx.actor(), &QuoteId(id), request.reason, &ctx.correlation_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(quote.into()))
}

async fn sign(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<QuoteView>, ApiError> {
    let quote = state
        .services
        .quotes
        .sign(ctx.actor(), &QuoteId(id), &ctx.correlation_id)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(quote.into()))
}

async fn document(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<QuoteDocumentView>, ApiError> {
    let view =
        state.services.quotes.document(ctx.actor(), &QuoteId(id)).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(view))
}
