use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use quoteflow_core::domain::actor::ActorId;
use quoteflow_core::domain::cart::{Cart, CartLine};
use quoteflow_core::domain::offer::OfferId;
use quoteflow_core::pricing::{totals_for, QuoteTotals};

use super::{ApiError, AppState, RequestContext};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(show).delete(clear))
        .route("/api/cart/items", post(add_item))
        .route("/api/cart/items/{offer_id}", delete(remove_item).put(set_quantity))
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    offer_id: OfferId,
    #[serde(default = "one")]
    quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct SetQuantityRequest {
    quantity: i64,
}

#[derive(Debug, Serialize)]
struct CartView {
    owner: ActorId,
    lines: Vec<CartLine>,
    item_count: u32,
    totals: QuoteTotals,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            item_count: cart.item_count(),
            totals: totals_for(cart.total()).for_display(),
            owner: cart.owner,
            lines: cart.lines,
        }
    }
}

async fn show(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<CartView>, ApiError> {
    let cart = state.services.carts.get(ctx.actor()).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(cart.into()))
}

async fn add_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart = state
        .services
        .carts
        .add_item(ctx.actor(), &request.offer_id, request.quantity)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(cart.into()))
}

async fn set_quantity(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(offer_id): Path<String>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart = state
        .services
        .carts
        .set_quantity(ctx.actor(), &OfferId(offer_id), request.quantity)
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(cart.into()))
}

async fn remove_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(offer_id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let cart = state
        .services
        .carts
        .remove_item(ctx.actor(), &OfferId(offer_id))
        .await
        .map_err(|e| ctx.fail(e))?;
    Ok(Json(cart.into()))
}

async fn clear(State(state): State<AppState>, ctx: RequestContext) -> Result<StatusCode, ApiError> {
    state.services.carts.clear(ctx.actor()).await.map_err(|e| ctx.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}
