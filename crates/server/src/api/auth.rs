use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use quoteflow_core::access::AccessError;
use quoteflow_core::domain::actor::Actor;
use quoteflow_core::errors::ApplicationError;
use quoteflow_core::session::{SignInResult, SignUp};

use super::{bearer_token, correlation_id, ApiError, AppState, RequestContext};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/session", get(current_session))
}

#[derive(Debug, Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct SessionView {
    actor: Actor,
    email_confirmed: bool,
    expires_at: DateTime<Utc>,
}

async fn sign_up(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<SignUp>,
) -> Result<(StatusCode, Json<Actor>), ApiError> {
    let actor = state.auth.sign_up(request).await.map_err(|error| ctx.fail(error))?;
    Ok((StatusCode::CREATED, Json(actor)))
}

async fn sign_in(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResult>, ApiError> {
    let result =
        state.auth.sign_in(&request.email, &request.password).await.map_err(|e| ctx.fail(e))?;
    Ok(Json(result))
}

/// Succeeds for unknown or already revoked tokens.
async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let correlation_id = correlation_id(&headers);
    let fail = |error: ApplicationError| ApiError(error.into_interface(correlation_id.as_str()));

    if let Some(token) = bearer_token(&headers).map_err(fail)? {
        state.auth.sign_out(&token).await.map_err(|error| fail(error.into()))?;
        info!(event_name = "auth.sign_out", correlation_id = %correlation_id, "session revoked");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn current_session(ctx: RequestContext) -> Result<Json<SessionView>, ApiError> {
    let session = ctx.session.as_ref().ok_or_else(|| ctx.fail(AccessError::Unauthenticated))?;
    Ok(Json(SessionView {
        actor: session.actor.clone(),
        email_confirmed: session.email_confirmed,
        expires_at: session.expires_at,
    }))
}
