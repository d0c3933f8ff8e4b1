//! JSON API.
//!
//! - `/api/auth/*`           sign-up, sign-in, sign-out, current session
//! - `/api/offers`           catalog grouped by category
//! - `/api/cart*`            per-actor cart
//! - `/api/quotes*`          checkout, listing, approve/reject/sign, document availability
//! - `/api/dossiers*`        case files, status, comments
//! - `/api/notifications*`   feed and read state
//! - `/api/profiles*`        staff listing, promotion
//! - `/api/dashboard`        staff counters
//!
//! Callers authenticate with `Authorization: Bearer <token>`. An absent header reaches the
//! services as an anonymous caller so the access guard decides between 401 and 403.

mod auth;
mod cart;
mod catalog;
mod dashboard;
mod dossiers;
mod notifications;
mod profiles;
mod quotes;

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use quoteflow_core::domain::actor::Actor;
use quoteflow_core::errors::{ApplicationError, DomainError, InterfaceError};
use quoteflow_core::session::{AuthProvider, Session, SessionToken};

use crate::services::AppServices;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub auth: Arc<dyn AuthProvider>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(auth::routes())
        .merge(catalog::routes())
        .merge(cart::routes())
        .merge(quotes::routes())
        .merge(dossiers::routes())
        .merge(notifications::routes())
        .merge(profiles::routes())
        .merge(dashboard::routes())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    correlation_id: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        }

        let body = ErrorBody {
            error: self.0.user_message(),
            // internal details stay in the logs
            detail: (!status.is_server_error()).then(|| self.0.message()),
            correlation_id: self.0.correlation_id(),
        };
        (status, Json(body)).into_response()
    }
}

/// Per-request caller and correlation id.
pub struct RequestContext {
    pub session: Option<Session>,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn actor(&self) -> Option<&Actor> {
        self.session.as_ref().map(Session::actor)
    }

    pub fn fail(&self, error: impl Into<ApplicationError>) -> ApiError {
        ApiError(error.into().into_interface(self.correlation_id.as_str()))
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let correlation_id = correlation_id(&parts.headers);
        let fail = |error: ApplicationError| ApiError(error.into_interface(correlation_id.as_str()));

        let session = match bearer_token(&parts.headers).map_err(fail)? {
            None => None,
            Some(token) => match state.auth.resolve(&token).await {
                Ok(session) => Some(session),
                Err(auth_error) => {
                    warn!(
                        event_name = "api.session.rejected",
                        correlation_id = %correlation_id,
                        error = %auth_error,
                        "bearer token did not resolve to a session"
                    );
                    return Err(fail(auth_error.into()));
                }
            },
        };

        Ok(Self { session, correlation_id })
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<Option<SessionToken>, ApplicationError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let malformed = || {
        ApplicationError::from(DomainError::Validation(
            "expected `Authorization: Bearer <token>`".to_string(),
        ))
    };
    let value = value.to_str().map_err(|_| malformed())?;
    let token = value.strip_prefix("Bearer ").map(str::trim).ok_or_else(malformed)?;
    if token.is_empty() {
        return Err(malformed());
    }
    Ok(Some(SessionToken(token.to_string())))
}
