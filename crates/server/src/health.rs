use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use quoteflow_db::{migrations, DbPool};
use serde::Serialize;

/// Tables every request path touches; the health check reads each one.
const CHECKED_TABLES: [&str; 4] = ["profiles", "offers", "dossiers", "quotes"];

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }

    fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let schema = schema_check(&state.db_pool).await;
    let database = if schema.is_ready() {
        tables_check(&state.db_pool).await
    } else {
        HealthCheck::degraded("skipped until the schema is current")
    };
    let ready = schema.is_ready() && database.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        schema,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn schema_check(pool: &DbPool) -> HealthCheck {
    match migrations::pending_count(pool).await {
        Ok(0) => HealthCheck::ready("all quoteflow migrations applied"),
        Ok(pending) => HealthCheck::degraded(format!(
            "{pending} migration(s) pending, run `quoteflow migrate`"
        )),
        Err(error) => HealthCheck::degraded(format!("migration table unreadable: {error}")),
    }
}

async fn tables_check(pool: &DbPool) -> HealthCheck {
    for table in CHECKED_TABLES {
        let query = format!("SELECT COUNT(*) FROM {table}");
        if let Err(error) = sqlx::query_scalar::<_, i64>(&query).fetch_one(pool).await {
            return HealthCheck::degraded(format!("{table} table unreachable: {error}"));
        }
    }
    HealthCheck::ready(format!("{} reachable", CHECKED_TABLES.join(", ")))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use quoteflow_db::{connect_with_settings, migrations};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_names_the_tables_it_reached() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.detail, "profiles, offers, dossiers, quotes reachable");
        assert_eq!(payload.schema.status, "ready");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_reports_pending_migrations() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.schema.status, "degraded");
        assert!(payload.schema.detail.contains("quoteflow migrate"), "{}", payload.schema.detail);
        assert_eq!(payload.database.status, "degraded");
    }
}
