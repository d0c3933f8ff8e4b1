use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of known migrations not yet recorded as applied. Read-only.
pub async fn pending_count(pool: &DbPool) -> Result<usize, sqlx::Error> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if tracked == 0 {
        return Ok(MIGRATOR.iter().count());
    }

    let applied: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
    Ok(MIGRATOR.iter().filter(|migration| !applied.contains(&migration.version)).count())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{pending_count, run_pending};
    use crate::connect_with_settings;

    const MANAGED_TABLES: &[&str] = &[
        "profiles",
        "offers",
        "carts",
        "cart_lines",
        "dossiers",
        "comments",
        "quotes",
        "quote_items",
        "notifications",
        "credentials",
        "sessions",
    ];

    async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await
            .expect("list tables")
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect()
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let tables = table_names(&pool).await;
        for table in MANAGED_TABLES {
            assert!(tables.iter().any(|name| name == table), "missing table `{table}`");
        }
    }

    #[tokio::test]
    async fn running_twice_is_a_no_op() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        let before = table_names(&pool).await;

        run_pending(&pool).await.expect("second run");
        assert_eq!(table_names(&pool).await, before);
    }

    #[tokio::test]
    async fn status_columns_reject_unknown_values() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let result = sqlx::query(
            "INSERT INTO profiles (id, display_name, email, role, created_at, updated_at)
             VALUES ('p-1', 'Mallory', 'm@acme.test', 'superuser', '2026-01-01T00:00:00Z',
                     '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "role CHECK constraint should refuse `superuser`");
    }

    #[tokio::test]
    async fn pending_count_drops_to_zero_after_migrating() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        assert_eq!(pending_count(&pool).await.expect("count"), 1);

        run_pending(&pool).await.expect("migrate");
        assert_eq!(pending_count(&pool).await.expect("count"), 0);
    }
}
