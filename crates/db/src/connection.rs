use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::debug;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

/// Opens the pool with foreign keys enforced.
///
/// A private in-memory database lives inside a single connection, so those URLs get exactly one
/// connection that is never recycled.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let private_memory = is_private_memory(database_url);
    let max_connections = if private_memory { 1 } else { max_connections.max(1) };

    let mut options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)));
    if private_memory {
        options = options.min_connections(1).idle_timeout(None).max_lifetime(None);
    }

    debug!(
        event_name = "db.pool.connecting",
        max_connections,
        private_memory,
        "opening sqlite pool"
    );
    options
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

fn is_private_memory(database_url: &str) -> bool {
    let url = database_url.trim();
    let memory = url == ":memory:" || url.starts_with("sqlite::memory:");
    memory && !url.contains("cache=shared")
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_private_memory};

    #[test]
    fn shared_cache_memory_is_not_private() {
        assert!(is_private_memory("sqlite::memory:"));
        assert!(!is_private_memory("sqlite::memory:?cache=shared"));
        assert!(!is_private_memory("sqlite://quoteflow.db"));
    }

    #[tokio::test]
    async fn private_memory_pool_keeps_one_connection() {
        let pool = connect_with_settings("sqlite::memory:", 8, 5).await.expect("connect");
        sqlx::query("CREATE TABLE probe (id INTEGER)").execute(&pool).await.expect("create");

        // a second connection would not see the table
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM probe")
            .fetch_one(&pool)
            .await
            .expect("probe visible");
        assert_eq!(count, 0);
        assert_eq!(pool.options().get_max_connections(), 1);
    }
}
