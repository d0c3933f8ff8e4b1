use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use quoteflow_core::domain::actor::ActorId;
use quoteflow_core::domain::notification::{Notification, NotificationId, NotificationKind};

use super::{decode, parse_timestamp, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_notification(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let kind: String = decode(row.try_get("kind"))?;
    let read: i64 = decode(row.try_get("read"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(Notification {
        id: NotificationId(decode(row.try_get("id"))?),
        target_user_id: ActorId(decode(row.try_get("target_user_id"))?),
        title: decode(row.try_get("title"))?,
        message: decode(row.try_get("message"))?,
        kind: NotificationKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown notification kind `{kind}`")))?,
        read: read != 0,
        link: decode(row.try_get("link"))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notifications (id, target_user_id, title, message, kind, read, link,
                                        created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&notification.id.0)
        .bind(&notification.target_user_id.0)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(i64::from(notification.read))
        .bind(&notification.link)
        .bind(notification.created_at.to_rfc3339())
        .bind(notification.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for(&self, target: &ActorId) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, target_user_id, title, message, kind, read, link, created_at, updated_at
             FROM notifications WHERE target_user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(&target.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_notification).collect()
    }

    async fn mark_read(
        &self,
        target: &ActorId,
        id: &NotificationId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE notifications SET read = 1, updated_at = ?
             WHERE id = ? AND target_user_id = ? AND read = 0",
        )
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .bind(&target.0)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn mark_all_read(
        &self,
        target: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE notifications SET read = 1, updated_at = ?
             WHERE target_user_id = ? AND read = 0",
        )
        .bind(now.to_rfc3339())
        .bind(&target.0)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected())
    }
}
