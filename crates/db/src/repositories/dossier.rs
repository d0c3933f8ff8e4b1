use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use quoteflow_core::domain::actor::{ActorId, Role};
use quoteflow_core::domain::dossier::{Comment, CommentId, Dossier, DossierId, DossierStatus};

use super::{decode, parse_timestamp, DossierRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDossierRepository {
    pool: DbPool,
}

impl SqlDossierRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_dossier(row: &SqliteRow) -> Result<Dossier, RepositoryError> {
    let status: String = decode(row.try_get("status"))?;
    let agent_id: Option<String> = decode(row.try_get("agent_id"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(Dossier {
        id: DossierId(decode(row.try_get("id"))?),
        client_id: ActorId(decode(row.try_get("client_id"))?),
        agent_id: agent_id.map(ActorId),
        title: decode(row.try_get("title"))?,
        description: decode(row.try_get("description"))?,
        status: DossierStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown dossier status `{status}`")))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
        comments: Vec::new(),
    })
}

fn row_to_comment(row: &SqliteRow) -> Result<Comment, RepositoryError> {
    let author_role: String = decode(row.try_get("author_role"))?;
    let created_at: String = decode(row.try_get("created_at"))?;

    Ok(Comment {
        id: CommentId(decode(row.try_get("id"))?),
        dossier_id: DossierId(decode(row.try_get("dossier_id"))?),
        author_id: ActorId(decode(row.try_get("author_id"))?),
        author_role: Role::parse(&author_role)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{author_role}`")))?,
        text: decode(row.try_get("text"))?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

impl SqlDossierRepository {
    async fn attach_comments(&self, dossiers: &mut [Dossier]) -> Result<(), RepositoryError> {
        if dossiers.is_empty() {
            return Ok(());
        }

        let mut query = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT id, dossier_id, author_id, author_role, text, created_at
             FROM comments WHERE dossier_id IN (",
        );
        let mut ids = query.separated(", ");
        for dossier in dossiers.iter() {
            ids.push_bind(dossier.id.0.clone());
        }
        ids.push_unseparated(") ORDER BY created_at ASC, rowid ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut grouped: HashMap<String, Vec<Comment>> = HashMap::new();
        for row in &rows {
            let comment = row_to_comment(row)?;
            grouped.entry(comment.dossier_id.0.clone()).or_default().push(comment);
        }
        for dossier in dossiers.iter_mut() {
            dossier.comments = grouped.remove(&dossier.id.0).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DossierRepository for SqlDossierRepository {
    async fn find_by_id(&self, id: &DossierId) -> Result<Option<Dossier>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, client_id, agent_id, title, description, status, created_at, updated_at
             FROM dossiers WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut dossiers = [row_to_dossier(&row)?];
        self.attach_comments(&mut dossiers).await?;
        let [dossier] = dossiers;
        Ok(Some(dossier))
    }

    async fn list(&self, client: Option<&ActorId>) -> Result<Vec<Dossier>, RepositoryError> {
        let rows = match client {
            Some(client) => {
                sqlx::query(
                    "SELECT id, client_id, agent_id, title, description, status, created_at,
                            updated_at
                     FROM dossiers WHERE client_id = ?
                     ORDER BY created_at DESC, id ASC",
                )
                .bind(&client.0)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, client_id, agent_id, title, description, status, created_at,
                            updated_at
                     FROM dossiers ORDER BY created_at DESC, id ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut dossiers = rows.iter().map(row_to_dossier).collect::<Result<Vec<_>, _>>()?;
        self.attach_comments(&mut dossiers).await?;
        Ok(dossiers)
    }

    async fn save(&self, dossier: &Dossier) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO dossiers (id, client_id, agent_id, title, description, status,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 agent_id = excluded.agent_id,
                 title = excluded.title,
                 description = excluded.description,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
        )
        .bind(&dossier.id.0)
        .bind(&dossier.client_id.0)
        .bind(dossier.agent_id.as_ref().map(|id| id.0.as_str()))
        .bind(&dossier.title)
        .bind(&dossier.description)
        .bind(dossier.status.as_str())
        .bind(dossier.created_at.to_rfc3339())
        .bind(dossier.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_comment(&self, comment: &Comment) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO comments (id, dossier_id, author_id, author_role, text, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.id.0)
        .bind(&comment.dossier_id.0)
        .bind(&comment.author_id.0)
        .bind(comment.author_role.as_str())
        .bind(&comment.text)
        .bind(comment.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE dossiers SET updated_at = ? WHERE id = ?")
            .bind(comment.created_at.to_rfc3339())
            .bind(&comment.dossier_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &DossierId) -> Result<bool, RepositoryError> {
        // comments, quotes and quote_items cascade through foreign keys
        let result =
            sqlx::query("DELETE FROM dossiers WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
