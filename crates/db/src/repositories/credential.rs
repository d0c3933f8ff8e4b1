use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use quoteflow_core::domain::actor::ActorId;

use super::{
    decode, is_unique_violation, parse_timestamp, Credential, CredentialRepository,
    RepositoryError, SessionRecord,
};
use crate::DbPool;

pub struct SqlCredentialRepository {
    pool: DbPool,
}

impl SqlCredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_credential(row: &SqliteRow) -> Result<Credential, RepositoryError> {
    let confirmed: i64 = decode(row.try_get("email_confirmed"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    Ok(Credential {
        actor_id: ActorId(decode(row.try_get("actor_id"))?),
        email: decode(row.try_get("email"))?,
        salt: decode(row.try_get("salt"))?,
        password_digest: decode(row.try_get("password_digest"))?,
        email_confirmed: confirmed != 0,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

fn row_to_session(row: &SqliteRow) -> Result<SessionRecord, RepositoryError> {
    let created_at: String = decode(row.try_get("created_at"))?;
    let expires_at: String = decode(row.try_get("expires_at"))?;
    Ok(SessionRecord {
        token: decode(row.try_get("token"))?,
        actor_id: ActorId(decode(row.try_get("actor_id"))?),
        created_at: parse_timestamp("created_at", &created_at)?,
        expires_at: parse_timestamp("expires_at", &expires_at)?,
    })
}

#[async_trait::async_trait]
impl CredentialRepository for SqlCredentialRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, RepositoryError> {
        let row = sqlx::query(
            "SELECT actor_id, email, salt, password_digest, email_confirmed, created_at
             FROM credentials WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_credential).transpose()
    }

    async fn find_by_actor(&self, actor: &ActorId) -> Result<Option<Credential>, RepositoryError> {
        let row = sqlx::query(
            "SELECT actor_id, email, salt, password_digest, email_confirmed, created_at
             FROM credentials WHERE actor_id = ?",
        )
        .bind(&actor.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_credential).transpose()
    }

    async fn insert(&self, credential: &Credential) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO credentials (actor_id, email, salt, password_digest, email_confirmed,
                                      created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&credential.actor_id.0)
        .bind(&credential.email)
        .bind(&credential.salt)
        .bind(&credential.password_digest)
        .bind(i64::from(credential.email_confirmed))
        .bind(credential.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(RepositoryError::Duplicate {
                resource: "credential",
                id: credential.email.clone(),
            }),
            Err(error) => Err(error.into()),
        }
    }

    async fn confirm_email(&self, actor: &ActorId) -> Result<bool, RepositoryError> {
        let updated = sqlx::query("UPDATE credentials SET email_confirmed = 1 WHERE actor_id = ?")
            .bind(&actor.0)
            .execute(&self.pool)
            .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn insert_session(&self, session: &SessionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sessions (token, actor_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(&session.actor_id.0)
        .bind(session.created_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        let row =
            sqlx::query("SELECT token, actor_id, created_at, expires_at FROM sessions WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(row_to_session).transpose()
    }

    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}
