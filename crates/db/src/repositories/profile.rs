use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use quoteflow_core::domain::actor::{Actor, ActorId, Role};

use super::{decode, is_unique_violation, parse_timestamp, ProfileRepository, RepositoryError};
use crate::DbPool;

const PROFILE_COLUMNS: &str =
    "id, display_name, email, role, company, phone, created_at, updated_at";

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_actor(row: &SqliteRow) -> Result<Actor, RepositoryError> {
    let role: String = decode(row.try_get("role"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(Actor {
        id: ActorId(decode(row.try_get("id"))?),
        display_name: decode(row.try_get("display_name"))?,
        email: decode(row.try_get("email"))?,
        role: Role::parse(&role)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role}`")))?,
        company: decode(row.try_get("company"))?,
        phone: decode(row.try_get("phone"))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find_by_id(&self, id: &ActorId) -> Result<Option<Actor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_actor).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Actor>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_actor).transpose()
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<Actor>, RepositoryError> {
        let rows = match role {
            Some(role) => {
                sqlx::query(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM profiles WHERE role = ?
                     ORDER BY display_name ASC, id ASC"
                ))
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY display_name ASC, id ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_actor).collect()
    }

    async fn save(&self, actor: Actor) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO profiles (id, display_name, email, role, company, phone,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 email = excluded.email,
                 role = excluded.role,
                 company = excluded.company,
                 phone = excluded.phone,
                 updated_at = excluded.updated_at",
        )
        .bind(&actor.id.0)
        .bind(&actor.display_name)
        .bind(&actor.email)
        .bind(actor.role.as_str())
        .bind(&actor.company)
        .bind(&actor.phone)
        .bind(actor.created_at.to_rfc3339())
        .bind(actor.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => {
                Err(RepositoryError::Duplicate { resource: "profile email", id: actor.email })
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use quoteflow_core::domain::actor::{Actor, ActorId, Role};

    use super::SqlProfileRepository;
    use crate::repositories::{ProfileRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlProfileRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlProfileRepository::new(pool)
    }

    fn actor(id: &str, name: &str, role: Role) -> Actor {
        let mut actor = Actor::register(
            ActorId(id.to_string()),
            name,
            format!("{}@acme.test", id.to_ascii_lowercase()),
            Utc::now(),
        );
        actor.role = role;
        actor
    }

    #[tokio::test]
    async fn role_filter_and_case_insensitive_email_lookup() {
        let repo = setup().await;
        repo.save(actor("A1", "Grace", Role::Admin)).await.expect("admin");
        repo.save(actor("A2", "Barbara", Role::Admin)).await.expect("admin");
        repo.save(actor("C1", "Ada", Role::Client)).await.expect("client");

        let admins = repo.list(Some(Role::Admin)).await.expect("admins");
        let names: Vec<_> = admins.iter().map(|a| a.display_name.as_str()).collect();
        assert_eq!(names, vec!["Barbara", "Grace"]);

        let found = repo.find_by_email("C1@ACME.test").await.expect("lookup");
        assert_eq!(found.map(|a| a.id.0), Some("C1".to_string()));
    }

    #[tokio::test]
    async fn promotion_is_persisted_by_upsert() {
        let repo = setup().await;
        let mut client = actor("C1", "Ada", Role::Client);
        repo.save(client.clone()).await.expect("insert");

        client.role = Role::Agent;
        repo.save(client.clone()).await.expect("upsert");

        let stored = repo.find_by_id(&client.id).await.expect("find").expect("exists");
        assert_eq!(stored.role, Role::Agent);
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let repo = setup().await;
        repo.save(actor("C1", "Ada", Role::Client)).await.expect("first");

        let mut clash = actor("C2", "Other", Role::Client);
        clash.email = "c1@acme.test".to_string();
        let error = repo.save(clash).await.expect_err("duplicate email");
        assert!(matches!(error, RepositoryError::Duplicate { .. }));
    }
}
