use chrono::Utc;
use quoteflow_core::access::raise_role;
use quoteflow_core::domain::actor::Role;
use quoteflow_db::Repositories;

use crate::commands::{load_config, open_database, runtime, CommandResult, StepFailure};

/// Operator-side promotion. Runs without a session, so the bootstrap admin can be created here;
/// the upward-only rule still applies.
pub fn run(email: &str, role: &str) -> CommandResult {
    let Some(role) = Role::parse(role) else {
        return CommandResult::failure(
            "promote",
            "invalid_role",
            format!("unknown role `{role}` (expected client|agent|admin)"),
            2,
        );
    };

    let result = load_config().and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_database(&config).await?;
            let repositories = Repositories::sqlite(pool.clone());
            let outcome = promote(&repositories, email, role).await;
            pool.close().await;
            outcome
        })
    });

    CommandResult::from_steps("promote", result)
}

async fn promote(
    repositories: &Repositories,
    email: &str,
    role: Role,
) -> Result<String, StepFailure> {
    let actor = repositories
        .profiles
        .find_by_email(email)
        .await
        .map_err(|error| ("lookup", error.to_string(), 4u8))?
        .ok_or_else(|| ("not_found", format!("no account registered for `{email}`"), 6u8))?;

    let previous = actor.role;
    let promoted = raise_role(&actor, role, Utc::now())
        .map_err(|error| ("invalid_role", error.to_string(), 2u8))?;
    if promoted.role == previous {
        return Ok(format!("`{email}` is already {role}"));
    }

    repositories
        .profiles
        .save(promoted)
        .await
        .map_err(|error| ("persistence", error.to_string(), 5u8))?;
    Ok(format!("`{email}` promoted from {previous} to {role}"))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use quoteflow_core::domain::actor::{Actor, ActorId, Role};
    use quoteflow_db::Repositories;

    use super::promote;

    async fn repositories_with(email: &str, role: Role) -> Repositories {
        let repositories = Repositories::in_memory();
        let mut actor = Actor::register(ActorId("USR-1".to_string()), "Ops", email, Utc::now());
        actor.role = role;
        repositories.profiles.save(actor).await.expect("seed actor");
        repositories
    }

    #[tokio::test]
    async fn raises_a_client_to_admin() {
        let repositories = repositories_with("ops@acme.test", Role::Client).await;

        let message = promote(&repositories, "ops@acme.test", Role::Admin).await.expect("promote");
        assert_eq!(message, "`ops@acme.test` promoted from client to admin");

        let stored = repositories
            .profiles
            .find_by_email("ops@acme.test")
            .await
            .expect("lookup")
            .expect("actor");
        assert_eq!(stored.role, Role::Admin);
    }

    #[tokio::test]
    async fn refuses_demotion() {
        let repositories = repositories_with("ops@acme.test", Role::Admin).await;

        let (class, _, code) =
            promote(&repositories, "ops@acme.test", Role::Agent).await.expect_err("demotion");
        assert_eq!((class, code), ("invalid_role", 2));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let repositories = Repositories::in_memory();
        let (class, _, code) =
            promote(&repositories, "ghost@acme.test", Role::Agent).await.expect_err("missing");
        assert_eq!((class, code), ("not_found", 6));
    }
}
