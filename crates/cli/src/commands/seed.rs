use quoteflow_db::fixtures::DEMO_PASSWORD;
use quoteflow_db::{DemoSeed, LocalAuthProvider, Repositories};

use crate::commands::{load_config, open_database, runtime, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_database(&config).await?;
            let repositories = Repositories::sqlite(pool.clone());
            let auth = LocalAuthProvider::from_repositories(&repositories, &config.auth);

            let outcome = async {
                let loaded = DemoSeed::load(&repositories, &auth)
                    .await
                    .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
                let verification = DemoSeed::verify(&repositories)
                    .await
                    .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
                if !verification.all_present {
                    let failed = verification
                        .checks
                        .iter()
                        .filter_map(|(check, passed)| (!passed).then_some(*check))
                        .collect::<Vec<_>>();
                    return Err(("seed_verification", verification_message(&failed), 6));
                }
                Ok::<_, StepFailure>(format!(
                    "demo dataset ready: {} accounts created, {} already present, {} offers upserted (password `{DEMO_PASSWORD}`)",
                    loaded.actors_created, loaded.actors_existing, loaded.offers_upserted
                ))
            }
            .await;

            pool.close().await;
            outcome
        })
    });

    CommandResult::from_steps("seed", result)
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        assert_eq!(
            verification_message(&["agent@quoteflow.test", "pbx-cloud"]),
            "Seed verification failed for checks: agent@quoteflow.test, pbx-cloud"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "Some seed data failed to load");
    }
}
