use crate::commands::{load_config, open_database, runtime, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_database(&config).await?;
            pool.close().await;
            Ok::<_, StepFailure>("applied pending migrations".to_string())
        })
    });

    CommandResult::from_steps("migrate", result)
}
