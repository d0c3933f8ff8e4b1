use std::env;
use std::sync::{Mutex, OnceLock};

use quoteflow_cli::commands::{config, doctor, migrate, promote, seed};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("QUOTEFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_rejects_non_sqlite_urls() {
    with_env(&[("QUOTEFLOW_DATABASE_URL", "postgres://localhost/quoteflow")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("QUOTEFLOW_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        let message = first_payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("3 accounts created, 0 already present"), "{message}");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        let message = second_payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("0 accounts created, 3 already present"), "{message}");
    });
}

#[test]
fn promote_raises_a_seeded_account_and_refuses_demotion() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("QUOTEFLOW_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = promote::run("client@quoteflow.test", "agent");
        assert_eq!(result.exit_code, 0, "{}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["message"], "`client@quoteflow.test` promoted from client to agent");

        let result = promote::run("client@quoteflow.test", "client");
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_role");

        let result = promote::run("nobody@quoteflow.test", "admin");
        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "not_found");
    });
}

#[test]
fn promote_rejects_unknown_roles_before_touching_the_database() {
    with_env(&[("QUOTEFLOW_DATABASE_URL", "postgres://never-used")], || {
        let result = promote::run("someone@acme.test", "owner");
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_role");
    });
}

#[test]
fn doctor_flags_pending_migrations_until_migrate_runs() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("QUOTEFLOW_DATABASE_URL", &url)], || {
        let before = doctor::run(true);
        assert_eq!(before.exit_code, 1);
        let report = parse_payload(&before.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check_status(&report, "database_connectivity"), "pass");
        assert_eq!(check_status(&report, "schema_migrations"), "fail");

        assert_eq!(migrate::run().exit_code, 0);

        let after = doctor::run(true);
        assert_eq!(after.exit_code, 0, "{}", after.output);
        assert_eq!(parse_payload(&after.output)["overall_status"], "pass");
    });
}

#[test]
fn doctor_skips_database_checks_when_config_is_invalid() {
    with_env(&[("QUOTEFLOW_SERVICES_TIMEOUT_MS", "0")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(check_status(&report, "config_validation"), "fail");
        assert_eq!(check_status(&report, "database_connectivity"), "skipped");
    });
}

#[test]
fn config_redacts_the_pepper_and_attributes_sources() {
    with_env(
        &[
            ("QUOTEFLOW_AUTH_SIGNING_PEPPER", "very-secret-pepper-value"),
            ("QUOTEFLOW_SERVER_PORT", "9090"),
        ],
        || {
            let output = config::run();
            assert!(!output.contains("very-secret-pepper-value"));
            assert!(output.contains(
                "- auth.signing_pepper = <redacted> (source: env (QUOTEFLOW_AUTH_SIGNING_PEPPER))"
            ));
            assert!(output.contains("- server.port = 9090 (source: env (QUOTEFLOW_SERVER_PORT))"));
            assert!(output.contains("- services.read_retries = 1 (source: default)"));
        },
    );
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("quoteflow.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn check_status(report: &Value, name: &str) -> String {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "QUOTEFLOW_DATABASE_URL",
        "QUOTEFLOW_DATABASE_MAX_CONNECTIONS",
        "QUOTEFLOW_DATABASE_TIMEOUT_SECS",
        "QUOTEFLOW_SERVER_BIND_ADDRESS",
        "QUOTEFLOW_SERVER_PORT",
        "QUOTEFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "QUOTEFLOW_AUTH_SESSION_TTL_SECS",
        "QUOTEFLOW_AUTH_SIGNING_PEPPER",
        "QUOTEFLOW_AUTH_REQUIRE_EMAIL_CONFIRMATION",
        "QUOTEFLOW_SERVICES_TIMEOUT_MS",
        "QUOTEFLOW_SERVICES_READ_RETRIES",
        "QUOTEFLOW_LOGGING_LEVEL",
        "QUOTEFLOW_LOGGING_FORMAT",
        "QUOTEFLOW_LOG_LEVEL",
        "QUOTEFLOW_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
