use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quoteflow_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field<'a> {
    key: &'static str,
    env_key: &'static str,
    value: &'a str,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let max_connections = config.database.max_connections.to_string();
    let db_timeout = config.database.timeout_secs.to_string();
    let port = config.server.port.to_string();
    let shutdown = config.server.graceful_shutdown_secs.to_string();
    let session_ttl = config.auth.session_ttl_secs.to_string();
    let pepper = redact_secret(config.auth.signing_pepper.expose_secret());
    let confirmation = config.auth.require_email_confirmation.to_string();
    let services_timeout = config.services.timeout_ms.to_string();
    let read_retries = config.services.read_retries.to_string();
    let log_format = format!("{:?}", config.logging.format);

    let fields = [
        Field {
            key: "database.url",
            env_key: "QUOTEFLOW_DATABASE_URL",
            value: &config.database.url,
        },
        Field {
            key: "database.max_connections",
            env_key: "QUOTEFLOW_DATABASE_MAX_CONNECTIONS",
            value: &max_connections,
        },
        Field {
            key: "database.timeout_secs",
            env_key: "QUOTEFLOW_DATABASE_TIMEOUT_SECS",
            value: &db_timeout,
        },
        Field {
            key: "server.bind_address",
            env_key: "QUOTEFLOW_SERVER_BIND_ADDRESS",
            value: &config.server.bind_address,
        },
        Field { key: "server.port", env_key: "QUOTEFLOW_SERVER_PORT", value: &port },
        Field {
            key: "server.graceful_shutdown_secs",
            env_key: "QUOTEFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS",
            value: &shutdown,
        },
        Field {
            key: "auth.session_ttl_secs",
            env_key: "QUOTEFLOW_AUTH_SESSION_TTL_SECS",
            value: &session_ttl,
        },
        Field {
            key: "auth.signing_pepper",
            env_key: "QUOTEFLOW_AUTH_SIGNING_PEPPER",
            value: &pepper,
        },
        Field {
            key: "auth.require_email_confirmation",
            env_key: "QUOTEFLOW_AUTH_REQUIRE_EMAIL_CONFIRMATION",
            value: &confirmation,
        },
        Field {
            key: "services.timeout_ms",
            env_key: "QUOTEFLOW_SERVICES_TIMEOUT_MS",
            value: &services_timeout,
        },
        Field {
            key: "services.read_retries",
            env_key: "QUOTEFLOW_SERVICES_READ_RETRIES",
            value: &read_retries,
        },
        Field {
            key: "logging.level",
            env_key: "QUOTEFLOW_LOGGING_LEVEL",
            value: &config.logging.level,
        },
        Field { key: "logging.format", env_key: "QUOTEFLOW_LOGGING_FORMAT", value: &log_format },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields {
        lines.push(render_line(
            field.key,
            field.value,
            field_source(
                field.key,
                Some(field.env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("quoteflow.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/quoteflow.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_never_render_in_clear() {
        assert_eq!(redact_secret(""), "<empty>");
        assert_eq!(redact_secret("very-secret-pepper"), "<redacted>");
    }

    #[test]
    fn nested_keys_are_found_in_file_document() {
        let doc: Value = "[auth]\nsession_ttl_secs = 60\n".parse().expect("toml");
        assert!(contains_path(&doc, "auth.session_ttl_secs"));
        assert!(!contains_path(&doc, "auth.signing_pepper"));
    }
}
