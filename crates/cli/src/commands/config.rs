use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use haulrate_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

/// Key path, env vars checked in order, rendered value.
type FieldRow = (&'static str, &'static [&'static str], String);

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, env_keys, value) in effective_fields(&config) {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<FieldRow> {
    vec![
        field("database.url", &["HAULRATE_DATABASE_URL"], redact_url(&config.database.url)),
        field(
            "database.max_connections",
            &["HAULRATE_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            &["HAULRATE_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        field(
            "server.bind_address",
            &["HAULRATE_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field("server.port", &["HAULRATE_SERVER_PORT"], config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            &["HAULRATE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "logging.level",
            &["HAULRATE_LOGGING_LEVEL", "HAULRATE_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["HAULRATE_LOGGING_FORMAT", "HAULRATE_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
        field("import.max_rows", &["HAULRATE_IMPORT_MAX_ROWS"], config.import.max_rows.to_string()),
    ]
}

fn field(key_path: &'static str, env_keys: &'static [&'static str], value: String) -> FieldRow {
    (key_path, env_keys, value)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
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

/// Hides a password embedded in a connection URL.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.split_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use toml::Value;

    use super::{contains_path, field_source, redact_url};

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc = "[import]\nmax_rows = 10\n".parse::<Value>().expect("toml");
        assert!(contains_path(&doc, "import.max_rows"));
        assert!(!contains_path(&doc, "import.delimiter"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn file_source_names_the_file() {
        let doc = "[server]\nport = 9000\n".parse::<Value>().expect("toml");
        let source = field_source(
            "server.port",
            &["HAULRATE_TEST_UNSET_PORT"],
            Some(&doc),
            Some(Path::new("config/haulrate.toml")),
        );
        assert_eq!(source, "file (config/haulrate.toml)");
        assert_eq!(field_source("server.bind_address", &[], Some(&doc), None), "default");
    }

    #[test]
    fn redact_url_masks_only_passwords() {
        assert_eq!(redact_url("sqlite://data/haulrate.db"), "sqlite://data/haulrate.db");
        assert_eq!(redact_url("postgres://fare:secret@db:5432/rates"), "postgres://fare:***@db:5432/rates");
        assert_eq!(redact_url("sqlite::memory:"), "sqlite::memory:");
    }
}
