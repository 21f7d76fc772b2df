use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use homeserve_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// `(key path, primary env var, legacy env var)` for every reported setting.
const FIELDS: &[(&str, &str, Option<&str>)] = &[
    ("database.url", "HOMESERVE_DATABASE_URL", None),
    ("database.max_connections", "HOMESERVE_DATABASE_MAX_CONNECTIONS", None),
    ("database.timeout_secs", "HOMESERVE_DATABASE_TIMEOUT_SECS", None),
    ("lifecycle.allow_custom_services", "HOMESERVE_LIFECYCLE_ALLOW_CUSTOM_SERVICES", None),
    ("lifecycle.custom_service_label", "HOMESERVE_LIFECYCLE_CUSTOM_SERVICE_LABEL", None),
    ("logging.level", "HOMESERVE_LOGGING_LEVEL", Some("HOMESERVE_LOG_LEVEL")),
    ("logging.format", "HOMESERVE_LOGGING_FORMAT", Some("HOMESERVE_LOG_FORMAT")),
];

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, env_key, legacy_env_key) in FIELDS {
        let value = effective_value(&config, key_path);
        let source = field_source(
            key_path,
            &[Some(*env_key), *legacy_env_key],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_value(config: &AppConfig, key_path: &str) -> String {
    match key_path {
        "database.url" => config.database.url.clone(),
        "database.max_connections" => config.database.max_connections.to_string(),
        "database.timeout_secs" => config.database.timeout_secs.to_string(),
        "lifecycle.allow_custom_services" => config.lifecycle.allow_custom_services.to_string(),
        "lifecycle.custom_service_label" => config.lifecycle.custom_service_label.clone(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format),
        _ => "<unknown>".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("homeserve.toml"), PathBuf::from("config/homeserve.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[Option<&str>],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().flatten().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
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

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn nested_keys_are_found_in_file_documents() {
        let doc: Value = "[lifecycle]\nallow_custom_services = false\n".parse().expect("toml");

        assert!(contains_path(&doc, "lifecycle.allow_custom_services"));
        assert!(!contains_path(&doc, "lifecycle.custom_service_label"));
        assert!(!contains_path(&doc, "database.url"));
    }

    #[test]
    fn file_source_is_reported_with_its_path() {
        let doc: Value = "[database]\nurl = \"sqlite::memory:\"\n".parse().expect("toml");
        let source = field_source(
            "database.url",
            &[Some("HOMESERVE_TEST_UNSET_VARIABLE")],
            Some(&doc),
            Some(std::path::Path::new("homeserve.toml")),
        );
        assert_eq!(source, "file (homeserve.toml)");

        let default = field_source("logging.level", &[None], Some(&doc), None);
        assert_eq!(default, "default");
    }
}
