use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// Environment aliases accepted besides the canonical `TOURLEAD_<SECTION>_<KEY>` name.
const ENV_ALIASES: &[(&str, &str)] =
    &[("logging.level", "TOURLEAD_LOG_LEVEL"), ("logging.format", "TOURLEAD_LOG_FORMAT")];

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    let redacted = config.redacted();
    if let Some(sections) = redacted.as_object() {
        for (section, fields) in sections {
            let Some(fields) = fields.as_object() else {
                continue;
            };
            for (field, value) in fields {
                let key_path = format!("{section}.{field}");
                let source =
                    field_source(&key_path, config_file_doc.as_ref(), config_file_path.as_deref());
                lines.push(render_line(&key_path, &display_value(value), source));
            }
        }
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("tourlead.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/tourlead.toml");
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

fn env_key(key_path: &str) -> String {
    format!("TOURLEAD_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let canonical = env_key(key_path);
    let alias = ENV_ALIASES
        .iter()
        .find(|(path, _)| *path == key_path)
        .map(|(_, alias)| alias.to_string());
    for env_key in std::iter::once(canonical).chain(alias) {
        if env::var_os(&env_key).is_some() {
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

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
