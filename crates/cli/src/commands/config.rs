use std::env;
use std::fs;
use std::path::Path;

use haggle_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let doc = config_file_doc.as_ref();
    let path = config_file_path.as_deref();

    let negotiation = &config.negotiation;
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let rows: Vec<(&str, String, Option<&str>)> = vec![
        ("negotiation.actual_price", negotiation.actual_price.to_string(), Some("HAGGLE_ACTUAL_PRICE")),
        ("negotiation.min_price", negotiation.min_price.to_string(), Some("HAGGLE_MIN_PRICE")),
        ("negotiation.currency", negotiation.currency.clone(), Some("HAGGLE_CURRENCY")),
        ("negotiation.max_attempts", negotiation.max_attempts.to_string(), Some("HAGGLE_MAX_ATTEMPTS")),
        ("negotiation.tolerance", negotiation.tolerance.to_string(), Some("HAGGLE_TOLERANCE")),
        (
            "negotiation.opening_discount_min_pct",
            negotiation.opening_discount_min_pct.to_string(),
            Some("HAGGLE_OPENING_DISCOUNT_MIN_PCT"),
        ),
        (
            "negotiation.opening_discount_max_pct",
            negotiation.opening_discount_max_pct.to_string(),
            Some("HAGGLE_OPENING_DISCOUNT_MAX_PCT"),
        ),
        ("llm.base_url", config.llm.base_url.clone(), Some("HAGGLE_LLM_BASE_URL")),
        ("llm.model", config.llm.model.clone(), Some("HAGGLE_LLM_MODEL")),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), Some("HAGGLE_LLM_TIMEOUT_SECS")),
        ("llm.max_retries", config.llm.max_retries.to_string(), Some("HAGGLE_LLM_MAX_RETRIES")),
        ("llm.api_key", api_key, Some("HAGGLE_LLM_API_KEY")),
        ("server.bind_address", config.server.bind_address.clone(), Some("HAGGLE_SERVER_BIND_ADDRESS")),
        ("server.port", config.server.port.to_string(), Some("HAGGLE_SERVER_PORT")),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            Some("HAGGLE_SERVER_HEALTH_CHECK_PORT"),
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            Some("HAGGLE_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        ("logging.level", config.logging.level.clone(), Some("HAGGLE_LOGGING_LEVEL")),
        ("logging.format", format!("{:?}", config.logging.format).to_lowercase(), Some("HAGGLE_LOGGING_FORMAT")),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in rows {
        lines.push(render_line(key, &value, field_source(key, env_key, doc, path)));
    }
    lines.join("\n")
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("  {key} = {value}  ({source})")
}

fn field_source(
    dotted_key: &str,
    env_key: Option<&str>,
    doc: Option<&Value>,
    path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var(env_key).map(|value| !value.trim().is_empty()).unwrap_or(false) {
            return format!("env {env_key}");
        }
    }

    if let (Some(doc), Some(path)) = (doc, path) {
        if file_defines(doc, dotted_key) {
            return format!("file {}", path.display());
        }
    }

    "default".to_string()
}

fn file_defines(doc: &Value, dotted_key: &str) -> bool {
    let mut current = doc;
    for part in dotted_key.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn redact_secret(raw: &str) -> String {
    if raw.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &raw[..4])
}
