use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub negotiation: NegotiationConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Deterministic negotiation policy. Everything here is externally
/// configurable, not hardwired.
#[derive(Clone, Debug)]
pub struct NegotiationConfig {
    pub actual_price: Decimal,
    pub min_price: Decimal,
    pub currency: String,
    pub max_attempts: u32,
    pub tolerance: Decimal,
    pub opening_discount_min_pct: Decimal,
    pub opening_discount_max_pct: Decimal,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub actual_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub currency: Option<String>,
    pub max_attempts: Option<u32>,
    pub tolerance: Option<Decimal>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            negotiation: NegotiationConfig {
                actual_price: Decimal::from(1500),
                min_price: Decimal::from(1200),
                currency: "GBP".to_string(),
                max_attempts: 5,
                tolerance: Decimal::new(2, 2),
                opening_discount_min_pct: Decimal::from(2),
                opening_discount_max_pct: Decimal::from(5),
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                api_key: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Loads configuration with the precedence `programmatic overrides >
    /// environment > file > defaults`, then validates the result.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("haggle.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(negotiation) = patch.negotiation {
            if let Some(actual_price) = negotiation.actual_price {
                self.negotiation.actual_price = actual_price;
            }
            if let Some(min_price) = negotiation.min_price {
                self.negotiation.min_price = min_price;
            }
            if let Some(currency) = negotiation.currency {
                self.negotiation.currency = currency;
            }
            if let Some(max_attempts) = negotiation.max_attempts {
                self.negotiation.max_attempts = max_attempts;
            }
            if let Some(tolerance) = negotiation.tolerance {
                self.negotiation.tolerance = tolerance;
            }
            if let Some(min_pct) = negotiation.opening_discount_min_pct {
                self.negotiation.opening_discount_min_pct = min_pct;
            }
            if let Some(max_pct) = negotiation.opening_discount_max_pct {
                self.negotiation.opening_discount_max_pct = max_pct;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(api_key_value.into());
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HAGGLE_ACTUAL_PRICE") {
            self.negotiation.actual_price = parse_decimal("HAGGLE_ACTUAL_PRICE", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_MIN_PRICE") {
            self.negotiation.min_price = parse_decimal("HAGGLE_MIN_PRICE", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_CURRENCY") {
            self.negotiation.currency = value;
        }
        if let Some(value) = read_env("HAGGLE_MAX_ATTEMPTS") {
            self.negotiation.max_attempts = parse_u32("HAGGLE_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_TOLERANCE") {
            self.negotiation.tolerance = parse_decimal("HAGGLE_TOLERANCE", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_OPENING_DISCOUNT_MIN_PCT") {
            self.negotiation.opening_discount_min_pct =
                parse_decimal("HAGGLE_OPENING_DISCOUNT_MIN_PCT", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_OPENING_DISCOUNT_MAX_PCT") {
            self.negotiation.opening_discount_max_pct =
                parse_decimal("HAGGLE_OPENING_DISCOUNT_MAX_PCT", &value)?;
        }

        if let Some(value) = read_env("HAGGLE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("HAGGLE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("HAGGLE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("HAGGLE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("HAGGLE_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }

        if let Some(value) = read_env("HAGGLE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HAGGLE_SERVER_PORT") {
            self.server.port = parse_u16("HAGGLE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("HAGGLE_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("HAGGLE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HAGGLE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("HAGGLE_LOGGING_LEVEL").or_else(|| read_env("HAGGLE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HAGGLE_LOGGING_FORMAT").or_else(|| read_env("HAGGLE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(actual_price) = overrides.actual_price {
            self.negotiation.actual_price = actual_price;
        }
        if let Some(min_price) = overrides.min_price {
            self.negotiation.min_price = min_price;
        }
        if let Some(currency) = overrides.currency {
            self.negotiation.currency = currency;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.negotiation.max_attempts = max_attempts;
        }
        if let Some(tolerance) = overrides.tolerance {
            self.negotiation.tolerance = tolerance;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let negotiation = &self.negotiation;
        if negotiation.actual_price < Decimal::ZERO || negotiation.min_price < Decimal::ZERO {
            return Err(ConfigError::Validation(
                "negotiation prices must be non-negative".to_string(),
            ));
        }
        if negotiation.min_price > negotiation.actual_price {
            return Err(ConfigError::Validation(format!(
                "negotiation.min_price {} exceeds negotiation.actual_price {}",
                negotiation.min_price, negotiation.actual_price
            )));
        }
        if negotiation.currency.trim().is_empty() {
            return Err(ConfigError::Validation("negotiation.currency must be set".to_string()));
        }
        if negotiation.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "negotiation.max_attempts must be at least 1".to_string(),
            ));
        }
        if negotiation.tolerance < Decimal::ZERO || negotiation.tolerance >= Decimal::ONE {
            return Err(ConfigError::Validation(format!(
                "negotiation.tolerance {} must lie in [0, 1)",
                negotiation.tolerance
            )));
        }
        if negotiation.opening_discount_min_pct < Decimal::ZERO
            || negotiation.opening_discount_max_pct >= Decimal::ONE_HUNDRED
            || negotiation.opening_discount_min_pct > negotiation.opening_discount_max_pct
        {
            return Err(ConfigError::Validation(format!(
                "opening discount window [{}, {}] must satisfy 0 <= min <= max < 100",
                negotiation.opening_discount_min_pct, negotiation.opening_discount_max_pct
            )));
        }

        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url must be set".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must be set".to_string()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Validation("llm.timeout_secs must be positive".to_string()));
        }

        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation("server.bind_address must be set".to_string()));
        }

        Ok(())
    }
}

/// Explicit path wins; otherwise `HAGGLE_CONFIG`, then `./haggle.toml` when
/// present.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = read_env("HAGGLE_CONFIG") {
        return Some(PathBuf::from(value));
    }

    let default = PathBuf::from("haggle.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    negotiation: Option<NegotiationPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct NegotiationPatch {
    actual_price: Option<Decimal>,
    min_price: Option<Decimal>,
    currency: Option<String>,
    max_attempts: Option<u32>,
    tolerance: Option<Decimal>,
    opening_discount_min_pct: Option<Decimal>,
    opening_discount_max_pct: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
