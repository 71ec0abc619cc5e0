use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub vault: VaultConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub history_window: usize,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub endpoint: String,
    pub poll_delay_ms: u64,
    pub timeout_secs: u64,
    pub exchange_rate: u32,
    pub default_departure: String,
    pub default_nights: u32,
    pub default_travelers: u32,
}

#[derive(Clone, Debug)]
pub struct VaultConfig {
    pub secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    Memory,
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
    pub database_backend: Option<StorageBackend>,
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub search_endpoint: Option<String>,
    pub vault_secret: Option<String>,
    pub server_port: Option<u16>,
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
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                backend: StorageBackend::Sqlite,
                url: "sqlite://tourlead.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                max_tokens: 1_024,
                timeout_secs: 30,
                history_window: 20,
            },
            search: SearchConfig {
                endpoint: "http://gate.sletat.ru/Search.svc".to_string(),
                poll_delay_ms: 3_000,
                timeout_secs: 10,
                exchange_rate: 90,
                default_departure: "Moscow".to_string(),
                default_nights: 7,
                default_travelers: 2,
            },
            vault: VaultConfig { secret: String::new().into() },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Validation(format!(
                "unsupported database backend `{other}` (expected sqlite|memory)"
            ))),
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
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tourlead.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(backend) = database.backend {
                self.database.backend = backend;
            }
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(history_window) = llm.history_window {
                self.llm.history_window = history_window;
            }
        }

        if let Some(search) = patch.search {
            if let Some(endpoint) = search.endpoint {
                self.search.endpoint = endpoint;
            }
            if let Some(poll_delay_ms) = search.poll_delay_ms {
                self.search.poll_delay_ms = poll_delay_ms;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
            if let Some(exchange_rate) = search.exchange_rate {
                self.search.exchange_rate = exchange_rate;
            }
            if let Some(default_departure) = search.default_departure {
                self.search.default_departure = default_departure;
            }
            if let Some(default_nights) = search.default_nights {
                self.search.default_nights = default_nights;
            }
            if let Some(default_travelers) = search.default_travelers {
                self.search.default_travelers = default_travelers;
            }
        }

        if let Some(vault) = patch.vault {
            if let Some(secret) = vault.secret {
                self.vault.secret = secret_value(secret);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("TOURLEAD_DATABASE_BACKEND") {
            self.database.backend = value.parse()?;
        }
        if let Some(value) = read_env("TOURLEAD_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TOURLEAD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TOURLEAD_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TOURLEAD_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TOURLEAD_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TOURLEAD_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TOURLEAD_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("TOURLEAD_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TOURLEAD_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("TOURLEAD_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("TOURLEAD_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("TOURLEAD_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TOURLEAD_LLM_HISTORY_WINDOW") {
            self.llm.history_window = parse_u32("TOURLEAD_LLM_HISTORY_WINDOW", &value)? as usize;
        }

        if let Some(value) = read_env("TOURLEAD_SEARCH_ENDPOINT") {
            self.search.endpoint = value;
        }
        if let Some(value) = read_env("TOURLEAD_SEARCH_POLL_DELAY_MS") {
            self.search.poll_delay_ms = parse_u64("TOURLEAD_SEARCH_POLL_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("TOURLEAD_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_u64("TOURLEAD_SEARCH_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TOURLEAD_SEARCH_EXCHANGE_RATE") {
            self.search.exchange_rate = parse_u32("TOURLEAD_SEARCH_EXCHANGE_RATE", &value)?;
        }
        if let Some(value) = read_env("TOURLEAD_SEARCH_DEFAULT_DEPARTURE") {
            self.search.default_departure = value;
        }

        if let Some(value) = read_env("TOURLEAD_VAULT_SECRET") {
            self.vault.secret = secret_value(value);
        }

        if let Some(value) = read_env("TOURLEAD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TOURLEAD_SERVER_PORT") {
            self.server.port = parse_u16("TOURLEAD_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TOURLEAD_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TOURLEAD_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("TOURLEAD_LOGGING_LEVEL").or_else(|| read_env("TOURLEAD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TOURLEAD_LOGGING_FORMAT").or_else(|| read_env("TOURLEAD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(backend) = overrides.database_backend {
            self.database.backend = backend;
        }
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(search_endpoint) = overrides.search_endpoint {
            self.search.endpoint = search_endpoint;
        }
        if let Some(vault_secret) = overrides.vault_secret {
            self.vault.secret = secret_value(vault_secret);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_search(&self.search)?;
        validate_vault(&self.vault)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    /// Effective configuration as JSON with secrets replaced by a presence marker.
    pub fn redacted(&self) -> serde_json::Value {
        let presence = |present: bool| if present { "<redacted>" } else { "<unset>" };

        serde_json::json!({
            "database": {
                "backend": self.database.backend,
                "url": self.database.url,
                "max_connections": self.database.max_connections,
                "timeout_secs": self.database.timeout_secs,
            },
            "llm": {
                "api_key": presence(self.llm.api_key.is_some()),
                "base_url": self.llm.base_url,
                "model": self.llm.model,
                "max_tokens": self.llm.max_tokens,
                "timeout_secs": self.llm.timeout_secs,
                "history_window": self.llm.history_window,
            },
            "search": {
                "endpoint": self.search.endpoint,
                "poll_delay_ms": self.search.poll_delay_ms,
                "timeout_secs": self.search.timeout_secs,
                "exchange_rate": self.search.exchange_rate,
                "default_departure": self.search.default_departure,
                "default_nights": self.search.default_nights,
                "default_travelers": self.search.default_travelers,
            },
            "vault": {
                "secret": presence(!self.vault.secret.expose_secret().is_empty()),
            },
            "server": {
                "bind_address": self.server.bind_address,
                "port": self.server.port,
                "graceful_shutdown_secs": self.server.graceful_shutdown_secs,
            },
            "logging": {
                "level": self.logging.level,
                "format": self.logging.format,
            },
        })
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tourlead.toml"), PathBuf::from("config/tourlead.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    if database.backend == StorageBackend::Sqlite {
        let url = database.url.trim();
        let sqlite_url =
            url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
        if !sqlite_url {
            return Err(ConfigError::Validation(
                "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                    .to_string(),
            ));
        }
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.history_window == 0 {
        return Err(ConfigError::Validation(
            "llm.history_window must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if !search.endpoint.starts_with("http://") && !search.endpoint.starts_with("https://") {
        return Err(ConfigError::Validation(
            "search.endpoint must start with http:// or https://".to_string(),
        ));
    }

    if search.timeout_secs == 0 || search.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if search.poll_delay_ms >= search.timeout_secs * 1_000 {
        return Err(ConfigError::Validation(
            "search.poll_delay_ms must be shorter than search.timeout_secs".to_string(),
        ));
    }

    if search.exchange_rate == 0 {
        return Err(ConfigError::Validation(
            "search.exchange_rate must be greater than zero".to_string(),
        ));
    }

    if search.default_nights == 0 || search.default_travelers == 0 {
        return Err(ConfigError::Validation(
            "search.default_nights and search.default_travelers must be greater than zero"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_vault(vault: &VaultConfig) -> Result<(), ConfigError> {
    let secret = vault.secret.expose_secret();
    if secret.is_empty() {
        return Err(ConfigError::Validation(
            "vault.secret is required (set TOURLEAD_VAULT_SECRET)".to_string(),
        ));
    }
    if secret.chars().count() < 16 {
        return Err(ConfigError::Validation(
            "vault.secret must be at least 16 characters".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    search: Option<SearchPatch>,
    vault: Option<VaultPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    backend: Option<StorageBackend>,
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    history_window: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    endpoint: Option<String>,
    poll_delay_ms: Option<u64>,
    timeout_secs: Option<u64>,
    exchange_rate: Option<u32>,
    default_departure: Option<String>,
    default_nights: Option<u32>,
    default_travelers: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct VaultPatch {
    secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
