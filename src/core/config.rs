//! Application configuration management
//!
//! Configuration is assembled once at startup from three layers, lowest
//! priority first: built-in defaults, an optional TOML file named by
//! `CONFIG_PATH`, and environment variables. The Gemini API key is only ever
//! read from the environment.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Default server port
const DEFAULT_PORT: u16 = 8000;

/// Default upstream request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default Gemini REST base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default upper bound on prompt length, in characters
const DEFAULT_MAX_PROMPT_CHARS: usize = 32_000;

/// Environment variable holding the upstream secret
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read configuration file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    ParseFile {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Deployment mode, consulted only at startup and by logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err("expected development or production".to_string()),
        }
    }
}

/// Upstream secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Sampling parameters forwarded as Gemini `generationConfig`
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpstreamSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub max_prompt_chars: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GenerationSection {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

/// Optional on-disk settings. Secrets are deliberately absent.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub upstream: UpstreamSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let display = path.as_ref().display().to_string();
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::ReadFile {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: display,
            source,
        })
    }
}

/// Immutable gateway configuration, built once and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub api_key: ApiKey,

    /// Deployment mode
    pub environment: Environment,

    /// Verbose diagnostics
    pub debug: bool,

    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Effective log level (`debug` whenever `debug` is set)
    pub log_level: String,

    /// Upstream request timeout in seconds
    pub request_timeout: u64,

    /// Gemini REST base URL, without trailing slash
    pub base_url: String,

    /// Gemini model name, without the `models/` prefix
    pub model: String,

    /// Longest accepted prompt, in characters
    pub max_prompt_chars: usize,

    pub generation: GenerationSettings,
}

impl Config {
    /// Load configuration from `.env`, the optional `CONFIG_PATH` file and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `GEMINI_API_KEY` is missing or blank
    /// - a set variable cannot be parsed
    /// - `CONFIG_PATH` points at an unreadable or invalid TOML file
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside development.
        let _ = dotenv::dotenv();

        let lookup = |name: &str| std::env::var(name).ok();
        let file = match lookup("CONFIG_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };
        Self::from_sources(file, lookup)
    }

    /// Build configuration from a parsed file layer and a variable lookup.
    pub fn from_sources<F>(file: TomlConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::MissingApiKey)?;

        let environment = parse_var::<Environment, _>(&get, "PYTHON_ENV")?.unwrap_or_default();
        let debug = match get("DEBUG") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                name: "DEBUG",
                value: raw.clone(),
                reason: "expected true or false".to_string(),
            })?,
            None => false,
        };

        let host = get("HOST")
            .or(file.server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var::<u16, _>(&get, "PORT")?
            .or(file.server.port)
            .unwrap_or(DEFAULT_PORT);

        let log_level = if debug {
            "debug".to_string()
        } else {
            get("LOG_LEVEL")
                .or(file.server.log_level)
                .unwrap_or_else(|| "info".to_string())
        };

        let request_timeout = parse_var::<u64, _>(&get, "REQUEST_TIMEOUT")?
            .or(file.upstream.request_timeout)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        if request_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT",
                value: "0".to_string(),
                reason: "timeout must be at least one second".to_string(),
            });
        }

        let base_url = get("GEMINI_BASE_URL")
            .or(file.upstream.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let model = get("GEMINI_MODEL")
            .or(file.upstream.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let model = model.strip_prefix("models/").unwrap_or(&model).to_string();

        let max_prompt_chars = parse_var::<usize, _>(&get, "MAX_PROMPT_CHARS")?
            .or(file.upstream.max_prompt_chars)
            .unwrap_or(DEFAULT_MAX_PROMPT_CHARS);

        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            temperature: file.generation.temperature.unwrap_or(defaults.temperature),
            top_p: file.generation.top_p.unwrap_or(defaults.top_p),
            top_k: file.generation.top_k.unwrap_or(defaults.top_k),
            max_output_tokens: file
                .generation
                .max_output_tokens
                .unwrap_or(defaults.max_output_tokens),
        };

        Ok(Config {
            api_key: ApiKey::new(api_key),
            environment,
            debug,
            host,
            port,
            log_level,
            request_timeout,
            base_url,
            model,
            max_prompt_chars,
            generation,
        })
    }
}

fn parse_var<T, G>(get: &G, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                name,
                value: raw,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
