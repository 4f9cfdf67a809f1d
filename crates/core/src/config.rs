use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Seat;
use crate::session::collaborator::RetryPolicy;
use crate::session::driver::SessionSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub negotiation: NegotiationConfig,
    pub llm: LlmConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NegotiationConfig {
    pub max_rounds: u32,
    /// Cumulative ceiling across every negotiation phase of one session.
    pub hard_round_ceiling: u32,
    pub deterioration_rate: f64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_message_revisions: u32,
    pub workflow: WorkflowSeats,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub summarizer_model: String,
    pub system_prompt: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct DataConfig {
    pub records_path: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Seats that run the belief-guided proposal workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowSeats {
    None,
    First,
    Second,
    Both,
}

impl WorkflowSeats {
    pub fn enables(self, seat: Seat) -> bool {
        matches!(
            (self, seat),
            (Self::Both, _) | (Self::First, Seat::First) | (Self::Second, Seat::Second)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::First => "first",
            Self::Second => "second",
            Self::Both => "both",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub max_rounds: Option<u32>,
    pub deterioration_rate: Option<f64>,
    pub workflow: Option<WorkflowSeats>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub records_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
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
            negotiation: NegotiationConfig {
                max_rounds: 20,
                hard_round_ceiling: 20,
                deterioration_rate: 0.0,
                max_attempts: 10,
                retry_backoff_ms: 100,
                max_message_revisions: 10,
                workflow: WorkflowSeats::Both,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434/v1".to_string()),
                model: "llama3.1".to_string(),
                summarizer_model: "llama3.1".to_string(),
                system_prompt: None,
                timeout_secs: 120,
                temperature: 0.0,
            },
            data: DataConfig {
                records_path: PathBuf::from("data/deal_no_deal_test.txt"),
                output_dir: PathBuf::from("results"),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
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

impl std::str::FromStr for WorkflowSeats {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "first" | "alice" => Ok(Self::First),
            "second" | "bob" => Ok(Self::Second),
            "both" => Ok(Self::Both),
            other => Err(ConfigError::Validation(format!(
                "unsupported workflow seats `{other}` (expected none|first|second|both)"
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("divvy.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Round limits, decay and workflow seats handed to a session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_rounds: self.negotiation.max_rounds,
            hard_round_ceiling: self.negotiation.hard_round_ceiling,
            deterioration_rate: self.negotiation.deterioration_rate,
            workflow: self.negotiation.workflow,
            retry: self.retry_policy(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.negotiation.max_attempts,
            Duration::from_millis(self.negotiation.retry_backoff_ms),
        )
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(negotiation) = patch.negotiation {
            if let Some(max_rounds) = negotiation.max_rounds {
                self.negotiation.max_rounds = max_rounds;
            }
            if let Some(hard_round_ceiling) = negotiation.hard_round_ceiling {
                self.negotiation.hard_round_ceiling = hard_round_ceiling;
            }
            if let Some(deterioration_rate) = negotiation.deterioration_rate {
                self.negotiation.deterioration_rate = deterioration_rate;
            }
            if let Some(max_attempts) = negotiation.max_attempts {
                self.negotiation.max_attempts = max_attempts;
            }
            if let Some(retry_backoff_ms) = negotiation.retry_backoff_ms {
                self.negotiation.retry_backoff_ms = retry_backoff_ms;
            }
            if let Some(max_message_revisions) = negotiation.max_message_revisions {
                self.negotiation.max_message_revisions = max_message_revisions;
            }
            if let Some(workflow) = negotiation.workflow {
                self.negotiation.workflow = workflow;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(summarizer_model) = llm.summarizer_model {
                self.llm.summarizer_model = summarizer_model;
            }
            if let Some(system_prompt) = llm.system_prompt {
                self.llm.system_prompt = Some(system_prompt);
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(data) = patch.data {
            if let Some(records_path) = data.records_path {
                self.data.records_path = records_path;
            }
            if let Some(output_dir) = data.output_dir {
                self.data.output_dir = output_dir;
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
        if let Some(value) = read_env("DIVVY_NEGOTIATION_MAX_ROUNDS") {
            self.negotiation.max_rounds = parse_u32("DIVVY_NEGOTIATION_MAX_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("DIVVY_NEGOTIATION_HARD_ROUND_CEILING") {
            self.negotiation.hard_round_ceiling =
                parse_u32("DIVVY_NEGOTIATION_HARD_ROUND_CEILING", &value)?;
        }
        if let Some(value) = read_env("DIVVY_NEGOTIATION_DETERIORATION_RATE") {
            self.negotiation.deterioration_rate =
                parse_f64("DIVVY_NEGOTIATION_DETERIORATION_RATE", &value)?;
        }
        if let Some(value) = read_env("DIVVY_NEGOTIATION_MAX_ATTEMPTS") {
            self.negotiation.max_attempts = parse_u32("DIVVY_NEGOTIATION_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("DIVVY_NEGOTIATION_RETRY_BACKOFF_MS") {
            self.negotiation.retry_backoff_ms =
                parse_u64("DIVVY_NEGOTIATION_RETRY_BACKOFF_MS", &value)?;
        }
        if let Some(value) = read_env("DIVVY_NEGOTIATION_MAX_MESSAGE_REVISIONS") {
            self.negotiation.max_message_revisions =
                parse_u32("DIVVY_NEGOTIATION_MAX_MESSAGE_REVISIONS", &value)?;
        }
        if let Some(value) = read_env("DIVVY_NEGOTIATION_WORKFLOW") {
            self.negotiation.workflow = value.parse()?;
        }

        if let Some(value) = read_env("DIVVY_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("DIVVY_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DIVVY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("DIVVY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("DIVVY_LLM_SUMMARIZER_MODEL") {
            self.llm.summarizer_model = value;
        }
        if let Some(value) = read_env("DIVVY_LLM_SYSTEM_PROMPT") {
            self.llm.system_prompt = Some(value);
        }
        if let Some(value) = read_env("DIVVY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("DIVVY_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DIVVY_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("DIVVY_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("DIVVY_DATA_RECORDS_PATH") {
            self.data.records_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("DIVVY_DATA_OUTPUT_DIR") {
            self.data.output_dir = PathBuf::from(value);
        }

        let log_level = read_env("DIVVY_LOGGING_LEVEL").or_else(|| read_env("DIVVY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("DIVVY_LOGGING_FORMAT").or_else(|| read_env("DIVVY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(max_rounds) = overrides.max_rounds {
            self.negotiation.max_rounds = max_rounds;
        }
        if let Some(deterioration_rate) = overrides.deterioration_rate {
            self.negotiation.deterioration_rate = deterioration_rate;
        }
        if let Some(workflow) = overrides.workflow {
            self.negotiation.workflow = workflow;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(records_path) = overrides.records_path {
            self.data.records_path = records_path;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.data.output_dir = output_dir;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_negotiation(&self.negotiation)?;
        validate_llm(&self.llm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("divvy.toml"), PathBuf::from("config/divvy.toml")]
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

fn validate_negotiation(negotiation: &NegotiationConfig) -> Result<(), ConfigError> {
    if negotiation.max_rounds == 0 {
        return Err(ConfigError::Validation(
            "negotiation.max_rounds must be greater than zero".to_string(),
        ));
    }

    if negotiation.hard_round_ceiling == 0 {
        return Err(ConfigError::Validation(
            "negotiation.hard_round_ceiling must be greater than zero".to_string(),
        ));
    }

    if !(0.0..1.0).contains(&negotiation.deterioration_rate) {
        return Err(ConfigError::Validation(
            "negotiation.deterioration_rate must be in range [0, 1)".to_string(),
        ));
    }

    if negotiation.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "negotiation.max_attempts must be greater than zero".to_string(),
        ));
    }

    if negotiation.retry_backoff_ms > 10_000 {
        return Err(ConfigError::Validation(
            "negotiation.retry_backoff_ms must be at most 10000".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.model.trim().is_empty() || llm.summarizer_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.model and llm.summarizer_model must not be empty".to_string(),
        ));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for the ollama provider".to_string(),
                ));
            }
        }
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

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    negotiation: Option<NegotiationPatch>,
    llm: Option<LlmPatch>,
    data: Option<DataPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct NegotiationPatch {
    max_rounds: Option<u32>,
    hard_round_ceiling: Option<u32>,
    deterioration_rate: Option<f64>,
    max_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
    max_message_revisions: Option<u32>,
    workflow: Option<WorkflowSeats>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    summarizer_model: Option<String>,
    system_prompt: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct DataPatch {
    records_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat, WorkflowSeats,
    };
    use crate::domain::Seat;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_DIVVY_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("divvy.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "openai"
api_key = "${TEST_DIVVY_API_KEY}"
base_url = "https://api.openai.com/v1"
model = "gpt-4o"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.provider == LlmProvider::OpenAi, "provider should come from file")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("sk-from-env".to_string()),
                "api key should be interpolated from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_DIVVY_API_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DIVVY_LOG_LEVEL", "warn");
        env::set_var("DIVVY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["DIVVY_LOG_LEVEL", "DIVVY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DIVVY_NEGOTIATION_MAX_ROUNDS", "12");
        env::set_var("DIVVY_NEGOTIATION_WORKFLOW", "second");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("divvy.toml");
            fs::write(
                &path,
                r#"
[negotiation]
max_rounds = 8
deterioration_rate = 0.2
workflow = "none"
max_attempts = 4

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    max_rounds: Some(6),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.negotiation.max_rounds == 6, "override max rounds should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.negotiation.workflow == WorkflowSeats::Second,
                "env workflow should win over file and defaults",
            )?;
            ensure(config.negotiation.deterioration_rate == 0.2, "file rate should win over default")?;
            ensure(config.negotiation.hard_round_ceiling == 20, "default ceiling should remain")?;
            ensure(
                config.retry_policy().max_attempts() == 4,
                "retry budget should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["DIVVY_NEGOTIATION_MAX_ROUNDS", "DIVVY_NEGOTIATION_WORKFLOW"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DIVVY_NEGOTIATION_DETERIORATION_RATE", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("deterioration_rate")
            );
            ensure(has_message, "validation failure should mention deterioration_rate")
        })();

        clear_vars(&["DIVVY_NEGOTIATION_DETERIORATION_RATE"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DIVVY_NEGOTIATION_MAX_ATTEMPTS", "many");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "DIVVY_NEGOTIATION_MAX_ATTEMPTS"),
                "override error should name the variable",
            )
        })();

        clear_vars(&["DIVVY_NEGOTIATION_MAX_ATTEMPTS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DIVVY_LLM_PROVIDER", "openai");
        env::set_var("DIVVY_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["DIVVY_LLM_PROVIDER", "DIVVY_LLM_API_KEY"]);
        result
    }

    #[test]
    fn defaults_map_onto_session_settings() {
        let config = AppConfig::default();
        let settings = config.session_settings();
        let retry = config.retry_policy();

        assert_eq!(settings.max_rounds, 20);
        assert_eq!(settings.hard_round_ceiling, 20);
        assert!(settings.workflow.enables(Seat::First));
        assert!(settings.workflow.enables(Seat::Second));
        assert!(!WorkflowSeats::First.enables(Seat::Second));
        assert_eq!(retry.max_attempts(), 10);
        assert_eq!(retry.backoff(), Duration::from_millis(100));
    }
}
