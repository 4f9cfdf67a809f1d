use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use divvy_core::config::AppConfig;
use toml::Value;

/// One effective setting with the env keys that can override it.
struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run(config: &AppConfig, config_path: Option<&Path>) -> String {
    let config_file_path = config_path.map(Path::to_path_buf).or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(config) {
        let source =
            field_source(field.key, field.env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let negotiation = &config.negotiation;
    let llm = &config.llm;

    vec![
        field(
            "negotiation.max_rounds",
            &["DIVVY_NEGOTIATION_MAX_ROUNDS"],
            negotiation.max_rounds.to_string(),
        ),
        field(
            "negotiation.hard_round_ceiling",
            &["DIVVY_NEGOTIATION_HARD_ROUND_CEILING"],
            negotiation.hard_round_ceiling.to_string(),
        ),
        field(
            "negotiation.deterioration_rate",
            &["DIVVY_NEGOTIATION_DETERIORATION_RATE"],
            negotiation.deterioration_rate.to_string(),
        ),
        field(
            "negotiation.max_attempts",
            &["DIVVY_NEGOTIATION_MAX_ATTEMPTS"],
            negotiation.max_attempts.to_string(),
        ),
        field(
            "negotiation.retry_backoff_ms",
            &["DIVVY_NEGOTIATION_RETRY_BACKOFF_MS"],
            negotiation.retry_backoff_ms.to_string(),
        ),
        field(
            "negotiation.max_message_revisions",
            &["DIVVY_NEGOTIATION_MAX_MESSAGE_REVISIONS"],
            negotiation.max_message_revisions.to_string(),
        ),
        field(
            "negotiation.workflow",
            &["DIVVY_NEGOTIATION_WORKFLOW"],
            negotiation.workflow.as_str().to_string(),
        ),
        field("llm.provider", &["DIVVY_LLM_PROVIDER"], llm.provider.as_str().to_string()),
        field("llm.model", &["DIVVY_LLM_MODEL"], llm.model.clone()),
        field("llm.summarizer_model", &["DIVVY_LLM_SUMMARIZER_MODEL"], llm.summarizer_model.clone()),
        field(
            "llm.base_url",
            &["DIVVY_LLM_BASE_URL"],
            llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "llm.api_key",
            &["DIVVY_LLM_API_KEY"],
            if llm.api_key.is_some() { "<redacted>" } else { "<unset>" }.to_string(),
        ),
        field(
            "llm.system_prompt",
            &["DIVVY_LLM_SYSTEM_PROMPT"],
            if llm.system_prompt.is_some() { "<set>" } else { "<unset>" }.to_string(),
        ),
        field("llm.timeout_secs", &["DIVVY_LLM_TIMEOUT_SECS"], llm.timeout_secs.to_string()),
        field("llm.temperature", &["DIVVY_LLM_TEMPERATURE"], llm.temperature.to_string()),
        field(
            "data.records_path",
            &["DIVVY_DATA_RECORDS_PATH"],
            config.data.records_path.display().to_string(),
        ),
        field("data.output_dir", &["DIVVY_DATA_OUTPUT_DIR"], config.data.output_dir.display().to_string()),
        field(
            "logging.level",
            &["DIVVY_LOGGING_LEVEL", "DIVVY_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["DIVVY_LOGGING_FORMAT", "DIVVY_LOG_FORMAT"],
            config.logging.format.as_str().to_string(),
        ),
    ]
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    Field { key, env_keys, value }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("divvy.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/divvy.toml");
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
    use super::*;

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc: Value = "[llm]\nmodel = \"gpt\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "data.records_path"));
    }

    #[test]
    fn missing_file_and_env_fall_back_to_default() {
        assert_eq!(field_source("negotiation.max_rounds", &[], None, None), "default");
    }
}
