pub mod config;
pub mod evaluate;
pub mod run;
pub mod select;

use std::fs;

use divvy_core::config::AppConfig;
use divvy_core::domain::{parse_records, NegotiationRecord};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Reads and parses the configured record file, or the failure to report.
pub(crate) fn load_records(command: &str, config: &AppConfig) -> Result<Vec<NegotiationRecord>, CommandResult> {
    let path = &config.data.records_path;
    let raw = fs::read_to_string(path).map_err(|error| {
        CommandResult::failure(
            command,
            "records_read",
            format!("could not read records file `{}`: {error}", path.display()),
            3,
        )
    })?;
    parse_records(&raw).map_err(|error| {
        CommandResult::failure(
            command,
            "records_parse",
            format!("records file `{}` is malformed: {error}", path.display()),
            3,
        )
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
