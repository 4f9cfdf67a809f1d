use divvy_core::config::AppConfig;
use divvy_core::select_by_difficulty;
use serde::Serialize;
use tracing::info;

use crate::commands::{load_records, CommandResult};

#[derive(Debug, Serialize)]
struct Selection<'a> {
    max_distance: u32,
    considered: usize,
    selected: &'a [divvy_core::NegotiationRecord],
}

pub fn run(config: &AppConfig, max_distance: u32) -> CommandResult {
    let records = match load_records("select", config) {
        Ok(records) => records,
        Err(failure) => return failure,
    };
    let selected = select_by_difficulty(&records, max_distance);
    info!(
        event_name = "cli.select.completed",
        considered = records.len(),
        selected = selected.len(),
        max_distance,
        "hard records selected"
    );

    let selection = Selection { max_distance, considered: records.len(), selected: &selected };
    match serde_json::to_string_pretty(&selection) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("select", "serialization", error.to_string(), 1),
    }
}
