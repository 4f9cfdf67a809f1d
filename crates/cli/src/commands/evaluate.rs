use divvy_core::config::AppConfig;
use divvy_core::DatasetSummary;

use crate::commands::{load_records, CommandResult};

pub fn run(config: &AppConfig, json: bool) -> CommandResult {
    let records = match load_records("evaluate", config) {
        Ok(records) => records,
        Err(failure) => return failure,
    };
    let summary = DatasetSummary::from_records(&records);

    if json {
        return match serde_json::to_string_pretty(&summary) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => CommandResult::failure("evaluate", "serialization", error.to_string(), 1),
        };
    }

    CommandResult { exit_code: 0, output: render_summary(config, &summary) }
}

fn render_summary(config: &AppConfig, summary: &DatasetSummary) -> String {
    let optional = |value: Option<f64>| value.map_or_else(|| "n/a".to_string(), |value| format!("{value:.2}"));
    let lines = [
        format!("Human outcomes in {}", config.data.records_path.display()),
        format!("- records = {}", summary.records),
        format!("- concrete outcomes = {}", summary.concrete_references),
        format!("- pareto optimal = {:.2}", summary.pareto_optimal_rate),
        format!("- envy free = {:.2}", summary.envy_free_rate),
        format!("- envy free and pareto optimal = {:.2}", summary.envy_free_and_pareto_optimal_rate),
        format!("- envy-free split exists = {:.2}", summary.envy_free_solution_rate),
        format!(
            "- mean fair and efficient splits per solvable record = {}",
            optional(summary.mean_pareto_envy_free_partitions)
        ),
        format!(
            "- fair share of efficient splits = {}",
            optional(summary.envy_free_share_of_pareto_partitions)
        ),
    ];
    lines.join("\n")
}
