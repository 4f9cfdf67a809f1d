use std::fs;
use std::path::PathBuf;

use divvy_agent::{ChatCompletionClient, GenerationError, LlmNegotiator, NegotiatorSettings, TextGenerator};
use divvy_core::config::AppConfig;
use divvy_core::session::NoDealReason;
use divvy_core::{NegotiationSession, OutcomeEvaluator, OutcomeReport, Resolution, Seat, SessionResult};
use serde::Serialize;
use tracing::info;

use crate::commands::{load_records, CommandResult};

/// Everything written for one negotiated record.
#[derive(Debug, Serialize)]
struct RunReport {
    record_index: usize,
    session: SessionResult,
    outcome: Option<OutcomeReport>,
    human_reference: Option<OutcomeReport>,
}

pub fn run(config: &AppConfig, index: usize) -> CommandResult {
    run_with(config, index, |_| ChatCompletionClient::from_config(&config.llm))
}

/// Runs one session with generators from `generator_for`, one per seat.
pub fn run_with<G, F>(config: &AppConfig, index: usize, mut generator_for: F) -> CommandResult
where
    G: TextGenerator,
    F: FnMut(Seat) -> Result<G, GenerationError>,
{
    let records = match load_records("run", config) {
        Ok(records) => records,
        Err(failure) => return failure,
    };
    let Some(record) = records.get(index) else {
        return CommandResult::failure(
            "run",
            "record_index",
            format!("record index {index} is out of range for {} records", records.len()),
            2,
        );
    };

    let evaluator = OutcomeEvaluator::for_record(record);
    if !evaluator.has_envy_free_solution() {
        return CommandResult::failure(
            "run",
            "no_envy_free_solution",
            format!("record {index} admits no envy-free split; nothing fair to negotiate toward"),
            4,
        );
    }

    let mut collaborator = |seat: Seat| {
        generator_for(seat)
            .map(|generator| LlmNegotiator::new(generator, NegotiatorSettings::from_config(config)))
    };
    let collaborators = match (collaborator(Seat::First), collaborator(Seat::Second)) {
        (Ok(first), Ok(second)) => (first, second),
        (Err(error), _) | (_, Err(error)) => {
            return CommandResult::failure(
                "run",
                "llm_client",
                format!("could not build language model client: {error}"),
                3,
            );
        }
    };

    let session = NegotiationSession::new(
        record.counts,
        (record.first_valuation, record.second_valuation),
        config.session_settings(),
        collaborators,
    );
    let result = match session.play() {
        Ok(result) => result,
        Err(error) => {
            return CommandResult::failure("run", error.error_class(), error.to_string(), 5);
        }
    };

    let report = RunReport {
        record_index: index,
        outcome: evaluator.evaluate_resolution(&result.resolution),
        human_reference: evaluator.evaluate_reference(&record.reference),
        session: result,
    };
    let path = match write_report(config, &report) {
        Ok(path) => path,
        Err(message) => return CommandResult::failure("run", "output_write", message, 6),
    };

    info!(
        event_name = "cli.run.completed",
        session_id = %report.session.session_id,
        record_index = index,
        path = %path.display(),
        "session result written"
    );
    CommandResult::success(
        "run",
        format!(
            "session {} on record {index} ended with {} after {} rounds; result written to {}",
            report.session.session_id,
            describe_resolution(&report.session.resolution),
            report.session.rounds,
            path.display()
        ),
    )
}

fn write_report(config: &AppConfig, report: &RunReport) -> Result<PathBuf, String> {
    let dir = &config.data.output_dir;
    fs::create_dir_all(dir)
        .map_err(|error| format!("could not create output directory `{}`: {error}", dir.display()))?;

    let path = dir.join(format!("record-{}-{}.json", report.record_index, report.session.session_id));
    let body = serde_json::to_string_pretty(report)
        .map_err(|error| format!("could not serialize session result: {error}"))?;
    fs::write(&path, body).map_err(|error| format!("could not write `{}`: {error}", path.display()))?;
    Ok(path)
}

fn describe_resolution(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Agreement { first, second } => format!("agreement (Alice {first}; Bob {second})"),
        Resolution::NoDeal { reason: NoDealReason::AllocationOverflow } => {
            "no deal (final offers overflow the pool)".to_string()
        }
        Resolution::NoDeal { reason: NoDealReason::RoundExhaustion } => {
            "no deal (round ceiling exhausted)".to_string()
        }
    }
}
