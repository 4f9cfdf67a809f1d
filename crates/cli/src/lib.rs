pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use divvy_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat, WorkflowSeats};
use tracing_subscriber::EnvFilter;

use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "divvy",
    about = "Divvy negotiation CLI",
    long_about = "Run belief-guided two-party negotiations over dataset records, evaluate human outcomes, \
                  select hard records, and inspect configuration.",
    after_help = "Examples:\n  divvy run --records data/deal_no_deal_test.txt --index 3\n  divvy evaluate --json\n  divvy select --max-distance 6\n  divvy config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a divvy.toml file (defaults to ./divvy.toml or ./config/divvy.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Negotiate one record between two model-backed agents and write the result")]
    Run {
        #[arg(long, help = "Record file, one record per line")]
        records: Option<PathBuf>,
        #[arg(long, default_value_t = 0, help = "Zero-based record index")]
        index: usize,
        #[arg(long, help = "Directory for the result JSON")]
        output: Option<PathBuf>,
        #[arg(long, help = "Seats that run the belief-guided workflow: none|first|second|both")]
        workflow: Option<WorkflowSeats>,
        #[arg(long, help = "Rounds before final offers are requested")]
        max_rounds: Option<u32>,
    },
    #[command(about = "Summarize fairness and efficiency of the human outcomes in a record file")]
    Evaluate {
        #[arg(long, help = "Record file, one record per line")]
        records: Option<PathBuf>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the records that make for a hard negotiation")]
    Select {
        #[arg(long, help = "Record file, one record per line")]
        records: Option<PathBuf>,
        #[arg(long, default_value_t = 20, help = "Largest L1 distance allowed between the two valuations")]
        max_distance: u32,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Evaluate { .. } => "evaluate",
            Self::Select { .. } => "select",
            Self::Config => "config",
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        match self {
            Self::Run { records, output, workflow, max_rounds, .. } => ConfigOverrides {
                records_path: records.clone(),
                output_dir: output.clone(),
                workflow: *workflow,
                max_rounds: *max_rounds,
                ..ConfigOverrides::default()
            },
            Self::Evaluate { records, .. } | Self::Select { records, .. } => {
                ConfigOverrides { records_path: records.clone(), ..ConfigOverrides::default() }
            }
            Self::Config => ConfigOverrides::default(),
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: cli.command.overrides(),
    };

    let result = match AppConfig::load(options) {
        Ok(config) => {
            init_logging(&config);
            dispatch(&cli, &config)
        }
        Err(error) => CommandResult::failure(
            cli.command.name(),
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        ),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn dispatch(cli: &Cli, config: &AppConfig) -> CommandResult {
    match &cli.command {
        Command::Run { index, .. } => commands::run::run(config, *index),
        Command::Evaluate { json, .. } => commands::evaluate::run(config, *json),
        Command::Select { max_distance, .. } => commands::select::run(config, *max_distance),
        Command::Config => CommandResult {
            exit_code: 0,
            output: commands::config::run(config, cli.config.as_deref()),
        },
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!(event_name = "cli.logging.already_installed", "global subscriber already set");
    }
}
