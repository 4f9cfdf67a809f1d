use std::process::ExitCode;

fn main() -> ExitCode {
    divvy_cli::run()
}
