use clap::Parser;
use eks_module_e2e::cli::{run, Cli};
use eks_module_e2e::logging::Logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = Logging::try_init(&cli.log_level) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
