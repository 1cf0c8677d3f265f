use clap::Parser;
use regional_prompts::cli::{self, CliArgs};
use regional_prompts::logger;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    logger::init(args.verbose);
    if let Some(path) = logger::log_path() {
        log::debug!("logging to {}", path.display());
    }
    cli::run(args)
}
