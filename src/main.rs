use anyhow::Context;
use clap::Parser;
use filene::cli::{Cli, run_cli};
use filene::config::Config;
use filene::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config =
        Config::load(cli.config.as_deref()).context("Error loading configuration")?;
    cli.apply(&mut config);

    run_cli(config.operation, &config, cli.verbose)
        .with_context(|| format!("{} failed", config.operation))
}
