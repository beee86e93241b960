use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::error;

use perft_diff::config::{Cli, CANDIDATE, REFERENCE};
use perft_diff::{CompareConfig, EngineCommand, EngineSession, SessionError};

fn main() -> ExitCode {
    let config = CompareConfig::from(Cli::parse());
    init_logging(config.debug);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(config: &CompareConfig) -> Result<(), SessionError> {
    let reference_cmd = EngineCommand::parse(REFERENCE, &config.reference)?;
    let candidate_cmd = EngineCommand::parse(CANDIDATE, &config.candidate)?;

    let request = &config.request;
    println!(
        "computing for position: '{}' moves: '{}' depth: '{}'",
        request.position, request.moves, request.depth
    );

    // sessions kill their process when dropped, so every early return cleans up
    let mut reference = EngineSession::spawn(REFERENCE, &reference_cmd)?;
    let mut candidate = EngineSession::spawn(CANDIDATE, &candidate_cmd)?;
    reference.set_read_timeout(config.read_timeout);
    candidate.set_read_timeout(config.read_timeout);

    let result = config
        .comparator()
        .run(&mut reference, &mut candidate, request);
    reference.kill();
    candidate.kill();
    let comparison = result?;

    for line in &comparison.board {
        println!("{line}");
    }
    for line in comparison.report.render() {
        println!("{line}");
    }
    if config.keyed {
        println!();
        for line in comparison.report.render_keyed() {
            println!("{line}");
        }
    }
    Ok(())
}
