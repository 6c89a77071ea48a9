//! Command-line interface for the tourism rating engine.
//!
//! `rating init` creates an empty rating database and `rating score` runs the
//! scoring pipeline over one. Options layer CLI flags over environment
//! variables (`RATING_CMDS_<SUBCOMMAND>_<FIELD>`) and configuration files.
#![forbid(unsafe_code)]

use std::io::{self, Write};

use clap::{Parser, Subcommand};

mod error;
mod fs;
mod init;
mod score;
pub mod sentiment;

pub use error::CliError;

use init::{InitArgs, run_init};
use score::{ScoreArgs, run_score};

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_CAPITAL_LON: &str = "capital-lon";
pub(crate) const ARG_CAPITAL_LAT: &str = "capital-lat";
pub(crate) const ARG_DEADLINE_SECS: &str = "deadline-secs";
pub(crate) const ARG_SENTIMENT_URL: &str = "sentiment-url";
pub(crate) const ARG_RETRY_ATTEMPTS: &str = "retry-attempts";
pub(crate) const ENV_SCORE_DATABASE: &str = "RATING_CMDS_SCORE_DATABASE";
pub(crate) const ENV_SCORE_CAPITAL_LON: &str = "RATING_CMDS_SCORE_CAPITAL_LON";
pub(crate) const ENV_SCORE_CAPITAL_LAT: &str = "RATING_CMDS_SCORE_CAPITAL_LAT";
pub(crate) const ENV_INIT_DATABASE: &str = "RATING_CMDS_INIT_DATABASE";

/// Run the rating CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when parsing, configuration, the store or output
/// fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    dispatch(cli.command, &mut handle)
}

fn dispatch(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Init(args) => run_init(args, writer),
        Command::Score(args) => run_score(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "rating",
    about = "Tourism rating engine for regions and cities",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a rating database with the current schema.
    Init(InitArgs),
    /// Score every location, segment and area in a rating database.
    Score(ScoreArgs),
}

#[cfg(test)]
mod tests;
