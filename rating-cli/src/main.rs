//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use log::error;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match rating_cli::run() {
        Ok(()) => {}
        Err(rating_cli::CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            error!("rating: {err}");
            std::process::exit(1);
        }
    }
}
