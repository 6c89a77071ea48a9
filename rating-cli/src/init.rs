//! `init` command: create a rating database.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use rating_core::{SCHEMA_VERSION, SqliteStore};
use serde::{Deserialize, Serialize};

use crate::{ARG_DATABASE, CliError, ENV_INIT_DATABASE};

/// CLI arguments for the `init` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Create the rating database and its parent directories. An \
                 existing database is opened and left untouched.",
    about = "Create a rating database"
)]
#[ortho_config(prefix = "RATING")]
pub(crate) struct InitArgs {
    /// Path of the SQLite database to create.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl InitArgs {
    fn into_config(self) -> Result<InitConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        InitConfig::try_from(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InitConfig {
    pub(crate) database: Utf8PathBuf,
}

impl TryFrom<InitArgs> for InitConfig {
    type Error = CliError;

    fn try_from(args: InitArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_INIT_DATABASE,
        })?;
        Ok(Self { database })
    }
}

pub(super) fn run_init(args: InitArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    execute_init(&config, writer)
}

pub(crate) fn execute_init(config: &InitConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    crate::fs::ensure_parent_dir(&config.database).map_err(|source| {
        CliError::CreateParentDir {
            path: config.database.clone(),
            source,
        }
    })?;
    SqliteStore::open(config.database.as_std_path())?;
    info!("initialised {}", config.database);
    writeln!(
        writer,
        "{} ready (schema version {SCHEMA_VERSION})",
        config.database
    )
    .map_err(CliError::WriteOutput)
}
