//! Score command implementation for the rating CLI.

use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use clap::Parser;
use geo::Coord;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use rating_core::{SentimentAnalyser, SqliteStore};
use rating_scorer::{BatchReport, BatchRunner, Deadline, PipelineConfig, RetryPolicy, StoredWeather};
use serde::{Deserialize, Serialize};

use crate::sentiment::{HttpSentimentAnalyser, HttpSentimentConfig, NoSentiment};
use crate::{
    ARG_CAPITAL_LAT, ARG_CAPITAL_LON, ARG_DATABASE, ARG_DEADLINE_SECS, ARG_RETRY_ATTEMPTS,
    ARG_SENTIMENT_URL, CliError, ENV_SCORE_CAPITAL_LAT, ENV_SCORE_CAPITAL_LON,
    ENV_SCORE_DATABASE,
};

/// CLI arguments for the `score` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Recompute location, segment and complex scores for every \
                 region and city in a rating database. Scores computed this \
                 month are reused.",
    about = "Run the scoring pipeline"
)]
#[ortho_config(prefix = "RATING")]
pub(crate) struct ScoreArgs {
    /// Path to the SQLite rating database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Longitude of the national capital.
    #[arg(long = ARG_CAPITAL_LON, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) capital_lon: Option<f64>,
    /// Latitude of the national capital.
    #[arg(long = ARG_CAPITAL_LAT, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) capital_lat: Option<f64>,
    /// Stop the run after this many seconds.
    #[arg(long = ARG_DEADLINE_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) deadline_secs: Option<u64>,
    /// Base URL of the sentiment service; sentiment scores 0 when unset.
    #[arg(long = ARG_SENTIMENT_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) sentiment_url: Option<String>,
    /// Attempts per sentiment request, including the first.
    #[arg(long = ARG_RETRY_ATTEMPTS, value_name = "count")]
    #[serde(default)]
    pub(crate) retry_attempts: Option<u32>,
}

impl ScoreArgs {
    pub(crate) fn into_config(self) -> Result<ScoreConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ScoreConfig::try_from(merged)
    }
}

/// Resolved `score` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) capital: Coord<f64>,
    pub(crate) deadline: Option<Duration>,
    pub(crate) sentiment_url: Option<String>,
    pub(crate) retry: RetryPolicy,
}

impl ScoreConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.database, ARG_DATABASE)
    }

    fn sentiment(&self) -> Result<Box<dyn SentimentAnalyser>, CliError> {
        let Some(base_url) = &self.sentiment_url else {
            info!("no sentiment service configured; sentiment scores 0");
            return Ok(Box::new(NoSentiment));
        };
        let client = HttpSentimentAnalyser::with_config(HttpSentimentConfig::new(base_url.as_str()))
            .map_err(|source| CliError::BuildSentimentClient {
                base_url: base_url.clone(),
                source,
            })?;
        Ok(Box::new(client))
    }
}

impl TryFrom<ScoreArgs> for ScoreConfig {
    type Error = CliError;

    fn try_from(args: ScoreArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_SCORE_DATABASE,
        })?;
        let x = coordinate(args.capital_lon, ARG_CAPITAL_LON, ENV_SCORE_CAPITAL_LON, 180.0)?;
        let y = coordinate(args.capital_lat, ARG_CAPITAL_LAT, ENV_SCORE_CAPITAL_LAT, 90.0)?;

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = args.retry_attempts {
            if attempts == 0 {
                return Err(CliError::InvalidArgument {
                    field: ARG_RETRY_ATTEMPTS,
                    reason: "at least one attempt is required".to_owned(),
                });
            }
            retry.max_attempts = attempts;
        }

        Ok(Self {
            database,
            capital: Coord { x, y },
            deadline: args.deadline_secs.map(Duration::from_secs),
            sentiment_url: args.sentiment_url,
            retry,
        })
    }
}

#[expect(clippy::float_arithmetic, reason = "negating the coordinate limit")]
fn coordinate(
    value: Option<f64>,
    field: &'static str,
    env: &'static str,
    limit: f64,
) -> Result<f64, CliError> {
    let degrees = value.ok_or(CliError::MissingArgument { field, env })?;
    if degrees.is_finite() && (-limit..=limit).contains(&degrees) {
        Ok(degrees)
    } else {
        Err(CliError::InvalidArgument {
            field,
            reason: format!("{degrees} is outside ±{limit}"),
        })
    }
}

pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match crate::fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// JSON summary printed after a run.
#[derive(Debug, Serialize)]
pub(crate) struct ScoreSummary {
    pub(crate) locations_scored: usize,
    pub(crate) locations_fresh: usize,
    pub(crate) segments: usize,
    pub(crate) empty_segments: usize,
    pub(crate) complex: Vec<AreaScore>,
    pub(crate) failures: Vec<String>,
    pub(crate) interrupted: Option<String>,
}

/// Complex score of one area.
#[derive(Debug, Serialize)]
pub(crate) struct AreaScore {
    pub(crate) area: String,
    pub(crate) score: f64,
}

impl From<&BatchReport> for ScoreSummary {
    fn from(report: &BatchReport) -> Self {
        Self {
            locations_scored: report.types.iter().map(|summary| summary.scored).sum(),
            locations_fresh: report.types.iter().map(|summary| summary.fresh).sum(),
            segments: report.segments,
            empty_segments: report.empty_segments,
            complex: report
                .complex
                .iter()
                .map(|(area, score)| AreaScore {
                    area: area.to_string(),
                    score: *score,
                })
                .collect(),
            failures: report.failures.iter().map(ToString::to_string).collect(),
            interrupted: report.interrupted.map(|stage| stage.to_string()),
        }
    }
}

pub(super) fn run_score(args: ScoreArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let report = execute_score(&config, Utc::now())?;
    write_summary(writer, &ScoreSummary::from(&report))
}

/// Run the pipeline against the configured database.
pub(crate) fn execute_score(config: &ScoreConfig, now: DateTime<Utc>) -> Result<BatchReport, CliError> {
    let store = SqliteStore::open(config.database.as_std_path())?;
    let geo = store.load_geo_context(config.capital)?;
    let sentiment = config.sentiment()?;
    let weather = StoredWeather::new(&store);
    let deadline = config.deadline.map_or_else(Deadline::none, Deadline::after);
    let pipeline = PipelineConfig {
        retry: config.retry.clone(),
        ..PipelineConfig::default()
    };
    info!("scoring {} with {} areas", config.database, geo.areas().len());
    Ok(
        BatchRunner::new(&store, sentiment.as_ref(), &weather, &geo, &geo)
            .with_config(pipeline)
            .run(&deadline, now),
    )
}

fn write_summary(writer: &mut dyn Write, summary: &ScoreSummary) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(summary).map_err(CliError::SerializeSummary)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
