//! Error types emitted by the rating CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use rating_core::StoreError;
use thiserror::Error;

use crate::sentiment::SentimentBuildError;

/// Errors emitted by the rating CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without dashes.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// An option holds a value outside its accepted range.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// Flag name without dashes.
        field: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
    /// The database path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag name without dashes.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// The database path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag name without dashes.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// The database path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag name without dashes.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Creating the database's parent directory failed.
    #[error("failed to create parent directory of {path:?}: {source}")]
    CreateParentDir {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The metric store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Constructing the sentiment client failed.
    #[error("failed to build sentiment client for {base_url:?}: {source}")]
    BuildSentimentClient {
        /// Configured service URL.
        base_url: String,
        /// Underlying failure.
        #[source]
        source: SentimentBuildError,
    },
    /// Serializing the run summary failed.
    #[error("failed to serialize run summary: {0}")]
    SerializeSummary(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
