//! Library-wide error type.
//!
//! Every fallible public entry point in this crate returns
//! `Result<T, AnalysisError>`. `anyhow` is reserved for the `bci` CLI binary,
//! which wraps these errors with I/O and argument-parsing context at the
//! process boundary.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::provider::ClassFileError;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to load {path}: {source}")]
    LoadFailure {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse class file {class_name}: {source}")]
    ClassParseFailure {
        class_name: String,
        #[source]
        source: ClassFileError,
    },

    #[error("analysis cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
