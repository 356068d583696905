//! CLI-level error type, translated into the exact exit messages §6 specifies.
//! `bci-core`'s [`bci_core::AnalysisError`] and any I/O/archive failure are
//! wrapped in [`AppError::Analysis`] via `anyhow::Context` at this boundary;
//! the two other variants short-circuit before any analysis runs.

use camino::Utf8PathBuf;

pub enum AppError {
    PathNotFound(Utf8PathBuf),
    InvalidHttpMethod(String),
    Analysis(anyhow::Error),
}

impl AppError {
    /// The one-line message printed to standard error, exactly as §6 specifies.
    pub fn message(&self) -> String {
        match self {
            AppError::PathNotFound(path) => format!("Error: Input path does not exist: {path}"),
            AppError::InvalidHttpMethod(v) => format!("Invalid HTTP method: {v}. Valid values: GET, POST, PUT, DELETE, PATCH"),
            AppError::Analysis(err) => format!("Error during analysis: {err}"),
        }
    }

    /// Full source chain, printed additionally in verbose mode.
    pub fn verbose_detail(&self) -> Option<String> {
        match self {
            AppError::Analysis(err) => {
                let mut lines = Vec::new();
                for cause in err.chain().skip(1) {
                    lines.push(format!("caused by: {cause}"));
                }
                if lines.is_empty() { None } else { Some(lines.join("\n")) }
            }
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Analysis(err)
    }
}

impl From<bci_core::AnalysisError> for AppError {
    fn from(err: bci_core::AnalysisError) -> Self {
        AppError::Analysis(err.into())
    }
}
