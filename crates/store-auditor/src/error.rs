use audit_common::error::CommonError;

use crate::analyzer::AnalysisError;
use crate::fetcher::FetchError;

/// Everything that can end an audit run or stop the server from starting.
///
/// None of these are retried; the web layer turns each into a visible status message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("missing input: {0}")]
    MissingInput(&'static str),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("config error: {0}")]
    Config(String),
}
