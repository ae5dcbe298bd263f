/// Error types shared across the auditor crates.
///
/// These errors represent failures in infrastructure components (HTTP client setup)
/// that are common to every binary. Application-specific errors should be defined
/// in each binary crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid environment variable {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}
