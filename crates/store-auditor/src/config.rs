use std::net::SocketAddr;
use std::time::Duration;

use audit_common::env;
use audit_common::openai::OpenAiClientConfig;

use crate::error::AppError;

/// Application configuration loaded explicitly from environment variables.
///
/// Every variable is optional. The model credential is deliberately not part of the
/// configuration: it arrives with each audit request from the UI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the web UI listens on.
    pub bind_addr: SocketAddr,
    /// Timeout for the single storefront GET.
    pub fetch_timeout: Duration,
    /// Model identifier sent with each analysis request.
    pub model: String,
    /// Chat-completions client settings.
    pub openai: OpenAiClientConfig,
}

impl Config {
    pub const DEFAULT_BIND_ADDR: &'static str = "127.0.0.1:8501";
    pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    /// Optional:
    /// - `AUDITOR_BIND_ADDR`: listen address (default `127.0.0.1:8501`)
    /// - `AUDITOR_FETCH_TIMEOUT_SECS`: storefront request timeout (default 10)
    /// - `AUDITOR_MODEL`: model id (default `gpt-4o`)
    /// - `OPENAI_BASE_URL`, `OPENAI_TIMEOUT_SECS`, `OPENAI_MAX_ERROR_BODY_BYTES`
    pub fn from_env() -> Result<Self, AppError> {
        let raw_addr = env::var_or("AUDITOR_BIND_ADDR", Self::DEFAULT_BIND_ADDR);
        let bind_addr = raw_addr.parse::<SocketAddr>().map_err(|e| {
            AppError::Config(format!("AUDITOR_BIND_ADDR {raw_addr:?} is not a socket address: {e}"))
        })?;

        let fetch_timeout_secs = env::parse_var::<u64>("AUDITOR_FETCH_TIMEOUT_SECS")?
            .unwrap_or(Self::DEFAULT_FETCH_TIMEOUT_SECS);
        if fetch_timeout_secs == 0 {
            return Err(AppError::Config(
                "AUDITOR_FETCH_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            model: env::var_or("AUDITOR_MODEL", Self::DEFAULT_MODEL),
            openai: OpenAiClientConfig::from_env()?,
        })
    }
}
