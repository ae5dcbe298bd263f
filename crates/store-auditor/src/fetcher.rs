/// Storefront fetcher.
///
/// One GET per audit with a randomly chosen browser `User-Agent` and a bounded timeout.
/// The response is classified before any parsing happens: 401/403 means the site is
/// blocking us, any other non-200 is a plain fetch failure, and only a 200 body is handed
/// to [`extract`](crate::extract::extract).
use std::time::{Duration, Instant};

use audit_common::error::CommonError;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::extract;
use crate::model::ScrapeResult;

/// Desktop browser identities; one is picked per request.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0",
];

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The site answered 401 or 403. Terminal for this run.
    #[error("security shield detected (HTTP {status})")]
    AccessBlocked { status: u16 },

    #[error("HTTP error {status}")]
    Status { status: u16 },

    /// DNS, TLS, timeout, connection reset, or a body that could not be read.
    #[error("{0}")]
    Transport(String),
}

impl FetchError {
    /// Whether running the same audit again could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::AccessBlocked { .. })
    }
}

/// Prefix `https://` when `raw` does not start with a scheme.
///
/// Only a leading `scheme://` counts; a URL embedded in the path or query
/// (`shop.example/login?next=https://...`) does not.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once("://") {
        Some((scheme, _)) if is_scheme(scheme) => trimmed.to_string(),
        _ => format!("https://{trimmed}"),
    }
}

/// `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`
fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Pick one entry of `pool` uniformly at random. No state carries across calls.
pub fn pick_user_agent<'a>(pool: &[&'a str]) -> Option<&'a str> {
    pool.choose(&mut rand::thread_rng()).copied()
}

pub struct Fetcher {
    http: reqwest::Client,
    timeout: Duration,
    user_agents: &'static [&'static str],
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            timeout,
            user_agents: USER_AGENTS,
        })
    }

    /// Fetch `raw_url` (normalized first) and extract its metadata.
    pub async fn fetch(&self, raw_url: &str) -> Result<ScrapeResult, FetchError> {
        let url = normalize_url(raw_url);
        let user_agent = pick_user_agent(self.user_agents).unwrap_or(USER_AGENTS[0]);
        let started = Instant::now();

        info!(url = %url, user_agent, "fetching storefront");

        let resp = self
            .http
            .get(&url)
            .header(USER_AGENT, user_agent)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %error_chain(&e), "storefront request failed");
                FetchError::Transport(error_chain(&e))
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(url = %url, status = status.as_u16(), "storefront blocked the request");
            return Err(FetchError::AccessBlocked {
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK {
            warn!(url = %url, status = status.as_u16(), "storefront returned non-200");
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %error_chain(&e), "storefront body read failed");
                FetchError::Transport(error_chain(&e))
            })?;

        let result = extract::extract(&url, &body);
        info!(
            url = %url,
            bytes = body.len(),
            schema_found = result.schema_found(),
            json_ld = result.raw_json_ld.len(),
            h1 = result.h1.len(),
            h2 = result.h2.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "storefront scanned"
        );
        Ok(result)
    }
}

/// `reqwest::Error` hides the useful cause (DNS, refused, timeout) in its source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
