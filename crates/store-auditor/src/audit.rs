use tracing::info;

use crate::analyzer::Analyzer;
use crate::error::AppError;
use crate::fetcher::Fetcher;
use crate::model::ApiKey;
use crate::session::AuditSession;

/// One audit: validate input, fetch the storefront, then analyze it.
///
/// Steps run strictly in sequence and the first failure ends the run.
pub async fn run_audit(
    fetcher: &Fetcher,
    analyzer: &Analyzer,
    raw_url: &str,
    raw_api_key: &str,
) -> Result<AuditSession, AppError> {
    let api_key = ApiKey::new(raw_api_key).ok_or(AppError::MissingInput("API key"))?;
    let url = raw_url.trim();
    if url.is_empty() {
        return Err(AppError::MissingInput("store URL"));
    }

    info!(url, "audit started");
    let scrape = fetcher.fetch(url).await?;
    let opportunities = analyzer.analyze(&scrape, &api_key).await?;
    info!(url, opportunities = opportunities.len(), "audit finished");

    Ok(AuditSession::new(url.to_string(), scrape, opportunities))
}
