use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use crate::model::{Opportunity, ScrapeResult};
use crate::report;

/// The latest completed audit.
#[derive(Debug, Clone)]
pub struct AuditSession {
    /// URL exactly as the user entered it.
    pub url: String,
    pub scrape: ScrapeResult,
    pub opportunities: Vec<Opportunity>,
    /// Unix seconds at completion.
    pub audited_at: u64,
}

impl AuditSession {
    pub fn new(url: String, scrape: ScrapeResult, opportunities: Vec<Opportunity>) -> Self {
        Self {
            url,
            scrape,
            opportunities,
            audited_at: unix_now(),
        }
    }

    pub fn report(&self) -> String {
        report::render_report(&self.url, &self.opportunities)
    }

    pub fn report_file_name(&self) -> String {
        report::report_file_name(self.audited_at)
    }
}

/// In-memory holder for the current [`AuditSession`].
///
/// Each successful audit replaces the previous one wholesale; nothing survives a restart.
#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Arc<RwLock<Option<AuditSession>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<AuditSession> {
        self.inner.read().await.clone()
    }

    /// Returns the session that was displaced, if any.
    pub async fn replace(&self, session: AuditSession) -> Option<AuditSession> {
        self.inner.write().await.replace(session)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::SchemaCheck;

    fn session(url: &str) -> AuditSession {
        AuditSession::new(
            url.to_string(),
            ScrapeResult {
                url: format!("https://{url}"),
                title: String::new(),
                description: String::new(),
                h1: vec![],
                h2: vec![],
                schema_check: SchemaCheck::Missing,
                raw_json_ld: vec![],
            },
            vec![],
        )
    }

    #[tokio::test]
    async fn test_slot_starts_empty() {
        assert!(SessionSlot::new().current().await.is_none());
    }

    #[tokio::test]
    async fn test_replace_overwrites_wholesale() {
        let slot = SessionSlot::new();
        assert!(slot.replace(session("first.example")).await.is_none());

        let displaced = slot.replace(session("second.example")).await.unwrap();
        assert_eq!(displaced.url, "first.example");
        assert_eq!(slot.current().await.unwrap().url, "second.example");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let slot = SessionSlot::new();
        let other = slot.clone();
        slot.replace(session("shared.example")).await;
        assert_eq!(other.current().await.unwrap().url, "shared.example");
    }

    #[test]
    fn test_report_file_name_uses_audit_time() {
        let mut s = session("acme.example");
        s.audited_at = 1_700_000_000;
        assert_eq!(s.report_file_name(), "AI_Audit_1700000000.md");
        assert!(s.report().starts_with("# AI Opportunity Report for acme.example"));
    }
}
