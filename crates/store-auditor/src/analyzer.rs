/// Opportunity analysis through an OpenAI-compatible chat model.
///
/// Split into a pure request builder, the model call, and a pure response parser so the
/// provider can be pointed elsewhere (via `OPENAI_BASE_URL`) or mocked without touching
/// extraction.
use std::sync::Arc;
use std::time::Instant;

use audit_common::openai::{
    ChatCompletionRequest, Message, OpenAiClient, OpenAiClientError, ResponseFormat,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::model::{ApiKey, Opportunity, ScrapeResult};

pub const SYSTEM_PROMPT: &str = r#"You are a Tier-1 AI Strategy Consultant (ex-McKinsey/BCG) auditing an e-commerce store.
Your goal is to find UNTAPPED, SPECIFIC automation opportunities.

CRITICAL RULES:
1. NO GENERIC ADVICE. Banned phrases: "Implement a chatbot", "Improve SEO", "Send emails".
2. BE SPECIFIC. Instead of "Chatbot", say "Autonomous Order Modification Agent". Instead of "SEO", say "Programmatic SEO for Long-tail [Product] Keywords".
3. BE CRITICAL. If the store looks small, suggest low-cost automations. If enterprise, suggest heavy-duty architectures.
4. VARIANCE IS GOOD. Do NOT give everything a 7/10 or 8/10.
   - If an idea is high risk, give it High complexity and a 9/10 ROI.
   - If it's a quick win, give it Low complexity and a 6/10 ROI.

Analyze the provided JSON-LD and Headers.
Structure the response exactly as this JSON:
{
    "opportunities": [
        {
            "title": "High-Impact, Specific Title",
            "description": "Brutal, direct explanation of the value. Why THIS store? Reference their specific products found in the data.",
            "complexity": "Low" | "Medium" | "High",
            "roi": <integer 1-10, use the full range 4-10>,
            "tools": ["Specific Tool 1 (e.g. Make.com)", "Specific Tool 2 (e.g. Pinecone)"]
        }
    ]
}"#;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("model request failed: {0}")]
    Client(#[from] OpenAiClientError),

    #[error("could not serialize store data: {0}")]
    Serialize(serde_json::Error),

    #[error("model returned no message content")]
    EmptyResponse,

    #[error("model returned non-JSON content: {0}")]
    InvalidJson(serde_json::Error),

    #[error("model response has no \"opportunities\" list")]
    MissingOpportunities,

    #[error("opportunity #{index} is malformed: {source}")]
    InvalidOpportunity {
        index: usize,
        source: serde_json::Error,
    },
}

/// The two-message prompt for one store.
pub fn build_request(
    scrape: &ScrapeResult,
    model: &str,
) -> Result<ChatCompletionRequest, AnalysisError> {
    let payload = serde_json::to_string(scrape).map_err(AnalysisError::Serialize)?;
    Ok(ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!("Analyze this store data: {payload}")),
        ],
        temperature: None,
        max_tokens: None,
        response_format: Some(ResponseFormat::json_object()),
    })
}

#[derive(Deserialize)]
struct Envelope {
    opportunities: Option<Vec<serde_json::Value>>,
}

/// Parse the assistant's reply into opportunities.
///
/// Each entry must carry every field of [`Opportunity`] (tools may be omitted); the first
/// malformed entry fails the whole response.
pub fn parse_opportunities(content: &str) -> Result<Vec<Opportunity>, AnalysisError> {
    let envelope: Envelope = serde_json::from_str(content).map_err(AnalysisError::InvalidJson)?;
    let raw = envelope
        .opportunities
        .ok_or(AnalysisError::MissingOpportunities)?;

    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<Opportunity>(value)
                .map_err(|source| AnalysisError::InvalidOpportunity { index: index + 1, source })
        })
        .collect()
}

#[derive(Clone)]
pub struct Analyzer {
    openai: Arc<OpenAiClient>,
    model: String,
}

impl Analyzer {
    pub fn new(openai: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            openai,
            model: model.into(),
        }
    }

    pub async fn analyze(
        &self,
        scrape: &ScrapeResult,
        api_key: &ApiKey,
    ) -> Result<Vec<Opportunity>, AnalysisError> {
        let request = build_request(scrape, &self.model)?;
        let started = Instant::now();
        info!(url = %scrape.url, model = %self.model, "requesting analysis");

        let response = self
            .openai
            .chat_completions(&request, api_key.expose(), None)
            .await
            .inspect_err(|e| warn!(url = %scrape.url, error = %e, "analysis request failed"))?;

        let content = response.first_content().ok_or(AnalysisError::EmptyResponse)?;
        let opportunities = parse_opportunities(content)
            .inspect_err(|e| warn!(url = %scrape.url, error = %e, "unusable analysis response"))?;

        info!(
            url = %scrape.url,
            opportunities = opportunities.len(),
            total_tokens = response.usage.as_ref().and_then(|u| u.total_tokens),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );
        Ok(opportunities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use audit_common::openai::OpenAiClientConfig;
    use axum::{routing::post, Json, Router};

    use crate::model::{Complexity, SchemaCheck};

    fn scrape() -> ScrapeResult {
        ScrapeResult {
            url: "https://acme.example".to_string(),
            title: "Acme Shop".to_string(),
            description: String::new(),
            h1: vec!["Acme".to_string()],
            h2: vec![],
            schema_check: SchemaCheck::Found,
            raw_json_ld: vec![serde_json::json!({"@type": "Product", "name": "Widget"})],
        }
    }

    async fn spawn_model(reply: serde_json::Value) -> Arc<OpenAiClient> {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Arc::new(
            OpenAiClient::new(OpenAiClientConfig {
                base_url: format!("http://{addr}/v1"),
                ..OpenAiClientConfig::default()
            })
            .unwrap(),
        )
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
            "usage": { "total_tokens": 42 }
        })
    }

    #[test]
    fn test_build_request_shape() {
        let request = build_request(&scrape(), "gpt-4o").unwrap();
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert_eq!(request.messages[1].role, "user");
        assert!(request.messages[1]
            .content
            .starts_with("Analyze this store data: {"));
        assert!(request.messages[1].content.contains(r#""name":"Widget""#));
        assert!(request.messages[1].content.contains(r#""schema_check":"found""#));
        assert_eq!(request.response_format, Some(ResponseFormat::json_object()));
    }

    #[test]
    fn test_parse_valid_response() {
        let opps = parse_opportunities(
            r#"{"opportunities":[{"title":"X","description":"Y","complexity":"Low","roi":5,"tools":["A"]}]}"#,
        )
        .unwrap();
        assert_eq!(
            opps,
            vec![Opportunity {
                title: "X".to_string(),
                description: "Y".to_string(),
                complexity: Complexity::Low,
                roi: 5,
                tools: vec!["A".to_string()],
            }]
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_opportunities(r#"{"opportunities":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_opportunities("Sure! Here are some ideas:").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidJson(_)));
    }

    #[test]
    fn test_parse_rejects_missing_key() {
        let err = parse_opportunities(r#"{"ideas":[]}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingOpportunities));
    }

    #[test]
    fn test_parse_reports_malformed_entry_index() {
        let err = parse_opportunities(
            r#"{"opportunities":[
                {"title":"A","description":"B","complexity":"High","roi":9,"tools":[]},
                {"title":"C","complexity":"Low","roi":3}
            ]}"#,
        )
        .unwrap_err();
        match err {
            AnalysisError::InvalidOpportunity { index, source } => {
                assert_eq!(index, 2);
                assert!(source.to_string().contains("description"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_analyze_against_mock_model() {
        let content = r#"{"opportunities":[{"title":"X","description":"Y","complexity":"Low","roi":5,"tools":["A"]}]}"#;
        let analyzer = Analyzer::new(spawn_model(completion(content)).await, "gpt-4o");
        let key = ApiKey::new("sk-test").unwrap();

        let opps = analyzer.analyze(&scrape(), &key).await.unwrap();
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].roi, 5);
    }

    #[tokio::test]
    async fn test_analyze_without_content() {
        let reply = serde_json::json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": null } }]
        });
        let analyzer = Analyzer::new(spawn_model(reply).await, "gpt-4o");
        let key = ApiKey::new("sk-test").unwrap();

        let err = analyzer.analyze(&scrape(), &key).await.unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyResponse));
    }
}
