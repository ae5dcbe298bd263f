use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::analyzer::Analyzer;
use crate::audit;
use crate::error::AppError;
use crate::fetcher::{FetchError, Fetcher};
use crate::session::{AuditSession, SessionSlot};

#[derive(Clone)]
pub struct AppState {
    fetcher: Arc<Fetcher>,
    analyzer: Analyzer,
    session: SessionSlot,
}

impl AppState {
    pub fn new(fetcher: Fetcher, analyzer: Analyzer, session: SessionSlot) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            analyzer,
            session,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/audit", get(index).post(run_audit))
        .route("/report", get(download_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuditForm {
    url: String,
    api_key: String,
}

async fn index(State(state): State<AppState>) -> Response {
    let session = state.session.current().await;
    render_page(StatusCode::OK, None, "", session.as_ref())
}

async fn run_audit(State(state): State<AppState>, Form(form): Form<AuditForm>) -> Response {
    let outcome = audit::run_audit(&state.fetcher, &state.analyzer, &form.url, &form.api_key).await;

    match outcome {
        Ok(session) => {
            let notice = Notice::success(
                "Analysis complete",
                format!(
                    "Site scanned and {} opportunities identified.",
                    session.opportunities.len()
                ),
            );
            let response = render_page(StatusCode::OK, Some(notice), &form.url, Some(&session));
            state.session.replace(session).await;
            response
        }
        Err(err) => {
            warn!(error = %err, "audit failed");
            // Results of an earlier run are not shown under a failure for a different URL.
            render_page(status_for(&err), Some(Notice::from_error(&err)), &form.url, None)
        }
    }
}

async fn download_report(State(state): State<AppState>) -> Response {
    let Some(session) = state.session.current().await else {
        return (StatusCode::NOT_FOUND, "No audit has been run yet.").into_response();
    };

    let disposition = format!("attachment; filename=\"{}\"", session.report_file_name());
    (
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        session.report(),
    )
        .into_response()
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::MissingInput(_) => StatusCode::BAD_REQUEST,
        AppError::Fetch(_) | AppError::Analysis(_) => StatusCode::BAD_GATEWAY,
        AppError::Common(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Success,
    Warning,
    Error,
}

impl Level {
    fn css_class(self) -> &'static str {
        match self {
            Self::Success => "notice success",
            Self::Warning => "notice warning",
            Self::Error => "notice error",
        }
    }
}

/// Status message shown above the results.
#[derive(Debug, Clone)]
struct Notice {
    level: Level,
    title: String,
    detail: String,
    hint: Option<&'static str>,
}

impl Notice {
    fn success(title: &str, detail: String) -> Self {
        Self {
            level: Level::Success,
            title: title.to_string(),
            detail,
            hint: None,
        }
    }

    fn from_error(err: &AppError) -> Self {
        match err {
            AppError::MissingInput("API key") => Self {
                level: Level::Warning,
                title: "API key required".to_string(),
                detail: "Please provide your OpenAI API key to proceed.".to_string(),
                hint: None,
            },
            AppError::MissingInput(what) => Self {
                level: Level::Warning,
                title: format!("{what} required"),
                detail: format!("Please enter a {what}."),
                hint: None,
            },
            AppError::Fetch(FetchError::AccessBlocked { status }) => Self {
                level: Level::Error,
                title: format!("Security Shield Detected ({status})"),
                detail: "The storefront refused automated access.".to_string(),
                hint: Some(
                    "This site has strong bot protection, which usually means it takes \
                     security seriously. No analysis was run.",
                ),
            },
            AppError::Fetch(e) => Self {
                level: Level::Error,
                title: "Connection failed".to_string(),
                detail: format!("Failed to connect: {e}"),
                hint: e.is_retryable().then_some("The site may be temporarily unavailable; try again."),
            },
            AppError::Analysis(e) => Self {
                level: Level::Error,
                title: "AI analysis failed".to_string(),
                detail: format!("AI Error: {e}"),
                hint: None,
            },
            other => Self {
                level: Level::Error,
                title: "Audit failed".to_string(),
                detail: other.to_string(),
                hint: None,
            },
        }
    }
}

#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate {
    notice: Option<Notice>,
    url_value: String,
    session: Option<SessionView>,
}

/// View model for the latest audit.
struct SessionView {
    url: String,
    opportunities: Vec<OpportunityView>,
    raw_json: String,
}

/// View model for one recommendation card.
struct OpportunityView {
    title: String,
    description: String,
    tools: String,
    roi: u8,
    complexity: String,
}

impl SessionView {
    fn from_session(session: &AuditSession) -> Self {
        Self {
            url: session.url.clone(),
            opportunities: session
                .opportunities
                .iter()
                .map(|opp| OpportunityView {
                    title: opp.title.clone(),
                    description: opp.description.clone(),
                    tools: opp.tools.join(", "),
                    roi: opp.roi,
                    complexity: opp.complexity.to_string(),
                })
                .collect(),
            // Serializing a ScrapeResult only fails on non-string map keys, which it has none of.
            raw_json: serde_json::to_string_pretty(&session.scrape).unwrap_or_default(),
        }
    }
}

fn render_page(
    status: StatusCode,
    notice: Option<Notice>,
    url_value: &str,
    session: Option<&AuditSession>,
) -> Response {
    let template = PageTemplate {
        notice,
        url_value: url_value.to_string(),
        session: session.map(SessionView::from_session),
    };
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            warn!(error = %e, "page template failed to render");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Template error: {e}")),
            )
                .into_response()
        }
    }
}
