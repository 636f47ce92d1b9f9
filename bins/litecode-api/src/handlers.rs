// HTTP route handlers for the LiteCode API

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use litecode_common::types::{OverallStatus, ProblemExecutionData, Submission};
use litecode_judge::{EvaluationError, JudgeStatus, PerTestVerdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::AppError;
use crate::metrics;
use crate::AppState;

/// Page size of the per-problem history when the caller gives none
const DEFAULT_HISTORY_LIMIT: usize = 5;
const MAX_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub language: String,
    #[serde(default, alias = "userCode")]
    pub code: String,
}

impl EvaluateRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.slug.trim().is_empty() || self.language.trim().is_empty() || self.code.is_empty() {
            return Err(AppError::BadRequest(
                "slug, language and code are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub result: Vec<PerTestVerdict>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub submission_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "submissionId")]
    pub submission_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: OverallStatus,
    pub max_runtime_seconds: Option<f64>,
    pub max_memory_kb: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "problemId", alias = "id")]
    pub problem_id: Option<String>,
    /// Creation time (epoch millis) of the last submission already seen
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

impl HistoryQuery {
    fn page_size(&self) -> Result<usize, AppError> {
        let Some(raw) = self.limit.as_deref().filter(|v| !v.trim().is_empty()) else {
            return Ok(DEFAULT_HISTORY_LIMIT);
        };
        match raw.trim().parse::<usize>() {
            Ok(limit) if (1..=MAX_HISTORY_LIMIT).contains(&limit) => Ok(limit),
            _ => Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_HISTORY_LIMIT
            ))),
        }
    }

    fn before(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let Some(raw) = self.cursor.as_deref().filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest("Invalid cursor".to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub submissions: Vec<Submission>,
    pub next_cursor: Option<i64>,
    pub has_next: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ContributionsResponse {
    pub submissions: Vec<Contribution>,
}

/// Resolve the language and problem in the order the caller can fix them
async fn load_problem(
    state: &AppState,
    request: &EvaluateRequest,
) -> Result<ProblemExecutionData, AppError> {
    if state.dispatcher.languages().judge_id(&request.language).is_none() {
        return Err(EvaluationError::UnsupportedLanguage(request.language.clone()).into());
    }

    state
        .problems
        .execution_data(&request.slug)
        .await?
        .ok_or_else(|| EvaluationError::ProblemNotFound(request.slug.clone()).into())
}

/// POST /run - Evaluate code against the visible test cases
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(payload): Json<EvaluateRequest>,
) -> Result<Json<RunResponse>, AppError> {
    payload.validate()?;
    let problem = load_problem(&state, &payload).await?;

    let result = state
        .dispatcher
        .run_now(&problem, &payload.code, &payload.language)
        .await?;

    metrics::RUNS_TOTAL.inc();
    let failed = result
        .iter()
        .filter(|r| r.status == JudgeStatus::Failed)
        .count();
    metrics::JUDGE_FAILURES_TOTAL.inc_by(failed as u64);

    info!(
        user_id = %user_id,
        slug = %payload.slug,
        tests = result.len(),
        failed,
        "Run evaluated"
    );
    Ok(Json(RunResponse { result }))
}

/// POST /submit - Queue code against the hidden test cases
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(payload): Json<EvaluateRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    payload.validate()?;
    let problem = load_problem(&state, &payload).await?;

    let submission_id = match state
        .dispatcher
        .submit_async(&problem, &payload.code, &payload.language, &user_id)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            if matches!(e, EvaluationError::JudgeUnavailable(_)) {
                metrics::JUDGE_FAILURES_TOTAL.inc();
            }
            error!(user_id = %user_id, slug = %payload.slug, error = %e, "Submission failed");
            return Err(e.into());
        }
    };

    metrics::SUBMISSIONS_TOTAL.inc();
    Ok(Json(SubmitResponse { submission_id }))
}

/// GET /submissionstatus?submissionId= - Poll a submission's verdict
pub async fn submission_status(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let raw_id = query
        .submission_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("submissionId is required".to_string()))?;
    let submission_id = Uuid::parse_str(raw_id.trim())
        .map_err(|_| AppError::BadRequest("Invalid submission ID format".to_string()))?;

    let check = state.dispatcher.check_status(submission_id, &user_id).await?;
    metrics::record_status_check(&check);

    Ok(Json(StatusResponse {
        status: check.verdict.overall,
        max_runtime_seconds: check.verdict.max_runtime_seconds,
        max_memory_kb: check.verdict.max_memory_kb,
    }))
}

/// GET /submissions?problemId=&cursor=&limit= - Caller's submissions for a problem, newest first
pub async fn recent_submissions(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let problem_id = query
        .problem_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("problemId is required".to_string()))?;
    let limit = query.page_size()?;
    let before = query.before()?;

    // One extra row tells whether another page exists
    let mut submissions = state
        .submissions
        .recent_for_problem(&user_id, problem_id, before, limit + 1)
        .await?;
    let has_next = submissions.len() > limit;
    submissions.truncate(limit);
    let next_cursor = if has_next {
        submissions.last().map(|s| s.created_at.timestamp_millis())
    } else {
        None
    };

    Ok(Json(HistoryResponse {
        submissions,
        next_cursor,
        has_next,
    }))
}

/// GET /contributions - Creation times of all the caller's submissions
pub async fn contributions(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Result<Json<ContributionsResponse>, AppError> {
    let submissions = state
        .submissions
        .created_times(&user_id)
        .await?
        .into_iter()
        .map(|created_at| Contribution { created_at })
        .collect();
    Ok(Json(ContributionsResponse { submissions }))
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_endpoint() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
