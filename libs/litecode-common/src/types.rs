use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single input/expected-output pair owned by a problem definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Language-specific program skeleton with exactly one user code marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTemplate {
    pub language: String,
    pub code: String,
}

/// Problem definition as kept in the problem store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub complete_code: Vec<CodeTemplate>,
    #[serde(default)]
    pub visible_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hidden_test_cases: Vec<TestCase>,
}

/// The read-only slice of a problem needed to evaluate code against it
#[derive(Debug, Clone)]
pub struct ProblemExecutionData {
    pub problem_id: String,
    pub complete_code_templates: Vec<CodeTemplate>,
    pub visible_test_cases: Vec<TestCase>,
    pub hidden_test_cases: Vec<TestCase>,
}

impl From<Problem> for ProblemExecutionData {
    fn from(problem: Problem) -> Self {
        Self {
            problem_id: problem.id,
            complete_code_templates: problem.complete_code,
            visible_test_cases: problem.visible_test_cases,
            hidden_test_cases: problem.hidden_test_cases,
        }
    }
}

/// Overall verdict of a submission.
///
/// `Pending` is the only non-terminal state. Once a submission leaves it,
/// the stored status never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Accepted,
    Rejected,
    Pending,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError,
    InternalError,
}

impl OverallStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OverallStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Accepted => "ACCEPTED",
            OverallStatus::Rejected => "REJECTED",
            OverallStatus::Pending => "PENDING",
            OverallStatus::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            OverallStatus::CompilationError => "COMPILATION_ERROR",
            OverallStatus::RuntimeError => "RUNTIME_ERROR",
            OverallStatus::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate performance numbers; only populated for accepted submissions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetrics {
    pub max_runtime_seconds: Option<f64>,
    pub max_memory_kb: Option<u64>,
}

/// One verdict for a whole batch of per-test results
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateVerdict {
    pub overall: OverallStatus,
    pub max_runtime_seconds: Option<f64>,
    pub max_memory_kb: Option<u64>,
}

impl AggregateVerdict {
    /// A verdict that carries no metrics
    pub fn bare(overall: OverallStatus) -> Self {
        Self {
            overall,
            max_runtime_seconds: None,
            max_memory_kb: None,
        }
    }

    pub fn metrics(&self) -> SubmissionMetrics {
        SubmissionMetrics {
            max_runtime_seconds: self.max_runtime_seconds,
            max_memory_kb: self.max_memory_kb,
        }
    }
}

/// A durable "submit" request and, once known, its verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub user_id: String,
    pub problem_id: String,
    pub code: String,
    pub language_id: i32,
    pub tokens: Vec<String>,
    pub status: OverallStatus,
    #[serde(default)]
    pub metrics: SubmissionMetrics,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Build a fresh `Pending` submission for the given judge tokens
    pub fn pending(
        user_id: impl Into<String>,
        problem_id: impl Into<String>,
        code: impl Into<String>,
        language_id: i32,
        tokens: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            problem_id: problem_id.into(),
            code: code.into(),
            language_id,
            tokens,
            status: OverallStatus::Pending,
            metrics: SubmissionMetrics::default(),
            created_at: Utc::now(),
        }
    }

    /// Copy of this record with a terminal verdict applied
    pub fn with_verdict(&self, verdict: &AggregateVerdict) -> Self {
        Self {
            status: verdict.overall,
            metrics: verdict.metrics(),
            ..self.clone()
        }
    }
}
