//! Verdict Aggregator - judge vocabulary and batch reduction
//!
//! **Status Mapping:**
//! Every label the remote judge can report is translated here and only here.
//! Unrecognized labels map to `INTERNAL_ERROR`, never to a silent pass.
//!
//! **Reduction Rules:**
//! - Results are scanned in submission order
//! - A still-running result before any failure makes the batch `PENDING`
//! - The first non-accepted terminal result decides the verdict, metrics null
//! - All accepted: `ACCEPTED` with the maximum runtime and memory

use litecode_common::types::{AggregateVerdict, OverallStatus};
use serde::{Deserialize, Serialize};

/// Judge status id used for results the judge never produced
pub const FAILED_STATUS_ID: i32 = -1;
pub const FAILED_STATUS_LABEL: &str = "Failed";

/// Per-test status as reported by the remote judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgeStatus {
    InQueue,
    Processing,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError,
    InternalError,
    ExecFormatError,
    Unrecognized,
    /// Local sentinel: the call to the judge itself failed
    Failed,
}

impl JudgeStatus {
    /// Parse a judge `status.description` label
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "In Queue" => JudgeStatus::InQueue,
            "Processing" => JudgeStatus::Processing,
            "Accepted" => JudgeStatus::Accepted,
            "Wrong Answer" => JudgeStatus::WrongAnswer,
            "Time Limit Exceeded" => JudgeStatus::TimeLimitExceeded,
            "Compilation Error" => JudgeStatus::CompilationError,
            "Internal Error" => JudgeStatus::InternalError,
            "Exec Format Error" => JudgeStatus::ExecFormatError,
            // "Runtime Error (SIGSEGV)", "Runtime error (NZEC)", ...
            other if other.to_ascii_lowercase().starts_with("runtime error") => {
                JudgeStatus::RuntimeError
            }
            _ => JudgeStatus::Unrecognized,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, JudgeStatus::InQueue | JudgeStatus::Processing)
    }

    /// The one mapping from judge vocabulary to overall status
    pub fn overall(&self) -> OverallStatus {
        match self {
            JudgeStatus::InQueue | JudgeStatus::Processing => OverallStatus::Pending,
            JudgeStatus::Accepted => OverallStatus::Accepted,
            JudgeStatus::WrongAnswer => OverallStatus::Rejected,
            JudgeStatus::TimeLimitExceeded => OverallStatus::TimeLimitExceeded,
            JudgeStatus::CompilationError => OverallStatus::CompilationError,
            JudgeStatus::RuntimeError => OverallStatus::RuntimeError,
            JudgeStatus::InternalError
            | JudgeStatus::ExecFormatError
            | JudgeStatus::Unrecognized
            | JudgeStatus::Failed => OverallStatus::InternalError,
        }
    }
}

/// Result of one test case as reported by the judge, already decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerTestVerdict {
    pub token: Option<String>,
    pub status_id: i32,
    pub status: JudgeStatus,
    pub status_label: String,
    pub runtime_seconds: Option<f64>,
    pub memory_kb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_output: Option<String>,
}

impl PerTestVerdict {
    /// Sentinel for a test case whose judge call failed
    pub fn failed(token: Option<String>) -> Self {
        Self {
            token,
            status_id: FAILED_STATUS_ID,
            status: JudgeStatus::Failed,
            status_label: FAILED_STATUS_LABEL.to_string(),
            runtime_seconds: None,
            memory_kb: None,
            stdout: None,
            stderr: None,
            compile_output: None,
        }
    }

    pub fn overall(&self) -> OverallStatus {
        self.status.overall()
    }
}

/// Reduce a batch of per-test results into one verdict
///
/// An empty batch has nothing to accept and is reported as `INTERNAL_ERROR`.
pub fn aggregate(results: &[PerTestVerdict]) -> AggregateVerdict {
    if results.is_empty() {
        return AggregateVerdict::bare(OverallStatus::InternalError);
    }

    let mut max_runtime: Option<f64> = None;
    let mut max_memory: Option<u64> = None;

    for result in results {
        match result.overall() {
            OverallStatus::Accepted => {
                if let Some(runtime) = result.runtime_seconds.filter(|r| r.is_finite()) {
                    max_runtime = Some(max_runtime.map_or(runtime, |m| m.max(runtime)));
                }
                if let Some(memory) = result.memory_kb {
                    max_memory = Some(max_memory.map_or(memory, |m| m.max(memory)));
                }
            }
            // Not terminal yet; later entries are not inspected
            OverallStatus::Pending => return AggregateVerdict::bare(OverallStatus::Pending),
            failure => return AggregateVerdict::bare(failure),
        }
    }

    AggregateVerdict {
        overall: OverallStatus::Accepted,
        max_runtime_seconds: max_runtime,
        max_memory_kb: max_memory,
    }
}
