//! Submission Dispatcher - high-level orchestration
//!
//! **Responsibility:**
//! Turn "user code + a problem" into judge calls and persisted records.
//!
//! **Paths:**
//! 1. `run_now` - interactive, sequential single submissions against the
//!    visible test cases; every test case gets a result, even on failure
//! 2. `submit_async` - one batch against the hidden test cases, persisted as
//!    a `PENDING` submission; returns without waiting for the judge
//! 3. `check_status` - polls a stored submission's tokens and applies the
//!    terminal verdict exactly once
//!
//! This module is the glue layer - it knows nothing about:
//! - The judge's wire format (client's job)
//! - How per-test results reduce to one verdict (verdict's job)

use crate::assembler::assemble;
use crate::client::JudgeApi;
use crate::error::EvaluationError;
use crate::languages::LanguageRegistry;
use crate::poller::{PollOutcome, StatusPoller};
use crate::verdict::PerTestVerdict;
use litecode_common::config::PollPolicy;
use litecode_common::store::SubmissionStore;
use litecode_common::types::{AggregateVerdict, ProblemExecutionData, Submission};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Where a reported status came from
#[derive(Debug, Clone, PartialEq)]
pub enum StatusSource {
    /// The stored record was already terminal; the judge was not contacted
    Stored,
    /// Freshly polled from the judge
    Polled(PollOutcome),
}

/// Answer to a status request
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCheck {
    pub submission_id: Uuid,
    pub verdict: AggregateVerdict,
    pub source: StatusSource,
    /// Whether this request performed the PENDING -> terminal transition
    pub applied: bool,
}

pub struct SubmissionDispatcher {
    judge: Arc<dyn JudgeApi>,
    submissions: Arc<dyn SubmissionStore>,
    languages: Arc<LanguageRegistry>,
    poller: StatusPoller,
}

impl SubmissionDispatcher {
    pub fn new(
        judge: Arc<dyn JudgeApi>,
        submissions: Arc<dyn SubmissionStore>,
        languages: Arc<LanguageRegistry>,
        poll_policy: PollPolicy,
    ) -> Self {
        let poller = StatusPoller::new(judge.clone(), poll_policy);
        Self {
            judge,
            submissions,
            languages,
            poller,
        }
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    fn language_id(&self, language: &str) -> Result<i32, EvaluationError> {
        self.languages
            .judge_id(language)
            .ok_or_else(|| EvaluationError::UnsupportedLanguage(language.to_string()))
    }

    /// Evaluate user code against the visible test cases, one call at a time
    ///
    /// A judge failure on one test case becomes a `Failed` sentinel for that
    /// test only; the remaining test cases are still evaluated.
    #[instrument(skip(self, problem, user_code), fields(problem_id = %problem.problem_id))]
    pub async fn run_now(
        &self,
        problem: &ProblemExecutionData,
        user_code: &str,
        language: &str,
    ) -> Result<Vec<PerTestVerdict>, EvaluationError> {
        let language_id = self.language_id(language)?;
        if problem.visible_test_cases.is_empty() {
            return Err(EvaluationError::NoVisibleTestCases);
        }
        let source = assemble(&problem.complete_code_templates, language, user_code)?;

        let mut results = Vec::with_capacity(problem.visible_test_cases.len());
        for (idx, test_case) in problem.visible_test_cases.iter().enumerate() {
            let result = match self
                .judge
                .submit_one(&source, language_id, &test_case.input, &test_case.output, true)
                .await
            {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(test_num = idx + 1, error = %e, "Judge call failed; recording failure");
                    PerTestVerdict::failed(None)
                }
            };
            results.push(result);
        }

        info!(tests = results.len(), "Run completed");
        Ok(results)
    }

    /// Enqueue the hidden test cases and persist a PENDING submission
    #[instrument(skip(self, problem, user_code), fields(problem_id = %problem.problem_id))]
    pub async fn submit_async(
        &self,
        problem: &ProblemExecutionData,
        user_code: &str,
        language: &str,
        user_id: &str,
    ) -> Result<Uuid, EvaluationError> {
        let language_id = self.language_id(language)?;
        if problem.hidden_test_cases.is_empty() {
            return Err(EvaluationError::NoHiddenTestCases);
        }
        let source = assemble(&problem.complete_code_templates, language, user_code)?;

        let tokens = self
            .judge
            .submit_batch(&source, language_id, &problem.hidden_test_cases)
            .await?;

        let submission = Submission::pending(
            user_id,
            problem.problem_id.clone(),
            user_code,
            language_id,
            tokens,
        );
        let id = self.submissions.create(&submission).await?;

        info!(submission_id = %id, tokens = submission.tokens.len(), "Submission queued");
        Ok(id)
    }

    /// Report a submission's status, polling the judge while it is pending
    ///
    /// Submissions belonging to another user are reported as not found.
    #[instrument(skip(self))]
    pub async fn check_status(
        &self,
        submission_id: Uuid,
        user_id: &str,
    ) -> Result<StatusCheck, EvaluationError> {
        let submission = self
            .submissions
            .get(submission_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or(EvaluationError::SubmissionNotFound(submission_id))?;

        if submission.status.is_terminal() {
            return Ok(StatusCheck {
                submission_id,
                verdict: stored_verdict(&submission),
                source: StatusSource::Stored,
                applied: false,
            });
        }

        let outcome = self.poller.poll(&submission.tokens).await;
        if !outcome.is_final() {
            return Ok(StatusCheck {
                submission_id,
                verdict: outcome.verdict(),
                source: StatusSource::Polled(outcome),
                applied: false,
            });
        }

        let verdict = outcome.verdict();
        let applied = self.submissions.update_status(&submission, &verdict).await?;
        if applied {
            info!(submission_id = %submission_id, status = %verdict.overall, "Submission verdict recorded");
            return Ok(StatusCheck {
                submission_id,
                verdict,
                source: StatusSource::Polled(outcome),
                applied,
            });
        }

        // Another request recorded a verdict first; report that one
        let current = self
            .submissions
            .get(submission_id)
            .await?
            .ok_or(EvaluationError::SubmissionNotFound(submission_id))?;
        Ok(StatusCheck {
            submission_id,
            verdict: stored_verdict(&current),
            source: StatusSource::Polled(outcome),
            applied: false,
        })
    }
}

fn stored_verdict(submission: &Submission) -> AggregateVerdict {
    AggregateVerdict {
        overall: submission.status,
        max_runtime_seconds: submission.metrics.max_runtime_seconds,
        max_memory_kb: submission.metrics.max_memory_kb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockJudgeApi;
    use crate::error::JudgeError;
    use crate::verdict::JudgeStatus;
    use litecode_common::store::{MemoryStore, StoreError};
    use litecode_common::types::{CodeTemplate, OverallStatus, TestCase};
    use std::time::Duration;

    fn judged(label: &str, runtime: Option<f64>, memory: Option<u64>) -> PerTestVerdict {
        PerTestVerdict {
            token: None,
            status_id: 3,
            status: JudgeStatus::from_label(label),
            status_label: label.to_string(),
            runtime_seconds: runtime,
            memory_kb: memory,
            stdout: None,
            stderr: None,
            compile_output: None,
        }
    }

    fn problem(visible: usize, hidden: usize) -> ProblemExecutionData {
        ProblemExecutionData {
            problem_id: "prob-1".to_string(),
            complete_code_templates: vec![CodeTemplate {
                language: "cpp".to_string(),
                code: "int f(){##USER_CODE_HERE##}".to_string(),
            }],
            visible_test_cases: (0..visible)
                .map(|i| TestCase::new(format!("v{}", i), format!("{}", i)))
                .collect(),
            hidden_test_cases: (0..hidden)
                .map(|i| TestCase::new(format!("h{}", i), format!("{}", i)))
                .collect(),
        }
    }

    fn dispatcher(judge: MockJudgeApi, store: Arc<MemoryStore>, max_attempts: u32) -> SubmissionDispatcher {
        SubmissionDispatcher::new(
            Arc::new(judge),
            store,
            Arc::new(LanguageRegistry::builtin()),
            PollPolicy {
                max_attempts,
                interval: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn test_run_now_sequential_with_assembled_source() {
        let mut judge = MockJudgeApi::new();
        judge
            .expect_submit_one()
            .withf(|source: &str, language_id: &i32, _: &str, _: &str, wait: &bool| {
                source == "int f(){return 1;}" && *language_id == 54 && *wait
            })
            .times(3)
            .returning(|_, _, stdin, _, _| {
                let label = if stdin == "v1" { "Wrong Answer" } else { "Accepted" };
                Ok(judged(label, Some(0.01), Some(100)))
            });

        let dispatcher = dispatcher(judge, Arc::new(MemoryStore::new()), 15);
        let results = dispatcher.run_now(&problem(3, 0), "return 1;", "cpp").await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, JudgeStatus::Accepted);
        assert_eq!(results[1].status, JudgeStatus::WrongAnswer);
        assert_eq!(results[2].status, JudgeStatus::Accepted);
    }

    #[tokio::test]
    async fn test_run_now_failure_becomes_sentinel_and_continues() {
        let mut judge = MockJudgeApi::new();
        judge.expect_submit_one().times(3).returning(|_, _, stdin, _, _| {
            if stdin == "v0" {
                Err(JudgeError::Unavailable("timeout".into()))
            } else {
                Ok(judged("Accepted", Some(0.02), Some(64)))
            }
        });

        let dispatcher = dispatcher(judge, Arc::new(MemoryStore::new()), 15);
        let results = dispatcher.run_now(&problem(3, 0), "return 1;", "cpp").await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], PerTestVerdict::failed(None));
        assert_eq!(results[1].status, JudgeStatus::Accepted);
        assert_eq!(results[2].status, JudgeStatus::Accepted);
    }

    #[tokio::test]
    async fn test_run_now_unfinished_wait_becomes_sentinel() {
        use crate::client::JudgeClient;
        use axum::{routing::post, Json, Router};
        use litecode_common::config::JudgeConfig;

        // Judge with wait mode disabled: answers with a bare token
        let app = Router::new().route(
            "/submissions/",
            post(|| async { Json(serde_json::json!({"token": "queued"})) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let judge = JudgeClient::new(JudgeConfig::new(format!("http://{}", addr))).unwrap();
        let dispatcher = SubmissionDispatcher::new(
            Arc::new(judge),
            Arc::new(MemoryStore::new()),
            Arc::new(LanguageRegistry::builtin()),
            PollPolicy::default(),
        );

        let results = dispatcher.run_now(&problem(2, 0), "return 1;", "cpp").await.unwrap();

        assert_eq!(results, vec![PerTestVerdict::failed(None), PerTestVerdict::failed(None)]);
        assert_eq!(results[0].status_id, crate::verdict::FAILED_STATUS_ID);
    }

    #[tokio::test]
    async fn test_run_now_without_visible_tests_makes_no_calls() {
        let mut judge = MockJudgeApi::new();
        judge.expect_submit_one().never();

        let dispatcher = dispatcher(judge, Arc::new(MemoryStore::new()), 15);
        let err = dispatcher.run_now(&problem(0, 2), "return 1;", "cpp").await.unwrap_err();

        assert!(matches!(err, EvaluationError::NoVisibleTestCases));
    }

    #[tokio::test]
    async fn test_run_now_unknown_language() {
        let mut judge = MockJudgeApi::new();
        judge.expect_submit_one().never();

        let dispatcher = dispatcher(judge, Arc::new(MemoryStore::new()), 15);
        let err = dispatcher.run_now(&problem(1, 1), "x", "cobol").await.unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedLanguage(_)));

        // Registered language without a template for this problem
        let err = dispatcher.run_now(&problem(1, 1), "x", "python").await.unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedLanguage(_)));
    }

    #[tokio::test]
    async fn test_submit_async_persists_pending_with_tokens() {
        let mut judge = MockJudgeApi::new();
        judge
            .expect_submit_batch()
            .withf(|source: &str, language_id: &i32, cases: &[TestCase]| {
                source == "int f(){return 1;}" && *language_id == 54 && cases.len() == 4
            })
            .times(1)
            .returning(|_, _, cases| Ok(cases.iter().map(|tc| format!("tok-{}", tc.input)).collect()));

        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(judge, store.clone(), 15);
        let id = dispatcher
            .submit_async(&problem(1, 4), "return 1;", "cpp", "user-7")
            .await
            .unwrap();

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, OverallStatus::Pending);
        assert_eq!(stored.user_id, "user-7");
        assert_eq!(stored.problem_id, "prob-1");
        assert_eq!(stored.code, "return 1;");
        assert_eq!(stored.language_id, 54);
        assert_eq!(stored.tokens, vec!["tok-h0", "tok-h1", "tok-h2", "tok-h3"]);
    }

    #[tokio::test]
    async fn test_submit_async_without_hidden_tests() {
        let mut judge = MockJudgeApi::new();
        judge.expect_submit_batch().never();

        let dispatcher = dispatcher(judge, Arc::new(MemoryStore::new()), 15);
        let err = dispatcher
            .submit_async(&problem(2, 0), "return 1;", "cpp", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::NoHiddenTestCases));
    }

    #[tokio::test]
    async fn test_submit_async_judge_down_persists_nothing() {
        let mut judge = MockJudgeApi::new();
        judge
            .expect_submit_batch()
            .times(1)
            .returning(|_, _, _| Err(JudgeError::Unavailable("refused".into())));

        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(judge, store.clone(), 15);
        let err = dispatcher
            .submit_async(&problem(1, 2), "return 1;", "cpp", "u")
            .await
            .unwrap_err();

        assert!(matches!(err, EvaluationError::JudgeUnavailable(_)));
        assert!(store.created_times("u").await.unwrap().is_empty());
    }

    async fn seed_pending(store: &MemoryStore, user: &str, tokens: usize) -> Submission {
        let submission = Submission::pending(
            user,
            "prob-1",
            "return 1;",
            54,
            (0..tokens).map(|i| format!("tok-{}", i)).collect(),
        );
        store.create(&submission).await.unwrap();
        submission
    }

    #[tokio::test]
    async fn test_check_status_records_accepted_verdict() {
        let mut judge = MockJudgeApi::new();
        judge.expect_query_batch().times(1).returning(|_| {
            Ok(vec![
                judged("Accepted", Some(0.1), Some(900)),
                judged("Accepted", Some(0.2), Some(800)),
            ])
        });

        let store = Arc::new(MemoryStore::new());
        let submission = seed_pending(&store, "u1", 2).await;
        let dispatcher = dispatcher(judge, store.clone(), 15);

        let check = dispatcher.check_status(submission.id, "u1").await.unwrap();

        assert!(check.applied);
        assert_eq!(check.verdict.overall, OverallStatus::Accepted);
        assert_eq!(check.verdict.max_runtime_seconds, Some(0.2));
        assert_eq!(check.verdict.max_memory_kb, Some(900));

        let stored = store.get(submission.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OverallStatus::Accepted);
        assert_eq!(stored.metrics.max_runtime_seconds, Some(0.2));
    }

    #[tokio::test]
    async fn test_check_status_terminal_record_skips_judge() {
        let mut judge = MockJudgeApi::new();
        judge.expect_query_batch().times(1).returning(|_| {
            Ok(vec![judged("Compilation Error", None, None)])
        });

        let store = Arc::new(MemoryStore::new());
        let submission = seed_pending(&store, "u1", 1).await;
        let dispatcher = dispatcher(judge, store.clone(), 15);

        let first = dispatcher.check_status(submission.id, "u1").await.unwrap();
        let second = dispatcher.check_status(submission.id, "u1").await.unwrap();

        assert!(first.applied);
        assert_eq!(first.verdict.overall, OverallStatus::CompilationError);
        assert!(!second.applied);
        assert_eq!(second.source, StatusSource::Stored);
        assert_eq!(second.verdict.overall, OverallStatus::CompilationError);
    }

    #[tokio::test]
    async fn test_check_status_still_pending_is_not_persisted() {
        let mut judge = MockJudgeApi::new();
        judge
            .expect_query_batch()
            .times(4)
            .returning(|_| Ok(vec![judged("Processing", None, None)]));

        let store = Arc::new(MemoryStore::new());
        let submission = seed_pending(&store, "u1", 1).await;
        let dispatcher = dispatcher(judge, store.clone(), 2);

        let first = dispatcher.check_status(submission.id, "u1").await.unwrap();
        let second = dispatcher.check_status(submission.id, "u1").await.unwrap();

        for check in [&first, &second] {
            assert!(!check.applied);
            assert_eq!(check.verdict.overall, OverallStatus::InternalError);
            assert_eq!(
                check.source,
                StatusSource::Polled(PollOutcome::Exhausted { attempts: 2 })
            );
        }
        let stored = store.get(submission.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OverallStatus::Pending);
    }

    #[tokio::test]
    async fn test_check_status_other_users_submission_is_hidden() {
        let mut judge = MockJudgeApi::new();
        judge.expect_query_batch().never();

        let store = Arc::new(MemoryStore::new());
        let submission = seed_pending(&store, "owner", 1).await;
        let dispatcher = dispatcher(judge, store, 15);

        let err = dispatcher.check_status(submission.id, "intruder").await.unwrap_err();
        assert!(matches!(err, EvaluationError::SubmissionNotFound(id) if id == submission.id));

        let err = dispatcher.check_status(Uuid::new_v4(), "owner").await.unwrap_err();
        assert!(matches!(err, EvaluationError::SubmissionNotFound(_)));
    }

    /// Serves one stale PENDING read, then delegates to the real store
    struct StaleOnceStore {
        inner: Arc<MemoryStore>,
        stale: std::sync::Mutex<Option<Submission>>,
    }

    #[async_trait::async_trait]
    impl SubmissionStore for StaleOnceStore {
        async fn create(&self, submission: &Submission) -> Result<Uuid, StoreError> {
            self.inner.create(submission).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
            let stale = self.stale.lock().unwrap().take();
            match stale {
                Some(snapshot) => Ok(Some(snapshot)),
                None => self.inner.get(id).await,
            }
        }

        async fn update_status(
            &self,
            submission: &Submission,
            verdict: &AggregateVerdict,
        ) -> Result<bool, StoreError> {
            self.inner.update_status(submission, verdict).await
        }

        async fn recent_for_problem(
            &self,
            user_id: &str,
            problem_id: &str,
            before: Option<chrono::DateTime<chrono::Utc>>,
            limit: usize,
        ) -> Result<Vec<Submission>, StoreError> {
            self.inner.recent_for_problem(user_id, problem_id, before, limit).await
        }

        async fn created_times(
            &self,
            user_id: &str,
        ) -> Result<Vec<chrono::DateTime<chrono::Utc>>, StoreError> {
            self.inner.created_times(user_id).await
        }
    }

    #[tokio::test]
    async fn test_check_status_reports_first_recorded_verdict() {
        let mut judge = MockJudgeApi::new();
        judge
            .expect_query_batch()
            .times(1)
            .returning(|_| Ok(vec![judged("Wrong Answer", None, None)]));

        let inner = Arc::new(MemoryStore::new());
        let submission = seed_pending(&inner, "u1", 1).await;

        // A concurrent request already recorded its verdict
        let racing = AggregateVerdict::bare(OverallStatus::TimeLimitExceeded);
        assert!(inner.update_status(&submission, &racing).await.unwrap());

        let store = Arc::new(StaleOnceStore {
            inner: inner.clone(),
            stale: std::sync::Mutex::new(Some(submission.clone())),
        });
        let dispatcher = SubmissionDispatcher::new(
            Arc::new(judge),
            store,
            Arc::new(LanguageRegistry::builtin()),
            PollPolicy {
                max_attempts: 15,
                interval: Duration::from_millis(1),
            },
        );

        let check = dispatcher.check_status(submission.id, "u1").await.unwrap();

        assert!(!check.applied);
        assert_eq!(check.verdict.overall, OverallStatus::TimeLimitExceeded);
        let stored = inner.get(submission.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OverallStatus::TimeLimitExceeded);
    }
}
