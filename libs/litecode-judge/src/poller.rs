//! Status Poller - drives one submission's token set to a terminal verdict
//!
//! Each attempt is a single batch query covering every token. Attempts are
//! separated by a fixed interval and capped by `PollPolicy::max_attempts`;
//! running out of attempts is reported as `INTERNAL_ERROR`, distinct from
//! anything the judge itself said.

use crate::client::JudgeApi;
use crate::verdict::aggregate;
use litecode_common::config::PollPolicy;
use litecode_common::types::{AggregateVerdict, OverallStatus};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How a polling run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The judge reported a terminal aggregate
    Finished { verdict: AggregateVerdict, attempts: u32 },
    /// Every attempt still saw running jobs
    Exhausted { attempts: u32 },
    /// A batch query failed; polling stopped early
    Unavailable { attempts: u32, reason: String },
}

impl PollOutcome {
    /// Verdict to report to the caller
    pub fn verdict(&self) -> AggregateVerdict {
        match self {
            PollOutcome::Finished { verdict, .. } => *verdict,
            PollOutcome::Exhausted { .. } | PollOutcome::Unavailable { .. } => {
                AggregateVerdict::bare(OverallStatus::InternalError)
            }
        }
    }

    /// Number of batch queries issued
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Finished { attempts, .. }
            | PollOutcome::Exhausted { attempts }
            | PollOutcome::Unavailable { attempts, .. } => *attempts,
        }
    }

    /// Only judge-reported verdicts are written back to the submission
    pub fn is_final(&self) -> bool {
        matches!(self, PollOutcome::Finished { .. })
    }
}

pub struct StatusPoller {
    judge: Arc<dyn JudgeApi>,
    policy: PollPolicy,
}

impl StatusPoller {
    pub fn new(judge: Arc<dyn JudgeApi>, policy: PollPolicy) -> Self {
        Self { judge, policy }
    }

    /// Poll the judge until every token is terminal or the budget runs out
    pub async fn poll(&self, tokens: &[String]) -> PollOutcome {
        if tokens.is_empty() {
            error!("Submission has no judge tokens");
            return PollOutcome::Finished {
                verdict: AggregateVerdict::bare(OverallStatus::InternalError),
                attempts: 0,
            };
        }

        for attempt in 1..=self.policy.max_attempts {
            let results = match self.judge.query_batch(tokens).await {
                Ok(results) => results,
                Err(e) => {
                    error!(attempt, tokens = tokens.len(), error = %e, "Batch status query failed");
                    return PollOutcome::Unavailable {
                        attempts: attempt,
                        reason: e.to_string(),
                    };
                }
            };

            let verdict = aggregate(&results);
            if verdict.overall.is_terminal() {
                info!(attempt, status = %verdict.overall, "Submission reached terminal verdict");
                return PollOutcome::Finished {
                    verdict,
                    attempts: attempt,
                };
            }

            debug!(
                attempt,
                max_attempts = self.policy.max_attempts,
                "Judge still running, retrying"
            );
            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        warn!(
            attempts = self.policy.max_attempts,
            tokens = tokens.len(),
            "Poll budget exhausted before judge finished"
        );
        PollOutcome::Exhausted {
            attempts: self.policy.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockJudgeApi;
    use crate::error::JudgeError;
    use crate::verdict::{JudgeStatus, PerTestVerdict};
    use mockall::Sequence;
    use std::time::Duration;

    fn judged(label: &str, runtime: Option<f64>) -> PerTestVerdict {
        PerTestVerdict {
            token: None,
            status_id: 0,
            status: JudgeStatus::from_label(label),
            status_label: label.to_string(),
            runtime_seconds: runtime,
            memory_kb: runtime.map(|_| 1024),
            stdout: None,
            stderr: None,
            compile_output: None,
        }
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            max_attempts,
            interval: Duration::from_millis(1),
        }
    }

    fn tokens(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tok-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_accepted_after_one_retry() {
        let mut judge = MockJudgeApi::new();
        let mut seq = Sequence::new();
        judge
            .expect_query_batch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![judged("In Queue", None), judged("Accepted", Some(0.1))]));
        judge
            .expect_query_batch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![judged("Accepted", Some(0.1)), judged("Accepted", Some(0.2))]));

        let poller = StatusPoller::new(Arc::new(judge), policy(15));
        let outcome = poller.poll(&tokens(2)).await;

        assert_eq!(outcome.attempts(), 2);
        assert!(outcome.is_final());
        let verdict = outcome.verdict();
        assert_eq!(verdict.overall, OverallStatus::Accepted);
        assert_eq!(verdict.max_runtime_seconds, Some(0.2));
    }

    #[tokio::test]
    async fn test_exhaustion_stops_at_budget() {
        let mut judge = MockJudgeApi::new();
        judge
            .expect_query_batch()
            .times(15)
            .returning(|tokens| Ok(tokens.iter().map(|_| judged("Processing", None)).collect()));

        let poller = StatusPoller::new(Arc::new(judge), policy(15));
        let outcome = poller.poll(&tokens(3)).await;

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 15 });
        assert!(!outcome.is_final());
        assert_eq!(outcome.verdict(), AggregateVerdict::bare(OverallStatus::InternalError));
    }

    #[tokio::test]
    async fn test_rejection_short_circuits_in_flight_siblings() {
        let mut judge = MockJudgeApi::new();
        judge.expect_query_batch().times(1).returning(|_| {
            Ok(vec![
                judged("Accepted", Some(0.01)),
                judged("Wrong Answer", Some(0.05)),
                judged("Processing", None),
            ])
        });

        let poller = StatusPoller::new(Arc::new(judge), policy(15));
        let outcome = poller.poll(&tokens(3)).await;

        assert_eq!(
            outcome,
            PollOutcome::Finished {
                verdict: AggregateVerdict::bare(OverallStatus::Rejected),
                attempts: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_query_failure_is_internal_error() {
        let mut judge = MockJudgeApi::new();
        judge
            .expect_query_batch()
            .times(1)
            .returning(|_| Err(JudgeError::Unavailable("connection reset".into())));

        let poller = StatusPoller::new(Arc::new(judge), policy(15));
        let outcome = poller.poll(&tokens(1)).await;

        assert!(matches!(outcome, PollOutcome::Unavailable { attempts: 1, .. }));
        assert!(!outcome.is_final());
        assert_eq!(outcome.verdict().overall, OverallStatus::InternalError);
    }

    #[tokio::test]
    async fn test_queries_full_token_set_each_attempt() {
        let mut judge = MockJudgeApi::new();
        judge
            .expect_query_batch()
            .withf(|tokens: &[String]| tokens == ["tok-0", "tok-1", "tok-2"])
            .times(1)
            .returning(|_| {
                Ok(vec![
                    judged("Accepted", Some(0.1)),
                    judged("Accepted", Some(0.1)),
                    judged("Accepted", Some(0.3)),
                ])
            });

        let poller = StatusPoller::new(Arc::new(judge), policy(15));
        let outcome = poller.poll(&tokens(3)).await;

        assert_eq!(outcome.verdict().max_runtime_seconds, Some(0.3));
    }

    #[tokio::test]
    async fn test_empty_token_set_never_queries() {
        let mut judge = MockJudgeApi::new();
        judge.expect_query_batch().never();

        let poller = StatusPoller::new(Arc::new(judge), policy(15));
        let outcome = poller.poll(&[]).await;

        assert_eq!(outcome.attempts(), 0);
        assert_eq!(outcome.verdict().overall, OverallStatus::InternalError);
    }
}
