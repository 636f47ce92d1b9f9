// Prometheus counters for the evaluation pipeline

use lazy_static::lazy_static;
use litecode_common::types::OverallStatus;
use litecode_judge::{PollOutcome, StatusCheck, StatusSource};
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref RUNS_TOTAL: IntCounter =
        register_int_counter!("litecode_runs_total", "Interactive runs evaluated").unwrap();
    pub static ref SUBMISSIONS_TOTAL: IntCounter =
        register_int_counter!("litecode_submissions_total", "Submissions queued on the judge")
            .unwrap();
    pub static ref POLL_ATTEMPTS_TOTAL: IntCounter =
        register_int_counter!("litecode_poll_attempts_total", "Batch status queries issued")
            .unwrap();
    pub static ref POLL_EXHAUSTED_TOTAL: IntCounter = register_int_counter!(
        "litecode_poll_exhausted_total",
        "Status requests that ran out of poll attempts"
    )
    .unwrap();
    pub static ref JUDGE_FAILURES_TOTAL: IntCounter =
        register_int_counter!("litecode_judge_failures_total", "Judge calls that failed").unwrap();
    pub static ref VERDICTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "litecode_verdicts_total",
        "Terminal verdicts recorded, by status",
        &["status"]
    )
    .unwrap();
}

/// Count a status check by how it was answered
pub fn record_status_check(check: &StatusCheck) {
    if let StatusSource::Polled(outcome) = &check.source {
        POLL_ATTEMPTS_TOTAL.inc_by(u64::from(outcome.attempts()));
        match outcome {
            PollOutcome::Exhausted { .. } => POLL_EXHAUSTED_TOTAL.inc(),
            PollOutcome::Unavailable { .. } => JUDGE_FAILURES_TOTAL.inc(),
            PollOutcome::Finished { .. } => {}
        }
    }
    if check.applied {
        record_verdict(check.verdict.overall);
    }
}

pub fn record_verdict(status: OverallStatus) {
    VERDICTS_TOTAL.with_label_values(&[status.as_str()]).inc();
}

/// Render every registered metric in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
