pub mod assembler;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod languages;
pub mod poller;
pub mod verdict;

pub use client::{JudgeApi, JudgeClient};
pub use dispatcher::{StatusCheck, StatusSource, SubmissionDispatcher};
pub use error::{EvaluationError, JudgeError};
pub use languages::LanguageRegistry;
pub use poller::{PollOutcome, StatusPoller};
pub use verdict::{aggregate, JudgeStatus, PerTestVerdict};
