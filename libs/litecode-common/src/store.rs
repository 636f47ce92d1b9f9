use crate::redis as keys;
use crate::types::{AggregateVerdict, OverallStatus, Problem, ProblemExecutionData, Submission};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Read access to problem definitions
#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError>;

    async fn execution_data(&self, slug: &str) -> Result<Option<ProblemExecutionData>, StoreError>;
}

/// Durable submission records
///
/// `update_status` must only apply while the stored status is still
/// `Pending`; it reports whether this call performed the transition.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn create(&self, submission: &Submission) -> Result<Uuid, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError>;

    async fn update_status(
        &self,
        submission: &Submission,
        verdict: &AggregateVerdict,
    ) -> Result<bool, StoreError>;

    /// Newest first; `before` pages past submissions created at or after it
    async fn recent_for_problem(
        &self,
        user_id: &str,
        problem_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Submission>, StoreError>;

    async fn created_times(&self, user_id: &str) -> Result<Vec<DateTime<Utc>>, StoreError>;
}

/// Redis-backed store shared by the API and the CLI
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ProblemStore for RedisStore {
    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::put_problem(&mut conn, problem).await?)
    }

    async fn execution_data(&self, slug: &str) -> Result<Option<ProblemExecutionData>, StoreError> {
        let mut conn = self.conn.clone();
        let problem = keys::get_problem(&mut conn, slug).await?;
        Ok(problem.map(ProblemExecutionData::from))
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn create(&self, submission: &Submission) -> Result<Uuid, StoreError> {
        let mut conn = self.conn.clone();
        keys::create_submission(&mut conn, submission).await?;
        Ok(submission.id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::get_submission(&mut conn, &id).await?)
    }

    async fn update_status(
        &self,
        submission: &Submission,
        verdict: &AggregateVerdict,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::update_status_if_pending(&mut conn, submission, verdict).await?)
    }

    async fn recent_for_problem(
        &self,
        user_id: &str,
        problem_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Submission>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::recent_submissions(&mut conn, user_id, problem_id, before, limit).await?)
    }

    async fn created_times(&self, user_id: &str) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::submission_times(&mut conn, user_id).await?)
    }
}

/// Process-local store for development and tests
#[derive(Default)]
pub struct MemoryStore {
    problems: RwLock<HashMap<String, Problem>>,
    submissions: RwLock<HashMap<Uuid, Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProblemStore for MemoryStore {
    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError> {
        self.problems
            .write()
            .await
            .insert(problem.slug.clone(), problem.clone());
        Ok(())
    }

    async fn execution_data(&self, slug: &str) -> Result<Option<ProblemExecutionData>, StoreError> {
        let problems = self.problems.read().await;
        Ok(problems.get(slug).cloned().map(ProblemExecutionData::from))
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn create(&self, submission: &Submission) -> Result<Uuid, StoreError> {
        self.submissions
            .write()
            .await
            .insert(submission.id, submission.clone());
        Ok(submission.id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self.submissions.read().await.get(&id).cloned())
    }

    async fn update_status(
        &self,
        submission: &Submission,
        verdict: &AggregateVerdict,
    ) -> Result<bool, StoreError> {
        let mut submissions = self.submissions.write().await;
        match submissions.get_mut(&submission.id) {
            Some(stored) if stored.status == OverallStatus::Pending => {
                *stored = stored.with_verdict(verdict);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn recent_for_problem(
        &self,
        user_id: &str,
        problem_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Submission>, StoreError> {
        let cutoff = before.map(|t| t.timestamp_millis());
        let submissions = self.submissions.read().await;
        let mut matching: Vec<Submission> = submissions
            .values()
            .filter(|s| s.user_id == user_id && s.problem_id == problem_id)
            .filter(|s| cutoff.map_or(true, |c| s.created_at.timestamp_millis() < c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn created_times(&self, user_id: &str) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let submissions = self.submissions.read().await;
        let mut times: Vec<DateTime<Utc>> = submissions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.created_at)
            .collect();
        times.sort();
        Ok(times)
    }
}
