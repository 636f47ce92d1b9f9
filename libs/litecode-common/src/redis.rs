use crate::types::{AggregateVerdict, OverallStatus, Problem, Submission};
use chrono::{DateTime, TimeZone, Utc};
use redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

/// Redis key layout - defines only semantics, not runtime logic
/// Keeps the API and the CLI on the same deterministic keys

pub const PROBLEM_PREFIX: &str = "litecode:problem";
pub const SUBMISSION_PREFIX: &str = "litecode:submission";
pub const USER_PREFIX: &str = "litecode:user";

/// Compare-and-set on the status key: the record is only rewritten while
/// the submission is still PENDING. Returns 1 when applied, 0 otherwise,
/// -1 when the submission does not exist.
const UPDATE_IF_PENDING: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
if current ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2])
redis.call('SET', KEYS[2], ARGV[3])
return 1
"#;

pub fn problem_key(slug: &str) -> String {
    format!("{}:{}", PROBLEM_PREFIX, slug)
}

pub fn submission_key(id: &Uuid) -> String {
    format!("{}:{}", SUBMISSION_PREFIX, id)
}

/// Status is stored separately so the conditional update can compare it
pub fn submission_status_key(id: &Uuid) -> String {
    format!("{}:{}:status", SUBMISSION_PREFIX, id)
}

/// Sorted set of every submission a user made, scored by creation time
pub fn user_submissions_key(user_id: &str) -> String {
    format!("{}:{}:submissions", USER_PREFIX, user_id)
}

/// Sorted set of a user's submissions for one problem
pub fn user_problem_submissions_key(user_id: &str, problem_id: &str) -> String {
    format!("{}:{}:problem:{}:submissions", USER_PREFIX, user_id, problem_id)
}

fn to_json<T: serde::Serialize>(value: &T) -> RedisResult<String> {
    serde_json::to_string(value).map_err(|e| {
        redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
    })
}

fn from_json<T: serde::de::DeserializeOwned>(payload: &str) -> RedisResult<T> {
    serde_json::from_str(payload).map_err(|e| {
        redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
    })
}

/// Store or replace a problem definition
pub async fn put_problem(
    conn: &mut redis::aio::ConnectionManager,
    problem: &Problem,
) -> RedisResult<()> {
    let payload = to_json(problem)?;
    conn.set(problem_key(&problem.slug), payload).await
}

pub async fn get_problem(
    conn: &mut redis::aio::ConnectionManager,
    slug: &str,
) -> RedisResult<Option<Problem>> {
    let payload: Option<String> = conn.get(problem_key(slug)).await?;
    payload.map(|data| from_json(&data)).transpose()
}

/// Persist a new submission and index it for the user
/// All writes happen in one MULTI/EXEC block
pub async fn create_submission(
    conn: &mut redis::aio::ConnectionManager,
    submission: &Submission,
) -> RedisResult<()> {
    let payload = to_json(submission)?;
    let status = to_json(&submission.status)?;
    let member = submission.id.to_string();
    let score = submission.created_at.timestamp_millis();

    redis::pipe()
        .atomic()
        .set(submission_key(&submission.id), payload)
        .ignore()
        .set(submission_status_key(&submission.id), status)
        .ignore()
        .zadd(user_submissions_key(&submission.user_id), &member, score)
        .ignore()
        .zadd(
            user_problem_submissions_key(&submission.user_id, &submission.problem_id),
            &member,
            score,
        )
        .ignore()
        .query_async(conn)
        .await
}

pub async fn get_submission(
    conn: &mut redis::aio::ConnectionManager,
    id: &Uuid,
) -> RedisResult<Option<Submission>> {
    let payload: Option<String> = conn.get(submission_key(id)).await?;
    payload.map(|data| from_json(&data)).transpose()
}

/// Apply a terminal verdict only if the submission is still PENDING
///
/// Returns `Ok(true)` when this call performed the transition and
/// `Ok(false)` when another caller already did (or the id is unknown).
pub async fn update_status_if_pending(
    conn: &mut redis::aio::ConnectionManager,
    submission: &Submission,
    verdict: &AggregateVerdict,
) -> RedisResult<bool> {
    let updated = submission.with_verdict(verdict);
    let expected = to_json(&OverallStatus::Pending)?;
    let status = to_json(&verdict.overall)?;
    let payload = to_json(&updated)?;

    let applied: i64 = redis::Script::new(UPDATE_IF_PENDING)
        .key(submission_status_key(&submission.id))
        .key(submission_key(&submission.id))
        .arg(expected)
        .arg(status)
        .arg(payload)
        .invoke_async(conn)
        .await?;

    Ok(applied == 1)
}

/// Most recent submissions of a user for one problem, newest first
///
/// With `before`, only submissions created strictly earlier (at millisecond
/// resolution) are returned.
pub async fn recent_submissions(
    conn: &mut redis::aio::ConnectionManager,
    user_id: &str,
    problem_id: &str,
    before: Option<DateTime<Utc>>,
    limit: usize,
) -> RedisResult<Vec<Submission>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let max = match before {
        Some(cursor) => format!("({}", cursor.timestamp_millis()),
        None => "+inf".to_string(),
    };
    let ids: Vec<String> = conn
        .zrevrangebyscore_limit(
            user_problem_submissions_key(user_id, problem_id),
            max,
            "-inf",
            0,
            limit as isize,
        )
        .await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<String> = ids
        .iter()
        .map(|id| format!("{}:{}", SUBMISSION_PREFIX, id))
        .collect();
    let payloads: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(conn).await?;

    payloads
        .into_iter()
        .flatten()
        .map(|data| from_json(&data))
        .collect()
}

/// Creation times of every submission a user made, oldest first
pub async fn submission_times(
    conn: &mut redis::aio::ConnectionManager,
    user_id: &str,
) -> RedisResult<Vec<DateTime<Utc>>> {
    let entries: Vec<(String, i64)> = conn
        .zrange_withscores(user_submissions_key(user_id), 0, -1)
        .await?;

    Ok(entries
        .into_iter()
        .filter_map(|(_, millis)| Utc.timestamp_millis_opt(millis).single())
        .collect())
}
