//! Judge Client - typed wrapper over the remote judge's HTTP surface
//!
//! **Responsibility:**
//! Build requests, base64-encode payloads, decode responses. Nothing else.
//!
//! **Critical Properties:**
//! - Every failure surfaces as `JudgeError::Unavailable`
//! - Base64 never leaks past this module; verdicts carry decoded text
//! - Batch results come back in the order the tokens were requested
//! - No status interpretation beyond parsing the label

use crate::error::JudgeError;
use crate::verdict::{JudgeStatus, PerTestVerdict};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use litecode_common::config::JudgeConfig;
use litecode_common::types::TestCase;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Fields requested when querying submissions
const RESULT_FIELDS: &str = "token,status,time,memory,stdout,stderr,compile_output";

/// The three remote operations the orchestrator needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JudgeApi: Send + Sync {
    /// Submit one job; with `wait` the judge answers once the job finishes
    async fn submit_one(
        &self,
        source: &str,
        language_id: i32,
        stdin: &str,
        expected_output: &str,
        wait: bool,
    ) -> Result<PerTestVerdict, JudgeError>;

    /// Enqueue one job per test case, returning tokens in input order
    async fn submit_batch(
        &self,
        source: &str,
        language_id: i32,
        test_cases: &[TestCase],
    ) -> Result<Vec<String>, JudgeError>;

    /// Current status of each token, in request order
    async fn query_batch(&self, tokens: &[String]) -> Result<Vec<PerTestVerdict>, JudgeError>;
}

#[derive(Debug, Serialize)]
struct WireSubmission {
    source_code: String,
    language_id: i32,
    stdin: String,
    expected_output: String,
}

impl WireSubmission {
    fn encode(source: &str, language_id: i32, stdin: &str, expected_output: &str) -> Self {
        Self {
            source_code: general_purpose::STANDARD.encode(source),
            language_id,
            stdin: general_purpose::STANDARD.encode(stdin),
            expected_output: general_purpose::STANDARD.encode(expected_output),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireBatchRequest {
    submissions: Vec<WireSubmission>,
}

#[derive(Debug, Deserialize)]
struct WireToken {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireBatchResults {
    submissions: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    id: i32,
    description: String,
}

/// The judge reports `time` as a decimal string; accept numbers too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSeconds {
    Text(String),
    Number(f64),
}

impl WireSeconds {
    fn seconds(&self) -> Option<f64> {
        match self {
            WireSeconds::Text(text) => text.trim().parse().ok(),
            WireSeconds::Number(n) => Some(*n),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResult {
    token: Option<String>,
    status: Option<WireStatus>,
    time: Option<WireSeconds>,
    memory: Option<u64>,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
}

/// Decode a base64 field; the judge wraps long values with newlines
fn decode_field(name: &str, value: Option<String>) -> Result<Option<String>, JudgeError> {
    let Some(encoded) = value else {
        return Ok(None);
    };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| JudgeError::unavailable(format!("malformed base64 in `{}`: {}", name, e)))?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

impl WireResult {
    fn into_verdict(self) -> Result<PerTestVerdict, JudgeError> {
        // A submission accepted without waiting has no status yet
        let (status_id, status, status_label) = match self.status {
            Some(status) => (
                status.id,
                JudgeStatus::from_label(&status.description),
                status.description,
            ),
            None => (1, JudgeStatus::InQueue, "In Queue".to_string()),
        };

        Ok(PerTestVerdict {
            token: self.token,
            status_id,
            status,
            status_label,
            runtime_seconds: self.time.as_ref().and_then(WireSeconds::seconds),
            memory_kb: self.memory,
            stdout: decode_field("stdout", self.stdout)?,
            stderr: decode_field("stderr", self.stderr)?,
            compile_output: decode_field("compile_output", self.compile_output)?,
        })
    }
}

/// Put results back into the order the tokens were requested in
fn align_to_tokens(
    tokens: &[String],
    results: Vec<PerTestVerdict>,
) -> Result<Vec<PerTestVerdict>, JudgeError> {
    if results.len() != tokens.len() {
        return Err(JudgeError::unavailable(format!(
            "judge returned {} results for {} tokens",
            results.len(),
            tokens.len()
        )));
    }

    let in_order = results
        .iter()
        .zip(tokens)
        .all(|(result, token)| result.token.as_deref().map_or(true, |t| t == token.as_str()));
    if in_order {
        return Ok(results);
    }

    let mut by_token: HashMap<String, PerTestVerdict> = results
        .into_iter()
        .filter_map(|r| r.token.clone().map(|t| (t, r)))
        .collect();
    tokens
        .iter()
        .map(|token| {
            by_token
                .remove(token)
                .ok_or_else(|| JudgeError::unavailable(format!("judge omitted token {}", token)))
        })
        .collect()
}

/// HTTP client for a Judge0-compatible service
#[derive(Debug, Clone)]
pub struct JudgeClient {
    http: reqwest::Client,
    config: JudgeConfig,
}

impl JudgeClient {
    pub fn new(config: JudgeConfig) -> Result<Self, JudgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            headers.insert(
                HeaderName::from_static("x-rapidapi-key"),
                HeaderValue::from_str(key).map_err(JudgeError::unavailable)?,
            );
        }
        if let Some(host) = &config.host {
            headers.insert(
                HeaderName::from_static("x-rapidapi-host"),
                HeaderValue::from_str(host).map_err(JudgeError::unavailable)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(JudgeError::unavailable)?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, JudgeError> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Judge request failed");
            JudgeError::unavailable(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Judge returned error status");
            return Err(JudgeError::unavailable(format!("judge responded {}: {}", status, body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| JudgeError::unavailable(format!("malformed judge response: {}", e)))
    }
}

#[async_trait]
impl JudgeApi for JudgeClient {
    async fn submit_one(
        &self,
        source: &str,
        language_id: i32,
        stdin: &str,
        expected_output: &str,
        wait: bool,
    ) -> Result<PerTestVerdict, JudgeError> {
        let body = WireSubmission::encode(source, language_id, stdin, expected_output);
        let mut request = self
            .http
            .post(self.url("/submissions/"))
            .query(&[("base64_encoded", "true"), ("wait", if wait { "true" } else { "false" })])
            .json(&body);
        if wait {
            request = request.timeout(self.config.wait_timeout);
        }

        let result: WireResult = self.send(request).await?;
        if wait && result.status.is_none() {
            warn!(token = ?result.token, "Judge answered a waiting submission without a status");
            return Err(JudgeError::unavailable("judge returned no status for a waiting submission"));
        }
        let verdict = result.into_verdict()?;
        if wait && verdict.status.is_pending() {
            warn!(token = ?verdict.token, status = %verdict.status_label, "Waiting submission did not finish");
            return Err(JudgeError::unavailable(format!(
                "waiting submission still {}",
                verdict.status_label
            )));
        }
        debug!(language_id, status = %verdict.status_label, "Single submission finished");
        Ok(verdict)
    }

    async fn submit_batch(
        &self,
        source: &str,
        language_id: i32,
        test_cases: &[TestCase],
    ) -> Result<Vec<String>, JudgeError> {
        let body = WireBatchRequest {
            submissions: test_cases
                .iter()
                .map(|tc| WireSubmission::encode(source, language_id, &tc.input, &tc.output))
                .collect(),
        };
        let request = self
            .http
            .post(self.url("/submissions/batch"))
            .query(&[("base64_encoded", "true")])
            .json(&body);

        let entries: Vec<WireToken> = self.send(request).await?;
        if entries.len() != test_cases.len() {
            return Err(JudgeError::unavailable(format!(
                "judge returned {} tokens for {} test cases",
                entries.len(),
                test_cases.len()
            )));
        }

        let tokens = entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                entry.token.ok_or_else(|| {
                    JudgeError::unavailable(format!("judge rejected test case {}", idx + 1))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(language_id, count = tokens.len(), "Batch enqueued");
        Ok(tokens)
    }

    async fn query_batch(&self, tokens: &[String]) -> Result<Vec<PerTestVerdict>, JudgeError> {
        let joined = tokens.join(",");
        let request = self.http.get(self.url("/submissions/batch")).query(&[
            ("tokens", joined.as_str()),
            ("base64_encoded", "true"),
            ("fields", RESULT_FIELDS),
        ]);

        let batch: WireBatchResults = self.send(request).await?;
        let results = batch
            .submissions
            .into_iter()
            .map(WireResult::into_verdict)
            .collect::<Result<Vec<_>, _>>()?;

        align_to_tokens(tokens, results)
    }
}
