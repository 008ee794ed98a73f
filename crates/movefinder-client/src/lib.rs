// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use movefinder_app::{LeadPayload, LeadReference, LeadTransport, SubmissionOutcome};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use std::thread;
use std::time::Duration;
use url::Url;

pub const USER_AGENT: &str = concat!("movefinder/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempt budget with exponential backoff: the wait before retry `n`
/// (1-based) is `base_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// How a single HTTP exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    Final(SubmissionOutcome),
    Transient(String),
}

#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Url,
    retry: RetryPolicy,
    http: HttpClient,
}

impl Client {
    pub fn new(endpoint: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let trimmed = endpoint.trim();
        if trimmed.is_empty() {
            bail!("submission.endpoint must not be empty");
        }
        let endpoint = Url::parse(trimmed)
            .with_context(|| format!("submission.endpoint {trimmed:?} is not a valid URL"))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            bail!(
                "submission.endpoint must use http or https, got {}:// -- fix the URL and retry",
                endpoint.scheme()
            );
        }
        if retry.max_attempts == 0 {
            bail!("submission.max_attempts must be at least 1");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            endpoint,
            retry,
            http,
        })
    }

    /// POSTs `payload`, retrying transient failures within the policy.
    pub fn submit_lead(&self, payload: &LeadPayload) -> SubmissionOutcome {
        let mut detail = String::new();
        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                let delay = self.retry.delay_before_retry(attempt - 1);
                tracing::info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %detail,
                    "retrying lead submission"
                );
                thread::sleep(delay);
            }

            match self.attempt(payload) {
                ResponseClass::Final(outcome) => {
                    match &outcome {
                        SubmissionOutcome::Accepted { reference } => tracing::info!(
                            attempt,
                            reference = reference.as_ref().map(LeadReference::as_str),
                            "lead accepted"
                        ),
                        SubmissionOutcome::Rejected { reason } => {
                            tracing::warn!(attempt, %reason, "lead rejected");
                        }
                        SubmissionOutcome::Unavailable { .. } => {}
                    }
                    return outcome;
                }
                ResponseClass::Transient(next) => {
                    tracing::warn!(attempt, detail = %next, "lead submission attempt failed");
                    detail = next;
                }
            }
        }

        SubmissionOutcome::Unavailable {
            attempts: self.retry.max_attempts,
            detail,
        }
    }

    fn attempt(&self, payload: &LeadPayload) -> ResponseClass {
        let response = match self.http.post(self.endpoint.clone()).json(payload).send() {
            Ok(response) => response,
            Err(error) => return ResponseClass::Transient(connection_error(&self.endpoint, &error)),
        };
        let status = response.status();
        let body = match response.text() {
            Ok(body) => body,
            Err(error) if status.is_success() => {
                tracing::debug!(%error, "acknowledgement body unreadable");
                String::new()
            }
            Err(error) => return ResponseClass::Transient(format!("read response body: {error}")),
        };
        classify_response(status, &body)
    }
}

impl LeadTransport for Client {
    fn submit(&self, payload: &LeadPayload) -> SubmissionOutcome {
        self.submit_lead(payload)
    }
}

/// Maps one response onto the submission contract. 2xx is acknowledged
/// unless the body says `success: false`; 408, 429 and 5xx are retryable;
/// any other status is a rejection carrying the server's reason.
pub fn classify_response(status: StatusCode, body: &str) -> ResponseClass {
    let parsed = serde_json::from_str::<Acknowledgement>(body).ok();

    if status.is_success() {
        let Some(ack) = parsed else {
            tracing::debug!(status = status.as_u16(), "acknowledgement is not JSON");
            return ResponseClass::Final(SubmissionOutcome::Accepted { reference: None });
        };
        if ack.success() == Some(false) {
            let reason = ack
                .reason()
                .unwrap_or_else(|| "The server declined the request".to_owned());
            return ResponseClass::Final(SubmissionOutcome::Rejected { reason });
        }
        return ResponseClass::Final(SubmissionOutcome::Accepted {
            reference: ack.reference(),
        });
    }

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return ResponseClass::Transient(error_detail(status, parsed.as_ref(), body));
    }

    let reason = parsed
        .as_ref()
        .and_then(Acknowledgement::reason)
        .or_else(|| plain_body(body))
        .unwrap_or_else(|| format!("The server rejected the request ({})", status.as_u16()));
    ResponseClass::Final(SubmissionOutcome::Rejected { reason })
}

/// Every field is loosely typed so an odd shape in one of them never
/// hides the others.
#[derive(Debug, Default, Deserialize)]
struct Acknowledgement {
    success: Option<serde_json::Value>,
    lead_id: Option<serde_json::Value>,
    id: Option<serde_json::Value>,
    reference: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
    message: Option<serde_json::Value>,
}

impl Acknowledgement {
    fn success(&self) -> Option<bool> {
        match &self.success {
            Some(serde_json::Value::Bool(flag)) => Some(*flag),
            Some(serde_json::Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        }
    }

    fn reference(&self) -> Option<LeadReference> {
        [&self.lead_id, &self.id, &self.reference]
            .into_iter()
            .flatten()
            .find_map(|value| match value {
                serde_json::Value::String(text) if !text.trim().is_empty() => {
                    Some(LeadReference::new(text.trim()))
                }
                serde_json::Value::Number(number) => Some(LeadReference::new(number.to_string())),
                _ => None,
            })
    }

    fn reason(&self) -> Option<String> {
        let from_error = match &self.error {
            Some(serde_json::Value::String(text)) => Some(text.clone()),
            Some(serde_json::Value::Object(map)) => map
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            _ => None,
        };
        from_error
            .or_else(|| {
                self.message
                    .as_ref()
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            })
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
    }
}

fn plain_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    (!trimmed.is_empty() && trimmed.len() < 200 && !trimmed.contains('{'))
        .then(|| trimmed.to_owned())
}

fn error_detail(status: StatusCode, parsed: Option<&Acknowledgement>, body: &str) -> String {
    match parsed.and_then(Acknowledgement::reason).or_else(|| plain_body(body)) {
        Some(reason) => format!("server error ({}): {reason}", status.as_u16()),
        None => format!("server returned {}", status.as_u16()),
    }
}

fn connection_error(endpoint: &Url, error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return format!("request to {endpoint} timed out");
    }
    format!("cannot reach {endpoint} ({error})")
}
