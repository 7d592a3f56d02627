//! Compute Environment Status Poller
//!
//! Drives the describe endpoint until a create reaches `AVAILABLE`, a delete
//! is confirmed, a failure status is seen, the overall deadline passes, or
//! the caller cancels.
//!
//! ```text
//! INITIAL_WAIT -> POLLING -> SUCCESS
//!                         -> FAILED_TERMINAL
//!                         -> FAILED_TIMEOUT
//!                         -> FAILED_CANCELLED
//! ```
//!
//! Every suspension point (initial wait, inter-poll sleep, in-flight
//! describe request) races the overall deadline and the cancellation token,
//! so a stop request never waits past the current suspension. Dropping the
//! in-flight request future aborts it.
//!
//! All timing goes through `tokio::time`, so tests drive the loop on a
//! paused clock.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::status::{ComputeEnvStatus, DescribeComputeEnvResponse};
use crate::platform::http::sanitize_for_log;

/// Describe endpoint, relative to the API base URL
pub const DESCRIBE_TEMPLATE: &str = "{base}/compute-envs/{id}?workspaceId={workspace}";

/// Initial wait before the first describe. The acceptance response can race
/// the platform's own read-your-writes consistency.
pub const DEFAULT_INITIAL_WAIT: Duration = Duration::from_secs(2);
/// Time between describes once the fast phase is over
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Time between the first few describes
pub const DEFAULT_FAST_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_FAST_POLL_ATTEMPTS: u32 = 3;
/// Time between retries after a transient failure
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);
/// Bound on a single describe request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound on the whole poll, initial wait included
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Create,
    Delete,
}

impl fmt::Display for PollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    InitialWait,
    Polling,
    Success,
    FailedTerminal,
    FailedTimeout,
    FailedCancelled,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InitialWait => "initial wait",
            Self::Polling => "polling",
            Self::Success => "success",
            Self::FailedTerminal => "failed",
            Self::FailedTimeout => "timed out",
            Self::FailedCancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One compute environment to wait on. Owned by a single poll.
#[derive(Clone)]
pub struct PollTarget {
    pub resource_id: String,
    pub workspace_id: String,
    pub base_url: String,
    /// Full `Authorization` header value captured from the triggering call
    pub auth_header: String,
    pub mode: PollMode,
}

impl PollTarget {
    pub fn describe_url(&self) -> String {
        DESCRIBE_TEMPLATE
            .replace("{base}", self.base_url.trim_end_matches('/'))
            .replace("{id}", &urlencoding::encode(&self.resource_id))
            .replace("{workspace}", &urlencoding::encode(&self.workspace_id))
    }
}

impl fmt::Debug for PollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollTarget")
            .field("resource_id", &self.resource_id)
            .field("workspace_id", &self.workspace_id)
            .field("base_url", &self.base_url)
            .field("auth_header", &"(sensitive)")
            .field("mode", &self.mode)
            .finish()
    }
}

/// Which failures are retried at the retry interval instead of aborting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryClassification {
    /// Connection failures and per-request timeouts
    pub network_errors: bool,
    /// HTTP 429
    pub throttled: bool,
    /// HTTP 5xx
    pub server_errors: bool,
}

impl Default for RetryClassification {
    fn default() -> Self {
        Self {
            network_errors: true,
            throttled: true,
            server_errors: true,
        }
    }
}

/// Timing and retry policy. Policy constants, not protocol requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_wait: Duration,
    pub poll_interval: Duration,
    pub fast_poll_interval: Duration,
    /// Number of describes followed by the fast interval
    pub fast_poll_attempts: u32,
    pub retry_interval: Duration,
    pub request_timeout: Duration,
    pub overall_timeout: Duration,
    pub retry: RetryClassification,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_wait: DEFAULT_INITIAL_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fast_poll_interval: DEFAULT_FAST_POLL_INTERVAL,
            fast_poll_attempts: DEFAULT_FAST_POLL_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
            retry: RetryClassification::default(),
        }
    }
}

impl PollPolicy {
    /// Sleep after the `describes`-th in-progress answer
    fn interval_after(&self, describes: u32) -> Duration {
        if describes <= self.fast_poll_attempts {
            self.fast_poll_interval
        } else {
            self.poll_interval
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Available,
    Deleted,
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => f.write_str("AVAILABLE"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub terminal_status: TerminalStatus,
    pub describes: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(
        "compute environment entered error state: {status}. The errored compute environment \
         must be deleted from the platform before it can be recreated"
    )]
    Terminal { status: ComputeEnvStatus },

    #[error("describe returned status {status}: {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error(
        "describe returned 401 Unauthorized; the access token captured when polling started \
         is no longer accepted: {body}"
    )]
    Unauthorized { body: String },

    #[error("describe request failed: {0}")]
    Transport(String),

    #[error(
        "timeout waiting for compute environment after {}s (last status: {last_status})",
        .elapsed.as_secs()
    )]
    Timeout { last_status: String, elapsed: Duration },

    #[error("polling cancelled during {phase}")]
    Cancelled { phase: PollState },

    #[error("malformed describe response: {0}")]
    MalformedResponse(String),

    #[error("authorization header is empty")]
    MissingCredential,

    #[error("cannot determine compute environment to poll: {0}")]
    InvalidTarget(String),
}

impl PollError {
    /// Terminal state this error corresponds to
    pub fn state(&self) -> PollState {
        match self {
            Self::Timeout { .. } => PollState::FailedTimeout,
            Self::Cancelled { .. } => PollState::FailedCancelled,
            _ => PollState::FailedTerminal,
        }
    }
}

/// Raw describe answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescribeError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Network(String),
}

/// Issues one describe request for a target
#[async_trait]
pub trait StatusTransport: Send + Sync {
    async fn describe(
        &self,
        target: &PollTarget,
        timeout: Duration,
    ) -> Result<StatusResponse, DescribeError>;
}

/// Describe over HTTP, sharing the client's connection pool
#[derive(Clone)]
pub struct HttpStatusTransport {
    client: reqwest::Client,
}

impl HttpStatusTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusTransport for HttpStatusTransport {
    async fn describe(
        &self,
        target: &PollTarget,
        timeout: Duration,
    ) -> Result<StatusResponse, DescribeError> {
        let url = target.describe_url();
        debug!("GET {}", url);

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                DescribeError::Timeout
            } else {
                DescribeError::Network(e.to_string())
            }
        };

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &target.auth_header)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?.to_vec();
        Ok(StatusResponse { status, body })
    }
}

/// What to do after evaluating one describe
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Done(TerminalStatus),
    /// Transient failure, retry soon
    Retry,
    /// Still in progress
    Wait,
}

/// Why a suspension ended early
enum Interrupt {
    Cancelled,
    Deadline,
}

pub struct StatusPoller {
    transport: Arc<dyn StatusTransport>,
    policy: PollPolicy,
}

impl StatusPoller {
    pub fn new(transport: Arc<dyn StatusTransport>, policy: PollPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Block until the target reaches a terminal state
    pub async fn poll(
        &self,
        target: &PollTarget,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, PollError> {
        if target.auth_header.trim().is_empty() {
            return Err(PollError::MissingCredential);
        }

        let span = tracing::info_span!(
            "compute_env_poll",
            poll_id = %Uuid::new_v4(),
            compute_env_id = %target.resource_id,
            workspace_id = %target.workspace_id,
            mode = %target.mode,
        );

        async {
            let result = self.run(target, cancel).await;
            match &result {
                Ok(outcome) => info!(
                    status = %outcome.terminal_status,
                    describes = outcome.describes,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Compute environment reached terminal state"
                ),
                Err(e) => warn!(state = %e.state(), "Compute environment polling failed: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        target: &PollTarget,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, PollError> {
        let started = Instant::now();
        let deadline = started + self.policy.overall_timeout;
        let mut last_status = String::from("none observed");

        info!("Waiting for compute environment to settle");
        self.pause(self.policy.initial_wait, deadline, cancel)
            .await
            .map_err(|i| stopped(i, PollState::InitialWait, &last_status, started))?;

        let mut describes = 0u32;
        let mut in_progress = 0u32;
        loop {
            if Instant::now() >= deadline {
                return Err(stopped(Interrupt::Deadline, PollState::Polling, &last_status, started));
            }

            describes += 1;
            let answer = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Interrupt::Cancelled),
                _ = sleep_until(deadline) => Err(Interrupt::Deadline),
                answer = self.transport.describe(target, self.policy.request_timeout) => Ok(answer),
            }
            .map_err(|i| stopped(i, PollState::Polling, &last_status, started))?;

            let wait = match self.evaluate(target.mode, answer, &mut last_status)? {
                Step::Done(terminal_status) => {
                    return Ok(PollOutcome {
                        terminal_status,
                        describes,
                        elapsed: started.elapsed(),
                    });
                }
                Step::Retry => self.policy.retry_interval,
                Step::Wait => {
                    in_progress += 1;
                    self.policy.interval_after(in_progress)
                }
            };

            debug!(
                describes,
                last_status = %last_status,
                wait_ms = wait.as_millis() as u64,
                "Compute environment not settled"
            );
            self.pause(wait, deadline, cancel)
                .await
                .map_err(|i| stopped(i, PollState::Polling, &last_status, started))?;
        }
    }

    /// Sleep for `duration` unless the deadline or a cancellation comes first
    async fn pause(
        &self,
        duration: Duration,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), Interrupt> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = sleep_until(deadline) => Err(Interrupt::Deadline),
            _ = sleep(duration) => Ok(()),
        }
    }

    fn evaluate(
        &self,
        mode: PollMode,
        answer: Result<StatusResponse, DescribeError>,
        last_status: &mut String,
    ) -> Result<Step, PollError> {
        let retry = self.policy.retry;

        let response = match answer {
            Ok(response) => response,
            Err(e) if retry.network_errors => {
                warn!("Describe request failed, retrying: {}", e);
                *last_status = format!("error: {}", e);
                return Ok(Step::Retry);
            }
            Err(e) => return Err(PollError::Transport(e.to_string())),
        };

        let status = response.status;

        // Some platform versions have no DELETING phase: absence is the only signal
        if mode == PollMode::Delete && status == StatusCode::NOT_FOUND.as_u16() {
            return Ok(Step::Done(TerminalStatus::Deleted));
        }

        let throttled = status == StatusCode::TOO_MANY_REQUESTS.as_u16();
        let server_error = status >= 500;
        if (throttled && retry.throttled) || (server_error && retry.server_errors) {
            warn!(status, "Transient describe failure, retrying");
            *last_status = format!("status {}", status);
            return Ok(Step::Retry);
        }

        let body = String::from_utf8_lossy(&response.body);
        if status == StatusCode::UNAUTHORIZED.as_u16() {
            return Err(PollError::Unauthorized {
                body: sanitize_for_log(&body),
            });
        }
        if status != StatusCode::OK.as_u16() {
            return Err(PollError::UnexpectedResponse {
                status,
                body: sanitize_for_log(&body),
            });
        }

        let described: DescribeComputeEnvResponse = serde_json::from_slice(&response.body)
            .map_err(|e| PollError::MalformedResponse(e.to_string()))?;
        let state = described.compute_env;

        match mode {
            PollMode::Delete => {
                if state.is_deleted() {
                    return Ok(Step::Done(TerminalStatus::Deleted));
                }
                *last_status = state.status.unwrap_or_else(|| "present".to_string());
                Ok(Step::Wait)
            }
            PollMode::Create => {
                let status = state.status().ok_or_else(|| {
                    PollError::MalformedResponse("computeEnv.status is missing".to_string())
                })?;
                *last_status = status.to_string();

                if status == ComputeEnvStatus::Available {
                    Ok(Step::Done(TerminalStatus::Available))
                } else if status.is_failed() {
                    Err(PollError::Terminal { status })
                } else {
                    Ok(Step::Wait)
                }
            }
        }
    }
}

fn stopped(
    interrupt: Interrupt,
    phase: PollState,
    last_status: &str,
    started: Instant,
) -> PollError {
    match interrupt {
        Interrupt::Cancelled => PollError::Cancelled { phase },
        Interrupt::Deadline => PollError::Timeout {
            last_status: last_status.to_string(),
            elapsed: started.elapsed(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Answers from a script; the last entry repeats once the script runs out
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<StatusResponse, DescribeError>>>,
        last: Mutex<Option<Result<StatusResponse, DescribeError>>>,
        calls: AtomicU32,
        headers: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<StatusResponse, DescribeError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
                headers: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusTransport for ScriptedTransport {
        async fn describe(
            &self,
            target: &PollTarget,
            _timeout: Duration,
        ) -> Result<StatusResponse, DescribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.headers.lock().unwrap().push(target.auth_header.clone());
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            match next {
                Some(answer) => {
                    *last = Some(answer.clone());
                    answer
                }
                None => last.clone().expect("empty script"),
            }
        }
    }

    fn status(s: &str) -> Result<StatusResponse, DescribeError> {
        Ok(StatusResponse {
            status: 200,
            body: format!(r#"{{"computeEnv":{{"status":"{}"}}}}"#, s).into_bytes(),
        })
    }

    fn deleted(flag: bool) -> Result<StatusResponse, DescribeError> {
        Ok(StatusResponse {
            status: 200,
            body: format!(r#"{{"computeEnv":{{"status":"AVAILABLE","deleted":{}}}}}"#, flag)
                .into_bytes(),
        })
    }

    fn code(status: u16) -> Result<StatusResponse, DescribeError> {
        Ok(StatusResponse {
            status,
            body: br#"{"message":"nope"}"#.to_vec(),
        })
    }

    fn target(mode: PollMode) -> PollTarget {
        PollTarget {
            resource_id: "ce-1".to_string(),
            workspace_id: "42".to_string(),
            base_url: "https://api.example.com/".to_string(),
            auth_header: "Bearer t0ken".to_string(),
            mode,
        }
    }

    /// Paused clock: elapsed lands on timer ticks, allow a few ms of rounding
    fn assert_elapsed(elapsed: Duration, expected: Duration) {
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    fn poller(transport: Arc<ScriptedTransport>) -> StatusPoller {
        StatusPoller::new(transport, PollPolicy::default())
    }

    #[test]
    fn test_describe_url_rendering() {
        assert_eq!(
            target(PollMode::Create).describe_url(),
            "https://api.example.com/compute-envs/ce-1?workspaceId=42"
        );
    }

    #[test]
    fn test_target_debug_redacts_credential() {
        let debug = format!("{:?}", target(PollMode::Delete));
        assert!(!debug.contains("t0ken"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_pending_then_available() {
        let transport = ScriptedTransport::new(vec![
            status("PENDING"),
            status("PENDING"),
            status("AVAILABLE"),
        ]);
        let outcome = assert_ok!(
            poller(transport.clone())
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );

        assert_eq!(outcome.terminal_status, TerminalStatus::Available);
        assert_eq!(outcome.describes, 3);
        assert_eq!(transport.calls(), 3);
        // initial wait + two fast intervals
        assert_elapsed(outcome.elapsed, Duration::from_secs(2 + 5 + 5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_errored_fails_immediately() {
        let transport = ScriptedTransport::new(vec![status("ERRORED"), status("AVAILABLE")]);
        let err = assert_err!(
            poller(transport.clone())
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );

        assert!(matches!(err, PollError::Terminal { status: ComputeEnvStatus::Errored }));
        assert_eq!(err.state(), PollState::FailedTerminal);
        assert!(err.to_string().contains("must be deleted"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_invalid_is_terminal() {
        let transport = ScriptedTransport::new(vec![status("CREATING"), status("INVALID")]);
        let err = assert_err!(
            poller(transport.clone())
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        assert!(matches!(err, PollError::Terminal { status: ComputeEnvStatus::Invalid }));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_until_not_found() {
        let transport = ScriptedTransport::new(vec![deleted(false), deleted(false), code(404)]);
        let outcome = assert_ok!(
            poller(transport.clone())
                .poll(&target(PollMode::Delete), &CancellationToken::new())
                .await
        );
        assert_eq!(outcome.terminal_status, TerminalStatus::Deleted);
        assert_eq!(outcome.describes, 3);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_until_deleted_flag() {
        let transport = ScriptedTransport::new(vec![deleted(false), deleted(true)]);
        let outcome = assert_ok!(
            poller(transport.clone())
                .poll(&target(PollMode::Delete), &CancellationToken::new())
                .await
        );
        assert_eq!(outcome.terminal_status, TerminalStatus::Deleted);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_404_is_not_success() {
        let transport = ScriptedTransport::new(vec![code(404)]);
        let err = assert_err!(
            poller(transport)
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        assert!(matches!(err, PollError::UnexpectedResponse { status: 404, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_at_deadline_not_before() {
        let transport = ScriptedTransport::new(vec![status("CREATING")]);
        let policy = PollPolicy::default();
        let started = Instant::now();
        let err = assert_err!(
            StatusPoller::new(transport.clone(), policy.clone())
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );

        let waited = started.elapsed();
        assert!(waited >= policy.overall_timeout, "gave up early: {waited:?}");
        assert!(waited < policy.overall_timeout + policy.poll_interval);
        match err {
            PollError::Timeout { last_status, .. } => assert_eq!(last_status, "CREATING"),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(transport.calls() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_use_retry_interval() {
        let transport = ScriptedTransport::new(vec![
            code(429),
            code(503),
            Err(DescribeError::Network("connection reset".to_string())),
            Err(DescribeError::Timeout),
            status("AVAILABLE"),
        ]);
        let outcome = assert_ok!(
            poller(transport.clone())
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        assert_eq!(outcome.describes, 5);
        // initial wait + four one-second retries
        assert_elapsed(outcome.elapsed, Duration::from_secs(2 + 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_classification_is_configurable() {
        let transport = ScriptedTransport::new(vec![code(500)]);
        let policy = PollPolicy {
            retry: RetryClassification {
                server_errors: false,
                ..RetryClassification::default()
            },
            ..PollPolicy::default()
        };
        let err = assert_err!(
            StatusPoller::new(transport.clone(), policy)
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        assert!(matches!(err, PollError::UnexpectedResponse { status: 500, .. }));

        let refused = Err(DescribeError::Network("refused".to_string()));
        let transport = ScriptedTransport::new(vec![refused]);
        let policy = PollPolicy {
            retry: RetryClassification {
                network_errors: false,
                ..RetryClassification::default()
            },
            ..PollPolicy::default()
        };
        let err = assert_err!(
            StatusPoller::new(transport, policy)
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        assert!(matches!(err, PollError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_mid_poll() {
        let transport = ScriptedTransport::new(vec![status("CREATING"), code(401)]);
        let err = assert_err!(
            poller(transport.clone())
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        assert!(matches!(err, PollError::Unauthorized { .. }));
        // the credential captured at start is reused, never refreshed
        assert!(transport.headers.lock().unwrap().iter().all(|h| h == "Bearer t0ken"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_client_error_is_terminal() {
        let transport = ScriptedTransport::new(vec![code(400)]);
        let err = assert_err!(
            poller(transport)
                .poll(&target(PollMode::Delete), &CancellationToken::new())
                .await
        );
        assert!(matches!(
            err,
            PollError::UnexpectedResponse { status: 400, ref body } if body.contains("nope")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body() {
        let transport = ScriptedTransport::new(vec![Ok(StatusResponse {
            status: 200,
            body: b"not json".to_vec(),
        })]);
        let err = assert_err!(
            poller(transport)
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        assert!(matches!(err, PollError::MalformedResponse(_)));

        let transport = ScriptedTransport::new(vec![Ok(StatusResponse {
            status: 200,
            body: br#"{"computeEnv":{}}"#.to_vec(),
        })]);
        let err = assert_err!(
            poller(transport)
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        assert!(matches!(err, PollError::MalformedResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_initial_wait() {
        let transport = ScriptedTransport::new(vec![status("AVAILABLE")]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = assert_err!(
            poller(transport.clone())
                .poll(&target(PollMode::Create), &cancel)
                .await
        );
        assert!(matches!(
            err,
            PollError::Cancelled {
                phase: PollState::InitialWait
            }
        ));
        assert_eq!(err.state(), PollState::FailedCancelled);
        assert!(started.elapsed() < DEFAULT_INITIAL_WAIT);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_describes() {
        let transport = ScriptedTransport::new(vec![status("CREATING")]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = assert_err!(poller(transport).poll(&target(PollMode::Create), &cancel).await);
        assert!(matches!(err, PollError::Cancelled { phase: PollState::Polling }));
        assert!(started.elapsed() < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_interval_then_normal() {
        let transport = ScriptedTransport::new(vec![
            status("CREATING"),
            status("CREATING"),
            status("CREATING"),
            status("CREATING"),
            status("AVAILABLE"),
        ]);
        let outcome = assert_ok!(
            poller(transport)
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );
        // 2s wait, three fast (5s) and one normal (10s) interval
        assert_elapsed(outcome.elapsed, Duration::from_secs(2 + 5 * 3 + 10));
    }

    /// Describe that never answers and ignores its own request timeout
    #[derive(Default)]
    struct HangingTransport {
        calls: AtomicU32,
        abandoned: Arc<AtomicU32>,
    }

    /// Counts in-flight describes dropped by the poller
    struct InFlight(Arc<AtomicU32>);

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl StatusTransport for HangingTransport {
        async fn describe(
            &self,
            _target: &PollTarget,
            _timeout: Duration,
        ) -> Result<StatusResponse, DescribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _in_flight = InFlight(self.abandoned.clone());
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_describe_stops_at_deadline() {
        let transport = Arc::new(HangingTransport::default());
        let policy = PollPolicy {
            overall_timeout: Duration::from_secs(60),
            ..PollPolicy::default()
        };
        let err = assert_err!(
            StatusPoller::new(transport.clone(), policy.clone())
                .poll(&target(PollMode::Create), &CancellationToken::new())
                .await
        );

        match err {
            PollError::Timeout {
                last_status,
                elapsed,
            } => {
                assert_eq!(last_status, "none observed");
                assert_elapsed(elapsed, policy.overall_timeout);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.abandoned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_describe_stops_on_cancel() {
        let transport = Arc::new(HangingTransport::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = assert_err!(
            StatusPoller::new(transport.clone(), PollPolicy::default())
                .poll(&target(PollMode::Create), &cancel)
                .await
        );

        assert!(matches!(err, PollError::Cancelled { phase: PollState::Polling }));
        assert_elapsed(started.elapsed(), Duration::from_secs(10));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.abandoned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_credential_rejected_before_waiting() {
        let transport = ScriptedTransport::new(vec![status("AVAILABLE")]);
        let mut t = target(PollMode::Create);
        t.auth_header = String::new();
        let err = assert_err!(poller(transport.clone()).poll(&t, &CancellationToken::new()).await);
        assert!(matches!(err, PollError::MissingCredential));
        assert_eq!(transport.calls(), 0);
    }
}
