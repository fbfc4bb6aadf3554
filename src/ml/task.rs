//! Asynchronous task status and the registration polling loop.

use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::api::paths;
use super::transport::{Method, Transport, TransportError};

/// State reported by the task endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Completed,
    Failed,
    Stopped,
    Cancelled,
    CompletedWithError,
    Other(String),
}

impl TaskState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CREATED" => Self::Created,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "STOPPED" => Self::Stopped,
            "CANCELLED" => Self::Cancelled,
            "COMPLETED_WITH_ERROR" => Self::CompletedWithError,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
            Self::Cancelled => "CANCELLED",
            Self::CompletedWithError => "COMPLETED_WITH_ERROR",
            Self::Other(raw) => raw,
        }
    }

    /// Terminal states that did not produce a model.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Stopped | Self::Cancelled | Self::CompletedWithError
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One task status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: TaskState,
    pub model_id: Option<String>,
    pub error: Option<String>,
}

impl TaskStatus {
    /// Read `state`, `model_id` and `error` from a task response.
    /// A missing `state` parses as an empty [`TaskState::Other`].
    pub fn from_response(response: &Value) -> Self {
        let field = |name: &str| response.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            state: TaskState::parse(response.get("state").and_then(Value::as_str).unwrap_or("")),
            model_id: field("model_id"),
            error: field("error"),
        }
    }
}

/// Reads the status of a task.
pub trait TaskStatusReader {
    fn get_task(&mut self, task_id: &str) -> Result<TaskStatus, TransportError>;
}

impl<T: Transport + ?Sized> TaskStatusReader for T {
    fn get_task(&mut self, task_id: &str) -> Result<TaskStatus, TransportError> {
        let response = self.perform_request(Method::Get, &paths::task(task_id), None)?;
        Ok(TaskStatus::from_response(&response))
    }
}

/// Time source for the polling loop.
pub trait Clock {
    /// Monotonic time since an arbitrary fixed origin.
    fn now(&mut self) -> Duration;
    fn sleep(&mut self, duration: Duration);
}

/// Wall clock backed by [`Instant`] and a blocking sleep.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Timeout and interval of the polling loop.
///
/// The interval is never shorter than [`PollConfig::MIN_INTERVAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    timeout: Duration,
    interval: Duration,
}

impl PollConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    /// Shorter intervals are raised to [`PollConfig::MIN_INTERVAL`].
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        if interval < Self::MIN_INTERVAL {
            warn!(?interval, min = ?Self::MIN_INTERVAL, "Poll interval too short, using minimum");
        }
        Self {
            timeout,
            interval: interval.max(Self::MIN_INTERVAL),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on status requests: `ceil(timeout / interval) + 1`.
    pub fn max_requests(&self) -> u64 {
        let rounds = self.timeout.as_nanos().div_ceil(self.interval.as_nanos());
        u64::try_from(rounds).unwrap_or(u64::MAX).saturating_add(1)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT, Self::DEFAULT_INTERVAL)
    }
}

/// Terminal result of polling a registration task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { model_id: String },
    Failed { state: TaskState, error: Option<String> },
    TimedOut { last_state: TaskState, elapsed: Duration },
}

impl TaskOutcome {
    /// The model id on success; `None` for both failure and timeout.
    pub fn model_id(&self) -> Option<&str> {
        match self {
            Self::Completed { model_id } => Some(model_id),
            _ => None,
        }
    }

}

/// Poll `task_id` until it completes, fails, or the poll timeout elapses.
///
/// Transport errors end the loop immediately. A COMPLETED response without a
/// `model_id` is reported as [`TransportError::MissingField`].
pub fn wait_for_model_registration<R, C>(
    reader: &mut R,
    task_id: &str,
    poll: PollConfig,
    clock: &mut C,
) -> Result<TaskOutcome, TransportError>
where
    R: TaskStatusReader + ?Sized,
    C: Clock + ?Sized,
{
    let started = clock.now();
    let mut requests = 0u64;

    loop {
        let status = reader.get_task(task_id)?;
        requests += 1;

        if status.state == TaskState::Completed {
            let model_id = status.model_id.ok_or_else(|| TransportError::MissingField {
                path: paths::task(task_id),
                field: "model_id",
                response: serde_json::json!({ "state": status.state.as_str() }),
            })?;
            info!(task_id, %model_id, requests, "Registration task completed");
            return Ok(TaskOutcome::Completed { model_id });
        }

        if status.state.is_failure() {
            warn!(task_id, state = %status.state, error = ?status.error, "Registration task failed");
            return Ok(TaskOutcome::Failed {
                state: status.state,
                error: status.error,
            });
        }

        let elapsed = clock.now().saturating_sub(started);
        if elapsed >= poll.timeout() {
            warn!(task_id, state = %status.state, ?elapsed, requests, "Timed out waiting for registration task");
            return Ok(TaskOutcome::TimedOut {
                last_state: status.state,
                elapsed,
            });
        }

        debug!(task_id, state = %status.state, ?elapsed, "Task still pending");
        clock.sleep(poll.interval());
    }
}
