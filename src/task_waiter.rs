// Copyright (c) 2025 - Cowboy AI, Inc.
//! Task completion waiting
//!
//! Mutating control plane calls return a [`TaskHandle`] while the work runs
//! server-side. [`TaskWaiter`] polls the task at a bounded interval until it
//! reaches a terminal state or the deadline passes, and turns the outcome
//! into a typed result.
//!
//! The waiter only observes. It never cancels the remote task: when the
//! deadline passes or the caller cancels, polling stops and the task keeps
//! running on the server.
//!
//! # Example
//!
//! ```ignore
//! use testbed_provisioning::task_waiter::{TaskWaiter, WaitConfig};
//!
//! let waiter = TaskWaiter::new(WaitConfig::default());
//! let task = client.create_distributed_switch(&folder, spec).await?;
//! let result = waiter.wait(client.as_ref(), &task).await?;
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::control_plane::{ControlPlaneClient, ControlPlaneError, TaskHandle, TaskResult, TaskState};

/// Lower bound for the poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Stand-in deadline for budgets too large to represent
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `start + budget`, saturating to a far-future instant instead of overflowing
pub(crate) fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start
        .checked_add(budget)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    300
}

/// Polling cadence and deadline for a single task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Delay between two polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long to wait for a terminal state, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl WaitConfig {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval_ms: poll_interval.as_millis() as u64,
            timeout_secs: timeout.as_secs(),
        }
    }

    /// Poll interval, never shorter than [`MIN_POLL_INTERVAL`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Why waiting for a task ended without a result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// No terminal state was observed before the deadline
    #[error("Task {task} did not reach a terminal state within {waited:?}")]
    Timeout { task: TaskHandle, waited: Duration },

    /// The control plane reported the task as failed
    #[error("Task {task} failed: {cause}")]
    Failed { task: TaskHandle, cause: String },

    /// The task state could not be read
    #[error("Polling task {task} failed: {source}")]
    Client {
        task: TaskHandle,
        #[source]
        source: ControlPlaneError,
    },

    /// The caller stopped waiting
    #[error("Stopped waiting for task {task}")]
    Cancelled { task: TaskHandle },
}

/// Blocks on a task handle until it is terminal or the deadline passes
#[derive(Debug, Clone, Default)]
pub struct TaskWaiter {
    config: WaitConfig,
}

impl TaskWaiter {
    pub fn new(config: WaitConfig) -> Self {
        Self { config }
    }

    /// Wait for `task` to finish
    pub async fn wait<C>(&self, client: &C, task: &TaskHandle) -> Result<TaskResult, WaitError>
    where
        C: ControlPlaneClient + ?Sized,
    {
        self.wait_with_cancel(client, task, &CancellationToken::new())
            .await
    }

    /// Wait for `task` to finish, giving up early when `cancel` fires.
    ///
    /// Returns the task result on success, [`WaitError::Failed`] with the
    /// reported cause on failure and [`WaitError::Timeout`] when the deadline
    /// passes first. A poll that is still in flight when the deadline passes
    /// is abandoned, so a slow client cannot stretch the wait.
    pub async fn wait_with_cancel<C>(
        &self,
        client: &C,
        task: &TaskHandle,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, WaitError>
    where
        C: ControlPlaneClient + ?Sized,
    {
        let started = Instant::now();
        let deadline = deadline_after(started, self.config.timeout());
        let poll_interval = self.config.poll_interval();
        let mut polls = 0u32;

        loop {
            let info = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(WaitError::Cancelled { task: task.clone() });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(self.timed_out(task, started));
                }
                info = client.task_info(task) => info.map_err(|source| WaitError::Client {
                    task: task.clone(),
                    source,
                })?,
            };
            polls += 1;

            match info.state {
                TaskState::Success { result } => {
                    debug!(task_id = %task, polls, "Task succeeded");
                    return Ok(result);
                }
                TaskState::Error { cause } => {
                    debug!(task_id = %task, polls, cause = %cause, "Task failed");
                    return Err(WaitError::Failed {
                        task: task.clone(),
                        cause,
                    });
                }
                state => {
                    debug!(task_id = %task, polls, state = ?state, "Task still in progress");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(WaitError::Cancelled { task: task.clone() });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(self.timed_out(task, started));
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    fn timed_out(&self, task: &TaskHandle, started: Instant) -> WaitError {
        let waited = started.elapsed();
        warn!(
            task_id = %task,
            waited_ms = waited.as_millis() as u64,
            "Task did not reach a terminal state before the deadline"
        );
        WaitError::Timeout {
            task: task.clone(),
            waited,
        }
    }
}
