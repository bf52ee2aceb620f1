// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value types shared between the dispatcher, the delivery queue and the store.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Health of a console adapter, as reported on the operator status route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum HealthStatus {
    /// The link is up and commands are answered.
    Healthy,
    /// Commands are answered, but something needs attention.
    Degraded(String),
    /// No commands can be delivered; carries the reason.
    Unhealthy(String),
}

/// A single remote-console instruction.
///
/// Commands are values: substitution produces a new `Command`, the original
/// is never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    name: String,
    arguments: Vec<String>,
    #[serde(default)]
    delay_seconds: f64,
    #[serde(default)]
    retry_on_failure: bool,
}

impl Command {
    /// A command with no delay that aborts its batch on failure.
    pub fn new<I, S>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
            delay_seconds: 0.0,
            retry_on_failure: false,
        }
    }

    /// Sets the pause before this command is issued. Negative or non-finite values become zero.
    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_seconds = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
        self
    }

    /// Sets whether a failure of this command lets the batch continue.
    pub fn with_retry(mut self, retry_on_failure: bool) -> Self {
        self.retry_on_failure = retry_on_failure;
        self
    }

    /// Parses a raw console line such as `give {username} diamond 16`.
    ///
    /// The first whitespace-separated token is the verb. Returns `None` for blank lines.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next()?;
        Some(Self::new(name, tokens))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn delay_seconds(&self) -> f64 {
        self.delay_seconds
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_seconds)
    }

    pub fn retry_on_failure(&self) -> bool {
        self.retry_on_failure
    }

    /// Builds a copy with `f` applied to the name and every argument.
    pub fn map_text(&self, mut f: impl FnMut(&str) -> String) -> Self {
        Self {
            name: f(&self.name),
            arguments: self.arguments.iter().map(|a| f(a)).collect(),
            delay_seconds: self.delay_seconds,
            retry_on_failure: self.retry_on_failure,
        }
    }

    /// The console line: the name followed by space-joined arguments.
    pub fn render(&self) -> String {
        if self.arguments.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.arguments.join(" "))
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Unique identifier for a delivery task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a [`DeliveryTask`].
///
/// `Queued -> Processing -> Completed`, or back to `Queued` with a backoff,
/// or `Failed` once attempts run out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// One purchase's worth of delivery work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTask {
    pub id: TaskId,
    pub transaction_id: String,
    pub player_id: String,
    pub player_username: String,
    pub item_id: String,
    pub commands: Vec<Command>,
    pub priority: i32,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl DeliveryTask {
    /// Whether the scheduled tick at `now` may pick this task up.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Queued
            && self.attempts < self.max_attempts
            && self.next_attempt_at.is_none_or(|at| at <= now)
    }
}

/// Per-status task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStatus {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a DeliveryTask>) -> Self {
        let mut status = Self::default();
        for task in tasks {
            status.total += 1;
            match task.status {
                TaskStatus::Queued => status.queued += 1,
                TaskStatus::Processing => status.processing += 1,
                TaskStatus::Completed => status.completed += 1,
                TaskStatus::Failed => status.failed += 1,
            }
        }
        status
    }
}

/// Aggregate result of executing one command batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub responses: Vec<String>,
}

impl DeliveryOutcome {
    pub fn succeeded(responses: Vec<String>) -> Self {
        Self {
            success: true,
            error: None,
            responses,
        }
    }

    pub fn failed(error: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            responses,
        }
    }
}

/// Phase of the console link.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot of the single logical link to the game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RconConnectionState {
    pub phase: ConnectionPhase,
    pub is_connected: bool,
    pub connection_attempts: u32,
    pub max_connection_attempts: u32,
    pub last_ping: Option<DateTime<Utc>>,
}

impl RconConnectionState {
    pub fn new(max_connection_attempts: u32) -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            is_connected: false,
            connection_attempts: 0,
            max_connection_attempts,
            last_ping: None,
        }
    }

    /// Moves to `phase`, keeping `is_connected` in step.
    pub fn set_phase(&mut self, phase: ConnectionPhase) {
        self.phase = phase;
        self.is_connected = phase == ConnectionPhase::Connected;
    }

    /// True once the automatic reconnect budget is spent.
    pub fn attempts_exhausted(&self) -> bool {
        self.connection_attempts >= self.max_connection_attempts
    }
}
