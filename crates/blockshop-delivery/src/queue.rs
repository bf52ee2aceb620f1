// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery queue engine.
//!
//! Turns a purchase into in-game effects with bounded retries. Queued tasks
//! are picked up by [`DeliveryQueue::process_due`] in priority order; each
//! attempt runs the task's command batch strictly in list order through the
//! dispatcher's immediate path. A failed attempt is rescheduled with a
//! linear backoff (`retry_delay * attempts`) until `max_attempts` is reached,
//! after which the task stays in the queue as `failed` for an operator.
//!
//! The task list lock is never held while commands run, so queue
//! introspection and cancellation stay responsive during long batches.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use blockshop_config::{DeliveryConfig, OfflinePolicy};
use blockshop_core::{
    BlockshopError, Command, DeliveryOutcome, DeliveryTask, QueueStatus, TaskId, TaskStatus,
    spawn_periodic,
};
use blockshop_rcon::CommandDispatcher;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chat;
use crate::events::{DeliveryEvent, EventBus};
use crate::template::{TemplateContext, substitute_command};

/// Priority given to tasks enqueued without one.
pub const DEFAULT_PRIORITY: i32 = 1;

/// Priority recorded on one-shot immediate deliveries.
const IMMEDIATE_PRIORITY: i32 = 999;

/// Retry and batching policy for a [`DeliveryQueue`].
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub batch_size: usize,
    pub offline_policy: OfflinePolicy,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for DeliverySettings {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
            batch_size: config.batch_size,
            offline_policy: config.offline_policy,
        }
    }
}

/// What to deliver, to whom, and for which purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    pub transaction_id: String,
    pub player_id: String,
    pub player_username: String,
    pub item_id: String,
    pub commands: Vec<Command>,
}

/// The delivery queue engine. Share it behind an `Arc`.
pub struct DeliveryQueue {
    dispatcher: Arc<CommandDispatcher>,
    settings: DeliverySettings,
    tasks: Mutex<Vec<DeliveryTask>>,
    tick: Mutex<()>,
    events: EventBus,
}

impl DeliveryQueue {
    pub fn new(dispatcher: Arc<CommandDispatcher>, settings: DeliverySettings) -> Self {
        Self {
            dispatcher,
            settings,
            tasks: Mutex::new(Vec::new()),
            tick: Mutex::new(()),
            events: EventBus::new(),
        }
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Receives every delivery event published after this call.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DeliveryEvent> {
        self.events.subscribe()
    }

    /// Queues `request` at [`DEFAULT_PRIORITY`].
    pub async fn enqueue(&self, request: DeliveryRequest) -> TaskId {
        self.enqueue_with_priority(request, DEFAULT_PRIORITY).await
    }

    /// Queues `request`; higher `priority` is serviced first.
    pub async fn enqueue_with_priority(&self, request: DeliveryRequest, priority: i32) -> TaskId {
        let task = new_task(request, priority, self.settings.max_attempts);
        let id = task.id;
        info!(
            task_id = %id,
            player = %task.player_username,
            item = %task.item_id,
            priority,
            commands = task.commands.len(),
            "delivery queued"
        );
        self.tasks.lock().await.push(task.clone());
        self.events.publish(DeliveryEvent::Queued(task));
        id
    }

    /// Runs the whole batch now and reports the outcome, bypassing the queue.
    ///
    /// A single attempt is made. The offline policy is only ever a warning here.
    pub async fn deliver_immediately(&self, request: DeliveryRequest) -> DeliveryOutcome {
        let transaction_id = request.transaction_id.clone();
        let item_id = request.item_id.clone();
        let mut task = new_task(request, IMMEDIATE_PRIORITY, 1);
        let now = Utc::now();
        task.status = TaskStatus::Processing;
        task.attempts = 1;
        task.processed_at = Some(now);

        let outcome = if task.commands.is_empty() {
            DeliveryOutcome::succeeded(Vec::new())
        } else {
            if self.settings.offline_policy != OfflinePolicy::Ignore {
                self.warn_if_offline(&task).await;
            }
            let ctx = TemplateContext::new(&task.player_username, now);
            match self.run_commands(&task, &ctx).await {
                Ok(responses) => {
                    self.notify(&task, true).await;
                    DeliveryOutcome::succeeded(responses)
                }
                Err((err, responses)) => {
                    self.notify(&task, false).await;
                    DeliveryOutcome::failed(err.to_string(), responses)
                }
            }
        };

        if outcome.success {
            info!(task_id = %task.id, player = %task.player_username, item = %item_id, "immediate delivery completed");
            self.events.publish(DeliveryEvent::ImmediateCompleted {
                transaction_id,
                item_id,
                outcome: outcome.clone(),
            });
        } else {
            error!(
                task_id = %task.id,
                player = %task.player_username,
                item = %item_id,
                error = outcome.error.as_deref().unwrap_or_default(),
                "immediate delivery failed"
            );
            self.events.publish(DeliveryEvent::ImmediateFailed {
                transaction_id,
                item_id,
                outcome: outcome.clone(),
            });
        }
        outcome
    }

    pub async fn get_queue_status(&self) -> QueueStatus {
        QueueStatus::from_tasks(self.tasks.lock().await.iter())
    }

    /// Snapshots of every task, in arrival order.
    pub async fn get_queue_items(&self) -> Vec<DeliveryTask> {
        self.tasks.lock().await.clone()
    }

    pub async fn get_task(&self, id: TaskId) -> Option<DeliveryTask> {
        self.tasks.lock().await.iter().find(|t| t.id == id).cloned()
    }

    /// Resets a task to `queued` with a fresh attempt budget.
    ///
    /// Returns false if the task does not exist or is mid-attempt.
    pub async fn retry_delivery(&self, id: TaskId) -> bool {
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if task.status == TaskStatus::Processing {
            return false;
        }
        task.status = TaskStatus::Queued;
        task.attempts = 0;
        task.next_attempt_at = None;
        task.last_error = None;
        let snapshot = task.clone();
        drop(tasks);

        info!(task_id = %id, "delivery retry requested");
        self.events.publish(DeliveryEvent::RetryRequested(snapshot));
        true
    }

    /// Removes a task whatever its state.
    ///
    /// An attempt already in flight runs to completion; its result is discarded.
    pub async fn cancel_delivery(&self, id: TaskId) -> bool {
        let mut tasks = self.tasks.lock().await;
        let Some(index) = tasks.iter().position(|t| t.id == id) else {
            return false;
        };
        let removed = tasks.remove(index);
        drop(tasks);

        info!(task_id = %id, status = %removed.status, "delivery cancelled");
        self.events.publish(DeliveryEvent::Cancelled(removed));
        true
    }

    /// Removes every task. Returns how many were removed.
    pub async fn clear_queue(&self) -> usize {
        let removed = {
            let mut tasks = self.tasks.lock().await;
            let removed = tasks.len();
            tasks.clear();
            removed
        };
        warn!(removed, "delivery queue cleared");
        self.events.publish(DeliveryEvent::QueueCleared { removed });
        removed
    }

    /// One processing tick at wall-clock time `now`.
    ///
    /// Picks up to `batch_size` tasks due at `now` by descending priority and
    /// runs them one after another. Attempt timestamps and the retry backoff
    /// are taken from `now` plus the time the tick has spent so far. A tick
    /// that finds the previous one still running does nothing. Returns the
    /// number of tasks picked up.
    pub async fn process_due(&self, now: DateTime<Utc>) -> usize {
        let Ok(_tick) = self.tick.try_lock() else {
            debug!("previous delivery tick still running, skipping");
            return 0;
        };

        let selected: Vec<TaskId> = {
            let tasks = self.tasks.lock().await;
            let mut due: Vec<&DeliveryTask> = tasks.iter().filter(|t| t.is_due(now)).collect();
            due.sort_by_key(|t| Reverse(t.priority));
            due.into_iter()
                .take(self.settings.batch_size)
                .map(|t| t.id)
                .collect()
        };

        if !selected.is_empty() {
            debug!(count = selected.len(), "processing due deliveries");
        }
        let clock = TickClock::start(now);
        for id in &selected {
            self.process_task(*id, &clock).await;
        }
        selected.len()
    }

    /// Runs [`process_due`](Self::process_due) every `period` until `cancel` fires.
    pub fn spawn_processing(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        spawn_periodic("delivery-queue", period, cancel, move || {
            let queue = Arc::clone(&queue);
            async move {
                queue.process_due(Utc::now()).await;
            }
        })
    }

    async fn process_task(&self, id: TaskId, clock: &TickClock) {
        let now = clock.selected_at;
        let Some(pending) = self.get_task(id).await.filter(|t| t.is_due(now)) else {
            return;
        };

        let online = if self.settings.offline_policy == OfflinePolicy::Ignore
            || pending.commands.is_empty()
        {
            None
        } else {
            self.player_online(&pending.player_username).await
        };

        if online == Some(false) && self.settings.offline_policy == OfflinePolicy::Defer {
            self.defer(id, now, clock.now()).await;
            return;
        }

        // Claim the task. It may have been cancelled or retried meanwhile.
        let started_at = clock.now();
        let task = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.iter_mut().find(|t| t.id == id && t.is_due(now)) else {
                return;
            };
            task.status = TaskStatus::Processing;
            task.attempts += 1;
            task.processed_at = Some(started_at);
            task.clone()
        };

        info!(
            task_id = %id,
            player = %task.player_username,
            item = %task.item_id,
            attempt = task.attempts,
            max_attempts = task.max_attempts,
            "processing delivery"
        );
        if online == Some(false) {
            warn!(player = %task.player_username, "player is not online, delivering anyway");
        }

        let result = if task.commands.is_empty() {
            Ok(Vec::new())
        } else {
            let ctx = TemplateContext::new(&task.player_username, started_at);
            self.run_commands(&task, &ctx).await
        };

        let terminal = task.attempts >= task.max_attempts;
        match &result {
            Ok(_) if !task.commands.is_empty() => self.notify(&task, true).await,
            Err(_) if terminal => self.notify(&task, false).await,
            _ => {}
        }

        let finished_at = clock.now();
        let mut tasks = self.tasks.lock().await;
        let Some(index) = tasks.iter().position(|t| t.id == id) else {
            info!(task_id = %id, "delivery cancelled while in flight, result discarded");
            return;
        };

        match result {
            Ok(responses) => {
                let mut done = tasks.remove(index);
                drop(tasks);
                done.status = TaskStatus::Completed;
                done.completed_at = Some(finished_at);
                info!(task_id = %id, player = %done.player_username, item = %done.item_id, "delivery completed");
                self.events.publish(DeliveryEvent::Completed {
                    task: done,
                    responses,
                });
            }
            Err((err, _responses)) => {
                let message = err.to_string();
                let entry = &mut tasks[index];
                entry.last_error = Some(message.clone());
                if terminal {
                    entry.status = TaskStatus::Failed;
                    let snapshot = entry.clone();
                    drop(tasks);
                    error!(
                        task_id = %id,
                        player = %snapshot.player_username,
                        item = %snapshot.item_id,
                        attempts = snapshot.attempts,
                        error = %message,
                        "delivery failed permanently"
                    );
                    self.events.publish(DeliveryEvent::Failed {
                        task: snapshot,
                        error: message,
                    });
                } else {
                    let backoff = self.settings.retry_delay * entry.attempts;
                    entry.status = TaskStatus::Queued;
                    entry.next_attempt_at = Some(finished_at + to_delta(backoff));
                    let snapshot = entry.clone();
                    drop(tasks);
                    warn!(
                        task_id = %id,
                        attempt = snapshot.attempts,
                        retry_in_secs = backoff.as_secs(),
                        error = %message,
                        "delivery attempt failed, will retry"
                    );
                    self.events.publish(DeliveryEvent::Retrying {
                        task: snapshot,
                        error: message,
                    });
                }
            }
        }
    }

    /// Postpones a task without spending an attempt.
    ///
    /// `now` is the eligibility instant, `checked_at` when the player list came back.
    async fn defer(&self, id: TaskId, now: DateTime<Utc>, checked_at: DateTime<Utc>) {
        let until = checked_at + to_delta(self.settings.retry_delay);
        let snapshot = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.iter_mut().find(|t| t.id == id && t.is_due(now)) else {
                return;
            };
            task.next_attempt_at = Some(until);
            task.clone()
        };
        info!(task_id = %id, player = %snapshot.player_username, %until, "player offline, delivery deferred");
        self.events.publish(DeliveryEvent::Deferred {
            task: snapshot,
            until,
        });
    }

    /// Executes the batch in order. On abort returns the error with the responses so far.
    async fn run_commands(
        &self,
        task: &DeliveryTask,
        ctx: &TemplateContext<'_>,
    ) -> Result<Vec<String>, (BlockshopError, Vec<String>)> {
        let mut responses = Vec::with_capacity(task.commands.len());
        for template in &task.commands {
            let command = substitute_command(template, ctx);
            if !command.delay().is_zero() {
                tokio::time::sleep(command.delay()).await;
            }

            match self
                .dispatcher
                .execute_immediate(&command, Some(&task.player_username))
                .await
            {
                Ok(response) => {
                    debug!(task_id = %task.id, command = %command, response = %response, "delivery command executed");
                    responses.push(response);
                }
                Err(err) if command.retry_on_failure() => {
                    warn!(task_id = %task.id, command = %command, error = %err, "delivery command failed, continuing");
                    responses.push(format!("ERROR: {err}"));
                }
                Err(err) => {
                    warn!(task_id = %task.id, command = %command, error = %err, "delivery command failed, aborting batch");
                    let reason = match err {
                        BlockshopError::CommandExecution { source, .. } => source.to_string(),
                        other => other.to_string(),
                    };
                    let aborted = BlockshopError::TaskAborted {
                        command: command.render(),
                        reason,
                    };
                    return Err((aborted, responses));
                }
            }
        }
        Ok(responses)
    }

    /// `Some(online)` from the server's player list, `None` if the list could not be fetched.
    async fn player_online(&self, username: &str) -> Option<bool> {
        match self.dispatcher.online_players().await {
            Ok(list) => Some(
                list.split(|c: char| c == ',' || c == ':' || c.is_whitespace())
                    .map(|token| token.trim_matches(|c: char| !is_name_char(c)))
                    .any(|name| name.eq_ignore_ascii_case(username)),
            ),
            Err(err) => {
                debug!(error = %err, "could not fetch online players");
                None
            }
        }
    }

    async fn warn_if_offline(&self, task: &DeliveryTask) {
        match self.player_online(&task.player_username).await {
            Some(true) => {}
            Some(false) => {
                warn!(player = %task.player_username, "player is not online, delivering anyway")
            }
            None => {
                warn!(player = %task.player_username, "could not check whether player is online")
            }
        }
    }

    /// Best-effort chat message about the delivery. Failures are only logged.
    async fn notify(&self, task: &DeliveryTask, delivered: bool) {
        let message = if delivered {
            chat::delivered_message(&task.item_id)
        } else {
            chat::delivery_failed_message(&task.item_id)
        };
        let command = Command::new("tellraw", [task.player_username.clone(), message]);
        if let Err(err) = self
            .dispatcher
            .execute_immediate(&command, Some(&task.player_username))
            .await
        {
            warn!(task_id = %task.id, error = %err, "failed to send delivery notification");
        }
    }
}

/// Wall-clock time inside one tick.
///
/// Eligibility is judged at the instant the tick was given; timestamps and
/// backoff anchors follow the time actually spent running earlier batches.
struct TickClock {
    selected_at: DateTime<Utc>,
    started: Instant,
}

impl TickClock {
    fn start(selected_at: DateTime<Utc>) -> Self {
        Self {
            selected_at,
            started: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.selected_at + to_delta(self.started.elapsed())
    }
}

fn new_task(request: DeliveryRequest, priority: i32, max_attempts: u32) -> DeliveryTask {
    DeliveryTask {
        id: TaskId::new(),
        transaction_id: request.transaction_id,
        player_id: request.player_id,
        player_username: request.player_username,
        item_id: request.item_id,
        commands: request.commands,
        priority,
        status: TaskStatus::Queued,
        attempts: 0,
        max_attempts,
        next_attempt_at: None,
        created_at: Utc::now(),
        processed_at: None,
        completed_at: None,
        last_error: None,
    }
}

/// Characters a player name can contain.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
