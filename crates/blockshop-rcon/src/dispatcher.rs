// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command dispatcher owning the single console connection.
//!
//! Every transport call, queued or immediate, goes through one async mutex,
//! so the game server observes commands in exactly the order they were
//! dispatched. The background worker ([`CommandDispatcher::run`]) drains the
//! queue one command per tick, pings the server on the heartbeat period, and
//! drives the reconnect loop after a connection-level failure.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use blockshop_config::RconConfig;
use blockshop_core::{
    BlockshopError, Command, ConnectionPhase, ConsoleTransport, HealthStatus,
    RconConnectionState, TransportError,
};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Notify, mpsc};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::queue::{CommandId, CommandQueue, QueuedCommand};

/// Console line used for liveness checks.
const HEARTBEAT_COMMAND: &str = "list";

/// Timing and retry settings for a [`CommandDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub max_connection_attempts: u32,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
    pub queue_tick: Duration,
    pub command_timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from(&RconConfig::default())
    }
}

impl From<&RconConfig> for DispatcherSettings {
    fn from(config: &RconConfig) -> Self {
        Self {
            max_connection_attempts: config.max_connection_attempts,
            reconnect_delay: config.reconnect_delay(),
            heartbeat_interval: config.heartbeat_interval(),
            queue_tick: config.queue_tick(),
            command_timeout: config.command_timeout(),
        }
    }
}

/// Result of a queued command, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub id: CommandId,
    pub line: String,
    pub player: Option<String>,
    /// Server response, or the failure message.
    pub result: Result<String, String>,
}

/// Console transport identity, as shown on the status route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportInfo {
    pub name: String,
    pub version: String,
    pub health: HealthStatus,
}

/// Owns the console link and serialises command execution over it.
pub struct CommandDispatcher {
    transport: Arc<dyn ConsoleTransport>,
    settings: DispatcherSettings,
    state: Mutex<RconConnectionState>,
    queue: Mutex<CommandQueue>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CommandOutcome>>>,
    exec: tokio::sync::Mutex<()>,
    reconnect_requested: Notify,
    reconnecting: AtomicBool,
    next_id: AtomicU64,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn ConsoleTransport>, settings: DispatcherSettings) -> Self {
        Self {
            state: Mutex::new(RconConnectionState::new(settings.max_connection_attempts)),
            transport,
            settings,
            queue: Mutex::new(CommandQueue::new()),
            subscribers: Mutex::new(Vec::new()),
            exec: tokio::sync::Mutex::new(()),
            reconnect_requested: Notify::new(),
            reconnecting: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Queues `command` for the background worker and returns immediately.
    ///
    /// Higher `priority` is dispatched first; equal priorities keep arrival order.
    pub fn enqueue_command(
        &self,
        command: &Command,
        priority: i32,
        player: Option<&str>,
    ) -> CommandId {
        let id = CommandId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let line = command.render();
        debug!(command_id = %id, priority, line = %line, "command queued");
        lock(&self.queue).push(QueuedCommand {
            id,
            line,
            priority,
            player: player.map(str::to_string),
            queued_at: Utc::now(),
        });
        id
    }

    /// Runs `command` now, ahead of anything queued, and returns the server's reply.
    pub async fn execute_immediate(
        &self,
        command: &Command,
        player: Option<&str>,
    ) -> Result<String, BlockshopError> {
        self.execute_line(&command.render(), player).await
    }

    /// True iff the connection is currently established.
    pub fn get_connection_status(&self) -> bool {
        lock(&self.state).is_connected
    }

    pub fn connection_state(&self) -> RconConnectionState {
        lock(&self.state).clone()
    }

    pub fn get_queue_depth(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Drops every queued command. Returns how many were discarded.
    pub fn clear_queue(&self) -> usize {
        let dropped = lock(&self.queue).drain().len();
        info!(dropped, "command queue cleared");
        dropped
    }

    /// Receives the outcome of every queued command dispatched after this call.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CommandOutcome> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Operator-triggered reconnect.
    ///
    /// Resets the attempt budget and runs the reconnect loop inline. Returns
    /// whether the link is up afterwards. If a reconnect loop is already
    /// running this returns the current status without starting another.
    pub async fn connect(&self) -> bool {
        lock(&self.state).connection_attempts = 0;
        self.reconnect().await
    }

    /// Closes the transport and marks the link down.
    pub async fn shutdown(&self) -> Result<(), BlockshopError> {
        let _exec = self.exec.lock().await;
        lock(&self.state).set_phase(ConnectionPhase::Disconnected);
        info!("closing console connection");
        self.transport
            .disconnect()
            .await
            .map_err(|e| BlockshopError::Internal(format!("console disconnect failed: {e}")))?;
        self.transport.shutdown().await
    }

    /// Identity and health of the console transport.
    pub async fn transport_info(&self) -> TransportInfo {
        let health = match self.transport.health_check().await {
            Ok(health) => health,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        };
        TransportInfo {
            name: self.transport.name().to_string(),
            version: self.transport.version().to_string(),
            health,
        }
    }

    /// Background worker: initial connect, queue tick, heartbeat and reconnects.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut queue_tick = time::interval(self.settings.queue_tick);
        queue_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let period = self.settings.heartbeat_interval;
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if !self.get_connection_status() {
            self.reconnect_requested.notify_one();
        }

        info!(transport = self.transport.name(), "command dispatcher started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.reconnect_requested.notified() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.reconnect() => {}
                    }
                }
                _ = queue_tick.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.process_next() => {}
                    }
                }
                _ = heartbeat.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.heartbeat() => {}
                    }
                }
            }
        }
        info!("command dispatcher stopped");
    }

    async fn process_next(&self) {
        let state = self.connection_state();
        if !state.is_connected {
            if state.attempts_exhausted() && !self.reconnecting.load(Ordering::Acquire) {
                let stranded = lock(&self.queue).drain();
                if !stranded.is_empty() {
                    warn!(count = stranded.len(), "console unreachable, failing queued commands");
                }
                for command in stranded {
                    self.publish(CommandOutcome {
                        id: command.id,
                        line: command.line,
                        player: command.player,
                        result: Err(not_connected(&state).to_string()),
                    });
                }
            }
            return;
        }

        let Some(command) = lock(&self.queue).pop() else {
            return;
        };
        let result = self
            .execute_line(&command.line, command.player.as_deref())
            .await;
        match &result {
            Ok(response) => {
                debug!(command_id = %command.id, response = %response, "queued command executed")
            }
            Err(e) => warn!(command_id = %command.id, error = %e, "queued command failed"),
        }
        self.publish(CommandOutcome {
            id: command.id,
            line: command.line,
            player: command.player,
            result: result.map_err(|e| e.to_string()),
        });
    }

    async fn heartbeat(&self) {
        if !self.get_connection_status() {
            return;
        }
        match self.execute_line(HEARTBEAT_COMMAND, None).await {
            Ok(_) => {
                lock(&self.state).last_ping = Some(Utc::now());
                debug!("console heartbeat ok");
            }
            Err(BlockshopError::CommandExecution { source, .. })
                if !source.is_connection_level() =>
            {
                // The server answered, so the link is alive.
                lock(&self.state).last_ping = Some(Utc::now());
                warn!(error = %source, "console heartbeat rejected");
            }
            Err(e) => {
                error!(error = %e, "console heartbeat failed, connection lost");
                self.mark_lost();
            }
        }
    }

    async fn execute_line(
        &self,
        line: &str,
        player: Option<&str>,
    ) -> Result<String, BlockshopError> {
        self.ensure_connected()?;
        let _exec = self.exec.lock().await;
        // The link may have dropped while we waited for our turn.
        self.ensure_connected()?;

        debug!(line, player, "dispatching console command");
        let timeout = self.settings.command_timeout;
        let result = match time::timeout(timeout, self.transport.execute(line)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };

        result.map_err(|source| {
            if source.is_connection_level() {
                warn!(line, error = %source, "console connection failure");
                self.mark_lost();
            }
            BlockshopError::CommandExecution {
                command: line.to_string(),
                source,
            }
        })
    }

    fn ensure_connected(&self) -> Result<(), BlockshopError> {
        let state = lock(&self.state);
        if state.is_connected {
            Ok(())
        } else {
            Err(not_connected(&state))
        }
    }

    /// Marks the link down and wakes the worker to reconnect.
    fn mark_lost(&self) {
        let mut state = lock(&self.state);
        let was_connected = state.is_connected;
        state.set_phase(ConnectionPhase::Disconnected);
        drop(state);
        if was_connected {
            self.reconnect_requested.notify_one();
        }
    }

    /// Reconnect loop. First attempt is immediate, later ones wait `reconnect_delay`.
    async fn reconnect(&self) -> bool {
        let Some(_guard) = ReconnectGuard::acquire(&self.reconnecting) else {
            return self.get_connection_status();
        };

        let mut first = true;
        loop {
            let attempt = {
                let mut state = lock(&self.state);
                if state.is_connected {
                    return true;
                }
                if state.attempts_exhausted() {
                    error!(
                        attempts = state.connection_attempts,
                        "console reconnect attempts exhausted, waiting for operator reconnect"
                    );
                    return false;
                }
                state.connection_attempts
            };

            if !first {
                time::sleep(self.settings.reconnect_delay).await;
            }
            first = false;

            lock(&self.state).set_phase(ConnectionPhase::Connecting);
            info!(
                attempt = attempt + 1,
                max = self.settings.max_connection_attempts,
                transport = self.transport.name(),
                "connecting to console"
            );

            let outcome = {
                let _exec = self.exec.lock().await;
                match time::timeout(self.settings.command_timeout, self.transport.connect()).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(self.settings.command_timeout)),
                }
            };

            let mut state = lock(&self.state);
            match outcome {
                Ok(()) => {
                    state.set_phase(ConnectionPhase::Connected);
                    state.connection_attempts = 0;
                    state.last_ping = Some(Utc::now());
                    info!("console connected");
                    return true;
                }
                Err(e) => {
                    state.set_phase(ConnectionPhase::Disconnected);
                    state.connection_attempts += 1;
                    warn!(
                        attempt = state.connection_attempts,
                        max = state.max_connection_attempts,
                        error = %e,
                        "console connection attempt failed"
                    );
                }
            }
        }
    }

    fn publish(&self, outcome: CommandOutcome) {
        lock(&self.subscribers).retain(|tx| tx.send(outcome.clone()).is_ok());
    }
}

fn not_connected(state: &RconConnectionState) -> BlockshopError {
    let reason = if state.attempts_exhausted() {
        format!(
            "gave up after {} connection attempts",
            state.connection_attempts
        )
    } else {
        format!("link is {}", state.phase)
    };
    BlockshopError::NotConnected { reason }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the reconnecting flag even if the loop is dropped mid-await.
struct ReconnectGuard<'a>(&'a AtomicBool);

impl<'a> ReconnectGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
