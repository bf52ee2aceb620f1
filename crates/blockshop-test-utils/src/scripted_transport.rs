// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console transport that records traffic and fails on cue.
//!
//! `ScriptedTransport` implements `ConsoleTransport` without any network:
//! every line handed to `execute` is recorded with the (tokio) instant it
//! arrived, and failures can be scripted globally or per command verb.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use blockshop_core::{BlockshopError, ConsoleTransport, HealthStatus, PluginAdapter, TransportError};
use blockshop_rcon::simulated::canned_response;

#[derive(Default)]
struct Script {
    connected: bool,
    shut_down: bool,
    connect_calls: u32,
    refuse_connects: bool,
    failing_connects: u32,
    fail_all: Option<TransportError>,
    fail_verbs: HashMap<String, TransportError>,
    hang_verbs: HashSet<String>,
    responses: HashMap<String, String>,
    lines: Vec<(Instant, String)>,
}

/// A scripted console transport for deterministic tests.
///
/// Unscripted commands succeed with the simulated server's canned reply.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command fails with `error` until [`clear_failures`](Self::clear_failures).
    pub async fn fail_all(&self, error: TransportError) {
        self.script.lock().await.fail_all = Some(error);
    }

    /// Commands whose verb is `verb` fail with `error`.
    pub async fn fail_verb(&self, verb: &str, error: TransportError) {
        self.script
            .lock()
            .await
            .fail_verbs
            .insert(verb.to_lowercase(), error);
    }

    /// Commands whose verb is `verb` never answer.
    pub async fn hang_verb(&self, verb: &str) {
        self.script.lock().await.hang_verbs.insert(verb.to_lowercase());
    }

    /// Replace the canned reply for `verb`.
    pub async fn respond(&self, verb: &str, response: &str) {
        self.script
            .lock()
            .await
            .responses
            .insert(verb.to_lowercase(), response.to_string());
    }

    pub async fn clear_failures(&self) {
        let mut script = self.script.lock().await;
        script.fail_all = None;
        script.fail_verbs.clear();
        script.hang_verbs.clear();
    }

    /// Refuse every connection attempt while `refuse` is set.
    pub async fn refuse_connects(&self, refuse: bool) {
        self.script.lock().await.refuse_connects = refuse;
    }

    /// Refuse only the next `count` connection attempts.
    pub async fn fail_next_connects(&self, count: u32) {
        self.script.lock().await.failing_connects = count;
    }

    /// Drop the link from the server side; the next command fails with `Io`.
    pub async fn drop_link(&self) {
        self.script.lock().await.connected = false;
    }

    /// Whether `PluginAdapter::shutdown` has been called.
    pub async fn is_shut_down(&self) -> bool {
        self.script.lock().await.shut_down
    }

    pub async fn connect_calls(&self) -> u32 {
        self.script.lock().await.connect_calls
    }

    /// Every line received so far, successful or not.
    pub async fn lines(&self) -> Vec<String> {
        self.script
            .lock()
            .await
            .lines
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Lines paired with the instant they reached the transport.
    pub async fn timed_lines(&self) -> Vec<(Instant, String)> {
        self.script.lock().await.lines.clone()
    }
}

#[async_trait]
impl PluginAdapter for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted-console"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, BlockshopError> {
        Ok(if self.script.lock().await.connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy("link down".into())
        })
    }

    async fn shutdown(&self) -> Result<(), BlockshopError> {
        let mut script = self.script.lock().await;
        script.connected = false;
        script.shut_down = true;
        Ok(())
    }
}

#[async_trait]
impl ConsoleTransport for ScriptedTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut script = self.script.lock().await;
        script.connect_calls += 1;
        if script.refuse_connects {
            return Err(TransportError::Io("connection refused".into()));
        }
        if script.failing_connects > 0 {
            script.failing_connects -= 1;
            return Err(TransportError::Io("connection refused".into()));
        }
        script.connected = true;
        Ok(())
    }

    async fn execute(&self, line: &str) -> Result<String, TransportError> {
        let verb = line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
        let outcome = {
            let mut script = self.script.lock().await;
            script.lines.push((Instant::now(), line.to_string()));
            if script.hang_verbs.contains(&verb) {
                None
            } else if !script.connected {
                Some(Err(TransportError::Io("not connected".into())))
            } else if let Some(error) = script.fail_all.clone() {
                Some(Err(error))
            } else if let Some(error) = script.fail_verbs.get(&verb).cloned() {
                Some(Err(error))
            } else {
                Some(Ok(script
                    .responses
                    .get(&verb)
                    .cloned()
                    .unwrap_or_else(|| canned_response(line))))
            }
        };
        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.script.lock().await.connected = false;
        Ok(())
    }
}
