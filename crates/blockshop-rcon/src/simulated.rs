// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process console transport with canned per-verb responses.
//!
//! Stands in for a real RCON client in development: connection attempts can
//! be made to fail at a fixed rate, and every command gets a deterministic
//! reply shaped like the server's.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use blockshop_core::{BlockshopError, ConsoleTransport, HealthStatus, PluginAdapter, TransportError};
use rand::Rng;
use tracing::debug;

pub struct SimulatedTransport {
    failure_rate: f64,
    connected: AtomicBool,
}

impl SimulatedTransport {
    /// `failure_rate` is the probability, clamped to `0.0..=1.0`, that a connect attempt fails.
    pub fn new(failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            failure_rate,
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PluginAdapter for SimulatedTransport {
    fn name(&self) -> &str {
        "simulated-console"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, BlockshopError> {
        Ok(if self.connected.load(Ordering::Acquire) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy("not connected".into())
        })
    }

    async fn shutdown(&self) -> Result<(), BlockshopError> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl ConsoleTransport for SimulatedTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if rand::thread_rng().gen_bool(self.failure_rate) {
            return Err(TransportError::Io("connection refused".into()));
        }
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn execute(&self, line: &str) -> Result<String, TransportError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::Io("not connected".into()));
        }
        let response = canned_response(line);
        debug!(line, response = %response, "simulated console reply");
        Ok(response)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}

/// The reply a vanilla server with LuckPerms and an economy plugin would give.
pub fn canned_response(line: &str) -> String {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = tokens.collect();
    let arg = |i: usize| args.get(i).copied().unwrap_or_default();

    match verb.as_str() {
        "give" => {
            let count = args.get(2).copied().unwrap_or("1");
            format!("Gave {count} {} to {}", arg(1), arg(0))
        }
        "lp" if arg(2) == "parent" && arg(3) == "set" => {
            format!("Set {}'s parent group to {}", arg(1), arg(4))
        }
        "lp" => "LuckPerms command executed".to_string(),
        "eco" if arg(0) == "give" => format!("${} has been given to {}", arg(2), arg(1)),
        "eco" => "Economy command executed".to_string(),
        "broadcast" => format!("Broadcasted: {}", args.join(" ")),
        "title" => format!("Title sent to {}", arg(0)),
        "tellraw" => format!("Message sent to {}", arg(0)),
        "list" => "There are 47/100 players online: Player1, Player2, Player3...".to_string(),
        "tps" => "TPS from last 1m, 5m, 15m: 19.8, 19.9, 20.0".to_string(),
        _ => format!("Command executed: {line}"),
    }
}
