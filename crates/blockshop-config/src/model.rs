// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Blockshop configuration.
///
/// Every section is optional and defaults to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlockshopConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Game server remote console settings.
    #[serde(default)]
    pub rcon: RconConfig,

    /// Delivery queue settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Storefront settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Remote console connection and dispatcher timing.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RconConfig {
    #[serde(default = "default_rcon_host")]
    pub host: String,

    #[serde(default = "default_rcon_port")]
    pub port: u16,

    /// Console password. Redacted from `Debug` output.
    #[serde(default)]
    pub password: String,

    /// Automatic reconnect attempts before giving up until an operator reconnects.
    #[serde(default = "default_max_connection_attempts")]
    pub max_connection_attempts: u32,

    /// Pause between reconnect attempts, in seconds.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Liveness check period, in seconds.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Queued command tick, in milliseconds. One command is dispatched per tick.
    #[serde(default = "default_queue_tick_ms")]
    pub queue_tick_ms: u64,

    /// Per-command response timeout, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Fraction of connection attempts the simulated transport refuses (0.0 to 1.0).
    #[serde(default)]
    pub simulated_failure_rate: f64,
}

impl RconConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn queue_tick(&self) -> Duration {
        Duration::from_millis(self.queue_tick_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: default_rcon_host(),
            port: default_rcon_port(),
            password: String::new(),
            max_connection_attempts: default_max_connection_attempts(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            queue_tick_ms: default_queue_tick_ms(),
            command_timeout_secs: default_command_timeout_secs(),
            simulated_failure_rate: 0.0,
        }
    }
}

impl fmt::Debug for RconConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .field("max_connection_attempts", &self.max_connection_attempts)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("queue_tick_ms", &self.queue_tick_ms)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .field("simulated_failure_rate", &self.simulated_failure_rate)
            .finish()
    }
}

fn default_rcon_host() -> String {
    "127.0.0.1".to_string()
}

fn default_rcon_port() -> u16 {
    25575
}

fn default_max_connection_attempts() -> u32 {
    5
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_queue_tick_ms() -> u64 {
    100
}

fn default_command_timeout_secs() -> u64 {
    10
}

/// What the delivery queue does when the target player is not online.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflinePolicy {
    /// Skip the online check entirely.
    Ignore,
    /// Check, log a warning, deliver anyway.
    #[default]
    Warn,
    /// Reschedule queued deliveries without consuming an attempt.
    Defer,
}

/// Delivery queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Whether the periodic processing tick runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Attempts per queued task before it is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base retry delay in seconds; the wait before retry `n` is `n * retry_delay_secs`.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Maximum tasks processed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Processing tick period, in seconds.
    #[serde(default = "default_processing_interval_secs")]
    pub processing_interval_secs: u64,

    #[serde(default)]
    pub offline_policy: OfflinePolicy,
}

impl DeliveryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn processing_interval(&self) -> Duration {
        Duration::from_secs(self.processing_interval_secs)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            batch_size: default_batch_size(),
            processing_interval_secs: default_processing_interval_secs(),
            offline_policy: OfflinePolicy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    10
}

fn default_processing_interval_secs() -> u64 {
    5
}

/// How a completed purchase is handed to the delivery pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Deliver inline and report the outcome to the buyer.
    #[default]
    Immediate,
    /// Always go through the delivery queue.
    Queued,
}

/// Storefront configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub delivery_mode: DeliveryMode,

    /// In immediate mode, hand a failed delivery to the queue instead of failing the purchase.
    #[serde(default = "default_true")]
    pub queue_on_immediate_failure: bool,

    /// TOML file with `[[items]]` entries. The built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::default(),
            queue_on_immediate_failure: true,
            catalog_path: None,
        }
    }
}

/// HTTP gateway configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for operator routes. Operator routes reject every request when unset.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings() {
        let config = BlockshopConfig::default();
        assert_eq!(config.rcon.port, 25575);
        assert_eq!(config.rcon.max_connection_attempts, 5);
        assert_eq!(config.rcon.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.rcon.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.rcon.queue_tick(), Duration::from_millis(100));
        assert_eq!(config.delivery.max_attempts, 3);
        assert_eq!(config.delivery.retry_delay(), Duration::from_secs(30));
        assert_eq!(config.delivery.batch_size, 10);
        assert_eq!(config.delivery.processing_interval(), Duration::from_secs(5));
        assert_eq!(config.delivery.offline_policy, OfflinePolicy::Warn);
        assert_eq!(config.store.delivery_mode, DeliveryMode::Immediate);
        assert!(config.store.queue_on_immediate_failure);
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = BlockshopConfig::default();
        config.rcon.password = "hunter2".into();
        config.gateway.bearer_token = Some("s3cret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
