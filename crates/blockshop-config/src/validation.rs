// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::BlockshopConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &BlockshopConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.rcon.host.trim().is_empty() {
        fail("rcon.host must not be empty".to_string());
    }
    if config.rcon.port == 0 {
        fail("rcon.port must not be 0".to_string());
    }
    if config.rcon.queue_tick_ms == 0 {
        fail("rcon.queue_tick_ms must be greater than 0".to_string());
    }
    if config.rcon.heartbeat_interval_secs == 0 {
        fail("rcon.heartbeat_interval_secs must be greater than 0".to_string());
    }
    if config.rcon.command_timeout_secs == 0 {
        fail("rcon.command_timeout_secs must be greater than 0".to_string());
    }
    let rate = config.rcon.simulated_failure_rate;
    if !(0.0..=1.0).contains(&rate) {
        fail(format!(
            "rcon.simulated_failure_rate must be between 0.0 and 1.0, got {rate}"
        ));
    }

    if config.delivery.max_attempts < 1 {
        fail("delivery.max_attempts must be at least 1".to_string());
    }
    if config.delivery.batch_size < 1 {
        fail("delivery.batch_size must be at least 1".to_string());
    }
    if config.delivery.processing_interval_secs == 0 {
        fail("delivery.processing_interval_secs must be greater than 0".to_string());
    }

    if let Some(path) = &config.store.catalog_path
        && path.trim().is_empty()
    {
        fail("store.catalog_path must not be empty when set".to_string());
    }

    if config.gateway.enabled {
        if config.gateway.host.trim().is_empty() {
            fail("gateway.host must not be empty".to_string());
        }
        if config.gateway.port == 0 {
            fail("gateway.port must not be 0".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
