// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and lifecycle shared by every console adapter.

use async_trait::async_trait;

use crate::error::BlockshopError;
use crate::types::HealthStatus;

/// The base trait for console adapters.
///
/// The dispatcher reports `name`, `version` and `health_check` on the
/// operator status route and calls `shutdown` once when the process stops.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Human-readable adapter name, used in logs and status output.
    fn name(&self) -> &str;

    /// Semantic version of the adapter implementation.
    fn version(&self) -> semver::Version;

    /// Current health of the adapter's link to the game server.
    async fn health_check(&self) -> Result<HealthStatus, BlockshopError>;

    /// Releases everything the adapter holds. Called after the link is closed;
    /// the adapter is not used again afterwards.
    async fn shutdown(&self) -> Result<(), BlockshopError>;
}
