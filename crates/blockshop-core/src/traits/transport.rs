// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console transport adapter trait.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::traits::adapter::PluginAdapter;

/// The wire to a game server's remote console.
///
/// Callers serialise access: the dispatcher never issues two calls at once,
/// so implementations need no ordering guarantees of their own.
#[async_trait]
pub trait ConsoleTransport: PluginAdapter {
    /// Opens (or re-opens) the link and authenticates.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Sends one rendered console line and returns the server's textual reply.
    async fn execute(&self, line: &str) -> Result<String, TransportError>;

    /// Closes the link. Closing an already closed link is not an error.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
