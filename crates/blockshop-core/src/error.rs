// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every Blockshop crate.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across Blockshop crate boundaries.
#[derive(Debug, Error)]
pub enum BlockshopError {
    /// Configuration errors (invalid TOML, bad values, unreadable catalog file).
    #[error("configuration error: {0}")]
    Config(String),

    /// The dispatcher has no live console connection.
    ///
    /// Raised once reconnect attempts are exhausted, and for immediate
    /// executions while the link is down.
    #[error("console not connected: {reason}")]
    NotConnected { reason: String },

    /// A single console command failed.
    #[error("command `{command}` failed: {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: TransportError,
    },

    /// A non-retryable command failed mid-batch; the rest of the batch was skipped.
    #[error("delivery aborted at `{command}`: {reason}")]
    TaskAborted { command: String, reason: String },

    /// Lookup miss (catalog item, purchase, delivery task).
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// The operation is not valid for the entity's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BlockshopError {
    /// Shorthand for a [`BlockshopError::NotFound`].
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}

/// Failure reported by a [`ConsoleTransport`](crate::ConsoleTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The link itself failed (socket closed, auth refused, not connected).
    #[error("transport i/o: {0}")]
    Io(String),

    /// The server ran the command and reported failure. The link is still up.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// No response within the command timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Whether this failure means the connection can no longer be trusted.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_))
    }
}
