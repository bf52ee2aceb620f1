// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Blockshop.
//!
//! Holds the value types passed between the console dispatcher, the delivery
//! queue and the store, the shared error taxonomy, the console transport
//! trait, and the periodic job scheduler.

pub mod error;
pub mod schedule;
pub mod traits;
pub mod types;

pub use error::{BlockshopError, TransportError};
pub use schedule::spawn_periodic;
pub use traits::{ConsoleTransport, PluginAdapter};
pub use types::{
    Command, ConnectionPhase, DeliveryOutcome, DeliveryTask, HealthStatus, QueueStatus,
    RconConnectionState, TaskId, TaskStatus,
};
