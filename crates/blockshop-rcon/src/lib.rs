// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote console command dispatch.
//!
//! [`CommandDispatcher`] owns the one connection to the game server's
//! console and offers queued (priority-ordered) and immediate execution.
//! [`SimulatedTransport`] answers with canned responses for local runs.

pub mod commands;
pub mod dispatcher;
pub mod queue;
pub mod simulated;

pub use dispatcher::{CommandDispatcher, CommandOutcome, DispatcherSettings, TransportInfo};
pub use queue::{CommandId, CommandQueue, QueuedCommand};
pub use simulated::SimulatedTransport;
