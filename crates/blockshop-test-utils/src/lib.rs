// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Blockshop integration tests.
//!
//! Deterministic stand-ins for the game server console plus a harness that
//! wires the full delivery stack around them.
//!
//! # Components
//!
//! - [`ScriptedTransport`] - console transport that records lines and fails on cue
//! - [`TestHarness`] - dispatcher, delivery queue and purchase orchestrator over a `ScriptedTransport`

pub mod harness;
pub mod scripted_transport;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use scripted_transport::ScriptedTransport;
