// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Purchase delivery for Blockshop.
//!
//! [`DeliveryQueue`] runs command batches through the console dispatcher with
//! bounded retries; [`template`] fills in per-player placeholders; [`helpers`]
//! builds the batches for ranks, coins and kits.

pub mod chat;
pub mod events;
pub mod helpers;
pub mod queue;
pub mod template;

pub use events::{DeliveryEvent, EventBus};
pub use helpers::{DeliveryBatch, KitItem};
pub use queue::{DEFAULT_PRIORITY, DeliveryQueue, DeliveryRequest, DeliverySettings};
pub use template::{TemplateContext, substitute, substitute_command};
