// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store side of Blockshop: the item catalog, purchase records and the
//! orchestrator that turns a purchase into a delivery.

pub mod catalog;
pub mod orchestrator;
pub mod purchase;

pub use catalog::{Catalog, ItemCategory, ItemKind, ItemMetadata, StoreItem};
pub use orchestrator::{PurchaseOrchestrator, StoreSettings, delivery_batch};
pub use purchase::{Purchase, PurchaseId, PurchaseStatus};
