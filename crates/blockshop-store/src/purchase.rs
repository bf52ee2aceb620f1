// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Purchase records.

use std::fmt;
use std::str::FromStr;

use blockshop_core::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(pub Uuid);

impl PurchaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PurchaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PurchaseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// `Pending -> Processing -> Completed | Failed`.
///
/// A purchase stays `Processing` while its delivery sits in the queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub player_id: String,
    pub player_username: String,
    pub item_id: String,
    pub price: u32,
    pub status: PurchaseStatus,
    pub payment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_task_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Purchase {
    /// A fresh `pending` purchase.
    pub fn new(player_id: &str, player_username: &str, item_id: &str, price: u32) -> Self {
        let id = PurchaseId::new();
        Self {
            payment_id: format!("pay_{}", id.0.simple()),
            id,
            player_id: player_id.to_string(),
            player_username: player_username.to_string(),
            item_id: item_id.to_string(),
            price,
            status: PurchaseStatus::Pending,
            delivery_task_id: None,
            failure_reason: None,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }

    pub(crate) fn mark_delivered(&mut self, at: DateTime<Utc>) {
        self.status = PurchaseStatus::Completed;
        self.delivered_at = Some(at);
        self.failure_reason = None;
    }

    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = PurchaseStatus::Failed;
        self.failure_reason = Some(reason.into());
    }

    /// Waiting on the queued delivery `task`.
    pub(crate) fn mark_queued(&mut self, task: TaskId) {
        self.status = PurchaseStatus::Processing;
        self.delivery_task_id = Some(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_purchase_is_pending() {
        let purchase = Purchase::new("uuid-1", "Steve", "vip-rank", 199);
        assert_eq!(purchase.status, PurchaseStatus::Pending);
        assert!(purchase.payment_id.starts_with("pay_"));
        assert!(purchase.delivered_at.is_none());
    }

    #[test]
    fn delivery_clears_the_failure_reason() {
        let mut purchase = Purchase::new("uuid-1", "Steve", "vip-rank", 199);
        purchase.mark_failed("console down");
        assert_eq!(purchase.status, PurchaseStatus::Failed);

        purchase.mark_delivered(Utc::now());
        assert_eq!(purchase.status, PurchaseStatus::Completed);
        assert!(purchase.failure_reason.is_none());
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!("failed".parse::<PurchaseStatus>().unwrap(), PurchaseStatus::Failed);
        assert_eq!(PurchaseStatus::Processing.to_string(), "processing");
        assert!("refunded".parse::<PurchaseStatus>().is_err());
    }

    #[test]
    fn serializes_without_empty_optionals() {
        let purchase = Purchase::new("uuid-1", "Steve", "coins-1000", 149);
        let json = serde_json::to_value(&purchase).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("delivery_task_id").is_none());
        assert!(json.get("failure_reason").is_none());
    }
}
