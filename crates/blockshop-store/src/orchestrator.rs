// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Purchase orchestration.
//!
//! Resolves a catalog item to its delivery batch, records the purchase and
//! hands the batch to the delivery queue, either inline or queued according
//! to `store.delivery_mode`. Queued deliveries report back through delivery
//! events, which [`PurchaseOrchestrator::apply_event`] folds into the
//! purchase records.

use std::sync::Arc;

use blockshop_config::{DeliveryMode, StoreConfig};
use blockshop_core::{BlockshopError, Command, DeliveryOutcome};
use blockshop_delivery::helpers::{self, DeliveryBatch, KitItem};
use blockshop_delivery::{DEFAULT_PRIORITY, DeliveryEvent, DeliveryQueue, DeliveryRequest};
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, ItemKind, StoreItem};
use crate::purchase::{Purchase, PurchaseId, PurchaseStatus};

#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub delivery_mode: DeliveryMode,
    pub queue_on_immediate_failure: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for StoreSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            delivery_mode: config.delivery_mode,
            queue_on_immediate_failure: config.queue_on_immediate_failure,
        }
    }
}

pub struct PurchaseOrchestrator {
    catalog: Catalog,
    queue: Arc<DeliveryQueue>,
    settings: StoreSettings,
    purchases: RwLock<Vec<Purchase>>,
}

impl PurchaseOrchestrator {
    pub fn new(catalog: Catalog, queue: Arc<DeliveryQueue>, settings: StoreSettings) -> Self {
        Self {
            catalog,
            queue,
            settings,
            purchases: RwLock::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    /// Buys `item_id` for a player and starts delivering it.
    ///
    /// Returns the purchase as it stands once delivery has been handed off:
    /// `completed` after a successful immediate delivery, `processing` while
    /// queued, or `failed`.
    pub async fn purchase(
        &self,
        item_id: &str,
        player_id: &str,
        player_username: &str,
    ) -> Result<Purchase, BlockshopError> {
        let item = self
            .catalog
            .get(item_id)
            .ok_or_else(|| BlockshopError::not_found("store item", item_id))?;
        if player_username.trim().is_empty() {
            return Err(BlockshopError::InvalidState(
                "player username is required".into(),
            ));
        }

        let purchase = Purchase::new(player_id, player_username, &item.id, item.price);
        let id = purchase.id;
        self.purchases.write().await.push(purchase.clone());
        info!(
            purchase_id = %id,
            player = player_username,
            item = %item.id,
            price = item.price,
            mode = ?self.settings.delivery_mode,
            "purchase recorded"
        );

        let batch = delivery_batch(item);
        let request = delivery_request(&purchase, batch.commands);
        match self.settings.delivery_mode {
            DeliveryMode::Immediate => {
                self.update(id, |p| p.status = PurchaseStatus::Processing)
                    .await;
                let outcome = self.queue.deliver_immediately(request.clone()).await;
                if outcome.success {
                    self.update(id, |p| p.mark_delivered(Utc::now())).await;
                } else if self.settings.queue_on_immediate_failure {
                    warn!(purchase_id = %id, error = ?outcome.error, "immediate delivery failed, queueing for retry");
                    self.enqueue_for(id, request, batch.priority, outcome.error)
                        .await;
                } else {
                    let reason = outcome.error.unwrap_or_else(|| "delivery failed".into());
                    self.update(id, |p| p.mark_failed(reason)).await;
                }
            }
            DeliveryMode::Queued => {
                self.enqueue_for(id, request, batch.priority, None).await;
            }
        }
        self.get_purchase(id).await
    }

    /// Purchases, newest last, optionally filtered by player and status.
    pub async fn list_purchases(
        &self,
        player_id: Option<&str>,
        status: Option<PurchaseStatus>,
    ) -> Vec<Purchase> {
        self.purchases
            .read()
            .await
            .iter()
            .filter(|p| player_id.is_none_or(|player| p.player_id == player))
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect()
    }

    pub async fn get_purchase(&self, id: PurchaseId) -> Result<Purchase, BlockshopError> {
        self.purchases
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| BlockshopError::not_found("purchase", id))
    }

    /// Retries delivery of a failed purchase.
    ///
    /// The retained queue task is reset when it still exists; otherwise the
    /// batch is queued again.
    pub async fn retry_purchase(&self, id: PurchaseId) -> Result<Purchase, BlockshopError> {
        let purchase = self.get_purchase(id).await?;
        if purchase.status != PurchaseStatus::Failed {
            return Err(BlockshopError::InvalidState(format!(
                "can only retry failed deliveries, purchase {id} is {}",
                purchase.status
            )));
        }

        let reset = match purchase.delivery_task_id {
            Some(task) => self.queue.retry_delivery(task).await,
            None => false,
        };
        if reset {
            // The reset task may already have completed on another worker.
            self.update(id, |p| {
                if p.status == PurchaseStatus::Failed {
                    p.status = PurchaseStatus::Processing;
                    p.failure_reason = None;
                }
            })
            .await;
        } else {
            let item = self.item_for(&purchase)?;
            let batch = delivery_batch(item);
            let request = delivery_request(&purchase, batch.commands);
            self.enqueue_for(id, request, batch.priority, None).await;
        }
        info!(purchase_id = %id, reused_task = reset, "purchase delivery retry initiated");
        self.get_purchase(id).await
    }

    /// Delivers a purchase again, right now, whatever its state.
    ///
    /// On success any queued delivery for it is cancelled. A failure leaves a
    /// completed purchase completed.
    pub async fn manual_delivery(
        &self,
        id: PurchaseId,
    ) -> Result<(Purchase, DeliveryOutcome), BlockshopError> {
        let purchase = self.get_purchase(id).await?;
        let item = self.item_for(&purchase)?;
        let batch = delivery_batch(item);

        info!(purchase_id = %id, item = %item.id, "manual delivery requested");
        let outcome = self
            .queue
            .deliver_immediately(delivery_request(&purchase, batch.commands))
            .await;

        if outcome.success {
            self.update(id, |p| p.mark_delivered(Utc::now())).await;
            if let Some(task) = purchase.delivery_task_id {
                self.queue.cancel_delivery(task).await;
            }
        } else {
            let reason = outcome
                .error
                .clone()
                .unwrap_or_else(|| "delivery failed".into());
            self.update(id, |p| {
                if p.status != PurchaseStatus::Completed {
                    p.mark_failed(reason);
                }
            })
            .await;
        }
        Ok((self.get_purchase(id).await?, outcome))
    }

    /// Folds a delivery event into the purchase it belongs to.
    ///
    /// Returns whether any purchase changed.
    pub async fn apply_event(&self, event: &DeliveryEvent) -> bool {
        let mut purchases = self.purchases.write().await;
        if let DeliveryEvent::QueueCleared { .. } = event {
            let mut changed = false;
            for purchase in purchases.iter_mut().filter(|p| {
                p.status == PurchaseStatus::Processing && p.delivery_task_id.is_some()
            }) {
                purchase.mark_failed("delivery queue cleared");
                changed = true;
            }
            return changed;
        }

        let Some(task_id) = event.task_id() else {
            return false;
        };
        let Some(purchase) = purchases
            .iter_mut()
            .find(|p| p.delivery_task_id == Some(task_id))
        else {
            return false;
        };

        let before = purchase.clone();
        match event {
            DeliveryEvent::Completed { task, .. } => {
                purchase.mark_delivered(task.completed_at.unwrap_or_else(Utc::now));
            }
            DeliveryEvent::Failed { error, .. } if purchase.status != PurchaseStatus::Completed => {
                purchase.mark_failed(error.clone());
            }
            DeliveryEvent::Retrying { error, .. }
                if purchase.status == PurchaseStatus::Processing =>
            {
                purchase.failure_reason = Some(error.clone());
            }
            DeliveryEvent::Cancelled(_) if purchase.status == PurchaseStatus::Processing => {
                purchase.mark_failed("delivery cancelled by operator");
            }
            DeliveryEvent::RetryRequested(_) if purchase.status == PurchaseStatus::Failed => {
                purchase.status = PurchaseStatus::Processing;
                purchase.failure_reason = None;
            }
            _ => {}
        }

        let changed = *purchase != before;
        if changed {
            debug!(purchase_id = %purchase.id, status = %purchase.status, "purchase updated from delivery event");
        }
        changed
    }

    /// Applies queue events to purchases until `cancel` fires.
    pub fn spawn_event_consumer(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let mut events = self.queue.subscribe();
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            orchestrator.apply_event(&event).await;
                        }
                        None => break,
                    },
                }
            }
            debug!("purchase event consumer stopped");
        })
    }

    fn item_for(&self, purchase: &Purchase) -> Result<&StoreItem, BlockshopError> {
        self.catalog
            .get(&purchase.item_id)
            .ok_or_else(|| BlockshopError::not_found("store item", &purchase.item_id))
    }

    async fn update(&self, id: PurchaseId, f: impl FnOnce(&mut Purchase)) {
        if let Some(purchase) = self.purchases.write().await.iter_mut().find(|p| p.id == id) {
            f(purchase);
        }
    }

    /// Queues `request` and links the task to the purchase.
    ///
    /// The purchase list stays locked until the link is made, so events for
    /// the new task cannot be applied before it.
    async fn enqueue_for(
        &self,
        id: PurchaseId,
        request: DeliveryRequest,
        priority: i32,
        failure_reason: Option<String>,
    ) {
        let mut purchases = self.purchases.write().await;
        let task = self.queue.enqueue_with_priority(request, priority).await;
        if let Some(purchase) = purchases.iter_mut().find(|p| p.id == id) {
            purchase.mark_queued(task);
            purchase.failure_reason = failure_reason;
        }
    }
}

fn delivery_request(purchase: &Purchase, commands: Vec<Command>) -> DeliveryRequest {
    DeliveryRequest {
        transaction_id: purchase.id.to_string(),
        player_id: purchase.player_id.clone(),
        player_username: purchase.player_username.clone(),
        item_id: purchase.item_id.clone(),
        commands,
    }
}

/// The command batch that delivers `item`.
///
/// Ranks, coin packs and kits use the ready-made batches; anything else, or
/// an item whose details do not fit its kind, runs its raw command lines.
pub fn delivery_batch(item: &StoreItem) -> DeliveryBatch {
    match item.kind {
        ItemKind::Rank => {
            if let Some(rank) = &item.metadata.rank {
                let mut batch = helpers::rank_upgrade(rank);
                let extras = item.commands.iter().filter(|line| !is_group_change(line));
                batch.commands.extend(extras.filter_map(|line| Command::parse_line(line)));
                return batch;
            }
        }
        ItemKind::Currency => {
            if let Some(amount) = item.metadata.amount {
                return helpers::give_coins(amount);
            }
        }
        ItemKind::ItemBundle => {
            if let Some(items) = kit_items(&item.commands) {
                return helpers::deliver_kit(&items, &item.name);
            }
        }
        ItemKind::Cosmetic => {}
    }
    DeliveryBatch {
        commands: item
            .commands
            .iter()
            .filter_map(|line| Command::parse_line(line))
            .collect(),
        priority: DEFAULT_PRIORITY,
    }
}

fn is_group_change(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    matches!(tokens.as_slice(), ["lp", "user", _, "parent", "set", ..])
}

/// `give {username} <item> <quantity>` lines as kit items; `None` if any line is not one.
fn kit_items(lines: &[String]) -> Option<Vec<KitItem>> {
    if lines.is_empty() {
        return None;
    }
    lines
        .iter()
        .map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["give", "{username}", item, quantity] => {
                    Some(KitItem::new(*item, quantity.parse().ok()?))
                }
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use blockshop_delivery::helpers::{COINS_PRIORITY, KIT_PRIORITY, RANK_PRIORITY};

    fn rendered(batch: &DeliveryBatch) -> Vec<String> {
        batch.commands.iter().map(Command::render).collect()
    }

    #[test]
    fn rank_items_use_the_rank_batch_plus_their_extras() {
        let catalog = Catalog::builtin();
        let batch = delivery_batch(catalog.get("vip-rank").unwrap());
        assert_eq!(batch.priority, RANK_PRIORITY);
        let lines = rendered(&batch);
        assert_eq!(lines[0], "lp user {username} parent set vip");
        assert_eq!(lines.iter().filter(|l| l.starts_with("lp ")).count(), 1);
        assert_eq!(lines[lines.len() - 2], "give {username} diamond 16");
        assert_eq!(lines[lines.len() - 1], "eco give {username} 5000");
    }

    #[test]
    fn currency_items_use_the_coins_batch() {
        let catalog = Catalog::builtin();
        let batch = delivery_batch(catalog.get("coins-5000").unwrap());
        assert_eq!(batch.priority, COINS_PRIORITY);
        assert_eq!(rendered(&batch)[0], "eco give {username} 5000");
    }

    #[test]
    fn kits_are_spread_out_and_confirmed() {
        let catalog = Catalog::builtin();
        let batch = delivery_batch(catalog.get("starter-kit").unwrap());
        assert_eq!(batch.priority, KIT_PRIORITY);
        assert_eq!(batch.commands.len(), 9);
        assert!((batch.commands[7].delay_seconds() - 0.7).abs() < 1e-9);
        assert_eq!(batch.commands[8].name(), "tellraw");
        assert!(batch.commands[8].arguments()[1].contains("Starter Kit has been delivered!"));
    }

    #[test]
    fn cosmetics_run_their_raw_lines() {
        let catalog = Catalog::builtin();
        let batch = delivery_batch(catalog.get("rainbow-trail").unwrap());
        assert_eq!(batch.priority, DEFAULT_PRIORITY);
        assert_eq!(rendered(&batch), vec!["trails give {username} rainbow"]);
        assert!(!batch.commands[0].retry_on_failure());
    }

    #[test]
    fn odd_kit_lines_fall_back_to_raw_commands() {
        let lines = vec![
            "give {username} stone 64".to_string(),
            "effect give {username} speed 60".to_string(),
        ];
        assert!(kit_items(&lines).is_none());
        assert!(kit_items(&[]).is_none());
        let items = kit_items(&lines[..1]).unwrap();
        assert_eq!(items, vec![KitItem::new("stone", 64)]);
    }
}
