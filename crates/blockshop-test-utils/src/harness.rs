// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end delivery tests.
//!
//! `TestHarness` assembles the dispatcher, delivery queue and purchase
//! orchestrator over a [`ScriptedTransport`]. No background workers are
//! started: tests drive the queue with [`TestHarness::tick`].

use std::sync::Arc;

use blockshop_config::OfflinePolicy;
use blockshop_core::BlockshopError;
use blockshop_delivery::{DeliveryQueue, DeliverySettings};
use blockshop_rcon::{CommandDispatcher, DispatcherSettings};
use blockshop_store::{Catalog, PurchaseOrchestrator, StoreSettings};
use chrono::{DateTime, Utc};

use crate::scripted_transport::ScriptedTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    dispatcher: DispatcherSettings,
    delivery: DeliverySettings,
    store: StoreSettings,
    catalog: Catalog,
    connect: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            dispatcher: DispatcherSettings::default(),
            // Tests script `list` themselves when they care about presence.
            delivery: DeliverySettings {
                offline_policy: OfflinePolicy::Ignore,
                ..DeliverySettings::default()
            },
            store: StoreSettings::default(),
            catalog: Catalog::builtin(),
            connect: true,
        }
    }

    pub fn with_dispatcher_settings(mut self, settings: DispatcherSettings) -> Self {
        self.dispatcher = settings;
        self
    }

    pub fn with_delivery_settings(mut self, settings: DeliverySettings) -> Self {
        self.delivery = settings;
        self
    }

    pub fn with_store_settings(mut self, settings: StoreSettings) -> Self {
        self.store = settings;
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Leave the console link down after building.
    pub fn disconnected(mut self) -> Self {
        self.connect = false;
        self
    }

    /// Build the harness, connecting the dispatcher unless told otherwise.
    pub async fn build(self) -> Result<TestHarness, BlockshopError> {
        let transport = Arc::new(ScriptedTransport::new());
        let dispatcher = Arc::new(CommandDispatcher::new(transport.clone(), self.dispatcher));
        if self.connect && !dispatcher.connect().await {
            return Err(BlockshopError::NotConnected {
                reason: "scripted console refused the initial connection".into(),
            });
        }

        let queue = Arc::new(DeliveryQueue::new(dispatcher.clone(), self.delivery));
        let orchestrator = Arc::new(PurchaseOrchestrator::new(
            self.catalog,
            queue.clone(),
            self.store,
        ));

        Ok(TestHarness {
            transport,
            dispatcher,
            queue,
            orchestrator,
        })
    }
}

/// A fully wired delivery stack over a scripted console.
pub struct TestHarness {
    pub transport: Arc<ScriptedTransport>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub queue: Arc<DeliveryQueue>,
    pub orchestrator: Arc<PurchaseOrchestrator>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// One delivery tick at the current wall-clock time.
    pub async fn tick(&self) -> usize {
        self.queue.process_due(Utc::now()).await
    }

    pub async fn tick_at(&self, now: DateTime<Utc>) -> usize {
        self.queue.process_due(now).await
    }

    /// Lines sent to the console so far, excluding chat notifications.
    pub async fn console_lines(&self) -> Vec<String> {
        self.transport
            .lines()
            .await
            .into_iter()
            .filter(|line| !line.starts_with("tellraw "))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn builds_a_connected_stack() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.dispatcher.get_connection_status());
        assert_eq!(harness.transport.connect_calls().await, 1);
        assert_eq!(harness.orchestrator.catalog().len(), 8);
        assert_eq!(harness.tick().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_harness_skips_the_initial_connect() {
        let harness = TestHarness::builder().disconnected().build().await.unwrap();
        assert!(!harness.dispatcher.get_connection_status());
        assert_eq!(harness.transport.connect_calls().await, 0);
    }
}
