// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `blockshop serve` command.
//!
//! Composition root: builds the console transport, dispatcher, delivery
//! queue, purchase orchestrator and gateway from configuration, runs their
//! background workers, and tears everything down on shutdown.

use std::sync::Arc;

use blockshop_config::BlockshopConfig;
use blockshop_core::{BlockshopError, ConsoleTransport};
use blockshop_delivery::{DeliveryQueue, DeliverySettings};
use blockshop_gateway::{AuthConfig, GatewayState, ServerConfig};
use blockshop_rcon::{CommandDispatcher, DispatcherSettings, SimulatedTransport};
use blockshop_store::{Catalog, PurchaseOrchestrator, StoreSettings};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::shutdown;

/// Long-lived services shared by the workers and the gateway.
pub struct Services {
    pub dispatcher: Arc<CommandDispatcher>,
    pub queue: Arc<DeliveryQueue>,
    pub orchestrator: Arc<PurchaseOrchestrator>,
}

impl Services {
    pub fn build(
        config: &BlockshopConfig,
        transport: Arc<dyn ConsoleTransport>,
    ) -> Result<Self, BlockshopError> {
        let catalog = Catalog::from_config(&config.store)?;
        info!(items = catalog.len(), "store catalog loaded");

        let dispatcher = Arc::new(CommandDispatcher::new(
            transport,
            DispatcherSettings::from(&config.rcon),
        ));
        let queue = Arc::new(DeliveryQueue::new(
            Arc::clone(&dispatcher),
            DeliverySettings::from(&config.delivery),
        ));
        let orchestrator = Arc::new(PurchaseOrchestrator::new(
            catalog,
            Arc::clone(&queue),
            StoreSettings::from(&config.store),
        ));
        Ok(Self {
            dispatcher,
            queue,
            orchestrator,
        })
    }

    /// Starts the dispatcher worker, the delivery tick and the purchase event consumer.
    pub fn spawn_workers(
        &self,
        config: &BlockshopConfig,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let mut workers = vec![
            tokio::spawn(Arc::clone(&self.dispatcher).run(cancel.clone())),
            self.orchestrator.spawn_event_consumer(cancel.clone()),
        ];
        if config.delivery.enabled {
            let period = config.delivery.processing_interval();
            workers.push(self.queue.spawn_processing(period, cancel.clone()));
            info!(
                interval_secs = period.as_secs(),
                batch_size = config.delivery.batch_size,
                "delivery queue processing started"
            );
        } else {
            warn!("delivery processing disabled, queued deliveries will not run");
        }
        workers
    }
}

/// The console transport to run against.
///
/// Only the simulated console is built in; the wire protocol client plugs in
/// through `ConsoleTransport`.
fn build_transport(config: &BlockshopConfig) -> Arc<dyn ConsoleTransport> {
    warn!(
        host = %config.rcon.host,
        port = config.rcon.port,
        failure_rate = config.rcon.simulated_failure_rate,
        "using the simulated console transport"
    );
    Arc::new(SimulatedTransport::new(config.rcon.simulated_failure_rate))
}

/// Runs the `blockshop serve` command until a shutdown signal arrives.
pub async fn run_serve(config: BlockshopConfig) -> Result<(), BlockshopError> {
    init_tracing(&config.server.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting blockshop serve");

    let services = Services::build(&config, build_transport(&config))?;
    let cancel = shutdown::install_signal_handler();
    let workers = services.spawn_workers(&config, &cancel);

    let result = if config.gateway.enabled {
        let state = GatewayState::new(
            Arc::clone(&services.orchestrator),
            Arc::clone(&services.dispatcher),
            AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
        );
        let server_config = ServerConfig::from(&config.gateway);
        let served = blockshop_gateway::start_server(&server_config, state, cancel.clone()).await;
        if let Err(e) = &served {
            error!(error = %e, "gateway stopped with an error, shutting down");
            cancel.cancel();
        }
        served
    } else {
        info!("gateway disabled");
        cancel.cancelled().await;
        Ok(())
    };

    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "background worker ended abnormally");
        }
    }
    if let Err(e) = services.dispatcher.shutdown().await {
        warn!(error = %e, "console shutdown failed");
    }

    let status = services.queue.get_queue_status().await;
    info!(
        queued = status.queued,
        failed = status.failed,
        "blockshop serve shutdown complete"
    );
    result
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("blockshop={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
