// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery lifecycle events and their fan-out to subscribers.

use std::sync::{Mutex, PoisonError};

use blockshop_core::{DeliveryOutcome, DeliveryTask, TaskId};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Something that happened to a delivery.
///
/// Task-carrying variants hold a snapshot taken at the moment of the event.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    Queued(DeliveryTask),
    Completed {
        task: DeliveryTask,
        responses: Vec<String>,
    },
    /// The attempt failed and the task is scheduled again.
    Retrying {
        task: DeliveryTask,
        error: String,
    },
    /// Attempts are exhausted; the task stays in the queue as `failed`.
    Failed {
        task: DeliveryTask,
        error: String,
    },
    /// The player was offline and the attempt was postponed without being counted.
    Deferred {
        task: DeliveryTask,
        until: DateTime<Utc>,
    },
    Cancelled(DeliveryTask),
    RetryRequested(DeliveryTask),
    QueueCleared {
        removed: usize,
    },
    ImmediateCompleted {
        transaction_id: String,
        item_id: String,
        outcome: DeliveryOutcome,
    },
    ImmediateFailed {
        transaction_id: String,
        item_id: String,
        outcome: DeliveryOutcome,
    },
}

impl DeliveryEvent {
    /// The queued task this event concerns, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Queued(task)
            | Self::Cancelled(task)
            | Self::RetryRequested(task)
            | Self::Completed { task, .. }
            | Self::Retrying { task, .. }
            | Self::Failed { task, .. }
            | Self::Deferred { task, .. } => Some(task.id),
            Self::QueueCleared { .. }
            | Self::ImmediateCompleted { .. }
            | Self::ImmediateFailed { .. } => None,
        }
    }
}

/// Fan-out of events, one unbounded channel per subscriber.
///
/// Nothing is dropped for a live subscriber; closed receivers are pruned on
/// the next publish.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<DeliveryEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DeliveryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, event: DeliveryEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
