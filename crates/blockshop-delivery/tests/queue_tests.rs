// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery queue behaviour against a scripted console.

use std::sync::Arc;
use std::time::Duration;

use blockshop_config::OfflinePolicy;
use blockshop_core::{Command, TaskId, TaskStatus, TransportError};
use blockshop_delivery::{DeliveryEvent, DeliveryQueue, DeliveryRequest, DeliverySettings};
use blockshop_rcon::{CommandDispatcher, DispatcherSettings};
use blockshop_test_utils::ScriptedTransport;
use chrono::{TimeDelta, Utc};

fn settings() -> DeliverySettings {
    DeliverySettings {
        max_attempts: 3,
        retry_delay: Duration::from_secs(30),
        batch_size: 10,
        offline_policy: OfflinePolicy::Ignore,
    }
}

async fn setup(settings: DeliverySettings) -> (Arc<ScriptedTransport>, Arc<DeliveryQueue>) {
    let transport = Arc::new(ScriptedTransport::new());
    let dispatcher = Arc::new(CommandDispatcher::new(
        transport.clone(),
        DispatcherSettings::default(),
    ));
    assert!(dispatcher.connect().await);
    let queue = Arc::new(DeliveryQueue::new(dispatcher, settings));
    (transport, queue)
}

fn request(transaction_id: &str, player: &str, commands: Vec<Command>) -> DeliveryRequest {
    DeliveryRequest {
        transaction_id: transaction_id.to_string(),
        player_id: format!("uuid-{player}"),
        player_username: player.to_string(),
        item_id: "diamond".to_string(),
        commands,
    }
}

fn diamond_batch() -> Vec<Command> {
    vec![
        Command::new("give", ["{username}", "diamond", "1"]).with_retry(true),
        Command::new("broadcast", ["{username}", "got", "diamond"]).with_delay(1.0),
    ]
}

#[tokio::test(start_paused = true)]
async fn diamond_delivery_runs_in_order_and_completes() {
    let (transport, queue) = setup(settings()).await;
    let mut events = queue.subscribe();

    let id = queue.enqueue(request("tx-1", "Steve", diamond_batch())).await;
    assert_eq!(queue.get_queue_status().await.queued, 1);

    assert_eq!(queue.process_due(Utc::now()).await, 1);

    let timed = transport.timed_lines().await;
    let lines: Vec<&str> = timed.iter().map(|(_, line)| line.as_str()).collect();
    assert_eq!(lines[0], "give Steve diamond 1");
    assert_eq!(lines[1], "broadcast Steve got diamond");
    assert!(lines[2].starts_with("tellraw Steve "));
    assert!(lines[2].contains("Your purchase (diamond) has been delivered!"));
    assert_eq!(lines.len(), 3);

    let gap = timed[1].0 - timed[0].0;
    assert!(gap >= Duration::from_secs(1));
    assert!(gap < Duration::from_millis(1100));

    assert!(queue.get_task(id).await.is_none());
    assert_eq!(queue.get_queue_status().await.total, 0);

    assert!(matches!(events.try_recv(), Ok(DeliveryEvent::Queued(task)) if task.id == id));
    match events.try_recv() {
        Ok(DeliveryEvent::Completed { task, responses }) => {
            assert_eq!(task.id, id);
            assert_eq!(task.status, TaskStatus::Completed);
            assert_eq!(task.attempts, 1);
            assert!(task.processed_at.is_some());
            assert!(task.completed_at.is_some());
            assert_eq!(
                responses,
                vec!["Gave 1 diamond to Steve", "Broadcasted: Steve got diamond"]
            );
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn always_failing_console_exhausts_attempts_with_linear_backoff() {
    let (transport, queue) = setup(settings()).await;
    transport
        .fail_all(TransportError::Rejected("server says no".into()))
        .await;
    let id = queue.enqueue(request("tx-2", "Steve", diamond_batch())).await;

    // Each attempt spends the broadcast's one second delay before aborting.
    let t0 = Utc::now();
    assert_eq!(queue.process_due(t0).await, 1);
    let task = queue.get_task(id).await.unwrap();
    assert_eq!(task.attempts, 1);
    assert_eq!(task.status, TaskStatus::Queued);
    let t1 = task.next_attempt_at.unwrap();
    assert!(t1 >= t0 + TimeDelta::seconds(31));
    assert!(t1 < t0 + TimeDelta::seconds(32));
    assert!(task.last_error.is_some());

    // Not due yet.
    assert_eq!(queue.process_due(t0 + TimeDelta::seconds(10)).await, 0);

    assert_eq!(queue.process_due(t1).await, 1);
    let task = queue.get_task(id).await.unwrap();
    assert_eq!(task.attempts, 2);
    let t2 = task.next_attempt_at.unwrap();
    assert!(t2 >= t1 + TimeDelta::seconds(61));
    assert!(t2 < t1 + TimeDelta::seconds(62));

    assert_eq!(queue.process_due(t2).await, 1);
    let task = queue.get_task(id).await.unwrap();
    assert_eq!(task.attempts, 3);
    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.last_error.unwrap();
    assert!(error.contains("broadcast Steve got diamond"), "{error}");

    // Terminal: never picked up again.
    assert_eq!(queue.process_due(t2 + TimeDelta::days(1)).await, 0);
    assert_eq!(queue.get_queue_status().await.failed, 1);

    let lines = transport.lines().await;
    let tellraws: Vec<&String> = lines.iter().filter(|l| l.starts_with("tellraw")).collect();
    assert_eq!(tellraws.len(), 1);
    assert!(tellraws[0].contains("Delivery failed for diamond"));
    assert_eq!(lines.iter().filter(|l| l.starts_with("give")).count(), 3);
}

#[tokio::test(start_paused = true)]
async fn higher_priority_is_selected_first() {
    let (transport, queue) = setup(DeliverySettings {
        batch_size: 1,
        ..settings()
    })
    .await;
    queue
        .enqueue_with_priority(request("tx-low", "Alex", vec![Command::new("say", ["low"])]), 1)
        .await;
    queue
        .enqueue_with_priority(request("tx-high", "Alex", vec![Command::new("say", ["high"])]), 10)
        .await;

    assert_eq!(queue.process_due(Utc::now()).await, 1);
    assert_eq!(transport.lines().await[0], "say high");
    assert_eq!(queue.get_queue_status().await.queued, 1);

    assert_eq!(queue.process_due(Utc::now()).await, 1);
    assert!(transport.lines().await.contains(&"say low".to_string()));
}

#[tokio::test(start_paused = true)]
async fn non_retryable_failure_skips_the_rest_of_the_batch() {
    let (transport, queue) = setup(settings()).await;
    transport
        .fail_verb("give", TransportError::Rejected("unknown item".into()))
        .await;
    let commands = vec![
        Command::new("give", ["{username}", "diamond", "1"]),
        Command::new("broadcast", ["{username}", "got", "diamond"]),
    ];
    let id = queue.enqueue(request("tx-3", "Steve", commands)).await;

    queue.process_due(Utc::now()).await;

    assert_eq!(transport.lines().await, vec!["give Steve diamond 1"]);
    let task = queue.get_task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(task.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn retryable_failure_is_recorded_and_the_batch_continues() {
    let (transport, queue) = setup(settings()).await;
    transport
        .fail_verb("give", TransportError::Rejected("inventory full".into()))
        .await;
    let mut events = queue.subscribe();
    queue.enqueue(request("tx-4", "Steve", diamond_batch())).await;

    queue.process_due(Utc::now()).await;

    let lines = transport.lines().await;
    assert_eq!(lines[0], "give Steve diamond 1");
    assert_eq!(lines[1], "broadcast Steve got diamond");
    let _queued = events.try_recv();
    match events.try_recv() {
        Ok(DeliveryEvent::Completed { responses, .. }) => {
            assert!(responses[0].starts_with("ERROR: "));
            assert!(responses[0].contains("inventory full"));
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_reports_missing_tasks_and_removes_existing_ones() {
    let (_transport, queue) = setup(settings()).await;
    let id = queue.enqueue(request("tx-5", "Steve", diamond_batch())).await;

    assert!(!queue.cancel_delivery(TaskId::new()).await);
    assert_eq!(queue.get_queue_status().await.total, 1);

    assert!(queue.cancel_delivery(id).await);
    assert_eq!(queue.get_queue_status().await.total, 0);
    assert!(!queue.cancel_delivery(id).await);
}

#[tokio::test(start_paused = true)]
async fn retry_resets_a_failed_task_for_the_next_tick() {
    let (transport, queue) = setup(DeliverySettings {
        max_attempts: 1,
        ..settings()
    })
    .await;
    transport
        .fail_verb("broadcast", TransportError::Rejected("muted".into()))
        .await;
    let id = queue.enqueue(request("tx-6", "Steve", diamond_batch())).await;

    queue.process_due(Utc::now()).await;
    assert_eq!(queue.get_task(id).await.unwrap().status, TaskStatus::Failed);

    assert!(!queue.retry_delivery(TaskId::new()).await);
    assert!(queue.retry_delivery(id).await);
    let task = queue.get_task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(task.attempts, 0);
    assert!(task.last_error.is_none());

    transport.clear_failures().await;
    assert_eq!(queue.process_due(Utc::now()).await, 1);
    assert!(queue.get_task(id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn clear_queue_removes_everything() {
    let (_transport, queue) = setup(settings()).await;
    queue.enqueue(request("tx-7", "Steve", diamond_batch())).await;
    queue.enqueue(request("tx-8", "Alex", diamond_batch())).await;

    assert_eq!(queue.clear_queue().await, 2);
    assert!(queue.get_queue_items().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_batches_succeed_without_touching_the_console() {
    let (transport, queue) = setup(settings()).await;

    let outcome = queue
        .deliver_immediately(request("tx-9", "Steve", Vec::new()))
        .await;
    assert!(outcome.success);
    assert!(outcome.responses.is_empty());
    assert!(outcome.error.is_none());

    let id = queue.enqueue(request("tx-10", "Steve", Vec::new())).await;
    assert_eq!(queue.process_due(Utc::now()).await, 1);
    assert!(queue.get_task(id).await.is_none());

    assert!(transport.lines().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn immediate_delivery_reports_the_outcome_without_queueing() {
    let (transport, queue) = setup(settings()).await;

    let outcome = queue
        .deliver_immediately(request("tx-11", "Steve", diamond_batch()))
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.responses.len(), 2);
    assert_eq!(queue.get_queue_status().await.total, 0);

    transport
        .fail_verb("give", TransportError::Rejected("unknown item".into()))
        .await;
    let commands = vec![Command::new("give", ["{username}", "diamond", "1"])];
    let outcome = queue
        .deliver_immediately(request("tx-12", "Steve", commands))
        .await;
    assert!(!outcome.success);
    let error = outcome.error.unwrap();
    assert!(error.contains("give Steve diamond 1"), "{error}");
    assert!(error.contains("unknown item"), "{error}");

    let last = transport.lines().await.pop().unwrap();
    assert!(last.contains("Delivery failed for diamond"));
}

#[tokio::test(start_paused = true)]
async fn defer_policy_postpones_offline_players_without_spending_attempts() {
    let (transport, queue) = setup(DeliverySettings {
        offline_policy: OfflinePolicy::Defer,
        ..settings()
    })
    .await;
    transport
        .respond("list", "There are 1 of a max of 20 players online: Alex")
        .await;
    let mut events = queue.subscribe();
    let id = queue.enqueue(request("tx-13", "Steve", diamond_batch())).await;

    let t0 = Utc::now();
    queue.process_due(t0).await;
    let task = queue.get_task(id).await.unwrap();
    assert_eq!(task.attempts, 0);
    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(task.next_attempt_at, Some(t0 + TimeDelta::seconds(30)));
    assert_eq!(transport.lines().await, vec!["list"]);

    let _queued = events.try_recv();
    assert!(matches!(events.try_recv(), Ok(DeliveryEvent::Deferred { .. })));

    transport
        .respond("list", "There are 2 of a max of 20 players online: Alex, steve")
        .await;
    queue.process_due(t0 + TimeDelta::seconds(30)).await;
    assert!(queue.get_task(id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn player_list_punctuation_does_not_hide_online_players() {
    let (transport, queue) = setup(DeliverySettings {
        offline_policy: OfflinePolicy::Defer,
        ..settings()
    })
    .await;
    transport
        .respond("list", "There are 2 of a max of 20 players online: Alex, Steve...")
        .await;
    let mut events = queue.subscribe();
    let id = queue.enqueue(request("tx-30", "Steve", diamond_batch())).await;

    queue.process_due(Utc::now()).await;

    assert!(queue.get_task(id).await.is_none());
    let lines = transport.lines().await;
    assert_eq!(lines[0], "list");
    assert_eq!(lines[1], "give Steve diamond 1");
    let _queued = events.try_recv();
    assert!(matches!(events.try_recv(), Ok(DeliveryEvent::Completed { .. })));
}

#[tokio::test(start_paused = true)]
async fn slow_batch_pushes_later_timestamps_and_backoff() {
    let (transport, queue) = setup(DeliverySettings {
        retry_delay: Duration::from_secs(5),
        ..settings()
    })
    .await;
    transport
        .fail_verb("give", TransportError::Rejected("unknown item".into()))
        .await;
    let mut events = queue.subscribe();
    let slow = queue
        .enqueue_with_priority(
            request(
                "tx-31",
                "Steve",
                vec![
                    Command::new("say", ["a"]).with_delay(20.0).with_retry(true),
                    Command::new("give", ["{username}", "diamond", "1"]),
                ],
            ),
            2,
        )
        .await;
    let quick = queue
        .enqueue_with_priority(
            request("tx-32", "Alex", vec![Command::new("say", ["b"])]),
            1,
        )
        .await;

    let t0 = Utc::now();
    assert_eq!(queue.process_due(t0).await, 2);

    let retrying = queue.get_task(slow).await.unwrap();
    assert_eq!(retrying.attempts, 1);
    assert_eq!(retrying.status, TaskStatus::Queued);
    assert!(retrying.processed_at.unwrap() < t0 + TimeDelta::seconds(1));
    // Backoff counts from the end of the attempt, not from the tick.
    assert!(retrying.next_attempt_at.unwrap() >= t0 + TimeDelta::seconds(25));
    assert_eq!(queue.process_due(t0 + TimeDelta::seconds(20)).await, 0);

    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        if let DeliveryEvent::Completed { task, .. } = event {
            completed = Some(task);
        }
    }
    let done = completed.unwrap();
    assert_eq!(done.id, quick);
    let processed_at = done.processed_at.unwrap();
    assert!(processed_at >= t0 + TimeDelta::seconds(20));
    assert!(done.completed_at.unwrap() >= processed_at);
}

#[tokio::test(start_paused = true)]
async fn warn_policy_delivers_to_offline_players() {
    let (transport, queue) = setup(DeliverySettings {
        offline_policy: OfflinePolicy::Warn,
        ..settings()
    })
    .await;
    transport
        .respond("list", "There are 0 of a max of 20 players online:")
        .await;
    let id = queue.enqueue(request("tx-14", "Steve", diamond_batch())).await;

    queue.process_due(Utc::now()).await;

    let lines = transport.lines().await;
    assert_eq!(lines[0], "list");
    assert_eq!(lines[1], "give Steve diamond 1");
    assert!(queue.get_task(id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn cancelling_an_in_flight_task_discards_its_result() {
    let (_transport, queue) = setup(settings()).await;
    let mut events = queue.subscribe();
    let commands = vec![
        Command::new("say", ["one"]),
        Command::new("say", ["two"]).with_delay(5.0),
    ];
    let id = queue.enqueue(request("tx-15", "Steve", commands)).await;

    let worker = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.process_due(Utc::now()).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(queue.get_task(id).await.unwrap().status, TaskStatus::Processing);

    // A tick that overlaps the running one does nothing.
    assert_eq!(queue.process_due(Utc::now()).await, 0);

    assert!(queue.cancel_delivery(id).await);
    assert_eq!(worker.await.unwrap(), 1);
    assert!(queue.get_task(id).await.is_none());

    assert!(matches!(events.try_recv(), Ok(DeliveryEvent::Queued(_))));
    assert!(matches!(events.try_recv(), Ok(DeliveryEvent::Cancelled(_))));
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn retry_is_refused_while_an_attempt_is_running() {
    let (_transport, queue) = setup(settings()).await;
    let commands = vec![Command::new("say", ["slow"]).with_delay(5.0)];
    let id = queue.enqueue(request("tx-16", "Steve", commands)).await;

    let worker = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.process_due(Utc::now()).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!queue.retry_delivery(id).await);
    worker.await.unwrap();
}
