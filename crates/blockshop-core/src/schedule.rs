// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic background jobs with an explicit stop handle.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawns `job` every `period` until `cancel` fires.
///
/// The first run happens one full period after spawning. Each run is awaited
/// before the next tick is taken, so runs never overlap; a run that outlasts
/// the period delays the following tick instead of queueing a burst.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(job = name, period_ms = period.as_millis() as u64, "periodic job started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = job() => {}
                    }
                }
            }
        }

        info!(job = name, "periodic job stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_once_per_period_after_first_delay() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = runs.clone();
        let handle = spawn_periodic("count", Duration::from_secs(5), cancel.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(10_200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_job_never_overlaps() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let (a, m) = (active.clone(), max_seen.clone());
        let handle = spawn_periodic("slow", Duration::from_secs(1), cancel.clone(), move || {
            let (a, m) = (a.clone(), m.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                time::sleep(Duration::from_secs(3)).await;
                a.fetch_sub(1, Ordering::SeqCst);
            }
        });

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_running_job() {
        let cancel = CancellationToken::new();
        let handle = spawn_periodic("stuck", Duration::from_millis(10), cancel.clone(), || async {
            std::future::pending::<()>().await;
        });

        time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
