//! Single-flight execution with an optional staleness TTL.
//!
//! Concurrent callers of [`SingleFlight::run`] share one pending future and
//! all receive a clone of its output. A flight older than the TTL is
//! abandoned and the next caller starts a fresh one; the abandoned future
//! keeps running for whoever is already awaiting it, but its completion no
//! longer touches the slot.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct Flight<T> {
    id: u64,
    started_at: Instant,
    future: Shared<BoxFuture<'static, T>>,
}

struct Slot<T> {
    next_id: u64,
    current: Option<Flight<T>>,
}

pub struct SingleFlight<T: Clone> {
    ttl: Option<Duration>,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A flight is shared until it completes, however long that takes.
    pub fn new() -> Self {
        Self {
            ttl: None,
            slot: Arc::new(Mutex::new(Slot {
                next_id: 0,
                current: None,
            })),
        }
    }

    /// A flight is shared for at most `ttl` after it started.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::new()
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().current.is_some()
    }

    /// Detach the pending flight, if any. Callers already awaiting it still
    /// get its output; the next caller starts a new one.
    pub fn abandon(&self) {
        if let Some(flight) = self.slot.lock().current.take() {
            debug!(flight_id = flight.id, "Abandoning flight");
        }
    }

    /// Join the current flight, or start one from `make`.
    ///
    /// `make` runs under the slot lock and must only construct the future.
    pub async fn run<F, Fut>(&self, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut slot = self.slot.lock();

            // Staleness is checked before joining, under the same lock.
            if let (Some(ttl), Some(flight)) = (self.ttl, slot.current.as_ref()) {
                if flight.started_at.elapsed() >= ttl {
                    debug!(
                        flight_id = flight.id,
                        ttl_ms = ttl.as_millis() as u64,
                        "Abandoning stale flight"
                    );
                    slot.current = None;
                }
            }

            match slot.current.as_ref() {
                Some(flight) => flight.future.clone(),
                None => {
                    let id = slot.next_id;
                    slot.next_id += 1;

                    let future = finish_flight(make(), Arc::downgrade(&self.slot), id)
                        .boxed()
                        .shared();
                    slot.current = Some(Flight {
                        id,
                        started_at: Instant::now(),
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        shared.await
    }
}

async fn finish_flight<T, Fut>(work: Fut, slot: Weak<Mutex<Slot<T>>>, id: u64) -> T
where
    Fut: Future<Output = T>,
{
    let output = work.await;
    if let Some(slot) = slot.upgrade() {
        let mut slot = slot.lock();
        if slot.current.as_ref().map(|f| f.id) == Some(id) {
            slot.current = None;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_run() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let flight = flight.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(|| async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        42
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!flight.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_flight_is_not_reused() {
        let flight = SingleFlight::<u32>::new();
        assert_eq!(flight.run(|| async { 1 }).await, 1);
        assert_eq!(flight.run(|| async { 2 }).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_flight_is_replaced_after_ttl() {
        let flight = Arc::new(SingleFlight::<&'static str>::with_ttl(Duration::from_secs(7)));

        let hung = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run(|| async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        "stale"
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(flight.is_in_flight());

        tokio::time::advance(Duration::from_millis(6_999)).await;
        let joined = flight.run(|| async { "fresh-too-early" });
        let early = tokio::time::timeout(Duration::from_millis(1), joined).await;
        assert!(early.is_err(), "caller within the TTL must join the pending flight");

        tokio::time::advance(Duration::from_millis(10)).await;
        assert_eq!(flight.run(|| async { "fresh" }).await, "fresh");

        // The abandoned flight still resolves for its own waiter.
        assert_eq!(hung.await.unwrap(), "stale");
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_flight_is_not_joined() {
        let flight = Arc::new(SingleFlight::<&'static str>::new());

        let pending = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run(|| async {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        "old"
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        flight.abandon();
        assert!(!flight.is_in_flight());
        assert_eq!(flight.run(|| async { "new" }).await, "new");
        assert_eq!(pending.await.unwrap(), "old");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_completion_does_not_clear_new_flight() {
        let flight = Arc::new(SingleFlight::<u8>::with_ttl(Duration::from_secs(1)));

        let first = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run(|| async {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        1
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(1_500)).await;

        let second = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run(|| async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        2
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        assert_eq!(first.await.unwrap(), 1);
        assert!(flight.is_in_flight(), "second flight must survive the first finishing");
        assert_eq!(second.await.unwrap(), 2);
        assert!(!flight.is_in_flight());
    }
}
