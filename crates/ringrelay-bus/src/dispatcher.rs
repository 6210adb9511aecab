//! Keyed, typed, in-process pub/sub.

use futures::FutureExt;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, warn};

use crate::handler::{Handler, Watcher};

/// Counters for one dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchMetrics {
    /// `emit` calls that reached at least one subscription.
    pub emitted: u64,
    /// Handler invocations that returned `Ok`.
    pub delivered: u64,
    pub handler_errors: u64,
    pub handler_panics: u64,
    /// `emit` calls for a key with no subscription.
    pub unrouted: u64,
}

enum Lane<M: Send + 'static> {
    Serial(mpsc::UnboundedSender<M>),
    Concurrent(Arc<dyn Handler<M>>),
}

struct Shared {
    name: &'static str,
    metrics: Mutex<DispatchMetrics>,
    /// Messages enqueued or running and not yet finished.
    pending: AtomicUsize,
    idle: Notify,
}

impl Shared {
    fn metrics(&self) -> std::sync::MutexGuard<'_, DispatchMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn invoke<M: Send + 'static>(&self, key: &str, handler: &Arc<dyn Handler<M>>, msg: M) {
        match AssertUnwindSafe(handler.handle(msg)).catch_unwind().await {
            Ok(Ok(())) => self.metrics().delivered += 1,
            Ok(Err(e)) => {
                warn!(bus = self.name, key, "handler error: {e}");
                self.metrics().handler_errors += 1;
            }
            Err(_) => {
                error!(bus = self.name, key, "handler panicked");
                self.metrics().handler_panics += 1;
            }
        }
        self.done();
    }

    fn done(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Routes each emitted message to every subscription registered for its key.
///
/// A serial subscription owns an unbounded FIFO queue drained by a single
/// Tokio task, so its handler sees messages one at a time in emit order.
/// A concurrent subscription spawns a task per message. Different keys never
/// wait on each other.
///
/// `on` and `emit` spawn tasks and must be called inside a Tokio runtime.
pub struct Dispatcher<K, M: Send + 'static> {
    lanes: RwLock<HashMap<K, Vec<Lane<M>>>>,
    shared: Arc<Shared>,
}

impl<K, M> Dispatcher<K, M>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    M: Clone + Send + 'static,
{
    /// `name` labels this bus in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            lanes: RwLock::new(HashMap::new()),
            shared: Arc::new(Shared {
                name,
                metrics: Mutex::new(DispatchMetrics::default()),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Register a subscription for `key`.
    pub fn on(&self, key: K, watcher: Watcher<M>) {
        let lane = if watcher.concurrent {
            Lane::Concurrent(watcher.handler)
        } else {
            let (tx, mut rx) = mpsc::unbounded_channel::<M>();
            let shared = Arc::clone(&self.shared);
            let handler = watcher.handler;
            let label = format!("{key:?}");
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    shared.invoke(&label, &handler, msg).await;
                }
                debug!(bus = shared.name, key = %label, "lane closed");
            });
            Lane::Serial(tx)
        };
        self.lanes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push(lane);
    }

    /// Queue `msg` for every subscription of `key` and return how many
    /// subscriptions it reached. Never waits for a handler.
    pub fn emit(&self, key: &K, msg: M) -> usize {
        let lanes = self.lanes.read().unwrap_or_else(PoisonError::into_inner);
        let Some(subs) = lanes.get(key).filter(|s| !s.is_empty()) else {
            debug!(bus = self.shared.name, key = ?key, "no subscribers");
            self.shared.metrics().unrouted += 1;
            return 0;
        };

        let mut reached = 0;
        for lane in subs {
            self.shared.pending.fetch_add(1, Ordering::AcqRel);
            match lane {
                Lane::Serial(tx) => {
                    if tx.send(msg.clone()).is_err() {
                        warn!(bus = self.shared.name, key = ?key, "lane worker gone");
                        self.shared.done();
                        continue;
                    }
                }
                Lane::Concurrent(handler) => {
                    let handler = Arc::clone(handler);
                    let shared = Arc::clone(&self.shared);
                    let label = format!("{key:?}");
                    let msg = msg.clone();
                    tokio::spawn(async move {
                        shared.invoke(&label, &handler, msg).await;
                    });
                }
            }
            reached += 1;
        }
        self.shared.metrics().emitted += 1;
        reached
    }

    /// Wait until every message emitted so far has been handled, including
    /// messages emitted by handlers while waiting.
    pub async fn flush(&self) {
        loop {
            let idle = self.shared.idle.notified();
            if self.shared.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    pub fn metrics(&self) -> DispatchMetrics {
        self.shared.metrics().clone()
    }

    /// Keys with at least one subscription.
    pub fn topics(&self) -> Vec<K> {
        self.lanes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.lanes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, Vec::len)
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }
}
