//! Subscriber side of the bus: the `Handler` trait, `Watcher` subscription
//! options and a couple of ready-made handlers.

use async_trait::async_trait;
use ringrelay_core::error::HandlerError;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives messages for one subscription.
///
/// Returned errors are logged and counted by the dispatcher; they never stop
/// the subscription.
#[async_trait]
pub trait Handler<M: Send + 'static>: Send + Sync {
    async fn handle(&self, msg: M) -> Result<(), HandlerError>;
}

/// A subscription request.
pub struct Watcher<M: Send + 'static> {
    /// `false`: messages are handled one at a time in emit order.
    /// `true`: every message gets its own task and handlers may overlap.
    pub concurrent: bool,
    pub handler: Arc<dyn Handler<M>>,
}

impl<M: Send + 'static> Watcher<M> {
    pub fn serial(handler: Arc<dyn Handler<M>>) -> Self {
        Self {
            concurrent: false,
            handler,
        }
    }

    pub fn concurrent(handler: Arc<dyn Handler<M>>) -> Self {
        Self {
            concurrent: true,
            handler,
        }
    }
}

/// Adapts a synchronous closure into a `Handler`.
pub struct FnHandler<M, F> {
    f: F,
    _msg: PhantomData<fn(M)>,
}

impl<M, F> FnHandler<M, F>
where
    F: Fn(M) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _msg: PhantomData,
        }
    }
}

#[async_trait]
impl<M, F> Handler<M> for FnHandler<M, F>
where
    M: Send + 'static,
    F: Fn(M) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, msg: M) -> Result<(), HandlerError> {
        (self.f)(msg)
    }
}

/// Collects every message it receives. Clones share the same buffer.
pub struct Recorder<M> {
    seen: Arc<Mutex<Vec<M>>>,
}

impl<M> Clone for Recorder<M> {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<M> Default for Recorder<M> {
    fn default() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<M: Clone> Recorder<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `msg` directly, without going through a dispatcher.
    pub fn record(&self, msg: M) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg);
    }

    /// Everything recorded so far, in arrival order.
    pub fn messages(&self) -> Vec<M> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[async_trait]
impl<M: Clone + Send + 'static> Handler<M> for Recorder<M> {
    async fn handle(&self, msg: M) -> Result<(), HandlerError> {
        self.record(msg);
        Ok(())
    }
}

impl<K, M> Recorder<(K, M)>
where
    K: Clone + Send + Sync + 'static,
    M: Clone + Send + 'static,
{
    /// A handler that records `(key, msg)` into this recorder, so one buffer
    /// can observe several keys in a single arrival order.
    pub fn tagged(&self, key: K) -> Tagged<K, M> {
        Tagged {
            key,
            recorder: self.clone(),
        }
    }
}

/// See [`Recorder::tagged`].
pub struct Tagged<K, M> {
    key: K,
    recorder: Recorder<(K, M)>,
}

#[async_trait]
impl<K, M> Handler<M> for Tagged<K, M>
where
    K: Clone + Send + Sync + 'static,
    M: Clone + Send + 'static,
{
    async fn handle(&self, msg: M) -> Result<(), HandlerError> {
        self.recorder.record((self.key.clone(), msg));
        Ok(())
    }
}
