//! # ringrelay-bus
//!
//! Typed in-process pub/sub. The relay runs two instances: an inbound bus
//! keyed by signature hex carrying raw payloads to their decoders, and an
//! outbound bus keyed by `Topic` carrying domain events to consumers.
//!
//! # Usage
//! ```no_run
//! # async fn example() {
//! use std::sync::Arc;
//! use ringrelay_bus::{Dispatcher, Recorder, Watcher};
//!
//! let bus: Dispatcher<String, u64> = Dispatcher::new("example");
//! let seen = Recorder::new();
//! bus.on("blocks".into(), Watcher::serial(Arc::new(seen.clone())));
//! bus.emit(&"blocks".to_string(), 42);
//! bus.flush().await;
//! assert_eq!(seen.messages(), vec![42]);
//! # }
//! ```

pub mod dispatcher;
pub mod handler;

pub use dispatcher::{DispatchMetrics, Dispatcher};
pub use handler::{FnHandler, Handler, Recorder, Tagged, Watcher};
