//! In-Process Event Bus
//!
//! Publish/subscribe broker keyed by [`EventKind`]. It is the only coupling
//! point between the pipeline stages.
//!
//! # Delivery
//!
//! Every subscriber owns an unbounded queue. Publishing pushes an `Arc` of the
//! event onto each matching queue and returns immediately, so a slow
//! subscriber can neither stall the publisher nor starve its peers. Each
//! subscriber observes events of its kind exactly once and in publish order.
//!
//! Subscriptions whose stream was dropped are pruned on the next publish of
//! that kind.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::events::{EventKind, PriceEvent};
use crate::infrastructure::metrics;

// =============================================================================
// Event Stream
// =============================================================================

/// Queue-backed subscription returned by [`EventBus::subscribe`].
///
/// Dropping the stream unsubscribes.
#[derive(Debug)]
pub struct EventStream {
    kind: EventKind,
    rx: mpsc::UnboundedReceiver<Arc<PriceEvent>>,
}

impl EventStream {
    /// The kind of events this stream yields.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Wait for the next event. Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<Arc<PriceEvent>> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<Arc<PriceEvent>> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = Arc<PriceEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Fan-out broker for [`PriceEvent`]s.
///
/// # Example
///
/// ```rust
/// use pulse_stream::domain::events::{EventKind, PriceEvent, TickStreamed};
/// use pulse_stream::infrastructure::bus::EventBus;
/// use rust_decimal::Decimal;
///
/// let bus = EventBus::new();
/// let mut stream = bus.subscribe(EventKind::TickStreamed);
///
/// let delivered = bus.publish(PriceEvent::from(TickStreamed {
///     symbol: "BTCUSDT".to_string(),
///     price: Decimal::from(50_000),
///     timestamp: 1,
///     streamed_at: 2,
///     recipients: 1,
/// }));
///
/// assert_eq!(delivered, 1);
/// assert_eq!(stream.try_recv().unwrap().symbol(), "BTCUSDT");
/// ```
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<EventKind, Vec<mpsc::UnboundedSender<Arc<PriceEvent>>>>>,
}

/// Shared event bus reference.
pub type SharedEventBus = Arc<EventBus>;

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared bus.
    #[must_use]
    pub fn shared() -> SharedEventBus {
        Arc::new(Self::new())
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// Never blocks. Returns the number of subscribers the event was queued
    /// for.
    pub fn publish(&self, event: impl Into<PriceEvent>) -> usize {
        let event = Arc::new(event.into());
        let kind = event.kind();

        let delivered = {
            let mut subscribers = self.subscribers.lock();
            let Some(senders) = subscribers.get_mut(&kind) else {
                return 0;
            };

            let mut delivered = 0;
            senders.retain(|tx| {
                let ok = tx.send(Arc::clone(&event)).is_ok();
                delivered += usize::from(ok);
                ok
            });
            delivered
        };

        metrics::record_bus_delivery(kind, delivered);
        delivered
    }

    /// Register a queue-backed subscription for `kind`.
    #[must_use]
    pub fn subscribe(&self, kind: EventKind) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().entry(kind).or_default().push(tx);
        tracing::debug!(event = kind.as_str(), "Bus subscription registered");
        EventStream { kind, rx }
    }

    /// Run `handler` on its own task for every event of `kind`.
    ///
    /// A panicking invocation is logged and isolated: later events are still
    /// delivered to the same handler. The task ends when the bus is dropped;
    /// abort the returned handle to unsubscribe earlier.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe_fn<F>(&self, kind: EventKind, handler: F) -> JoinHandle<()>
    where
        F: Fn(&PriceEvent) + Send + 'static,
    {
        let mut stream = self.subscribe(kind);
        tokio::spawn(async move {
            while let Some(event) = stream.recv().await {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
                if outcome.is_err() {
                    tracing::error!(
                        event = kind.as_str(),
                        symbol = event.symbol(),
                        "Event handler panicked"
                    );
                }
            }
        })
    }

    /// Number of live subscribers for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .lock()
            .get(&kind)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }
}

// =============================================================================
// Tests
// =============================================================================
