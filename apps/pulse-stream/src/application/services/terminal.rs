//! Terminal Sink
//!
//! Debounced per-symbol display of processed ticks. Every update for a symbol
//! restarts that symbol's quiet window; only the last update inside the window
//! is rendered. Symbols are debounced independently.
//!
//! Each pending render is tracked by a cancellation token plus a generation
//! number. A timer that fires after being superseded finds a newer
//! generation in the table and does nothing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Direction, RenderedTick, TickRenderer};
use crate::domain::events::{EventKind, PriceEvent, TickProcessed};
use crate::infrastructure::bus::SharedEventBus;

/// Default quiet window per symbol.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct PendingRender {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct DisplayState {
    pending: HashMap<String, PendingRender>,
    last_prices: HashMap<String, Decimal>,
    next_generation: u64,
}

/// Debounced terminal display of processed prices.
pub struct TerminalSink {
    renderer: Arc<dyn TickRenderer>,
    debounce: Duration,
    state: Arc<Mutex<DisplayState>>,
}

impl TerminalSink {
    /// Create a sink rendering through `renderer` after `debounce` of quiet.
    #[must_use]
    pub fn new(renderer: Arc<dyn TickRenderer>, debounce: Duration) -> Self {
        Self {
            renderer,
            debounce,
            state: Arc::new(Mutex::new(DisplayState::default())),
        }
    }

    /// Schedule a render for `tick`, superseding any pending render of the
    /// same symbol.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_tick(&self, tick: &TickProcessed) {
        let cancel = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock();
            state.next_generation += 1;
            let generation = state.next_generation;
            let previous = state.pending.insert(
                tick.symbol.clone(),
                PendingRender {
                    generation,
                    cancel: cancel.clone(),
                },
            );
            if let Some(previous) = previous {
                previous.cancel.cancel();
            }
            generation
        };

        let state = Arc::clone(&self.state);
        let renderer = Arc::clone(&self.renderer);
        let debounce = self.debounce;
        let symbol = tick.symbol.clone();
        let price = tick.price;

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(debounce) => {}
            }

            let rendered = {
                let mut state = state.lock();
                match state.pending.get(&symbol) {
                    Some(pending) if pending.generation == generation => {}
                    _ => return,
                }
                state.pending.remove(&symbol);
                let delta = state
                    .last_prices
                    .insert(symbol.clone(), price)
                    .map_or(Decimal::ZERO, |last| price - last);
                RenderedTick {
                    symbol,
                    price,
                    delta,
                    direction: Direction::from_delta(delta),
                }
            };

            renderer.render(&rendered);
        });
    }

    /// Number of symbols with a render still pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Last displayed price of `symbol`.
    #[must_use]
    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.state.lock().last_prices.get(symbol).copied()
    }

    /// Subscribe to processed ticks on the bus.
    pub fn start(self: Arc<Self>, bus: &SharedEventBus) -> JoinHandle<()> {
        tracing::info!(debounce_ms = self.debounce.as_millis(), "Starting terminal stream");
        bus.subscribe_fn(EventKind::TickProcessed, move |event| {
            if let PriceEvent::Processed(tick) = event {
                self.on_tick(tick);
            }
        })
    }
}
