//! Price Processor
//!
//! Consumes `TickReceived`, rejects ticks that fail validation and publishes
//! a `TickProcessed` with the normalized price for every accepted tick.
//!
//! No deduplication happens here: each received event yields at most one
//! processed event, and the same tick published twice is processed twice.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::domain::events::{
    EventKind, PROCESSED_SCHEMA_VERSION, PriceEvent, TickProcessed, TickReceived,
};
use crate::domain::tick::{TickValidator, normalize_price};
use crate::infrastructure::bus::SharedEventBus;
use crate::infrastructure::metrics;

/// Validation and normalization stage of the pipeline.
pub struct PriceProcessor {
    bus: SharedEventBus,
    validator: TickValidator,
}

impl PriceProcessor {
    /// Create a processor publishing to `bus`.
    #[must_use]
    pub const fn new(bus: SharedEventBus) -> Self {
        Self {
            bus,
            validator: TickValidator::new(),
        }
    }

    /// Validate and normalize one tick without publishing.
    ///
    /// Returns `None` if the tick is rejected.
    #[must_use]
    pub fn process(&self, tick: &TickReceived) -> Option<TickProcessed> {
        let result = self.validator.validate(tick);
        if !result.is_valid {
            metrics::record_tick_rejected();
            tracing::warn!(
                symbol = %tick.symbol,
                exchange = %tick.exchange,
                errors = ?result.errors,
                "Invalid tick rejected"
            );
            return None;
        }

        Some(TickProcessed {
            symbol: tick.symbol.clone(),
            price: normalize_price(tick.price),
            timestamp: tick.timestamp,
            exchange: tick.exchange.clone(),
            processed_at: Utc::now().timestamp_millis(),
            version: PROCESSED_SCHEMA_VERSION.to_string(),
        })
    }

    /// Process one tick and publish the result. Returns whether it was accepted.
    pub fn handle(&self, tick: &TickReceived) -> bool {
        let started = Instant::now();
        let Some(processed) = self.process(tick) else {
            return false;
        };

        tracing::trace!(symbol = %processed.symbol, price = %processed.price, "Tick processed");
        self.bus.publish(processed);
        metrics::record_tick_processed();
        metrics::record_processing_duration(started.elapsed());
        true
    }

    /// Subscribe to received ticks on the bus.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let bus = Arc::clone(&self.bus);
        bus.subscribe_fn(EventKind::TickReceived, move |event| {
            if let PriceEvent::Received(tick) = event {
                self.handle(tick);
            }
        })
    }
}
