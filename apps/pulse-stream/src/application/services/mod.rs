//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - [`MarketIngestionService`]: drives the connector and publishes received ticks
//! - [`PriceProcessor`]: validates and normalizes received ticks
//! - [`TerminalSink`]: debounced per-symbol terminal display

mod ingestion;
mod processor;
mod terminal;

pub use ingestion::MarketIngestionService;
pub use processor::PriceProcessor;
pub use terminal::{DEFAULT_DEBOUNCE, TerminalSink};
