//! Helpers shared by the integration tests.

use pulse_stream::{ConnectionState, MarketConnector};

/// Connector that never dials out and always reports the given state.
pub struct StubConnector(pub ConnectionState);

impl MarketConnector for StubConnector {
    fn connect(&self, _symbols: &[String]) {}
    fn disconnect(&self) {}
    fn state(&self) -> ConnectionState {
        self.0
    }
}
