//! Client Subscription Tracking
//!
//! Domain types for tracking WebSocket clients and the symbols they opted
//! into.
//!
//! # Design
//!
//! Connections are indexed by a monotonically assigned [`ConnectionId`]; the
//! transport handle is stored as a value next to the client's filter. The
//! registry never inspects the handle, so it stays independent of the
//! transport layer.
//!
//! A filter is fixed when the connection is registered and never changes for
//! the lifetime of that connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a client connection.
pub type ConnectionId = u64;

// =============================================================================
// Symbol Filter
// =============================================================================

/// Allow-list of symbols a client receives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SymbolFilter {
    /// No filter, every symbol is delivered.
    #[default]
    All,
    /// Only these symbols (uppercase, de-duplicated, in first-seen order).
    Only(Vec<String>),
}

impl SymbolFilter {
    /// Parse a comma-separated `symbols` query value.
    ///
    /// Entries are trimmed and uppercased; empty entries and duplicates are
    /// dropped. An absent or effectively empty value yields [`SymbolFilter::All`].
    ///
    /// ```rust
    /// use pulse_stream::domain::subscription::SymbolFilter;
    ///
    /// assert_eq!(SymbolFilter::parse(None), SymbolFilter::All);
    /// assert_eq!(SymbolFilter::parse(Some(",,")), SymbolFilter::All);
    /// assert_eq!(
    ///     SymbolFilter::parse(Some(" btcusdt,ETHUSDT,btcusdt ")),
    ///     SymbolFilter::Only(vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()])
    /// );
    /// ```
    #[must_use]
    pub fn parse(query: Option<&str>) -> Self {
        let Some(query) = query else {
            return Self::All;
        };

        let mut symbols: Vec<String> = Vec::new();
        for symbol in query.split(',').map(|s| s.trim().to_uppercase()) {
            if !symbol.is_empty() && !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }

        if symbols.is_empty() {
            Self::All
        } else {
            Self::Only(symbols)
        }
    }

    /// Whether `symbol` passes this filter (case-insensitive).
    #[must_use]
    pub fn matches(&self, symbol: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(symbols) => symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol)),
        }
    }

    /// Symbols in the allow-list, or `None` when unfiltered.
    #[must_use]
    pub fn symbols(&self) -> Option<&[String]> {
        match self {
            Self::All => None,
            Self::Only(symbols) => Some(symbols),
        }
    }

    /// Human-readable description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Only(symbols) => symbols.join(","),
        }
    }
}

// =============================================================================
// Client Subscription
// =============================================================================

/// Per-connection state: transport handle plus symbol filter.
#[derive(Debug, Clone)]
pub struct ClientSubscription<H> {
    handle: H,
    filter: SymbolFilter,
}

impl<H> ClientSubscription<H> {
    /// Create a subscription for a newly connected client.
    #[must_use]
    pub const fn new(handle: H, filter: SymbolFilter) -> Self {
        Self { handle, filter }
    }

    /// The transport handle.
    #[must_use]
    pub const fn handle(&self) -> &H {
        &self.handle
    }

    /// The client's symbol filter.
    #[must_use]
    pub const fn filter(&self) -> &SymbolFilter {
        &self.filter
    }
}

// =============================================================================
// Client Registry
// =============================================================================

/// Thread-safe table of connected clients indexed by [`ConnectionId`].
///
/// Registration, removal and iteration may run concurrently from the
/// connection path and the broadcast path.
///
/// # Example
///
/// ```rust
/// use pulse_stream::domain::subscription::{ClientRegistry, SymbolFilter};
///
/// let registry = ClientRegistry::new();
/// let id = registry.register("client-a", SymbolFilter::parse(Some("BTCUSDT")));
/// assert_eq!(registry.len(), 1);
///
/// let mut matched = Vec::new();
/// registry.for_each_matching("btcusdt", |_, handle| matched.push(*handle));
/// assert_eq!(matched, vec!["client-a"]);
///
/// assert!(registry.remove(id).is_some());
/// assert!(registry.is_empty());
/// ```
pub struct ClientRegistry<H> {
    clients: RwLock<HashMap<ConnectionId, ClientSubscription<H>>>,
    next_id: AtomicU64,
}

impl<H> Default for ClientRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ClientRegistry<H> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a client and return its connection id.
    pub fn register(&self, handle: H, filter: SymbolFilter) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients
            .write()
            .insert(id, ClientSubscription::new(handle, filter));
        id
    }

    /// Remove a client. Returns its subscription if it was registered.
    pub fn remove(&self, id: ConnectionId) -> Option<ClientSubscription<H>> {
        self.clients.write().remove(&id)
    }

    /// Visit every client whose filter matches `symbol`.
    ///
    /// The visitor runs under the registry's read lock and must not block.
    pub fn for_each_matching<F>(&self, symbol: &str, mut visit: F)
    where
        F: FnMut(ConnectionId, &H),
    {
        let clients = self.clients.read();
        for (id, subscription) in clients.iter() {
            if subscription.filter.matches(symbol) {
                visit(*id, &subscription.handle);
            }
        }
    }

    /// The filter registered for a connection.
    #[must_use]
    pub fn filter(&self, id: ConnectionId) -> Option<SymbolFilter> {
        self.clients.read().get(&id).map(|s| s.filter.clone())
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether no clients are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use test_case::test_case;

    use super::*;

    fn only(symbols: &[&str]) -> SymbolFilter {
        SymbolFilter::Only(symbols.iter().map(|s| (*s).to_string()).collect())
    }

    #[test_case(None, SymbolFilter::All ; "absent")]
    #[test_case(Some(""), SymbolFilter::All ; "empty")]
    #[test_case(Some(",,,"), SymbolFilter::All ; "only commas")]
    #[test_case(Some("BTCUSDT"), only(&["BTCUSDT"]) ; "single")]
    #[test_case(Some("BTCUSDT,ETHUSDT"), only(&["BTCUSDT", "ETHUSDT"]) ; "multiple")]
    #[test_case(Some("btcusdt,ethusdt"), only(&["BTCUSDT", "ETHUSDT"]) ; "uppercased")]
    #[test_case(Some(" BTCUSDT , ETHUSDT "), only(&["BTCUSDT", "ETHUSDT"]) ; "trimmed")]
    #[test_case(Some("BTCUSDT,,ETHUSDT"), only(&["BTCUSDT", "ETHUSDT"]) ; "empty entries dropped")]
    #[test_case(Some("BTCUSDT,btcusdt"), only(&["BTCUSDT"]) ; "deduplicated")]
    fn parse_symbols(query: Option<&str>, expected: SymbolFilter) {
        assert_eq!(SymbolFilter::parse(query), expected);
    }

    #[test]
    fn unfiltered_matches_everything() {
        let filter = SymbolFilter::All;
        assert!(filter.matches("BTCUSDT"));
        assert!(filter.matches("ETHUSDT"));
        assert!(filter.matches("SOLUSDT"));
        assert!(filter.symbols().is_none());
    }

    #[test]
    fn filter_matches_members_only() {
        let filter = only(&["BTCUSDT", "ETHUSDT"]);
        assert!(filter.matches("BTCUSDT"));
        assert!(filter.matches("ETHUSDT"));
        assert!(!filter.matches("SOLUSDT"));
        assert!(!filter.matches("BNBUSDT"));
    }

    #[test]
    fn filter_is_case_insensitive() {
        let filter = only(&["BTCUSDT"]);
        assert!(filter.matches("btcusdt"));
        assert!(filter.matches("BtcUsDt"));
    }

    #[test]
    fn describe_filter() {
        assert_eq!(SymbolFilter::All.describe(), "ALL");
        assert_eq!(only(&["BTCUSDT", "ETHUSDT"]).describe(), "BTCUSDT,ETHUSDT");
    }

    #[test]
    fn register_assigns_distinct_ids() {
        let registry = ClientRegistry::new();
        let a = registry.register("a", SymbolFilter::All);
        let b = registry.register("b", SymbolFilter::All);

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_unknown_id_is_none() {
        let registry: ClientRegistry<&str> = ClientRegistry::new();
        assert!(registry.remove(42).is_none());
    }

    #[test]
    fn filter_is_kept_per_connection() {
        let registry = ClientRegistry::new();
        let id = registry.register("a", SymbolFilter::parse(Some("ethusdt")));

        assert_eq!(registry.filter(id), Some(only(&["ETHUSDT"])));
        registry.remove(id);
        assert_eq!(registry.filter(id), None);
    }

    #[test]
    fn for_each_matching_applies_filters() {
        let registry = ClientRegistry::new();
        registry.register("btc-only", SymbolFilter::parse(Some("BTCUSDT")));
        registry.register("eth-only", SymbolFilter::parse(Some("ETHUSDT")));
        registry.register("everything", SymbolFilter::All);

        let mut matched = Vec::new();
        registry.for_each_matching("BTCUSDT", |_, handle| matched.push(*handle));
        matched.sort_unstable();

        assert_eq!(matched, vec!["btc-only", "everything"]);
    }

    #[test]
    fn thread_safety_concurrent_register_and_remove() {
        let registry = Arc::new(ClientRegistry::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                let id = r.register(i, SymbolFilter::All);
                let mut seen = 0;
                r.for_each_matching("BTCUSDT", |_, _| seen += 1);
                assert!(seen >= 1);
                if i % 2 == 0 {
                    r.remove(id);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 5);
    }
}
