//! Domain Layer - Core tick types and business rules.
//!
//! This layer contains the canonical event shapes, the validation and
//! normalization rules, and per-client subscription tracking. Nothing here
//! performs I/O.

/// Canonical pipeline events (received, processed, streamed).
pub mod events;

/// Tick validation and price normalization rules.
pub mod tick;

/// Client subscription tracking and symbol filtering.
pub mod subscription;
