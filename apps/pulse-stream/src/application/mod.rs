//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the pipeline services and the port interfaces
//! that define how they interact with external systems.

/// Port interfaces for external systems (exchange feed, clients, terminal).
pub mod ports;

/// Pipeline services: ingestion, processing and terminal display.
pub mod services;
