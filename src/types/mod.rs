//! Core types for verticore.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Correlation identifiers with human-readable names
//! - **Errors**: Application error types with thiserror derives and reply codes
//! - **Config**: Configuration structures for the bus, worker pool and transport

mod config;
mod errors;
mod ids;

pub use config::{
    BusConfig, Config, LoggingConfig, ObservabilityConfig, TransportConfig, WorkerPoolConfig,
};
pub use errors::{codes, Error, Result};
pub use ids::{random_name, CorrelationId};
