//! # Verticore - typed request/reply message bus
//!
//! Components register handlers on symbolic addresses; callers send typed
//! values and get typed replies back. Verticore provides:
//! - A JSON value model and a descriptor-driven codec (`#[derive(Codec)]`)
//! - Address dispatch with reply outcomes (success, no handlers, timeout,
//!   recipient failure with a numeric code)
//! - Correlation ids carried through nested requests across suspension
//! - Failure translation with redacted diagnostic logging
//! - Built-in diagnostics and an in-memory entity store
//! - A length-prefixed TCP transport in front of the bus
//!
//! ## Architecture
//!
//! ```text
//!   TCP frames ──►  TransportServer ──► EventBus::dispatch ──► AddressRegistry
//!                                          │                      │
//!                                          │  RequestContext      ▼
//!                                          └───────────────►  Handler (Codec in/out)
//!                                                                 │
//!                                                 nested requests / WorkerPool
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Derived impls name `::verticore::...` paths, including inside this crate.
extern crate self as verticore;

pub mod address;
pub mod bus;
pub mod codec;
pub mod components;
pub mod transport;
pub mod types;
pub mod value;

// Internal utilities
pub mod observability;

pub use bus::{
    BusBuilder, Component, DeliveryOptions, EventBus, ReplyFailure, ReplyOutcome, RequestContext,
};
pub use codec::{Codec, TypeDescriptor};
pub use types::{Config, CorrelationId, Error, Result};
