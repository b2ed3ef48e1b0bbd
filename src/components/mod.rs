//! Built-in components.
//!
//! - [`DiagnosticsComponent`]: ping, echo, address listing and bus counters
//! - [`EntityStoreComponent`]: in-memory CRUD for one [`EntitySchema`],
//!   including one computed lookup address per reference
//!
//! [`EntitySchema`]: crate::address::EntitySchema

mod diagnostics;
mod store;

pub use diagnostics::{AddressInfo, DiagnosticsComponent, Pong};
pub use store::{CountReply, EntityId, EntityStoreComponent};

use crate::bus::BusBuilder;
use crate::types::{Config, Result};
use std::sync::Arc;

/// Add the diagnostics component and one store per configured entity.
pub fn install(builder: BusBuilder, config: &Config) -> Result<BusBuilder> {
    let mut builder = builder.component(DiagnosticsComponent);
    for schema in &config.entities {
        let store = EntityStoreComponent::new(schema.clone())?;
        builder = builder.shared_component(Arc::new(store));
    }
    Ok(builder)
}
