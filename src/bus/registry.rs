//! Address registry: exactly one handler per address.

use crate::bus::envelope::REPLY_PREFIX;
use crate::bus::Handler;
use crate::codec::{DescriptorCache, TypeDescriptor};
use crate::types::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handler bound to an address, with its declared argument and result types.
#[derive(Clone)]
pub struct AddressBinding {
    pub address: String,
    pub handler: Arc<dyn Handler>,
    pub argument: Arc<TypeDescriptor>,
    pub result: Arc<TypeDescriptor>,
    /// Suspending handlers run as their own task.
    pub suspending: bool,
    /// Keys masked when the request body is logged.
    pub redact: Vec<String>,
    /// Name of the registering component.
    pub component: String,
}

impl AddressBinding {
    pub fn new(
        address: impl Into<String>,
        handler: Arc<dyn Handler>,
        argument: Arc<TypeDescriptor>,
        result: Arc<TypeDescriptor>,
        suspending: bool,
    ) -> Self {
        Self {
            address: address.into(),
            handler,
            argument,
            result,
            suspending,
            redact: Vec::new(),
            component: String::new(),
        }
    }
}

impl fmt::Debug for AddressBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressBinding")
            .field("address", &self.address)
            .field("argument", &self.argument.to_string())
            .field("result", &self.result.to_string())
            .field("suspending", &self.suspending)
            .field("redact", &self.redact)
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

/// Address → binding map.
///
/// Filled once during start-up registration, then frozen inside the bus and
/// read concurrently without locking.
#[derive(Debug, Default)]
pub struct AddressRegistry {
    bindings: HashMap<String, AddressBinding>,
    descriptors: DescriptorCache,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler. Fails with `DuplicateAddress` if the address is taken
    /// and with a descriptor error if either type cannot be encoded.
    pub fn register(&mut self, binding: AddressBinding) -> Result<()> {
        if binding.address.is_empty() {
            return Err(Error::illegal_state("address must not be empty"));
        }
        if binding.address.starts_with(REPLY_PREFIX) {
            return Err(Error::illegal_state(format!(
                "address {} uses the reserved prefix {}",
                binding.address, REPLY_PREFIX
            )));
        }
        binding.argument.validate()?;
        binding.result.validate()?;

        if let Some(existing) = self.bindings.get(&binding.address) {
            return Err(Error::DuplicateAddress(format!(
                "{} (already bound by {})",
                binding.address, existing.component
            )));
        }

        tracing::debug!("Registered handler for address: {}", binding.address);
        self.bindings.insert(binding.address.clone(), binding);
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&AddressBinding> {
        self.bindings.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.bindings.contains_key(address)
    }

    /// All bound addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.bindings.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn bindings(&self) -> impl Iterator<Item = &AddressBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolved descriptors of the types registered so far.
    pub fn descriptors(&self) -> &DescriptorCache {
        &self.descriptors
    }
}
