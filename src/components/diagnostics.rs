//! Diagnostics addresses under `verticore.debug.*`.

use crate::address::debug;
use crate::bus::{BusStats, Component, Registrar, RequestContext};
use crate::codec::{Codec, TypeDescriptor};
use crate::types::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Reply to `verticore.debug.ping`.
#[derive(Debug, Clone, PartialEq, Codec)]
pub struct Pong {
    pub correlation_id: String,
    pub addresses: u64,
    pub timestamp: DateTime<Utc>,
}

/// One entry of `verticore.debug.addresses`.
#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct AddressInfo {
    pub address: String,
    pub component: String,
    pub argument: String,
    pub result: String,
    pub suspending: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiagnosticsComponent;

impl Component for DiagnosticsComponent {
    fn name(&self) -> &str {
        "diagnostics"
    }

    fn register(self: Arc<Self>, registrar: &mut Registrar<'_>) -> Result<()> {
        registrar.handle_async(debug::PING, |_: (), ctx: RequestContext| async move {
            Ok(Pong {
                correlation_id: ctx.correlation_id().to_string(),
                addresses: ctx.bus().registry().len() as u64,
                timestamp: Utc::now(),
            })
        })?;

        registrar.handle_raw(
            debug::ECHO,
            TypeDescriptor::Json,
            TypeDescriptor::Json,
            |body, _ctx| async move { Ok(body) },
        )?;

        registrar.handle_async(debug::ADDRESSES, |_: (), ctx: RequestContext| async move {
            let mut infos = ctx
                .bus()
                .registry()
                .bindings()
                .map(|binding| AddressInfo {
                    address: binding.address.clone(),
                    component: binding.component.clone(),
                    argument: binding.argument.to_string(),
                    result: binding.result.to_string(),
                    suspending: binding.suspending,
                })
                .collect::<Vec<_>>();
            infos.sort_by(|a, b| a.address.cmp(&b.address));
            Ok(infos)
        })?;

        registrar.handle_async(debug::STATS, |_: (), ctx: RequestContext| async move {
            Ok::<BusStats, _>(ctx.bus().stats())
        })?;

        Ok(())
    }
}
