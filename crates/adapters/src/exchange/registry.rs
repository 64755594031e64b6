// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared exchange instances.

use super::{ExchangeAdapter, ExchangeError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub type SharedExchange = Arc<dyn ExchangeAdapter>;

type Factory = Box<dyn Fn(&str) -> Result<SharedExchange, ExchangeError> + Send + Sync>;

/// One adapter instance per venue, shared across every job addressing it.
pub struct ExchangeRegistry {
    default_exchange: Option<String>,
    factory: Factory,
    instances: Mutex<HashMap<String, SharedExchange>>,
}

impl ExchangeRegistry {
    /// `factory` builds an adapter for a venue id; it is consulted once
    /// per id, after which the instance is shared.
    pub fn new(
        default_exchange: Option<String>,
        factory: impl Fn(&str) -> Result<SharedExchange, ExchangeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            default_exchange,
            factory: Box::new(factory),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `id`, falling back to the configured default exchange.
    pub fn get_or_create(&self, id: Option<&str>) -> Result<SharedExchange, ExchangeError> {
        let id = match id {
            Some(id) if !id.is_empty() => id,
            _ => self
                .default_exchange
                .as_deref()
                .ok_or(ExchangeError::NoExchangeSelected)?,
        };

        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(id) {
            return Ok(Arc::clone(existing));
        }

        let adapter = (self.factory)(id)?;
        instances.insert(id.to_string(), Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Close and drop every live instance (shutdown path).
    pub async fn close_all(&self) {
        let drained: Vec<(String, SharedExchange)> = {
            let mut instances = self.instances.lock();
            instances.drain().collect()
        };
        for (id, adapter) in drained {
            if let Err(e) = adapter.close().await {
                tracing::warn!("closing exchange {}: {}", id, e);
            } else {
                info!("closed exchange {}", id);
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
