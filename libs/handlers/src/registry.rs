use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use mercury_core::{ChannelType, HandlerError};

use crate::traits::{ChannelHandler, HandlerConfig, HandlerRoute};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("channel type `{0}` already registered")]
    AlreadyRegistered(ChannelType),
    #[error("no handler registered for channel type `{0}`")]
    UnknownChannelType(ChannelType),
    #[error("handler initialization failed: {0}")]
    Init(#[from] HandlerError),
}

struct Registered {
    handler: Arc<dyn ChannelHandler>,
    routes: Vec<HandlerRoute>,
}

/// Process-wide mapping from channel type code to adapter, populated once at
/// startup. After registration the registry is frozen behind an `Arc` and
/// only read, so lookups take no lock. Looking up an unregistered type code
/// is a configuration error surfaced to the caller, never a silent fallback.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ChannelType, Registered>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, running its initialization to learn which routes
    /// it serves. Startup-only.
    pub fn register(
        &mut self,
        mut handler: Box<dyn ChannelHandler>,
        config: &HandlerConfig,
    ) -> Result<(), RegistryError> {
        let routes = handler.initialize(config)?;
        let channel_type = handler.channel_type().clone();
        if self.handlers.contains_key(&channel_type) {
            return Err(RegistryError::AlreadyRegistered(channel_type));
        }
        self.handlers.insert(
            channel_type,
            Registered {
                handler: Arc::from(handler),
                routes,
            },
        );
        Ok(())
    }

    pub fn lookup(
        &self,
        channel_type: &ChannelType,
    ) -> Result<Arc<dyn ChannelHandler>, RegistryError> {
        self.handlers
            .get(channel_type)
            .map(|entry| Arc::clone(&entry.handler))
            .ok_or_else(|| RegistryError::UnknownChannelType(channel_type.clone()))
    }

    /// Whether the handler for `channel_type` declared `route` at
    /// initialization.
    pub fn serves_route(&self, channel_type: &ChannelType, route: HandlerRoute) -> bool {
        self.handlers
            .get(channel_type)
            .is_some_and(|entry| entry.routes.contains(&route))
    }

    pub fn channel_types(&self) -> impl Iterator<Item = &ChannelType> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
