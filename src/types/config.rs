//! Binder configuration.
//!
//! A [`BinderConfig`] owns the codec setup a service (or client) is composed
//! against: the ordered factory list becomes a layered marshaller cache with
//! the scalar-wrapping factory behind the configured codecs, so wrapper
//! carriers resolve automatically while real codecs keep priority.

use std::sync::Arc;

use crate::marshal::wrapper::WrappedMarshallerFactory;
use crate::marshal::{MarshallerCache, MarshallerFactory};

/// Configuration for contract composition.
#[derive(Debug, Clone)]
pub struct BinderConfig {
    marshallers: Arc<MarshallerCache>,

    /// Bounded channel capacity for in-process payload streams.
    pub stream_channel_capacity: usize,
}

impl BinderConfig {
    /// Build a configuration from codec factories in priority order.
    ///
    /// The public cache is layered: supplied factories first, then the
    /// wrapper factory delegating inner types to the supplied ones. Both
    /// layers share one resolved-type map.
    pub fn new(factories: Vec<Arc<dyn MarshallerFactory>>) -> Self {
        let base = Arc::new(MarshallerCache::new(factories.clone()));
        let mut layered = factories;
        layered.push(Arc::new(WrappedMarshallerFactory::new(base.clone())) as Arc<dyn MarshallerFactory>);
        let marshallers = Arc::new(MarshallerCache::layered(&base, layered));
        Self {
            marshallers,
            stream_channel_capacity: 64,
        }
    }

    /// The layered marshaller cache used at composition and call time.
    pub fn marshallers(&self) -> &Arc<MarshallerCache> {
        &self.marshallers
    }

    pub fn with_stream_channel_capacity(mut self, capacity: usize) -> Self {
        self.stream_channel_capacity = capacity;
        self
    }
}

impl Default for BinderConfig {
    /// Bundled JSON factory (no types registered yet) plus the wrapper layer.
    fn default() -> Self {
        Self::new(vec![Arc::new(crate::marshal::json::JsonMarshallerFactory::new())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::json::JsonMarshallerFactory;
    use crate::payload::PayloadType;

    #[test]
    fn wrapper_carriers_resolve_through_configured_codecs() {
        let config = BinderConfig::new(vec![Arc::new(
            JsonMarshallerFactory::new().with_type::<i64>(),
        )]);
        assert!(config.marshallers().can_serialize(&PayloadType::scalar::<i64>()));
        assert!(!config.marshallers().can_serialize(&PayloadType::scalar::<bool>()));
    }

    #[test]
    fn default_config_still_knows_the_empty_sentinel() {
        let config = BinderConfig::default();
        assert!(config.marshallers().can_serialize(&PayloadType::empty()));
    }
}
