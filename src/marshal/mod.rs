//! Marshaller selection and caching.
//!
//! A [`Marshaller`] is a serialize/deserialize pair for exactly one payload
//! type. Resolution walks an ordered list of pluggable factories (first match
//! wins) and memoizes the outcome in a type-indexed map, including negative
//! outcomes, so `can_serialize` is idempotent and cheap after first use.
//!
//! Concurrency: the type map is the only shared mutable state. Resolution
//! holds no lock while a factory constructs, and publication is
//! first-publish-wins — concurrent first users may each construct a codec for
//! a never-before-seen type, but all converge on the one instance that landed
//! first.

pub mod json;
pub mod wrapper;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use crate::payload::{downcast_payload, Empty, PayloadType, PayloadValue};
use crate::types::{Error, Result};

/// Object-layer codec for exactly one payload type. Immutable once created.
pub trait ErasedMarshaller: Send + Sync {
    /// The payload type this codec handles.
    fn payload_type(&self) -> PayloadType;

    /// Encode one payload value to bytes.
    fn serialize(&self, value: PayloadValue) -> Result<Bytes>;

    /// Decode one payload value from bytes.
    fn deserialize(&self, bytes: &[u8]) -> Result<PayloadValue>;
}

impl fmt::Debug for dyn ErasedMarshaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErasedMarshaller({})", self.payload_type().name())
    }
}

/// Typed view over an erased codec, recovered at the call site where the
/// concrete type is statically known.
pub struct Marshaller<T> {
    inner: Arc<dyn ErasedMarshaller>,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: Send + 'static> Marshaller<T> {
    fn new(inner: Arc<dyn ErasedMarshaller>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn serialize(&self, value: T) -> Result<Bytes> {
        self.inner.serialize(Box::new(value))
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<T> {
        downcast_payload::<T>(self.inner.deserialize(bytes)?)
    }

    /// The underlying erased codec (shared with the cache).
    pub fn erased(&self) -> Arc<dyn ErasedMarshaller> {
        self.inner.clone()
    }
}

impl<T> Clone for Marshaller<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Marshaller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marshaller<{}>", std::any::type_name::<T>())
    }
}

/// Pluggable codec factory. Variants correspond to different wire codecs;
/// ordering in the cache's factory list is priority order.
pub trait MarshallerFactory: Send + Sync {
    /// Whether this factory can build a codec for the type.
    fn can_serialize(&self, ty: &PayloadType) -> bool;

    /// Build a codec for the type. Only called after `can_serialize`
    /// answered yes, but may still fail (e.g. a delegating factory whose
    /// inner type lost its codec through an override).
    fn create(&self, ty: &PayloadType) -> Result<Arc<dyn ErasedMarshaller>>;

    /// Kind-based lookup support for [`MarshallerCache::find_factory_as`].
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn MarshallerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MarshallerFactory")
    }
}

type TypeMap = Arc<RwLock<HashMap<TypeId, Option<Arc<dyn ErasedMarshaller>>>>>;

/// Type-indexed, lazily-populated registry of codecs backed by an ordered
/// factory list.
///
/// A cache may be layered on an inner cache: it gets its own factory list
/// (so overrides can sit in front) while sharing the inner cache's
/// already-resolved type map, avoiding duplicate resolution across layers.
pub struct MarshallerCache {
    factories: Vec<Arc<dyn MarshallerFactory>>,
    marshallers: TypeMap,
}

impl MarshallerCache {
    pub fn new(factories: Vec<Arc<dyn MarshallerFactory>>) -> Self {
        // The empty sentinel is always wire-legal, no factory required.
        let seeded: HashMap<TypeId, Option<Arc<dyn ErasedMarshaller>>> = HashMap::from([(
            TypeId::of::<Empty>(),
            Some(Arc::new(EmptyMarshaller) as Arc<dyn ErasedMarshaller>),
        )]);
        Self {
            factories,
            marshallers: Arc::new(RwLock::new(seeded)),
        }
    }

    /// Layer a new cache over `inner`: own factory list, shared type map.
    pub fn layered(inner: &MarshallerCache, factories: Vec<Arc<dyn MarshallerFactory>>) -> Self {
        Self {
            factories,
            marshallers: inner.marshallers.clone(),
        }
    }

    /// Resolve the codec for a payload type, constructing and publishing it
    /// on first use. Fails with `NoMarshaller` when no factory accepts the
    /// type; the negative outcome is memoized.
    pub fn get_or_create(&self, ty: &PayloadType) -> Result<Arc<dyn ErasedMarshaller>> {
        {
            let map = self.marshallers.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = map.get(&ty.id()) {
                return entry.clone().ok_or_else(|| Error::no_marshaller(ty.name()));
            }
        }

        // Slow path: construct outside the lock so a slow factory cannot
        // stall unrelated resolutions, then publish first-wins.
        let created = match self.find_factory(ty) {
            Some(factory) => Some(factory.create(ty)?),
            None => None,
        };
        if created.is_some() {
            tracing::debug!(payload_type = ty.name(), "marshaller resolved");
        } else {
            tracing::warn!(payload_type = ty.name(), "no factory accepts payload type");
        }

        let mut map = self.marshallers.write().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(ty.id()).or_insert(created);
        entry.clone().ok_or_else(|| Error::no_marshaller(ty.name()))
    }

    /// Typed resolution for a call site that statically knows `T`.
    ///
    /// `ty` must describe `T` itself (message types) or the carrier `T`
    /// stands for (scalar descriptors describe `Wrapped<T>`).
    pub fn typed<T: Send + 'static>(&self, ty: &PayloadType) -> Result<Marshaller<T>> {
        debug_assert_eq!(ty.id(), TypeId::of::<T>(), "descriptor/type mismatch");
        Ok(Marshaller::new(self.get_or_create(ty)?))
    }

    /// Typed resolution for a plain message type.
    pub fn for_message<T: Send + 'static>(&self) -> Result<Marshaller<T>> {
        self.typed::<T>(&PayloadType::message::<T>())
    }

    /// Whether a cached or constructible codec exists for the type.
    /// Construction is triggered as a side effect so the answer is memoized.
    pub fn can_serialize(&self, ty: &PayloadType) -> bool {
        self.get_or_create(ty).is_ok()
    }

    /// Explicit override. `None` removes any cached entry, forcing
    /// re-resolution on next use.
    pub fn set(&self, ty: &PayloadType, marshaller: Option<Arc<dyn ErasedMarshaller>>) {
        let mut map = self.marshallers.write().unwrap_or_else(PoisonError::into_inner);
        match marshaller {
            Some(m) => {
                map.insert(ty.id(), Some(m));
            }
            None => {
                map.remove(&ty.id());
            }
        }
    }

    /// First factory (in priority order) that accepts the type.
    pub fn find_factory(&self, ty: &PayloadType) -> Option<&Arc<dyn MarshallerFactory>> {
        self.factories.iter().find(|f| f.can_serialize(ty))
    }

    /// First factory of a concrete kind, for adapters that delegate to
    /// "whatever real codec is configured".
    pub fn find_factory_as<F: MarshallerFactory + 'static>(&self) -> Option<&F> {
        self.factories
            .iter()
            .find_map(|f| f.as_any().downcast_ref::<F>())
    }

    pub fn factory_count(&self) -> usize {
        self.factories.len()
    }
}

impl fmt::Debug for MarshallerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self
            .marshallers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("MarshallerCache")
            .field("factories", &self.factories.len())
            .field("resolved", &resolved)
            .finish()
    }
}

/// Built-in codec for the empty sentinel: zero bytes on the wire.
struct EmptyMarshaller;

impl ErasedMarshaller for EmptyMarshaller {
    fn payload_type(&self) -> PayloadType {
        PayloadType::empty()
    }

    fn serialize(&self, value: PayloadValue) -> Result<Bytes> {
        downcast_payload::<Empty>(value)?;
        Ok(Bytes::new())
    }

    fn deserialize(&self, _bytes: &[u8]) -> Result<PayloadValue> {
        Ok(Box::new(Empty))
    }
}

// =============================================================================
// Tests
// =============================================================================
