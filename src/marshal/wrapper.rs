//! Scalar-wrapping codec factory.
//!
//! Makes scalar/struct payload types wire-legal without every codec
//! special-casing them: this factory claims only wrapper-shaped types
//! (`Wrapped<T>` carriers), delegates the inner type to an underlying cache
//! of real codecs, and crosses the carrier boundary through the wrap/unwrap
//! functions bound into the [`PayloadType`] descriptor at composition time.

use std::sync::Arc;

use bytes::Bytes;

use super::{ErasedMarshaller, MarshallerCache, MarshallerFactory};
use crate::payload::{PayloadType, PayloadValue, WrapperVtable};
use crate::types::{Error, Result};

/// [`MarshallerFactory`] for `Wrapped<T>` carrier types.
#[derive(Debug)]
pub struct WrappedMarshallerFactory {
    inner: Arc<MarshallerCache>,
}

impl WrappedMarshallerFactory {
    /// `inner` is the cache of real codecs the carrier delegates to.
    pub fn new(inner: Arc<MarshallerCache>) -> Self {
        Self { inner }
    }
}

impl MarshallerFactory for WrappedMarshallerFactory {
    fn can_serialize(&self, ty: &PayloadType) -> bool {
        // Unwrap one level and ask the underlying cache about the inner
        // type; non-wrapper types are never claimed.
        match ty.inner() {
            Some(inner_ty) => self.inner.can_serialize(&inner_ty),
            None => false,
        }
    }

    fn create(&self, ty: &PayloadType) -> Result<Arc<dyn ErasedMarshaller>> {
        let vtable = *ty
            .wrapper()
            .ok_or_else(|| Error::no_marshaller(ty.name()))?;
        let inner = self.inner.get_or_create(&(vtable.inner)())?;
        Ok(Arc::new(WrappedMarshaller {
            ty: *ty,
            vtable,
            inner,
        }))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Codec for one carrier type: unwrap-then-encode, decode-then-wrap.
struct WrappedMarshaller {
    ty: PayloadType,
    vtable: WrapperVtable,
    inner: Arc<dyn ErasedMarshaller>,
}

impl ErasedMarshaller for WrappedMarshaller {
    fn payload_type(&self) -> PayloadType {
        self.ty
    }

    fn serialize(&self, value: PayloadValue) -> Result<Bytes> {
        let inner_value = (self.vtable.unwrap)(value)?;
        self.inner.serialize(inner_value)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<PayloadValue> {
        let inner_value = self.inner.deserialize(bytes)?;
        (self.vtable.wrap)(inner_value)
    }
}
