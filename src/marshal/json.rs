//! Bundled JSON codec factory.
//!
//! Rust has no runtime reflection, so the set of serializable types is
//! declared up front: each `with_type::<T>()` registers a serde_json codec
//! constructor for `T`. The factory claims exactly the registered types.

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ErasedMarshaller, MarshallerFactory};
use crate::payload::{downcast_payload, PayloadType, PayloadValue};
use crate::types::{Error, Result};
use std::sync::Arc;

type CodecCtor = fn() -> Arc<dyn ErasedMarshaller>;

/// serde_json-backed [`MarshallerFactory`] over an explicit type registry.
#[derive(Debug, Default)]
pub struct JsonMarshallerFactory {
    codecs: HashMap<TypeId, CodecCtor>,
}

impl JsonMarshallerFactory {
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register a codec constructor for `T`.
    #[must_use]
    pub fn with_type<T>(mut self) -> Self
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.codecs.insert(TypeId::of::<T>(), || {
            Arc::new(JsonMarshaller::<T> {
                ty: PayloadType::message::<T>(),
                _marker: PhantomData,
            })
        });
        self
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl MarshallerFactory for JsonMarshallerFactory {
    fn can_serialize(&self, ty: &PayloadType) -> bool {
        self.codecs.contains_key(&ty.id())
    }

    fn create(&self, ty: &PayloadType) -> Result<Arc<dyn ErasedMarshaller>> {
        self.codecs
            .get(&ty.id())
            .map(|ctor| ctor())
            .ok_or_else(|| Error::no_marshaller(ty.name()))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

struct JsonMarshaller<T> {
    ty: PayloadType,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> ErasedMarshaller for JsonMarshaller<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn payload_type(&self) -> PayloadType {
        self.ty
    }

    fn serialize(&self, value: PayloadValue) -> Result<Bytes> {
        let value = downcast_payload::<T>(value)?;
        Ok(Bytes::from(serde_json::to_vec(&value)?))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<PayloadValue> {
        let value: T = serde_json::from_slice(bytes)?;
        Ok(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        text: String,
        repeat: u8,
    }

    #[test]
    fn registered_type_round_trips() {
        let factory = JsonMarshallerFactory::new().with_type::<Greeting>();
        let ty = PayloadType::message::<Greeting>();
        assert!(factory.can_serialize(&ty));

        let codec = factory.create(&ty).unwrap();
        let original = Greeting {
            text: "hi".to_string(),
            repeat: 3,
        };
        let bytes = codec.serialize(Box::new(original.clone())).unwrap();
        let back = codec.deserialize(&bytes).unwrap();
        assert_eq!(downcast_payload::<Greeting>(back).unwrap(), original);
    }

    #[test]
    fn unregistered_type_is_refused() {
        let factory = JsonMarshallerFactory::new();
        let ty = PayloadType::message::<Greeting>();
        assert!(!factory.can_serialize(&ty));
        assert!(matches!(
            factory.create(&ty).unwrap_err(),
            Error::NoMarshaller { .. }
        ));
    }

    #[test]
    fn decode_failure_surfaces_serialization_error() {
        let factory = JsonMarshallerFactory::new().with_type::<Greeting>();
        let codec = factory.create(&PayloadType::message::<Greeting>()).unwrap();
        let err = codec.deserialize(b"not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
