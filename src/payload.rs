//! Payload value model for the canonical call boundary.
//!
//! Canonical requests, responses, and stream items cross the adapter as
//! type-erased [`PayloadValue`]s. The concrete types behind them are bound at
//! contract-composition time through [`PayloadType`] descriptors, so no
//! runtime re-specialization is ever needed on the call-serving path.
//!
//! Pieces:
//!   - [`Empty`] — the canonical empty sentinel message (elided payloads)
//!   - [`Wrapped<T>`] — single-field carrier making scalar types wire-legal
//!   - [`ArgList`] — logical argument list for multi-parameter methods
//!   - [`PayloadType`] — runtime descriptor with a wrap/unwrap vtable

use std::any::{Any, TypeId};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Error, Result};

/// A type-erased payload crossing the canonical boundary.
pub type PayloadValue = Box<dyn Any + Send>;

/// Canonical empty sentinel message, produced for elided responses and
/// accepted for elided requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty;

/// Single-field carrier holding one instance of a non-message type.
///
/// Exists only to satisfy "every payload is a message" wire constraints;
/// created and destroyed per call, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wrapped<T>(pub T);

impl<T> Wrapped<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Logical argument list for methods declaring more than one request
/// parameter. The canonical request payload for such methods is one
/// `ArgList`; the packing transform distributes its slots positionally.
pub struct ArgList(pub Vec<PayloadValue>);

impl ArgList {
    pub fn new(slots: Vec<PayloadValue>) -> Self {
        Self(slots)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArgList").field(&self.0.len()).finish()
    }
}

/// Downcast a payload value to its concrete type.
///
/// Failure means the contract declared one type and the transport delivered
/// another; surfaced as an internal error with both names for diagnosis.
pub fn downcast_payload<T: Send + 'static>(value: PayloadValue) -> Result<T> {
    match value.downcast::<T>() {
        Ok(boxed) => Ok(*boxed),
        Err(_) => Err(Error::internal(format!(
            "payload type confusion: expected {}",
            std::any::type_name::<T>()
        ))),
    }
}

/// Monomorphized wrap/unwrap entry points for one `Wrapped<T>` carrier type,
/// captured when the descriptor is built. Keeps the call-serving path free of
/// any type-erased re-specialization.
#[derive(Clone, Copy)]
pub struct WrapperVtable {
    /// Descriptor of the inner (unwrapped) type.
    pub inner: fn() -> PayloadType,
    /// `T` -> `Wrapped<T>`.
    pub wrap: fn(PayloadValue) -> Result<PayloadValue>,
    /// `Wrapped<T>` -> `T`.
    pub unwrap: fn(PayloadValue) -> Result<PayloadValue>,
}

impl fmt::Debug for WrapperVtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperVtable")
            .field("inner", &(self.inner)().name())
            .finish()
    }
}

/// Runtime descriptor for one payload type, built at composition time.
///
/// Message types are described by [`PayloadType::message`]; scalar types by
/// [`PayloadType::scalar`], which describes the `Wrapped<T>` carrier the
/// scalar travels as and carries the vtable to cross the carrier boundary.
#[derive(Clone, Copy)]
pub struct PayloadType {
    id: TypeId,
    name: &'static str,
    wrapper: Option<WrapperVtable>,
}

impl PayloadType {
    /// Descriptor for a message type used as-is on the wire.
    pub fn message<T: Send + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            wrapper: None,
        }
    }

    /// Descriptor for a scalar type `T`, described as its `Wrapped<T>`
    /// carrier with wrap/unwrap bound to the concrete `T`.
    pub fn scalar<T: Send + 'static>() -> Self {
        Self {
            id: TypeId::of::<Wrapped<T>>(),
            name: std::any::type_name::<Wrapped<T>>(),
            wrapper: Some(WrapperVtable {
                inner: PayloadType::message::<T>,
                wrap: |value| {
                    let inner = downcast_payload::<T>(value)?;
                    Ok(Box::new(Wrapped(inner)))
                },
                unwrap: |value| {
                    let wrapped = downcast_payload::<Wrapped<T>>(value)?;
                    Ok(Box::new(wrapped.0))
                },
            }),
        }
    }

    /// Descriptor for the canonical empty sentinel.
    pub fn empty() -> Self {
        Self::message::<Empty>()
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True when this descriptor is a `Wrapped<T>` carrier.
    pub fn is_wrapper(&self) -> bool {
        self.wrapper.is_some()
    }

    /// The carrier vtable, present only for wrapper-shaped types.
    pub fn wrapper(&self) -> Option<&WrapperVtable> {
        self.wrapper.as_ref()
    }

    /// Descriptor of the inner type for wrapper-shaped descriptors.
    pub fn inner(&self) -> Option<PayloadType> {
        self.wrapper.as_ref().map(|w| (w.inner)())
    }
}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadType")
            .field("name", &self.name)
            .field("wrapper", &self.wrapper.is_some())
            .finish()
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PayloadType {}

// =============================================================================
// Tests
// =============================================================================
