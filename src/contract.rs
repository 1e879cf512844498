//! Service contract model.
//!
//! A [`ServiceContract`] is an ordered list of method declarations produced by
//! an external discovery step. Each [`MethodDecl`] carries:
//!   - parameter roles in declared order ([`ParamRole`])
//!   - the return role ([`ReturnRole`])
//!   - the user callable in one of the recognized completion conventions
//!     ([`MethodBody`])
//!
//! The contract is pure data: classification, table lookup, and invoker
//! synthesis all happen later, in `binder::bind`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::payload::{downcast_payload, PayloadType, PayloadValue};
use crate::types::{Error, Result};

/// The service instance a bound method executes against.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Logical arguments handed to a user method body: request components first
/// (in declared order), then the injected context value if the method
/// declares one.
pub type LogicalArgs = Vec<PayloadValue>;

/// Canonical single-value completion: `Some(payload)` for a response,
/// `None` for completion-only bodies.
pub type MethodFuture = BoxFuture<'static, Result<Option<PayloadValue>>>;

/// Lazy asynchronous sequence of response payloads.
pub type MethodStream = BoxStream<'static, Result<PayloadValue>>;

/// Lightweight single-value awaitable: may already be complete, avoiding a
/// boxed future for synchronously-available results.
pub enum LightFuture {
    Ready(Result<Option<PayloadValue>>),
    Pending(MethodFuture),
}

impl fmt::Debug for LightFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightFuture::Ready(_) => f.write_str("LightFuture::Ready"),
            LightFuture::Pending(_) => f.write_str("LightFuture::Pending"),
        }
    }
}

/// Downcast a logical argument that carries a request stream (client-stream
/// and duplex bodies receive their input sequence this way).
pub fn downcast_arg_stream(arg: PayloadValue) -> Result<MethodStream> {
    downcast_payload::<MethodStream>(arg)
}

/// Semantic role of one declared parameter.
#[derive(Debug, Clone, Copy)]
pub enum ParamRole {
    /// One logical request payload component.
    Request(PayloadType),
    /// Stream of request payloads (client-streaming input).
    RequestStream(PayloadType),
    /// Trailing unified call context parameter.
    CallContext,
    /// Trailing cancellation-signal parameter.
    Cancellation,
    /// Trailing native call context parameter, used verbatim.
    NativeContext,
}

impl ParamRole {
    /// Request component holding a message type.
    pub fn message<T: Send + 'static>() -> Self {
        Self::Request(PayloadType::message::<T>())
    }

    /// Request component holding a scalar type (travels as `Wrapped<T>`).
    pub fn scalar<T: Send + 'static>() -> Self {
        Self::Request(PayloadType::scalar::<T>())
    }

    /// Request stream of a message type.
    pub fn stream_of<T: Send + 'static>() -> Self {
        Self::RequestStream(PayloadType::message::<T>())
    }

    /// True for the trailing context/cancellation parameter kinds.
    pub fn is_context(&self) -> bool {
        matches!(
            self,
            ParamRole::CallContext | ParamRole::Cancellation | ParamRole::NativeContext
        )
    }
}

/// Semantic role of the declared return.
#[derive(Debug, Clone, Copy)]
pub enum ReturnRole {
    /// Single response payload of a message type.
    Message(PayloadType),
    /// Stream of response payloads.
    Stream(PayloadType),
    /// No logical return value (completion-only).
    Empty,
}

impl ReturnRole {
    /// Single response of a message type.
    pub fn message<T: Send + 'static>() -> Self {
        Self::Message(PayloadType::message::<T>())
    }

    /// Single response of a scalar type (travels as `Wrapped<T>`).
    pub fn scalar<T: Send + 'static>() -> Self {
        Self::Message(PayloadType::scalar::<T>())
    }

    /// Response stream of a message type.
    pub fn stream_of<T: Send + 'static>() -> Self {
        Self::Stream(PayloadType::message::<T>())
    }
}

/// The user callable, in one of the recognized completion conventions.
///
/// Every variant except `Native` is invoked with [`LogicalArgs`]: request
/// components in declared order, then the injected context value when the
/// declaration has one. `Native` bodies already match the canonical handler
/// shape and are invoked directly with no translation (the fast path).
pub enum MethodBody {
    /// Plain value return; lifted into an already-completed future.
    Sync(Box<dyn Fn(ServiceInstance, LogicalArgs) -> Result<Option<PayloadValue>> + Send + Sync>),
    /// Single-value awaitable.
    Future(Box<dyn Fn(ServiceInstance, LogicalArgs) -> MethodFuture + Send + Sync>),
    /// Lightweight awaitable, adapted to a full awaitable.
    LightFuture(Box<dyn Fn(ServiceInstance, LogicalArgs) -> LightFuture + Send + Sync>),
    /// Lazy asynchronous sequence; only legal with a stream return role.
    Stream(Box<dyn Fn(ServiceInstance, LogicalArgs) -> MethodStream + Send + Sync>),
    /// Canonical handler shape: (service, canonical call) -> completion.
    Native(Arc<crate::dispatch::InvokerFn>),
}

impl MethodBody {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            MethodBody::Sync(_) => "sync",
            MethodBody::Future(_) => "future",
            MethodBody::LightFuture(_) => "light-future",
            MethodBody::Stream(_) => "stream",
            MethodBody::Native(_) => "native",
        }
    }
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodBody::{}", self.kind())
    }
}

/// One declared method: roles, return, and body. Immutable once added to a
/// contract.
#[derive(Debug)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<ParamRole>,
    pub returns: ReturnRole,
    pub body: MethodBody,
}

impl MethodDecl {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ParamRole>,
        returns: ReturnRole,
        body: MethodBody,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            body,
        }
    }

    /// Request-component roles, excluding the trailing context parameter.
    pub fn request_params(&self) -> impl Iterator<Item = &ParamRole> {
        self.params.iter().filter(|p| !p.is_context())
    }

    /// Every payload type this method puts on the wire (request components,
    /// stream elements, response). Used to prime marshaller resolution at
    /// composition time.
    pub fn payload_types(&self) -> Vec<PayloadType> {
        let mut types = Vec::new();
        for param in &self.params {
            match param {
                ParamRole::Request(ty) | ParamRole::RequestStream(ty) => types.push(*ty),
                _ => {}
            }
        }
        match self.returns {
            ReturnRole::Message(ty) | ReturnRole::Stream(ty) => types.push(ty),
            ReturnRole::Empty => types.push(PayloadType::empty()),
        }
        types
    }
}

/// Ordered list of method declarations for one service.
#[derive(Debug)]
pub struct ServiceContract {
    name: String,
    methods: Vec<MethodDecl>,
}

impl ServiceContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a method declaration. Names must be unique within the contract.
    pub fn add_method(&mut self, decl: MethodDecl) -> Result<()> {
        if self.methods.iter().any(|m| m.name == decl.name) {
            return Err(Error::duplicate_method(format!(
                "{}/{}",
                self.name, decl.name
            )));
        }
        self.methods.push(decl);
        Ok(())
    }

    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    /// Consume the contract, yielding declarations in registration order.
    /// Used by the binder, which moves each body into its invoker.
    pub fn into_methods(self) -> Vec<MethodDecl> {
        self.methods
    }

    pub fn get(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
