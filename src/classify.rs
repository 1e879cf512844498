//! Signature classification.
//!
//! Inspects one method declaration and produces a four-axis [`DispatchKey`],
//! or rejects the shape with `UnsupportedSignature`. Classification is purely
//! structural: whether a produced key actually has a recipe is decided by the
//! dispatch table, so "key present vs. absent" stays checkable in one place.

use crate::contract::{MethodBody, MethodDecl, ParamRole, ReturnRole};
use crate::types::{Error, Result};

/// Request/response cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodShape {
    Unary,
    ClientStream,
    ServerStream,
    Duplex,
}

/// How caller metadata/cancellation is surfaced to the user method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextShape {
    None,
    CallContext,
    Cancellation,
    NativeContext,
}

/// Completion/streaming convention of the user body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    Sync,
    Future,
    LightFuture,
    Stream,
}

/// Whether the request and/or response payload is structurally empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElisionShape {
    None,
    Request,
    Response,
    Both,
}

impl ElisionShape {
    pub fn from_bits(request: bool, response: bool) -> Self {
        match (request, response) {
            (false, false) => ElisionShape::None,
            (true, false) => ElisionShape::Request,
            (false, true) => ElisionShape::Response,
            (true, true) => ElisionShape::Both,
        }
    }

    pub fn request_elided(&self) -> bool {
        matches!(self, ElisionShape::Request | ElisionShape::Both)
    }

    pub fn response_elided(&self) -> bool {
        matches!(self, ElisionShape::Response | ElisionShape::Both)
    }
}

/// Four-axis classification key. Unique per recognized signature shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub method: MethodShape,
    pub context: ContextShape,
    pub result: ResultShape,
    pub elision: ElisionShape,
}

/// Classify one method declaration.
///
/// Rules (in order):
///   - at most one trailing context/cancellation parameter; it sets
///     [`ContextShape`], absence sets `None`
///   - a stream-typed input parameter implies client-stream or duplex; it
///     must be the only request-carrying parameter
///   - [`ResultShape`] is read off the body's completion convention; a stream
///     body is only legal when the declared return is a stream
///   - elision bits: zero remaining request parameters (non-stream shapes)
///     and an empty declared return
///   - native bodies must pair with a native-context declaration and vice
///     versa; they classify as the canonical awaitable shape
pub fn classify(decl: &MethodDecl) -> Result<DispatchKey> {
    let reject = |reason: &str| Err(Error::unsupported_signature(&decl.name, reason));

    // Context parameter: only one, only trailing.
    let context_params = decl.params.iter().filter(|p| p.is_context()).count();
    if context_params > 1 {
        return reject("more than one context-shaped parameter");
    }
    let context = match decl.params.last() {
        Some(ParamRole::CallContext) => ContextShape::CallContext,
        Some(ParamRole::Cancellation) => ContextShape::Cancellation,
        Some(ParamRole::NativeContext) => ContextShape::NativeContext,
        _ if context_params != 0 => {
            return reject("context parameter must be the trailing parameter");
        }
        _ => ContextShape::None,
    };

    // Request cardinality.
    let request_components = decl
        .request_params()
        .filter(|p| matches!(p, ParamRole::Request(_)))
        .count();
    let request_streams = decl
        .request_params()
        .filter(|p| matches!(p, ParamRole::RequestStream(_)))
        .count();
    if request_streams > 1 {
        return reject("more than one stream-typed input parameter");
    }
    if request_streams == 1 && request_components > 0 {
        return reject("stream-typed input cannot mix with plain request parameters");
    }

    let streamed_response = matches!(decl.returns, ReturnRole::Stream(_));
    let method = match (request_streams == 1, streamed_response) {
        (false, false) => MethodShape::Unary,
        (true, false) => MethodShape::ClientStream,
        (false, true) => MethodShape::ServerStream,
        (true, true) => MethodShape::Duplex,
    };

    // Native fast path: the body already matches the canonical handler shape.
    if matches!(decl.body, MethodBody::Native(_)) {
        if context != ContextShape::NativeContext {
            return reject("native-shaped body requires a native context parameter");
        }
        return Ok(DispatchKey {
            method,
            context: ContextShape::NativeContext,
            result: ResultShape::Future,
            elision: ElisionShape::None,
        });
    }
    if context == ContextShape::NativeContext {
        return reject("native context parameter requires a native-shaped body");
    }

    let result = match decl.body {
        MethodBody::Sync(_) => ResultShape::Sync,
        MethodBody::Future(_) => ResultShape::Future,
        MethodBody::LightFuture(_) => ResultShape::LightFuture,
        MethodBody::Stream(_) => ResultShape::Stream,
        // Returned above; kept for a total match.
        MethodBody::Native(_) => ResultShape::Future,
    };
    if result == ResultShape::Stream && !streamed_response {
        return reject("lazy-sequence body requires a stream return");
    }
    if streamed_response && result != ResultShape::Stream {
        return reject("stream return requires a lazy-sequence body");
    }

    let request_elided = request_streams == 0 && request_components == 0;
    let response_elided = matches!(decl.returns, ReturnRole::Empty);
    let elision = ElisionShape::from_bits(request_elided, response_elided);

    Ok(DispatchKey {
        method,
        context,
        result,
        elision,
    })
}

// =============================================================================
// Tests
// =============================================================================
