//! Invoker synthesis and the dispatch table.
//!
//! The table is an exhaustive, hand-curated mapping from [`DispatchKey`] to a
//! recipe. It is data, not control flow: one `match` enumerates every
//! supported key group, a wildcard arm makes absence explicit, and new shapes
//! are added by adding arms. A direct entry means the user body already
//! matches the canonical handler shape and is invoked with no translation
//! (the fast path); every other entry composes the reusable transforms in
//! [`reshape`] plus context injection and argument packing.
//!
//! Synthesis runs once per method at contract-composition time. The produced
//! [`Invoker`] is immutable, holds no hidden state, and is safe to invoke
//! concurrently and repeatedly.

pub mod reshape;

use std::fmt;
use std::sync::Arc;

use futures::future;

use crate::classify::{ContextShape, DispatchKey, ElisionShape, MethodShape, ResultShape};
use crate::context::{CallContext, ServerContext};
use crate::contract::{
    LogicalArgs, MethodBody, MethodDecl, MethodFuture, ParamRole, ReturnRole, ServiceInstance,
};
use crate::payload::{ArgList, PayloadValue};
use crate::streams::{PayloadReader, PayloadWriter};
use crate::types::{Error, Result};

// =============================================================================
// Canonical call surface
// =============================================================================

/// The canonical inputs the transport hands to an invoker: at most one unary
/// request payload, the stream halves the method shape requires, and the
/// native per-call context.
pub struct CanonicalCall {
    pub request: Option<PayloadValue>,
    pub reader: Option<Box<dyn PayloadReader>>,
    pub writer: Option<Box<dyn PayloadWriter>>,
    pub context: ServerContext,
}

impl CanonicalCall {
    /// Unary call with a request payload.
    pub fn unary(request: PayloadValue, context: ServerContext) -> Self {
        Self {
            request: Some(request),
            reader: None,
            writer: None,
            context,
        }
    }

    /// Unary call with an elided (empty) request.
    pub fn empty(context: ServerContext) -> Self {
        Self {
            request: None,
            reader: None,
            writer: None,
            context,
        }
    }

    /// Client-streaming call.
    pub fn client_stream(reader: Box<dyn PayloadReader>, context: ServerContext) -> Self {
        Self {
            request: None,
            reader: Some(reader),
            writer: None,
            context,
        }
    }

    /// Server-streaming call.
    pub fn server_stream(
        request: Option<PayloadValue>,
        writer: Box<dyn PayloadWriter>,
        context: ServerContext,
    ) -> Self {
        Self {
            request,
            reader: None,
            writer: Some(writer),
            context,
        }
    }

    /// Duplex call.
    pub fn duplex(
        reader: Box<dyn PayloadReader>,
        writer: Box<dyn PayloadWriter>,
        context: ServerContext,
    ) -> Self {
        Self {
            request: None,
            reader: Some(reader),
            writer: Some(writer),
            context,
        }
    }
}

impl fmt::Debug for CanonicalCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalCall")
            .field("request", &self.request.is_some())
            .field("reader", &self.reader.is_some())
            .field("writer", &self.writer.is_some())
            .field("method", &self.context.method)
            .finish()
    }
}

/// Canonical handler function: (service, canonical call) -> completion.
pub type InvokerFn = dyn Fn(ServiceInstance, CanonicalCall) -> MethodFuture + Send + Sync;

/// A synthesized adapter bound to one concrete method. Built once per method
/// at composition time, cached for the contract's lifetime, never mutated.
#[derive(Clone)]
pub struct Invoker {
    key: DispatchKey,
    func: Arc<InvokerFn>,
}

impl Invoker {
    pub(crate) fn new(key: DispatchKey, func: Arc<InvokerFn>) -> Self {
        Self { key, func }
    }

    /// The classification key this invoker was synthesized for.
    pub fn key(&self) -> DispatchKey {
        self.key
    }

    /// Run the adapted call.
    pub fn invoke(&self, service: ServiceInstance, call: CanonicalCall) -> MethodFuture {
        (self.func)(service, call)
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker").field("key", &self.key).finish()
    }
}

// =============================================================================
// Dispatch table
// =============================================================================

type WrapFn = fn(PayloadValue) -> Result<PayloadValue>;

/// How the canonical request payload maps onto the method's logical
/// parameters. Slot unwrap functions are bound at composition time for
/// scalar parameters.
enum RequestPlan {
    /// Request elided; the method takes no request argument.
    Elided,
    /// One logical parameter receives the whole payload.
    Single { unwrap: Option<WrapFn> },
    /// The payload is an [`ArgList`] distributed positionally.
    Multi { slots: Vec<Option<WrapFn>> },
}

/// Everything a recipe needs, derived from one declaration plus its key.
struct Plan {
    method: String,
    key: DispatchKey,
    body: MethodBody,
    request: RequestPlan,
    wrap_response: Option<WrapFn>,
}

type Recipe = fn(Plan) -> Invoker;

enum RecipeEntry {
    /// Already canonical; invoked directly with no translation.
    Direct,
    Adapt(Recipe),
}

/// The classification-to-recipe table.
///
/// Arm groups mirror the supported signature matrix:
///   - canonical bodies are a direct match for all four method shapes
///   - unary accepts every general-purpose context, every single-value
///     completion convention, and all elision combinations
///   - client streaming accepts awaitable completions (the request is the
///     stream itself, so only the response can be elided)
///   - server streaming and duplex accept lazy-sequence results only
///
/// Absence from this match is the single source of "unsupported".
fn lookup(key: DispatchKey) -> Option<RecipeEntry> {
    use ContextShape as C;
    use ElisionShape as E;
    use MethodShape as M;
    use ResultShape as R;

    match (key.method, key.context, key.result, key.elision) {
        // Canonical server methods: no mapping required.
        (_, C::NativeContext, R::Future, E::None) => Some(RecipeEntry::Direct),

        // Unary: service.method([args..][, ctx]) -> value | future | light
        (M::Unary, C::None | C::CallContext | C::Cancellation, R::Sync | R::Future | R::LightFuture, _) => {
            Some(RecipeEntry::Adapt(adapt_unary))
        }

        // Client streaming: service.method(sequence[, ctx]) -> future | light
        (M::ClientStream, C::None | C::CallContext | C::Cancellation, R::Future | R::LightFuture, E::None | E::Response) => {
            Some(RecipeEntry::Adapt(adapt_client_stream))
        }

        // Server streaming: service.method([request][, ctx]) -> sequence
        (M::ServerStream, C::None | C::CallContext | C::Cancellation, R::Stream, E::None | E::Request) => {
            Some(RecipeEntry::Adapt(adapt_server_stream))
        }

        // Duplex: service.method(sequence[, ctx]) -> sequence
        (M::Duplex, C::None | C::CallContext | C::Cancellation, R::Stream, E::None) => {
            Some(RecipeEntry::Adapt(adapt_duplex))
        }

        _ => None,
    }
}

/// True when the key has a recipe (including the direct fast path).
pub fn is_supported(key: DispatchKey) -> bool {
    lookup(key).is_some()
}

const METHOD_SHAPES: [MethodShape; 4] = [
    MethodShape::Unary,
    MethodShape::ClientStream,
    MethodShape::ServerStream,
    MethodShape::Duplex,
];
const CONTEXT_SHAPES: [ContextShape; 4] = [
    ContextShape::None,
    ContextShape::CallContext,
    ContextShape::Cancellation,
    ContextShape::NativeContext,
];
const RESULT_SHAPES: [ResultShape; 4] = [
    ResultShape::Sync,
    ResultShape::Future,
    ResultShape::LightFuture,
    ResultShape::Stream,
];
const ELISION_SHAPES: [ElisionShape; 4] = [
    ElisionShape::None,
    ElisionShape::Request,
    ElisionShape::Response,
    ElisionShape::Both,
];

/// Enumerate every key the table holds a recipe for.
pub fn supported_keys() -> impl Iterator<Item = DispatchKey> {
    METHOD_SHAPES.into_iter().flat_map(|method| {
        CONTEXT_SHAPES.into_iter().flat_map(move |context| {
            RESULT_SHAPES.into_iter().flat_map(move |result| {
                ELISION_SHAPES.into_iter().filter_map(move |elision| {
                    let key = DispatchKey {
                        method,
                        context,
                        result,
                        elision,
                    };
                    is_supported(key).then_some(key)
                })
            })
        })
    })
}

/// Introspection hook: number of supported keys reachable without opting
/// into the native context surface. Diagnostics only.
pub fn general_purpose_signature_count() -> usize {
    supported_keys()
        .filter(|key| {
            matches!(
                key.context,
                ContextShape::None | ContextShape::CallContext | ContextShape::Cancellation
            )
        })
        .count()
}

// =============================================================================
// Synthesis
// =============================================================================

/// Build the invoker for one classified method, consuming its declaration.
///
/// A key absent from the table is a configuration-time error, surfaced here
/// (via the binder) rather than when a call arrives.
pub fn synthesize(decl: MethodDecl, key: DispatchKey) -> Result<Invoker> {
    let Some(entry) = lookup(key) else {
        tracing::warn!(method = %decl.name, ?key, "signature has no dispatch entry");
        return Err(Error::unsupported_signature(
            &decl.name,
            format!("no dispatch entry for {key:?}"),
        ));
    };
    tracing::debug!(method = %decl.name, ?key, "synthesizing invoker");

    match entry {
        RecipeEntry::Direct => match decl.body {
            MethodBody::Native(func) => Ok(Invoker::new(key, func)),
            other => Err(Error::internal(format!(
                "direct dispatch entry requires a native body, got {}",
                other.kind()
            ))),
        },
        RecipeEntry::Adapt(recipe) => Ok(recipe(Plan::build(decl, key))),
    }
}

impl Plan {
    fn build(decl: MethodDecl, key: DispatchKey) -> Self {
        let mut slots = Vec::new();
        for param in decl.request_params() {
            if let ParamRole::Request(ty) = param {
                slots.push(ty.wrapper().map(|w| w.unwrap));
            }
        }
        let request = match slots.len() {
            0 => RequestPlan::Elided,
            1 => RequestPlan::Single {
                unwrap: slots.remove(0),
            },
            _ => RequestPlan::Multi { slots },
        };

        // Wrapping only applies to single-value canonical payloads; lazy
        // sequences and elided responses are left untouched.
        let wrap_response = match decl.returns {
            ReturnRole::Message(ty) if key.result != ResultShape::Stream => {
                ty.wrapper().map(|w| w.wrap)
            }
            _ => None,
        };

        Self {
            method: decl.name,
            key,
            body: decl.body,
            request,
            wrap_response,
        }
    }
}

// =============================================================================
// Transforms shared by recipes
// =============================================================================

/// Context injection: the value appended as the last logical argument.
fn context_arg(
    shape: ContextShape,
    service: &ServiceInstance,
    context: &ServerContext,
) -> Option<PayloadValue> {
    match shape {
        ContextShape::None | ContextShape::NativeContext => None,
        ContextShape::CallContext => {
            Some(Box::new(CallContext::new(service.clone(), context.clone())))
        }
        ContextShape::Cancellation => Some(Box::new(context.cancellation.clone())),
    }
}

/// Argument packing: distribute the canonical request payload onto the
/// method's logical parameters, unwrapping scalar carriers per slot.
fn unpack_request(
    plan: &RequestPlan,
    request: Option<PayloadValue>,
    method: &str,
) -> Result<LogicalArgs> {
    match plan {
        RequestPlan::Elided => Ok(Vec::new()),
        RequestPlan::Single { unwrap } => {
            let payload = request.ok_or_else(|| {
                Error::shape_mismatch(format!("{method}: canonical request payload missing"))
            })?;
            let arg = match unwrap {
                Some(unwrap) => unwrap(payload)?,
                None => payload,
            };
            Ok(vec![arg])
        }
        RequestPlan::Multi { slots } => {
            let payload = request.ok_or_else(|| {
                Error::shape_mismatch(format!("{method}: canonical request payload missing"))
            })?;
            let list = payload.downcast::<ArgList>().map_err(|_| {
                Error::shape_mismatch(format!(
                    "{method}: multi-parameter method expects an argument list payload"
                ))
            })?;
            if list.0.len() != slots.len() {
                return Err(Error::shape_mismatch(format!(
                    "{method}: expected {} logical arguments, found {}",
                    slots.len(),
                    list.0.len()
                )));
            }
            let mut args = Vec::with_capacity(slots.len());
            for (slot, component) in slots.iter().zip(list.0) {
                args.push(match slot {
                    Some(unwrap) => unwrap(component)?,
                    None => component,
                });
            }
            Ok(args)
        }
    }
}

/// Completion normalization for single-value conventions: lift the body's
/// convention into one boxed awaitable.
fn single_completion(body: &MethodBody, service: ServiceInstance, args: LogicalArgs) -> MethodFuture {
    match body {
        MethodBody::Sync(f) => Box::pin(future::ready(f(service, args))),
        MethodBody::Future(f) => f(service, args),
        MethodBody::LightFuture(f) => reshape::light_to_future(f(service, args)),
        _ => fail(Error::internal("completion shape mismatch in recipe")),
    }
}

fn fail(err: Error) -> MethodFuture {
    Box::pin(future::ready(Err(err)))
}

// =============================================================================
// Recipes
// =============================================================================

/// Unary: unpack → inject context → call → normalize completion → wrap.
fn adapt_unary(plan: Plan) -> Invoker {
    let Plan {
        method,
        key,
        body,
        request,
        wrap_response,
    } = plan;
    let response_elided = key.elision.response_elided();

    let func: Arc<InvokerFn> = Arc::new(move |service, call| {
        let mut args = match unpack_request(&request, call.request, &method) {
            Ok(args) => args,
            Err(err) => return fail(err),
        };
        if let Some(ctx) = context_arg(key.context, &service, &call.context) {
            args.push(ctx);
        }
        let fut = single_completion(&body, service, args);
        Box::pin(async move {
            let value = fut.await?;
            reshape::finish_single(value, response_elided, wrap_response)
        })
    });
    Invoker::new(key, func)
}

/// Client streaming: intake the canonical reader as the single logical
/// argument, then proceed as unary.
fn adapt_client_stream(plan: Plan) -> Invoker {
    let Plan {
        method,
        key,
        body,
        wrap_response,
        ..
    } = plan;
    let response_elided = key.elision.response_elided();

    let func: Arc<InvokerFn> = Arc::new(move |service, call| {
        let Some(reader) = call.reader else {
            return fail(Error::internal(format!(
                "{method}: canonical stream reader missing"
            )));
        };
        let sequence = reshape::intake(reader, call.context.cancellation.clone());
        let mut args: LogicalArgs = vec![Box::new(sequence)];
        if let Some(ctx) = context_arg(key.context, &service, &call.context) {
            args.push(ctx);
        }
        let fut = single_completion(&body, service, args);
        Box::pin(async move {
            let value = fut.await?;
            reshape::finish_single(value, response_elided, wrap_response)
        })
    });
    Invoker::new(key, func)
}

/// Server streaming: unpack → inject context → call → outtake the produced
/// sequence into the canonical writer.
fn adapt_server_stream(plan: Plan) -> Invoker {
    let Plan {
        method,
        key,
        body,
        request,
        ..
    } = plan;

    let func: Arc<InvokerFn> = Arc::new(move |service, call| {
        let mut args = match unpack_request(&request, call.request, &method) {
            Ok(args) => args,
            Err(err) => return fail(err),
        };
        if let Some(ctx) = context_arg(key.context, &service, &call.context) {
            args.push(ctx);
        }
        let source = match &body {
            MethodBody::Stream(f) => f(service, args),
            _ => return fail(Error::internal("completion shape mismatch in recipe")),
        };
        let cancel = call.context.cancellation.clone();
        let writer = call.writer;
        let method = method.clone();
        Box::pin(async move {
            let mut writer = writer.ok_or_else(|| {
                Error::internal(format!("{method}: canonical stream writer missing"))
            })?;
            reshape::outtake(source, writer.as_mut(), cancel).await?;
            Ok(None)
        })
    });
    Invoker::new(key, func)
}

/// Duplex: intake + call + outtake, all bound to one cancellation token.
fn adapt_duplex(plan: Plan) -> Invoker {
    let Plan { method, key, body, .. } = plan;

    let func: Arc<InvokerFn> = Arc::new(move |service, call| {
        let Some(reader) = call.reader else {
            return fail(Error::internal(format!(
                "{method}: canonical stream reader missing"
            )));
        };
        let cancel = call.context.cancellation.clone();
        let sequence = reshape::intake(reader, cancel.clone());
        let mut args: LogicalArgs = vec![Box::new(sequence)];
        if let Some(ctx) = context_arg(key.context, &service, &call.context) {
            args.push(ctx);
        }
        let source = match &body {
            MethodBody::Stream(f) => f(service, args),
            _ => return fail(Error::internal("completion shape mismatch in recipe")),
        };
        let writer = call.writer;
        let method = method.clone();
        Box::pin(async move {
            let mut writer = writer.ok_or_else(|| {
                Error::internal(format!("{method}: canonical stream writer missing"))
            })?;
            reshape::outtake(source, writer.as_mut(), cancel).await?;
            Ok(None)
        })
    });
    Invoker::new(key, func)
}

// =============================================================================
// Tests
// =============================================================================
