//! Call context types.
//!
//! Two context surfaces exist at the adapter boundary:
//!   - [`ServerContext`] — the transport's native per-call context, passed
//!     verbatim to methods that opt into the canonical shape
//!   - [`CallContext`] — a unified convenience value aggregating caller
//!     metadata and cancellation, injected for methods that declare it

use std::collections::HashMap;
use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::contract::ServiceInstance;

/// Native per-call context supplied by the transport's handler.
#[derive(Debug, Clone)]
pub struct ServerContext {
    /// Remote peer description (transport-defined format).
    pub peer: String,

    /// Full method path being invoked (e.g. `/calculator.Calculator/DoubleIt`).
    pub method: String,

    /// Caller metadata (header key/value pairs).
    pub metadata: HashMap<String, String>,

    /// Per-call cancellation signal. All stream transforms for the call
    /// observe this single token.
    pub cancellation: CancellationToken,
}

impl ServerContext {
    pub fn new(peer: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            method: method.into(),
            metadata: HashMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Unified call context, constructed from (service instance, native context)
/// and appended as the last argument for methods declaring it.
#[derive(Clone)]
pub struct CallContext {
    service: ServiceInstance,
    server: ServerContext,
}

impl CallContext {
    pub fn new(service: ServiceInstance, server: ServerContext) -> Self {
        Self { service, server }
    }

    /// The service instance handling this call.
    pub fn service(&self) -> &ServiceInstance {
        &self.service
    }

    /// The underlying native context.
    pub fn server_context(&self) -> &ServerContext {
        &self.server
    }

    /// Remote peer description.
    pub fn peer(&self) -> &str {
        &self.server.peer
    }

    /// Full method path being invoked.
    pub fn method(&self) -> &str {
        &self.server.method
    }

    /// Caller metadata.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.server.metadata
    }

    /// Per-call cancellation signal.
    pub fn cancellation(&self) -> CancellationToken {
        self.server.cancellation.clone()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("peer", &self.server.peer)
            .field("method", &self.server.method)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn call_context_exposes_server_fields() {
        let server = ServerContext::new("127.0.0.1:5000", "/svc/Method").with_metadata(
            HashMap::from([("trace-id".to_string(), "abc123".to_string())]),
        );
        let service: ServiceInstance = Arc::new(42u32);
        let ctx = CallContext::new(service, server);

        assert_eq!(ctx.peer(), "127.0.0.1:5000");
        assert_eq!(ctx.method(), "/svc/Method");
        assert_eq!(ctx.metadata().get("trace-id").unwrap(), "abc123");
        assert!(!ctx.cancellation().is_cancelled());
    }

    #[test]
    fn cancellation_is_shared_with_server_context() {
        let server = ServerContext::new("peer", "/svc/M");
        let token = server.cancellation.clone();
        let ctx = CallContext::new(Arc::new(()), server);

        token.cancel();
        assert!(ctx.cancellation().is_cancelled());
    }
}
