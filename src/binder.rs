//! Contract composition.
//!
//! Binding walks the contract once: classify each declaration, prime codec
//! resolution for every payload type it puts on the wire, and synthesize the
//! invoker. Every adaptation failure — unsupported signature, missing
//! marshaller — surfaces here, so a misconfigured service fails before it
//! serves traffic, never mid-call.

use std::collections::HashMap;

use crate::classify::classify;
use crate::contract::ServiceContract;
use crate::dispatch::{synthesize, Invoker};
use crate::types::{BinderConfig, Result};

/// An immutable, fully composed service: one cached invoker per method.
#[derive(Debug)]
pub struct BoundService {
    name: String,
    invokers: HashMap<String, Invoker>,
}

impl BoundService {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cached invoker for a method, if the contract declared it.
    pub fn invoker(&self, method: &str) -> Option<&Invoker> {
        self.invokers.get(method)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.invokers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }
}

/// Compose a contract against a configuration.
///
/// Consumes the contract: method bodies move into their synthesized
/// invokers, which live for the bound service's lifetime.
pub fn bind(contract: ServiceContract, config: &BinderConfig) -> Result<BoundService> {
    let name = contract.name().to_string();
    let mut invokers = HashMap::with_capacity(contract.len());

    for decl in contract.into_methods() {
        let key = classify(&decl)?;

        // Prime codec resolution so NoMarshaller surfaces now, not on the
        // first call that touches the type.
        for ty in decl.payload_types() {
            config.marshallers().get_or_create(&ty)?;
        }

        tracing::debug!(service = %name, method = %decl.name, ?key, "binding method");
        let method_name = decl.name.clone();
        let invoker = synthesize(decl, key)?;
        invokers.insert(method_name, invoker);
    }

    tracing::info!(service = %name, methods = invokers.len(), "service bound");
    Ok(BoundService { name, invokers })
}

// =============================================================================
// Tests
// =============================================================================
