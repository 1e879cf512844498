//! # Wirebind - Contract-to-Canonical RPC Binding Engine
//!
//! Lets a plain service contract (method declarations with ordinary
//! parameter and return shapes) be served over an RPC transport whose native
//! surface is exactly four canonical handler shapes, by providing:
//! - Signature classification onto a four-axis dispatch key
//! - Invoker synthesis: one immutable adapter per method, built at
//!   composition time
//! - A layered, lazily-populated marshaller cache over pluggable codec
//!   factories
//! - A scalar-wrapping adapter making non-message payload types wire-legal
//!
//! ## Architecture
//!
//! ```text
//!   ServiceContract ──► Classifier ──► DispatchKey
//!                                          │
//!                                   Dispatch Table ──► recipe
//!                                          │
//!                                     Synthesizer ──► Invoker (cached)
//!                                          │
//!   transport call ──► Invoker ──► user method body
//!            │                           │
//!            └──► MarshallerCache ◄──────┘
//!                 (ValueWrapper adapter for scalar payloads)
//! ```
//!
//! Transport framing, connection management, and contract discovery are
//! external collaborators; this crate only maps user-shaped methods onto the
//! canonical handler shapes and finds byte codecs for payload types.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod binder;
pub mod classify;
pub mod context;
pub mod contract;
pub mod dispatch;
pub mod marshal;
pub mod payload;
pub mod streams;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{BinderConfig, Error, Result};
