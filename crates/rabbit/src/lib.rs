#![forbid(unsafe_op_in_unsafe_fn)]

//! Rabbit: a text-framed, secure, asynchronous peer-to-peer protocol for
//! hierarchical content networks.
//!
//! This crate is the facade tying `rabbit-core` (transport, lane, and
//! tunnel primitives), `rabbit-registry` (selectors and resolvers), and
//! `rabbit-proto` (handshake, verb dispatch, subscriptions) into a runnable
//! burrow: [`engine::Burrow`] drives one tunnel's read loop, and
//! [`server`] wires that up to a TCP listener.

pub mod engine;
pub mod prelude;

#[cfg(feature = "stream")]
pub mod server;

pub use engine::Burrow;

pub use rabbit_core as core;
pub use rabbit_proto as proto;
pub use rabbit_registry as registry;
