//! Convenient imports for building a burrow.
//!
//! ```ignore
//! use rabbit::prelude::*;
//! ```

pub use rabbit_core::{
    BurrowConfig, Capabilities, Identity, Lane, LaneMode, Session, StatusCode, Transport, TrustLevel,
    Tunnel, TunnelError,
};
pub use rabbit_proto::{
    Dispatcher, DispatchOutcome, Discovery, HandshakeOutcome, HelloRequest, IdemCache,
    MemoryOracle, ResumeRegistry, TopicRegistry, Verb,
};
pub use rabbit_registry::{ItemType, MemoryRegistry, Rabbitmap, Selector, SelectorResolver};

pub use crate::engine::Burrow;
