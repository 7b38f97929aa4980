//! Handshake, verb dispatch, and the subscription engine: the layer above
//! `rabbit-core`'s transport/lane/tunnel primitives that understands
//! Rabbit's verbs and selectors.

pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod idem;
pub mod subscription;
pub mod verb;

pub use discovery::{Discovery, PeerInfo, StaticDiscovery};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::DispatchError;
pub use handshake::{HandshakeError, HandshakeOutcome, HelloRequest, ResumeRegistry, respond_hello};
pub use identity::{IdentityProvider, NoopIdentityProvider};
pub use idem::IdemCache;
pub use subscription::{ContinuityOracle, Delivery, MemoryOracle, Subscriber, SubscriptionError, TopicRegistry};
pub use verb::Verb;
