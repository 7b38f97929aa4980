#![forbid(unsafe_op_in_unsafe_fn)]

//! Transport, lane, tunnel, session, and error/status primitives for the
//! Rabbit protocol engine. Frame parsing lives in `rabbit-wire`; selector
//! resolution and verb dispatch live in `rabbit-registry`/`rabbit-proto`.

pub mod config;
pub mod error;
pub mod lane;
pub mod session;
pub mod status;
pub mod tunnel;
mod transport;

pub use config::BurrowConfig;
pub use error::{LaneError, TransportError, TunnelError};
pub use lane::{Lane, LaneMode};
pub use session::{Capabilities, Identity, Session, TrustLevel};
pub use status::{ErrorKind, StatusCode};
pub use transport::Transport;
pub use tunnel::Tunnel;

pub use rabbit_wire::{Body, DecodeError, EncodeError, Frame, FrameCodec, Headers, StartLine};
