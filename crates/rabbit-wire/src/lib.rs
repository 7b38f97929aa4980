//! Text frame codec for the Rabbit protocol.
//!
//! This crate implements spec §4.1 (Frame Codec) in isolation from session,
//! lane, or verb semantics: it knows how to turn an octet stream into
//! [`Frame`]s and back, and nothing else.

mod codec;
mod error;
mod frame;
mod header;
mod limits;

pub use codec::FrameCodec;
pub use error::{DecodeError, EncodeError};
pub use frame::{Body, Frame, StartLine};
pub use header::Headers;
pub use limits::{DEFAULT_BODY_MAX, DEFAULT_HEADER_BLOCK_MAX};
