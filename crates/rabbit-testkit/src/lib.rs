//! Test fixtures shared across the Rabbit workspace's crates.

mod harness;

pub use harness::{anonymous_session, default_tunnel_pair, resumable_session, tunnel_pair, TunnelPair};
