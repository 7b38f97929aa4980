//! Fixtures for exercising the engine without a real socket.
//!
//! Mirrors the role the teacher's in-memory transport-pair helpers played
//! for conformance testing, adapted from channel/credit bookkeeping to the
//! lane/tunnel/session primitives in `rabbit-core`.

use std::sync::Arc;

use rabbit_core::{BurrowConfig, Capabilities, Identity, Session, Transport, TrustLevel, Tunnel};

/// A pair of tunnels wired together over an in-memory transport, as if one
/// side had just accepted the other's connection.
pub struct TunnelPair {
    pub initiator: Arc<Tunnel>,
    pub responder: Arc<Tunnel>,
}

/// Build a pair of tunnels sharing an in-memory transport and the given
/// config on both sides.
pub fn tunnel_pair(config: BurrowConfig) -> TunnelPair {
    let (a, b) = Transport::mem_pair();
    TunnelPair {
        initiator: Tunnel::new(a, config.clone()),
        responder: Tunnel::new(b, config),
    }
}

/// Build a pair of tunnels using [`BurrowConfig::default`].
pub fn default_tunnel_pair() -> TunnelPair {
    tunnel_pair(BurrowConfig::default())
}

/// A session with no negotiated identity, useful for exercising dispatch
/// paths that don't depend on trust level.
pub fn anonymous_session(capabilities: Capabilities) -> Session {
    Session::new(Identity::Anonymous, capabilities, TrustLevel::SelfSigned)
}

/// A session that has completed a full-capability handshake, with a resume
/// token already issued, for exercising resumption paths.
pub fn resumable_session(capabilities: Capabilities) -> Session {
    let mut session = Session::new(Identity::Anonymous, capabilities, TrustLevel::SelfSigned);
    session.issue_resume_token("test-resume-token");
    session
}
