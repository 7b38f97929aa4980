//! The discovery collaborator (spec §6: "Discovery: `peers() →
//! iterator<identity>` (feeds `OFFER /warren`)."). UDP multicast discovery
//! itself is out of scope for the core (spec §1); this is the seam it
//! would feed into.

/// One peer burrow known to a warren.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub burrow: String,
    /// `ed25519:<pubkey>` or `dns:<name>` (spec §4.5 "`OFFER /warren`").
    pub identity: String,
}

impl PeerInfo {
    pub fn new(burrow: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            burrow: burrow.into(),
            identity: identity.into(),
        }
    }
}

pub trait Discovery: Send + Sync {
    fn peers(&self) -> Vec<PeerInfo>;
}

/// A fixed peer list, for tests and small static warrens.
#[derive(Debug, Default, Clone)]
pub struct StaticDiscovery(Vec<PeerInfo>);

impl StaticDiscovery {
    pub fn new(peers: Vec<PeerInfo>) -> Self {
        Self(peers)
    }
}

impl Discovery for StaticDiscovery {
    fn peers(&self) -> Vec<PeerInfo> {
        self.0.clone()
    }
}
