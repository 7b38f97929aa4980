//! Session identity and resumption state (spec §3 "Session").
//!
//! A [`Session`] is what a [`crate::Tunnel`] negotiates at `HELLO` and what
//! survives a transport restart during the resumption window. It carries
//! identity, the negotiated capability set, trust level, and the opaque
//! resume token a peer presents to restore lane state.

use std::time::Instant;

use bitflags::bitflags;

bitflags! {
    /// Recognized capabilities (spec §6: "Recognized caps: `lanes`
    /// (required), `async`, `ui`, `resume`, `chunked`, `events`"), plus the
    /// `since-token` capability bit this implementation adds to gate
    /// opaque-cursor `Since:` values (spec §9 Open Question (a)).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const LANES       = 0b0000_0001;
        const ASYNC       = 0b0000_0010;
        const UI          = 0b0000_0100;
        const RESUME      = 0b0000_1000;
        const CHUNKED     = 0b0001_0000;
        const EVENTS      = 0b0010_0000;
        const SINCE_TOKEN = 0b0100_0000;
    }
}

impl Capabilities {
    /// Parse a comma-separated `Caps:` header value.
    pub fn parse(value: &str) -> Self {
        let mut caps = Capabilities::empty();
        for tok in value.split(',').map(str::trim) {
            caps |= match tok {
                "lanes" => Capabilities::LANES,
                "async" => Capabilities::ASYNC,
                "ui" => Capabilities::UI,
                "resume" => Capabilities::RESUME,
                "chunked" => Capabilities::CHUNKED,
                "events" => Capabilities::EVENTS,
                "since-token" => Capabilities::SINCE_TOKEN,
                _ => Capabilities::empty(),
            };
        }
        caps
    }

    /// Render back to the wire's comma-separated form, in a stable order.
    pub fn render(self) -> String {
        let pairs: &[(Capabilities, &str)] = &[
            (Capabilities::LANES, "lanes"),
            (Capabilities::ASYNC, "async"),
            (Capabilities::UI, "ui"),
            (Capabilities::RESUME, "resume"),
            (Capabilities::CHUNKED, "chunked"),
            (Capabilities::EVENTS, "events"),
            (Capabilities::SINCE_TOKEN, "since-token"),
        ];
        pairs
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Identity asserted by a peer at `HELLO` (spec §3: "Identity (anonymous or
/// `ed25519:<pubkey>`)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Ed25519 { pubkey: String },
}

impl Identity {
    /// Parse a `From:` header value of the form `ed25519:<hex-pubkey>`, or
    /// anonymous when absent/empty.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("") => Identity::Anonymous,
            Some(v) => match v.split_once(':') {
                Some(("ed25519", key)) => Identity::Ed25519 {
                    pubkey: key.to_string(),
                },
                _ => Identity::Anonymous,
            },
        }
    }
}

/// Trust level assigned to a session's identity (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    /// Key is self-asserted and unverified against any anchor.
    SelfSigned,
    /// Key matches a previously-seen key for this identity (trust on first
    /// use), but no external anchor vouches for it.
    Anchored,
    /// Key is verified against an external anchor (e.g. a registry entry).
    Verified,
}

/// Negotiated session state produced by the handshake and consumed by the
/// tunnel for the lifetime of the connection, plus the resumption window.
///
/// Spec §3: "Sessions outlive tunnels only for the resumption window."
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub capabilities: Capabilities,
    pub trust: TrustLevel,
    /// Opaque resume token, issued implicitly at `HELLO` (spec §9 Glossary
    /// "Resume token"). Present once the session has a `resume` capability
    /// in its negotiated set.
    pub resume_token: Option<String>,
    pub established_at: Instant,
}

impl Session {
    pub fn new(identity: Identity, capabilities: Capabilities, trust: TrustLevel) -> Self {
        Self {
            identity,
            capabilities,
            trust,
            resume_token: None,
            established_at: Instant::now(),
        }
    }

    /// Negotiate capabilities as the intersection of both sides' `Caps:`
    /// (spec §6: "Capability set is the intersection of both sides'
    /// `Caps:`").
    pub fn negotiate_capabilities(ours: Capabilities, theirs: Capabilities) -> Capabilities {
        ours & theirs
    }

    pub fn can_resume(&self) -> bool {
        self.capabilities.contains(Capabilities::RESUME) && self.resume_token.is_some()
    }

    /// Issue (or reissue) a resume token, recorded for the session's
    /// remaining lifetime.
    pub fn issue_resume_token(&mut self, token: impl Into<String>) {
        self.resume_token = Some(token.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_round_trip_through_wire_form() {
        let caps = Capabilities::parse("lanes,async,resume");
        assert!(caps.contains(Capabilities::LANES));
        assert!(caps.contains(Capabilities::ASYNC));
        assert!(caps.contains(Capabilities::RESUME));
        assert!(!caps.contains(Capabilities::UI));
        assert_eq!(caps.render(), "lanes,async,resume");
    }

    #[test]
    fn unrecognized_caps_are_ignored() {
        let caps = Capabilities::parse("lanes,quantum-teleport");
        assert_eq!(caps, Capabilities::LANES);
    }

    #[test]
    fn negotiation_is_an_intersection() {
        let ours = Capabilities::LANES | Capabilities::ASYNC | Capabilities::RESUME;
        let theirs = Capabilities::LANES | Capabilities::UI;
        let negotiated = Session::negotiate_capabilities(ours, theirs);
        assert_eq!(negotiated, Capabilities::LANES);
    }

    #[test]
    fn identity_parses_ed25519_from_header() {
        assert_eq!(Identity::parse(None), Identity::Anonymous);
        assert_eq!(
            Identity::parse(Some("ed25519:abc123")),
            Identity::Ed25519 {
                pubkey: "abc123".to_string()
            }
        );
    }

    #[test]
    fn resume_requires_both_capability_and_token() {
        let mut session = Session::new(Identity::Anonymous, Capabilities::LANES, TrustLevel::SelfSigned);
        assert!(!session.can_resume());
        session.capabilities |= Capabilities::RESUME;
        assert!(!session.can_resume());
        session.issue_resume_token("tok-1");
        assert!(session.can_resume());
    }
}
