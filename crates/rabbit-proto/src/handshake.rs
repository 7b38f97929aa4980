//! `HELLO`/`AUTH`/`CHALLENGE` handshake and resumption (spec §4.4).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rabbit_core::{Capabilities, Identity, Session, TrustLevel};
use rabbit_wire::{Frame, StartLine};

/// A parsed `HELLO` start-line and its headers.
///
/// Spec §4.4: "initiator sends `HELLO RABBIT/1.0` with `Caps:` and
/// optional `Burrow-ID:`"; resumption adds `Resume:<token>` and
/// `Lanes-Resume: <id>=ACK:<seq>,…`.
#[derive(Debug, Clone)]
pub struct HelloRequest {
    pub caps: Capabilities,
    pub burrow_id: Option<String>,
    pub resume: Option<String>,
    pub lanes_resume: Vec<(u16, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    NotAHello,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::NotAHello => write!(f, "expected a HELLO start-line"),
        }
    }
}

impl std::error::Error for HandshakeError {}

impl HelloRequest {
    pub fn parse(frame: &Frame) -> Result<Self, HandshakeError> {
        if frame.start.word != "HELLO" {
            return Err(HandshakeError::NotAHello);
        }
        let caps = frame
            .headers
            .get("Caps")
            .map(Capabilities::parse)
            .unwrap_or_else(Capabilities::empty);
        let burrow_id = frame.headers.get("Burrow-ID").map(str::to_string);
        let resume = frame.headers.get("Resume").map(str::to_string);
        let lanes_resume = frame
            .headers
            .get("Lanes-Resume")
            .map(parse_lanes_resume)
            .unwrap_or_default();
        Ok(Self {
            caps,
            burrow_id,
            resume,
            lanes_resume,
        })
    }
}

/// Parses `5=ACK:10,7=ACK:3` into `[(5, 10), (7, 3)]`. Malformed entries
/// are skipped rather than failing the whole handshake.
fn parse_lanes_resume(value: &str) -> Vec<(u16, u64)> {
    value
        .split(',')
        .filter_map(|entry| {
            let (lane, ack) = entry.split_once('=')?;
            let ack = ack.strip_prefix("ACK:")?;
            Some((lane.trim().parse().ok()?, ack.trim().parse().ok()?))
        })
        .collect()
}

struct ResumeEntry {
    session: Session,
    lane_acks: HashMap<u16, u64>,
    saved_at: Instant,
}

/// Holds session state across a transport restart, keyed by resume token
/// (spec §3: "Sessions outlive tunnels only for the resumption window.").
pub struct ResumeRegistry {
    entries: Mutex<HashMap<String, ResumeEntry>>,
    next_token: AtomicU64,
}

impl Default for ResumeRegistry {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }
}

impl ResumeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh resume token. Real deployments would draw this from a
    /// CSPRNG; this registry only promises uniqueness within itself.
    pub fn mint_token(&self) -> String {
        let n = self.next_token.fetch_add(1, Ordering::Relaxed);
        format!("rt-{n}")
    }

    pub fn save(&self, token: String, session: Session, lane_acks: HashMap<u16, u64>) {
        self.entries.lock().insert(
            token,
            ResumeEntry {
                session,
                lane_acks,
                saved_at: Instant::now(),
            },
        );
    }

    /// Remove and return the entry for `token` if it exists and is still
    /// within `ttl` of when it was saved.
    fn take_if_valid(&self, token: &str, ttl: Duration) -> Option<(Session, HashMap<u16, u64>)> {
        let mut entries = self.entries.lock();
        let entry = entries.remove(token)?;
        if entry.saved_at.elapsed() > ttl {
            return None;
        }
        Some((entry.session, entry.lane_acks))
    }
}

/// Outcome of processing an inbound `HELLO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Fresh session, no resumption requested or the token was stale.
    Hello,
    /// Resumed from a prior session; carries the lane→ack map the caller
    /// should use to resync each lane's `peer_seq_expected`.
    Resumed { lane_acks: HashMap<u16, u64> },
}

/// Process an inbound `HelloRequest` and build the response frame.
///
/// Spec §4.4: "Returns `200 HELLO` ... or `300 CHALLENGE`"; this engine
/// accepts anonymous/trust-on-first-use unconditionally (channel-binding
/// challenge/proof is the identity provider's concern, see
/// [`crate::identity::IdentityProvider`], not exercised on this path).
pub fn respond_hello(
    req: &HelloRequest,
    our_caps: Capabilities,
    resumes: &ResumeRegistry,
    resume_ttl: Duration,
) -> (Session, HandshakeOutcome, Frame) {
    let negotiated = Session::negotiate_capabilities(our_caps, req.caps);

    if let Some(token) = &req.resume {
        if let Some((mut session, lane_acks)) = resumes.take_if_valid(token, resume_ttl) {
            session.capabilities = negotiated;
            let lanes_header = lane_acks
                .keys()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let mut resp = Frame::new(StartLine::new("201", vec!["RESUMED".to_string()]));
            resp.headers.push("Lanes", lanes_header).unwrap();
            return (session, HandshakeOutcome::Resumed { lane_acks }, resp);
        }
    }

    let identity = Identity::parse(req.burrow_id.as_deref());
    let mut session = Session::new(identity, negotiated, TrustLevel::SelfSigned);
    if negotiated.contains(Capabilities::RESUME) {
        session.issue_resume_token(resumes.mint_token());
    }

    let mut resp = Frame::new(StartLine::new("200", vec!["HELLO".to_string()]));
    resp.headers.push("Caps", negotiated.render()).unwrap();
    if let Some(token) = &session.resume_token {
        resp.headers.push("Resume", token.clone()).unwrap();
    }
    (session, HandshakeOutcome::Hello, resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_frame(caps: &str) -> Frame {
        let mut frame = Frame::new(StartLine::new("HELLO", vec!["RABBIT/1.0".to_string()]));
        frame.headers.push("Caps", caps).unwrap();
        frame
    }

    #[test]
    fn parses_caps_and_burrow_id() {
        let mut frame = hello_frame("lanes,async");
        frame.headers.push("Burrow-ID", "ed25519:abc").unwrap();
        let req = HelloRequest::parse(&frame).unwrap();
        assert_eq!(req.caps, Capabilities::LANES | Capabilities::ASYNC);
        assert_eq!(req.burrow_id.as_deref(), Some("ed25519:abc"));
    }

    #[test]
    fn parses_lanes_resume() {
        let mut frame = hello_frame("lanes,resume");
        frame.headers.push("Lanes-Resume", "5=ACK:10,7=ACK:3").unwrap();
        let req = HelloRequest::parse(&frame).unwrap();
        assert_eq!(req.lanes_resume, vec![(5, 10), (7, 3)]);
    }

    #[test]
    fn fresh_hello_negotiates_intersection() {
        let frame = hello_frame("lanes,async,ui");
        let req = HelloRequest::parse(&frame).unwrap();
        let resumes = ResumeRegistry::new();
        let (session, outcome, resp) = respond_hello(
            &req,
            Capabilities::LANES | Capabilities::ASYNC,
            &resumes,
            Duration::from_secs(60),
        );
        assert_eq!(outcome, HandshakeOutcome::Hello);
        assert_eq!(session.capabilities, Capabilities::LANES | Capabilities::ASYNC);
        assert_eq!(resp.start.word, "200");
    }

    #[test]
    fn resume_within_ttl_restores_lane_acks() {
        let resumes = ResumeRegistry::new();
        let token = resumes.mint_token();
        let mut acks = HashMap::new();
        acks.insert(5u16, 10u64);
        resumes.save(
            token.clone(),
            Session::new(Identity::Anonymous, Capabilities::LANES, TrustLevel::SelfSigned),
            acks.clone(),
        );

        let mut frame = hello_frame("lanes,resume");
        frame.headers.push("Resume", token).unwrap();
        let req = HelloRequest::parse(&frame).unwrap();
        let (_, outcome, resp) = respond_hello(
            &req,
            Capabilities::LANES | Capabilities::RESUME,
            &resumes,
            Duration::from_secs(60),
        );
        assert_eq!(outcome, HandshakeOutcome::Resumed { lane_acks: acks });
        assert_eq!(resp.start.args, vec!["RESUMED".to_string()]);
    }

    #[test]
    fn expired_resume_token_falls_back_to_fresh_hello() {
        let resumes = ResumeRegistry::new();
        let token = resumes.mint_token();
        resumes.save(
            token.clone(),
            Session::new(Identity::Anonymous, Capabilities::LANES, TrustLevel::SelfSigned),
            HashMap::new(),
        );

        let mut frame = hello_frame("lanes,resume");
        frame.headers.push("Resume", token).unwrap();
        let req = HelloRequest::parse(&frame).unwrap();
        let (_, outcome, _) = respond_hello(
            &req,
            Capabilities::LANES | Capabilities::RESUME,
            &resumes,
            Duration::from_secs(0),
        );
        assert_eq!(outcome, HandshakeOutcome::Hello);
    }
}
