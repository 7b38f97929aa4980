//! The protocol engine: drives one [`Tunnel`]'s read loop against the
//! handshake, verb dispatcher, and subscription engine (spec §4.2 "Per-
//! tunnel read loop").
//!
//! `AUTH`/`CHALLENGE` (spec §4.4) is not wired into this loop yet: frames
//! it doesn't recognize as `HELLO`/`ACK`/`CREDIT`/`CANCEL`/`SUBSCRIBE`/
//! `PUBLISH` fall through to the verb dispatcher, which answers `AUTH`
//! with `400 BAD REQUEST` until that flow is built.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use parking_lot::Mutex;
use rabbit_core::{
    Capabilities, Identity, LaneMode, Session, StatusCode, Transport, Tunnel, TunnelError,
};
use rabbit_proto::{
    respond_hello, ContinuityOracle, DispatchOutcome, Dispatcher, HandshakeOutcome, HelloRequest,
    IdemCache, ResumeRegistry, TopicRegistry, Verb,
};
use rabbit_registry::SelectorResolver;
use rabbit_wire::{Body, Frame, StartLine};
use tracing::{debug, warn};

/// How many distinct `(selector, Idem)` pairs to remember per lane before
/// evicting the oldest (spec §9 Open Question (c)).
const IDEM_CAPACITY_PER_LANE: usize = 256;
const IDEM_TTL: Duration = Duration::from_secs(60);

/// Consecutive missed `PONG`s (or any other inbound traffic) tolerated
/// before the tunnel is declared dead (spec §5 "heartbeat").
const MAX_MISSED_HEARTBEATS: u32 = 2;

/// Lane carrying heartbeat `PING`s; lane 0 is always opened at `HELLO`.
const HEARTBEAT_LANE: u16 = 0;

/// One burrow's side of a tunnel: owns the dispatcher, subscription
/// registry, and resumption state a live connection needs.
pub struct Burrow<R: SelectorResolver> {
    tunnel: Arc<Tunnel>,
    dispatcher: Dispatcher<R>,
    topics: Arc<TopicRegistry>,
    resumes: Arc<ResumeRegistry>,
    oracle: Option<Arc<dyn ContinuityOracle>>,
    idem: IdemCache,
    our_caps: Capabilities,
    session: Mutex<Option<Session>>,
    /// Lane id -> `(topic, subscriber_id)` for lanes currently subscribed,
    /// so an `ACK` on that lane can free the subscriber's inflight slots.
    subscriptions: Mutex<HashMap<u16, (String, u64)>>,
    missed_heartbeats: AtomicU32,
}

impl<R: SelectorResolver> Burrow<R> {
    pub fn new(
        tunnel: Arc<Tunnel>,
        dispatcher: Dispatcher<R>,
        topics: Arc<TopicRegistry>,
        resumes: Arc<ResumeRegistry>,
        our_caps: Capabilities,
    ) -> Self {
        Self {
            tunnel,
            dispatcher,
            topics,
            resumes,
            oracle: None,
            idem: IdemCache::new(IDEM_CAPACITY_PER_LANE, IDEM_TTL),
            our_caps,
            session: Mutex::new(None),
            subscriptions: Mutex::new(HashMap::new()),
            missed_heartbeats: AtomicU32::new(0),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn ContinuityOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn tunnel(&self) -> &Arc<Tunnel> {
        &self.tunnel
    }

    pub fn session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    fn principal(&self) -> String {
        match self.session.lock().as_ref().map(|s| &s.identity) {
            Some(Identity::Anonymous) | None => "anonymous".to_string(),
            Some(Identity::Ed25519 { pubkey }) => format!("ed25519:{pubkey}"),
        }
    }

    /// Drive the tunnel's read loop until it closes or a fatal error
    /// occurs. Per-frame errors are logged and answered on the wire rather
    /// than ending the loop, except transport-level closure.
    ///
    /// Idle periods longer than `config.heartbeat` (spec §5) trigger a
    /// `PING` on the heartbeat lane; `MAX_MISSED_HEARTBEATS` consecutive
    /// idle periods with no inbound traffic at all close the tunnel as
    /// dead. Any inbound frame, not just a `PONG`, counts as liveness.
    pub async fn run(&self) -> Result<(), TunnelError> {
        let result = self.run_inner().await;
        self.save_for_resume();
        result
    }

    async fn run_inner(&self) -> Result<(), TunnelError> {
        let heartbeat = self.tunnel.config().heartbeat;
        loop {
            match tokio::time::timeout(heartbeat, self.tunnel.recv()).await {
                Ok(Ok((lane_id, frame))) => {
                    self.missed_heartbeats.store(0, Ordering::Relaxed);
                    if let Err(e) = self.handle_frame(lane_id, &frame).await {
                        warn!(error = %e, lane = lane_id, verb = %frame.start.word, "error handling frame");
                    }
                }
                Ok(Err(TunnelError::Transport(rabbit_core::TransportError::Closed))) => {
                    return Ok(())
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "tunnel recv error, ending run loop");
                    return Err(e);
                }
                Err(_elapsed) => {
                    let missed = self.missed_heartbeats.fetch_add(1, Ordering::Relaxed) + 1;
                    if missed > MAX_MISSED_HEARTBEATS {
                        warn!(missed, "no activity across heartbeat window, closing tunnel");
                        self.tunnel.close();
                        return Ok(());
                    }
                    debug!(missed, "heartbeat idle timeout, sending PING");
                    self.tunnel.open_lane(HEARTBEAT_LANE).ok();
                    let ping = Frame::new(StartLine::new("PING", vec![]));
                    if let Err(e) = self.tunnel.send(HEARTBEAT_LANE, ping, true).await {
                        warn!(error = %e, "failed to send heartbeat PING");
                    }
                }
            }
        }
    }

    /// Saves the current session into the resume registry, keyed by its
    /// resume token, with each lane's last-accepted inbound seq (spec §4.4
    /// "Resumption") so a later `HELLO` with `Resume:` on a fresh tunnel
    /// can pick up where this one left off.
    fn save_for_resume(&self) {
        let Some(session) = self.session() else { return };
        if !session.can_resume() {
            return;
        }
        let Some(token) = session.resume_token.clone() else { return };
        let mut lane_acks = HashMap::new();
        for lane_id in self.tunnel.lane_ids() {
            if let Ok(ack) = self
                .tunnel
                .with_lane(lane_id, |lane| lane.peer_seq_expected().saturating_sub(1))
            {
                lane_acks.insert(lane_id, ack);
            }
        }
        self.resumes.save(token, session, lane_acks);
    }

    async fn handle_frame(&self, lane_id: u16, frame: &Frame) -> Result<(), TunnelError> {
        match Verb::from_word(&frame.start.word) {
            Some(Verb::Hello) => self.handle_hello(lane_id, frame).await,
            Some(Verb::Ack) => self.handle_ack(lane_id, frame),
            Some(Verb::Credit) => self.handle_credit(lane_id, frame),
            Some(Verb::Cancel) => self.handle_cancel(lane_id, frame).await,
            Some(Verb::Subscribe) => self.handle_subscribe(lane_id, frame).await,
            Some(Verb::Publish) => self.handle_publish(lane_id, frame).await,
            _ => self.handle_request(lane_id, frame).await,
        }
    }

    async fn handle_hello(&self, lane_id: u16, frame: &Frame) -> Result<(), TunnelError> {
        let req = match HelloRequest::parse(frame) {
            Ok(r) => r,
            Err(_) => return self.respond_status(lane_id, frame, StatusCode::BadHello).await,
        };
        let (session, outcome, resp) =
            respond_hello(&req, self.our_caps, &self.resumes, self.tunnel.config().resume_ttl);
        if let HandshakeOutcome::Resumed { lane_acks } = &outcome {
            for (&lid, &ack) in lane_acks {
                self.tunnel.open_lane(lid)?;
                self.tunnel.with_lane(lid, |lane| lane.resync_inbound_seq(ack + 1))?;
            }
        }
        *self.session.lock() = Some(session);
        self.tunnel.send(lane_id, resp, true).await
    }

    /// `LIST`/`FETCH`/`SEARCH`/`DESCRIBE`/`OFFER`/`PING`, and anything else
    /// the dispatcher doesn't own (answered `400 BAD REQUEST`).
    ///
    /// A `Timeout:` header (spec §4.2/§6) bounds how long the responder may
    /// take before it must answer `408 TIMEOUT` instead of the normal
    /// response.
    async fn handle_request(&self, lane_id: u16, frame: &Frame) -> Result<(), TunnelError> {
        if let (Some(selector), Some(idem)) = (frame.start.args.first(), frame.headers.get("Idem")) {
            if !self.idem.check_and_record(lane_id, selector, idem) {
                debug!(lane = lane_id, selector, "duplicate Idem, not redispatching");
                return Ok(());
            }
        }

        let deadline = frame
            .headers
            .get("Timeout")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis);

        let outcome = match deadline {
            Some(d) => match tokio::time::timeout(d, self.dispatch_owned(frame)).await {
                Ok(outcome) => outcome,
                Err(_elapsed) => {
                    debug!(lane = lane_id, ?d, "request exceeded its Timeout:, answering 408");
                    return self.respond_status(lane_id, frame, StatusCode::Timeout).await;
                }
            },
            None => self.dispatch_owned(frame).await,
        };

        match outcome {
            Ok(DispatchOutcome::Single(resp)) => self.tunnel.send(lane_id, resp, false).await,
            Ok(DispatchOutcome::Chunked { envelope, chunks }) => {
                self.send_chunked(lane_id, frame, envelope, chunks).await
            }
            Err(Some(err)) => self.respond_status(lane_id, frame, err.status()).await,
            Err(None) => self.respond_status(lane_id, frame, StatusCode::BadRequest).await,
        }
    }

    /// Wraps the (synchronous, non-blocking) dispatcher call as a `Future`
    /// so it can be raced against a `Timeout:` deadline with
    /// `tokio::time::timeout`. The `yield_now` gives the runtime a chance
    /// to observe an already-elapsed deadline before this resolves.
    async fn dispatch_owned(&self, frame: &Frame) -> Result<DispatchOutcome, Option<rabbit_proto::DispatchError>> {
        tokio::task::yield_now().await;
        self.dispatcher.dispatch(&self.principal(), frame)
    }

    async fn send_chunked(
        &self,
        lane_id: u16,
        req: &Frame,
        envelope: Frame,
        chunks: Vec<Bytes>,
    ) -> Result<(), TunnelError> {
        self.tunnel.send(lane_id, envelope, false).await?;
        let txn = req.txn().unwrap_or_default().to_string();
        let last_index = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let part = match i {
                0 if last_index == 0 => "END",
                0 => "BEGIN",
                i if i == last_index => "END",
                _ => "MORE",
            };
            let mut part_frame = Frame::new(StartLine::new("PART", vec![]));
            part_frame.headers.push("Txn", txn.clone()).ok();
            part_frame.headers.push("Part", part).ok();
            part_frame.body = Body::Full(chunk);
            self.tunnel.send(lane_id, part_frame, false).await?;
        }
        Ok(())
    }

    fn handle_ack(&self, lane_id: u16, frame: &Frame) -> Result<(), TunnelError> {
        if let Some(k) = frame.headers.get("Ack").and_then(|v| v.parse::<u64>().ok()) {
            self.tunnel.with_lane(lane_id, |lane| lane.record_peer_ack(k))?;
            if let Some((topic, sub_id)) = self.subscriptions.lock().get(&lane_id).cloned() {
                self.topics.ack(&topic, sub_id, k);
            }
        }
        Ok(())
    }

    fn handle_credit(&self, lane_id: u16, frame: &Frame) -> Result<(), TunnelError> {
        if let Some(n) = frame.headers.get("Credit").and_then(parse_credit_delta) {
            self.tunnel.with_lane(lane_id, |lane| lane.grant_send_credit(n))?;
        }
        Ok(())
    }

    /// Spec §4.2: on `CANCEL` the peer stops producing, drains any chunked
    /// body in progress, and responds `499 CANCELED`.
    async fn handle_cancel(&self, lane_id: u16, frame: &Frame) -> Result<(), TunnelError> {
        match frame.txn() {
            Some(txn) => {
                self.tunnel.with_lane(lane_id, |lane| lane.close_txn(txn))?;
                self.respond_status(lane_id, frame, StatusCode::Canceled).await
            }
            None => {
                // The 499 must go out before the lane is torn down: closing
                // removes it from the tunnel's lane table, after which a
                // send targeting it fails with UnknownLane.
                let resp = self.respond_status(lane_id, frame, StatusCode::Canceled).await;
                self.tunnel.close_lane(lane_id);
                if let Some((topic, sub_id)) = self.subscriptions.lock().remove(&lane_id) {
                    self.topics.unsubscribe(&topic, sub_id);
                }
                resp
            }
        }
    }

    async fn handle_subscribe(&self, lane_id: u16, frame: &Frame) -> Result<(), TunnelError> {
        let Some(selector) = frame.start.args.first().cloned() else {
            return self.respond_status(lane_id, frame, StatusCode::BadRequest).await;
        };
        let sub_id = self.topics.subscribe(&selector, lane_id);
        self.subscriptions.lock().insert(lane_id, (selector.clone(), sub_id));
        self.tunnel.with_lane(lane_id, |lane| lane.mode = LaneMode::Subscribed)?;

        let mut resp = Frame::new(StartLine::new("201", vec!["SUBSCRIBED".to_string()]));
        resp.headers.push("Sub", sub_id.to_string()).ok();
        if let Some(txn) = frame.txn() {
            resp.headers.push("Txn", txn.to_string()).ok();
        }
        self.tunnel.send(lane_id, resp, true).await?;

        if let (Some(since), Some(oracle)) = (frame.headers.get("Since"), &self.oracle) {
            if let Ok(since_seq) = since.parse::<u64>() {
                for (seq, payload, _at) in self.topics.backfill(&selector, oracle.as_ref(), since_seq) {
                    self.send_event(lane_id, &selector, seq, payload).await?;
                }
            }
        }
        Ok(())
    }

    /// Fans out to every subscriber of the topic, tolerating a failed send
    /// to any one subscriber's lane (e.g. its credit is exhausted) without
    /// aborting delivery to the rest (spec §8 Isolation: "a lane exhausting
    /// credit does not delay progress on any other lane of the same
    /// tunnel") or skipping the publisher's own `204 DONE` ack.
    async fn handle_publish(&self, lane_id: u16, frame: &Frame) -> Result<(), TunnelError> {
        let Some(selector) = frame.start.args.first().cloned() else {
            return self.respond_status(lane_id, frame, StatusCode::BadRequest).await;
        };
        let payload = frame.body.as_bytes().cloned().unwrap_or_default();
        if let Some(oracle) = &self.oracle {
            oracle.append(&selector, payload.clone(), SystemTime::now());
        }
        let (deliveries, overflowed) = self.topics.publish(&selector, payload);
        for delivery in deliveries {
            if let Err(e) = self
                .send_event(delivery.lane, &selector, delivery.seq, delivery.payload)
                .await
            {
                warn!(
                    error = %e,
                    subscriber = delivery.subscriber_id,
                    lane = delivery.lane,
                    topic = %selector,
                    "failed to deliver event to subscriber, continuing to others",
                );
            }
        }
        for (sub_id, _err) in overflowed {
            warn!(subscriber = sub_id, topic = %selector, "flow-limit exceeded, dropping subscriber");
        }
        self.respond_status(lane_id, frame, StatusCode::Done).await
    }

    async fn send_event(&self, lane_id: u16, selector: &str, seq: u64, payload: Bytes) -> Result<(), TunnelError> {
        let mut ev = Frame::new(StartLine::new("EVENT", vec![selector.to_string()]));
        ev.headers.push("Seq", seq.to_string()).ok();
        ev.headers.push("Length", payload.len().to_string()).ok();
        ev.body = Body::Full(payload);
        self.tunnel.send(lane_id, ev, false).await
    }

    async fn respond_status(&self, lane_id: u16, req: &Frame, status: StatusCode) -> Result<(), TunnelError> {
        let mut resp = Frame::new(StartLine::new(
            status.code().to_string(),
            vec![status.default_reason().to_string()],
        ));
        if let Some(lane) = req.headers.get("Lane") {
            resp.headers.push("Lane", lane.to_string()).ok();
        }
        if let Some(txn) = req.txn() {
            resp.headers.push("Txn", txn.to_string()).ok();
        }
        self.tunnel.send(lane_id, resp, true).await
    }
}

/// Parses a `Credit: +N` header value.
fn parse_credit_delta(v: &str) -> Option<u32> {
    v.strip_prefix('+').unwrap_or(v).parse().ok()
}

/// Convenience constructor for a [`Burrow`] wrapping a fresh [`Tunnel`]
/// over `transport`, with its own topic registry and the given (usually
/// shared, listener-lifetime) resumption registry.
pub fn new_tunnel<R: SelectorResolver>(
    transport: Transport,
    config: rabbit_core::BurrowConfig,
    dispatcher: Dispatcher<R>,
    our_caps: Capabilities,
    resumes: Arc<ResumeRegistry>,
) -> Burrow<R> {
    let initial_inflight = config.max_inflight_per_subscriber;
    let tunnel = Tunnel::new(transport, config);
    Burrow::new(
        tunnel,
        dispatcher,
        Arc::new(TopicRegistry::new(initial_inflight)),
        resumes,
        our_caps,
    )
}
