//! Per-lane state machine (spec §4.2).
//!
//! A [`Lane`] is the unit the tunnel multiplexer demultiplexes frames onto.
//! It owns sequencing, cumulative acking, credit bookkeeping, chunked-body
//! reassembly, and the coarse request/stream/subscription mode a lane is
//! in. The lane itself does not touch the transport; the tunnel
//! multiplexer (`tunnel.rs`) owns the lane table and write path.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use bytes::{Bytes, BytesMut};

use crate::error::LaneError;

/// Lane lifecycle state.
///
/// Spec §4.2: "States: `Idle → Request → (Streaming | Subscribed | Done)`,
/// any non-terminal → `Closing` on `CANCEL` or fatal error."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneMode {
    Idle,
    Request,
    Streaming,
    Subscribed,
    Done,
    Closing,
}

/// In-progress chunked body reassembly for one `Txn:`.
///
/// Spec §9: "Chunked reassembly must cap buffered bytes per `Txn`; overflow
/// yields `400 frame-too-large` and cancels the `Txn`."
#[derive(Debug)]
struct Reassembly {
    buf: BytesMut,
}

/// Per-lane protocol state (spec §3 "Lane").
#[derive(Debug)]
pub struct Lane {
    pub id: u16,
    /// Next inbound `Seq:` expected; starts at 1.
    peer_seq_expected: u64,
    /// Next outbound `Seq:` to assign; starts at 1.
    local_seq_next: u64,
    /// Highest `Seq` the peer has acked (our sends).
    peer_ack: u64,
    /// Highest `Seq` we have acked (peer's sends).
    local_ack: u64,
    /// Credit granted to us by the peer; consumed by our outbound sends.
    send_credit: u32,
    /// Credit we have granted to the peer, tracked so we know when to top
    /// it up (spec §4.2 "replenish ... whenever `recv_credit_granted` <
    /// `low_watermark`").
    recv_credit_granted: u32,
    initial_recv_credit: u32,
    pub mode: LaneMode,
    /// Outstanding request `Txn:`s awaiting a response.
    outstanding_txns: HashSet<String>,
    reassembly: HashMap<String, Reassembly>,
    pub last_activity: Instant,
}

impl Lane {
    pub fn new(id: u16, initial_credit: u32) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer_seq_expected: 1,
            local_seq_next: 1,
            peer_ack: 0,
            local_ack: 0,
            send_credit: initial_credit,
            recv_credit_granted: initial_credit,
            initial_recv_credit: initial_credit,
            mode: LaneMode::Idle,
            outstanding_txns: HashSet::new(),
            reassembly: HashMap::new(),
            last_activity: now,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Validate and accept an inbound `Seq:`.
    ///
    /// Spec §4.2: "Inbound `Seq:` must equal `peer_seq_expected`; otherwise
    /// the receiver emits `409 OUT-OF-ORDER` ... and drops until resync."
    pub fn accept_inbound_seq(&mut self, seq: u64) -> Result<(), LaneError> {
        if seq != self.peer_seq_expected {
            return Err(LaneError::OutOfOrder {
                expected: self.peer_seq_expected,
                got: seq,
            });
        }
        self.peer_seq_expected += 1;
        self.touch();
        Ok(())
    }

    /// Resynchronize the expected inbound sequence, e.g. after a resume
    /// that replays from a known ack point (spec §4.4 "Resumption").
    pub fn resync_inbound_seq(&mut self, next_expected: u64) {
        self.peer_seq_expected = next_expected;
    }

    /// Assign the next outbound `Seq:` and advance the counter.
    pub fn next_outbound_seq(&mut self) -> u64 {
        let seq = self.local_seq_next;
        self.local_seq_next += 1;
        self.touch();
        seq
    }

    pub fn peer_seq_expected(&self) -> u64 {
        self.peer_seq_expected
    }

    pub fn local_seq_next(&self) -> u64 {
        self.local_seq_next
    }

    /// Record the peer's cumulative `ACK: k` for frames we sent.
    ///
    /// Spec invariant 3: "the sender's `peer_ack >= k`, monotonically
    /// non-decreasing." Duplicate/stale acks are idempotent.
    pub fn record_peer_ack(&mut self, k: u64) {
        if k > self.peer_ack {
            self.peer_ack = k;
        }
    }

    /// Record that we have acked up to `k` of the peer's sends.
    pub fn record_local_ack(&mut self, k: u64) {
        if k > self.local_ack {
            self.local_ack = k;
        }
    }

    pub fn peer_ack(&self) -> u64 {
        self.peer_ack
    }

    pub fn local_ack(&self) -> u64 {
        self.local_ack
    }

    /// Consume one unit of send credit for an outbound non-control frame.
    ///
    /// Spec §4.2: "Outbound non-`ACK`/`PING`/`CREDIT` frames consume one
    /// unit of `send_credit`. If `send_credit == 0`, the sender blocks
    /// until `CREDIT: +N` arrives."
    pub fn consume_send_credit(&mut self) -> Result<(), LaneError> {
        if self.send_credit == 0 {
            return Err(LaneError::CreditExhausted);
        }
        self.send_credit -= 1;
        Ok(())
    }

    pub fn send_credit(&self) -> u32 {
        self.send_credit
    }

    /// Apply a `CREDIT: +N` grant received from the peer.
    pub fn grant_send_credit(&mut self, n: u32) {
        self.send_credit = self.send_credit.saturating_add(n);
        self.touch();
    }

    /// Record that we granted `n` credit to the peer (outbound `CREDIT:`).
    pub fn record_credit_granted(&mut self, n: u32) {
        self.recv_credit_granted = self.recv_credit_granted.saturating_add(n);
    }

    /// Record consumption of one unit of the credit we granted the peer,
    /// i.e. we received one frame from them. Returns `Some(topup)` if the
    /// low watermark was crossed and the caller should send `CREDIT:
    /// +topup`.
    ///
    /// Spec §4.2: "Recommended replenishment: top up by the count consumed
    /// whenever `recv_credit_granted < low_watermark` (default low
    /// watermark = half of the initial grant)."
    pub fn consume_recv_credit(&mut self) -> Option<u32> {
        self.recv_credit_granted = self.recv_credit_granted.saturating_sub(1);
        let low_watermark = self.initial_recv_credit / 2;
        if self.recv_credit_granted < low_watermark {
            let topup = self.initial_recv_credit - self.recv_credit_granted;
            self.recv_credit_granted = self.initial_recv_credit;
            Some(topup)
        } else {
            None
        }
    }

    /// Register a new outstanding request `Txn:`.
    ///
    /// Spec §4.2: "A `Txn:` is unique within a lane among outstanding
    /// requests."
    pub fn open_txn(&mut self, txn: impl Into<String>) -> Result<(), LaneError> {
        let txn = txn.into();
        if !self.outstanding_txns.insert(txn.clone()) {
            return Err(LaneError::DuplicateTxn(txn));
        }
        Ok(())
    }

    pub fn close_txn(&mut self, txn: &str) {
        self.outstanding_txns.remove(txn);
        self.reassembly.remove(txn);
    }

    pub fn is_txn_open(&self, txn: &str) -> bool {
        self.outstanding_txns.contains(txn)
    }

    /// Begin chunked reassembly for `txn`.
    pub fn start_chunk(&mut self, txn: impl Into<String>) {
        self.reassembly
            .insert(txn.into(), Reassembly { buf: BytesMut::new() });
    }

    /// Append a `MORE`/`BEGIN` chunk's bytes, enforcing `max_bytes`.
    ///
    /// Returns `Err` if the accumulated buffer would exceed `max_bytes`
    /// (spec §9: cancels the `Txn` and yields `400 frame-too-large`).
    pub fn feed_chunk(
        &mut self,
        txn: &str,
        bytes: &[u8],
        max_bytes: usize,
    ) -> Result<(), LaneError> {
        let entry = self
            .reassembly
            .get_mut(txn)
            .ok_or_else(|| LaneError::DuplicateTxn(txn.to_string()))?;
        if entry.buf.len() + bytes.len() > max_bytes {
            self.reassembly.remove(txn);
            self.outstanding_txns.remove(txn);
            return Err(LaneError::CreditExhausted);
        }
        entry.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Complete reassembly for `txn`, returning the accumulated body.
    pub fn finish_chunk(&mut self, txn: &str) -> Option<Bytes> {
        self.reassembly.remove(txn).map(|r| r.buf.freeze())
    }

    /// Transition to `Closing`; used on `CANCEL` or a fatal lane error.
    pub fn begin_closing(&mut self) {
        self.mode = LaneMode::Closing;
        self.outstanding_txns.clear();
        self.reassembly.clear();
    }
}
