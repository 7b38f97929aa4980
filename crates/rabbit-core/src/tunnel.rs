//! Tunnel multiplexer (spec §4.3).
//!
//! A [`Tunnel`] owns one [`Transport`] and the table of [`Lane`]s
//! multiplexed over it: lane admission against `max_lanes`, and dispatch of
//! inbound frames to the lane their `Lane:` header names. Outbound sends
//! write straight to the transport as the caller issues them — there is no
//! internal write queue, so fairness across lanes is whatever the caller
//! (the protocol engine built on top of this crate) provides by how it
//! schedules its own `send` calls. It does not know about verbs or
//! selectors; that lives in the dispatcher built on top of it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rabbit_wire::Frame;
use tokio::sync::Notify;

use crate::config::BurrowConfig;
use crate::error::TunnelError;
use crate::lane::{Lane, LaneMode};
use crate::transport::Transport;

/// Shared, lock-guarded lane table plus the transport it rides on.
///
/// Spec §4.3 asks that no single lane starve another of writer access.
/// `send` below writes directly to the transport per call with no internal
/// queue, so a lane that wants to send nothing never blocks a lane that
/// does; guaranteeing fairness *among simultaneously-ready* senders is the
/// caller's responsibility (the protocol engine decides the order in which
/// it issues `send` calls across lanes).
pub struct Tunnel {
    transport: Transport,
    lanes: Mutex<HashMap<u16, Lane>>,
    config: BurrowConfig,
    closed: std::sync::atomic::AtomicBool,
    /// Signalled whenever a lane transitions or credit changes, so a
    /// caller waiting on lane state can wake and re-check it.
    activity: Notify,
}

impl Tunnel {
    pub fn new(transport: Transport, config: BurrowConfig) -> Arc<Self> {
        Arc::new(Self {
            transport,
            lanes: Mutex::new(HashMap::new()),
            config,
            closed: std::sync::atomic::AtomicBool::new(false),
            activity: Notify::new(),
        })
    }

    pub fn config(&self) -> &BurrowConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::Acquire) || self.transport.is_closed()
    }

    /// Admit a new lane with the given id, failing with `429 FLOW-LIMIT` if
    /// `max_lanes` would be exceeded (spec §4.3 "Lane admission").
    pub fn open_lane(&self, id: u16) -> Result<(), TunnelError> {
        let mut lanes = self.lanes.lock();
        if lanes.len() as u32 >= self.config.max_lanes && !lanes.contains_key(&id) {
            return Err(TunnelError::LaneLimitExceeded {
                max: self.config.max_lanes,
            });
        }
        lanes
            .entry(id)
            .or_insert_with(|| Lane::new(id, self.config.initial_credit));
        Ok(())
    }

    /// Run `f` against the named lane, failing with `UnknownLane` if it was
    /// never opened or has since been closed and reaped.
    pub fn with_lane<R>(
        &self,
        id: u16,
        f: impl FnOnce(&mut Lane) -> R,
    ) -> Result<R, TunnelError> {
        let mut lanes = self.lanes.lock();
        let lane = lanes
            .get_mut(&id)
            .ok_or(TunnelError::Lane(crate::error::LaneError::UnknownLane(id)))?;
        Ok(f(lane))
    }

    /// Close and remove a lane from the table (spec §4.2: `Closing` is
    /// terminal and the lane is reaped once any in-flight acks settle).
    pub fn close_lane(&self, id: u16) {
        if let Some(lane) = self.lanes.lock().get_mut(&id) {
            lane.begin_closing();
        }
        self.lanes.lock().remove(&id);
        self.activity.notify_waiters();
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.lock().len()
    }

    pub fn lane_ids(&self) -> Vec<u16> {
        self.lanes.lock().keys().copied().collect()
    }

    /// Current mode of a lane, if it exists.
    pub fn lane_mode(&self, id: u16) -> Option<LaneMode> {
        self.lanes.lock().get(&id).map(|l| l.mode)
    }

    /// Send a frame on behalf of `lane`, consuming credit and assigning the
    /// next outbound `Seq:` unless `is_control` (ACK/PING/CREDIT frames are
    /// exempt from credit consumption per spec §4.2).
    pub async fn send(&self, lane_id: u16, mut frame: Frame, is_control: bool) -> Result<(), TunnelError> {
        if self.is_closed() {
            return Err(TunnelError::Transport(crate::error::TransportError::Closed));
        }
        let seq = self.with_lane(lane_id, |lane| -> Result<u64, TunnelError> {
            if !is_control {
                lane.consume_send_credit()?;
            }
            Ok(lane.next_outbound_seq())
        })??;
        frame
            .headers
            .push("Lane", lane_id.to_string())
            .map_err(|_| TunnelError::Transport(crate::error::TransportError::Decode(
                "invalid lane header".to_string(),
            )))?;
        frame
            .headers
            .push("Seq", seq.to_string())
            .map_err(|_| TunnelError::Transport(crate::error::TransportError::Decode(
                "invalid seq header".to_string(),
            )))?;
        self.transport.send_frame(frame).await?;
        self.activity.notify_waiters();
        Ok(())
    }

    /// Receive the next frame, routing sequence acceptance through the
    /// frame's declared lane. Returns the lane id alongside the frame so
    /// the caller's dispatcher can route it onward.
    pub async fn recv(&self) -> Result<(u16, Frame), TunnelError> {
        let frame = self.transport.recv_frame().await?;
        let lane_id: u16 = frame.lane().unwrap_or(0);
        self.open_lane(lane_id)?;
        if let Some(seq) = frame.seq() {
            self.with_lane(lane_id, |lane| lane.accept_inbound_seq(seq))??;
        }
        Ok((lane_id, frame))
    }

    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::Release);
        self.transport.close();
        self.activity.notify_waiters();
    }
}
