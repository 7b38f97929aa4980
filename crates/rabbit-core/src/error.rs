use std::fmt;

/// Errors raised by a [`crate::Transport`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has been closed, locally or by the peer.
    Closed,
    /// The peer sent a malformed frame.
    Decode(String),
    /// Underlying I/O failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "transport closed"),
            TransportError::Decode(e) => write!(f, "decode error: {e}"),
            TransportError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors raised by lane bookkeeping (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneError {
    /// Inbound `Seq:` did not equal `peer_seq_expected`.
    OutOfOrder { expected: u64, got: u64 },
    /// The sender has exhausted `send_credit` on this lane.
    CreditExhausted,
    /// The lane does not exist (never opened, or already closed).
    UnknownLane(u16),
    /// A `Txn:` collided with one already outstanding on this lane.
    DuplicateTxn(String),
    /// The lane was closed by `CANCEL`, a fatal error, or tunnel close.
    Closed,
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::OutOfOrder { expected, got } => {
                write!(f, "out of order: expected seq {expected}, got {got}")
            }
            LaneError::CreditExhausted => write!(f, "send credit exhausted"),
            LaneError::UnknownLane(id) => write!(f, "unknown lane {id}"),
            LaneError::DuplicateTxn(txn) => write!(f, "duplicate txn {txn:?} on lane"),
            LaneError::Closed => write!(f, "lane is closed"),
        }
    }
}

impl std::error::Error for LaneError {}

/// Errors raised by the tunnel multiplexer (§4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelError {
    /// `max_lanes` was exceeded (§4.3 "Lane admission").
    LaneLimitExceeded { max: u32 },
    Lane(LaneError),
    Transport(TransportError),
}

impl fmt::Display for TunnelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelError::LaneLimitExceeded { max } => {
                write!(f, "flow-limit: more than {max} lanes")
            }
            TunnelError::Lane(e) => write!(f, "{e}"),
            TunnelError::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TunnelError {}

impl From<LaneError> for TunnelError {
    fn from(e: LaneError) -> Self {
        TunnelError::Lane(e)
    }
}

impl From<TransportError> for TunnelError {
    fn from(e: TransportError) -> Self {
        TunnelError::Transport(e)
    }
}
