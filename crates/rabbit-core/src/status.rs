use std::fmt;

/// The closed set of Rabbit status codes (spec §7).
///
/// Every error response echoes `Lane:`/`Txn:` when present on the causing
/// request and carries a human-readable reason in the start line (e.g.
/// `409 OUT-OF-ORDER`); this type owns the numeric/reason pairing so the
/// dispatcher and the lane layer agree on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusCode {
    Hello = 200,
    Content = 200,
    Menu = 200,
    Description = 200,
    Pong = 200,
    Peers = 200,
    Subscribed = 201,
    Resumed = 201,
    Done = 204,
    Challenge = 300,
    Moved = 301,
    BadRequest = 400,
    Forbidden = 403,
    Missing = 404,
    Timeout = 408,
    OutOfOrder = 409,
    Precondition = 412,
    AuthRequired = 440,
    Canceled = 499,
    FlowLimit = 429,
    BadHello = 431,
    Busy = 503,
    Internal = 520,
}

impl StatusCode {
    /// The numeric code as sent on the wire.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether this code represents success (2xx/3xx).
    pub fn is_success(self) -> bool {
        (200..400).contains(&self.code())
    }

    /// The conventional reason phrase used for this status in start lines.
    ///
    /// A numeric code can carry more than one reason (e.g. `200` is used
    /// for `HELLO`, `CONTENT`, `MENU`, `DESCRIPTION`, `PONG`, and `PEERS`
    /// depending on the responding verb) — callers that need the exact
    /// wire phrase should render it themselves from the responding verb;
    /// this is the default used when no more specific phrase applies.
    pub fn default_reason(self) -> &'static str {
        match self {
            StatusCode::Hello => "HELLO",
            StatusCode::Content => "CONTENT",
            StatusCode::Menu => "MENU",
            StatusCode::Description => "DESCRIPTION",
            StatusCode::Pong => "PONG",
            StatusCode::Peers => "PEERS",
            StatusCode::Subscribed => "SUBSCRIBED",
            StatusCode::Resumed => "RESUMED",
            StatusCode::Done => "DONE",
            StatusCode::Challenge => "CHALLENGE",
            StatusCode::Moved => "MOVED",
            StatusCode::BadRequest => "BAD REQUEST",
            StatusCode::Forbidden => "FORBIDDEN",
            StatusCode::Missing => "MISSING",
            StatusCode::Timeout => "TIMEOUT",
            StatusCode::OutOfOrder => "OUT-OF-ORDER",
            StatusCode::Precondition => "PRECONDITION",
            StatusCode::AuthRequired => "AUTH-REQUIRED",
            StatusCode::Canceled => "CANCELED",
            StatusCode::FlowLimit => "FLOW-LIMIT",
            StatusCode::BadHello => "BAD-HELLO",
            StatusCode::Busy => "BUSY",
            StatusCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.default_reason())
    }
}

/// Error kind taxonomy (spec §7), used internally to decide status mapping
/// and tunnel-vs-lane scoped teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Codec-level error; unrecoverable, closes the tunnel.
    Malformed,
    /// Lane/seq/credit violation; closes the lane.
    ProtocolViolation,
    Unauthorized,
    Forbidden,
    NotFound,
    OutOfOrder,
    Precondition,
    FlowLimit,
    BadHello,
    Timeout,
    Canceled,
    Busy,
    Internal,
}

impl ErrorKind {
    /// Maps this kind onto its wire status code.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Malformed | ErrorKind::ProtocolViolation => StatusCode::BadRequest,
            ErrorKind::Unauthorized => StatusCode::AuthRequired,
            ErrorKind::Forbidden => StatusCode::Forbidden,
            ErrorKind::NotFound => StatusCode::Missing,
            ErrorKind::OutOfOrder => StatusCode::OutOfOrder,
            ErrorKind::Precondition => StatusCode::Precondition,
            ErrorKind::FlowLimit => StatusCode::FlowLimit,
            ErrorKind::BadHello => StatusCode::BadHello,
            ErrorKind::Timeout => StatusCode::Timeout,
            ErrorKind::Canceled => StatusCode::Canceled,
            ErrorKind::Busy => StatusCode::Busy,
            ErrorKind::Internal => StatusCode::Internal,
        }
    }

    /// Whether an error of this kind closes the whole tunnel (vs. only the
    /// lane it occurred on). Spec §7 propagation policy.
    pub fn closes_tunnel(self) -> bool {
        matches!(self, ErrorKind::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_phrases_match_spec_examples() {
        assert_eq!(StatusCode::OutOfOrder.to_string(), "409 OUT-OF-ORDER");
        assert_eq!(StatusCode::FlowLimit.to_string(), "429 FLOW-LIMIT");
        assert_eq!(StatusCode::BadHello.to_string(), "431 BAD-HELLO");
    }

    #[test]
    fn error_kind_maps_to_status() {
        assert_eq!(ErrorKind::OutOfOrder.status(), StatusCode::OutOfOrder);
        assert!(ErrorKind::Malformed.closes_tunnel());
        assert!(!ErrorKind::OutOfOrder.closes_tunnel());
    }
}
