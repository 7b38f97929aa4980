use std::time::Duration;

/// Resource limits and timing defaults for a burrow.
///
/// Spec §5: "Resource limits (recommended defaults): `max_lanes = 1024`,
/// `max_inflight_per_subscriber = 256`, `initial_credit = 32`,
/// `frame_header_max = 16 KiB`, `non_chunked_body_max = 1 MiB`,
/// `resume_ttl = 60 s`, `heartbeat = 30 s`." Parsing this from a config
/// file is out of scope (§1); this struct is the programmatic surface a
/// deployment wires up from whatever configuration layer it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurrowConfig {
    pub max_lanes: u32,
    pub max_inflight_per_subscriber: usize,
    pub initial_credit: u32,
    pub frame_header_max: usize,
    pub non_chunked_body_max: usize,
    pub resume_ttl: Duration,
    pub heartbeat: Duration,
    /// Spec §9 "Recursive warrens": hop-count limit for onward forwarding.
    pub max_forward_hops: u8,
}

impl Default for BurrowConfig {
    fn default() -> Self {
        Self {
            max_lanes: 1024,
            max_inflight_per_subscriber: 256,
            initial_credit: 32,
            frame_header_max: rabbit_wire::DEFAULT_HEADER_BLOCK_MAX,
            non_chunked_body_max: rabbit_wire::DEFAULT_BODY_MAX,
            resume_ttl: Duration::from_secs(60),
            heartbeat: Duration::from_secs(30),
            max_forward_hops: 8,
        }
    }
}
