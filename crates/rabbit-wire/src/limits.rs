/// Recommended maximum header-block size in bytes.
///
/// Spec §4.1: "Implementers must enforce a max header-block size
/// (recommended 16 KiB)".
pub const DEFAULT_HEADER_BLOCK_MAX: usize = 16 * 1024;

/// Recommended maximum single-body size for non-chunked frames.
///
/// Spec §4.1: "a max single-body size for non-chunked frames (recommended
/// 1 MiB)".
pub const DEFAULT_BODY_MAX: usize = 1024 * 1024;
