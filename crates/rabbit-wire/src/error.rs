use std::fmt;

/// Errors raised while decoding a frame from an octet stream.
///
/// Spec: frame codec errors (§4.1) — `MalformedStartLine`, `BadHeader`,
/// `MissingEnd`, `BodyTooShort`, `BadLength`, `MixedTransfer`, plus the
/// limit and encoding violations the spec asks implementers to enforce.
#[derive(Debug)]
pub enum DecodeError {
    /// The connection was closed cleanly before any frame bytes arrived.
    Eof,
    /// A line was terminated by a lone `\n` without a preceding `\r`.
    LoneLineFeed,
    /// The start line was empty or could not be tokenized.
    MalformedStartLine,
    /// A header line was not `Key: Value` or the key contained characters
    /// outside `[A-Za-z0-9-]`, or the value contained a byte outside
    /// `0x20..=0x7E`.
    BadHeader(String),
    /// The stream ended, or a chunk boundary was hit, before the mandatory
    /// `End:` sentinel line was seen.
    MissingEnd,
    /// `Length:` announced more bytes than the stream actually delivered
    /// before closing.
    BodyTooShort,
    /// `Length:` value was not a valid non-negative integer.
    BadLength(String),
    /// Both `Length:` and `Transfer:` were present on the same frame.
    MixedTransfer,
    /// The header block exceeded the configured maximum size.
    HeaderBlockTooLarge { limit: usize },
    /// A non-chunked body exceeded the configured maximum size.
    BodyTooLarge { limit: usize },
    /// A header value contained a byte outside the printable ASCII range.
    NonPrintableHeaderValue(String),
    /// A body declared `View: text/...` was not valid UTF-8.
    NonUtf8Body,
    /// Underlying I/O error.
    Io(std::io::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Eof => write!(f, "connection closed before a frame arrived"),
            DecodeError::LoneLineFeed => write!(f, "line terminated by lone LF, CRLF required"),
            DecodeError::MalformedStartLine => write!(f, "malformed start line"),
            DecodeError::BadHeader(line) => write!(f, "bad header line: {line:?}"),
            DecodeError::MissingEnd => write!(f, "frame is missing the End: sentinel"),
            DecodeError::BodyTooShort => write!(f, "stream closed before body was fully read"),
            DecodeError::BadLength(v) => write!(f, "invalid Length value: {v:?}"),
            DecodeError::MixedTransfer => write!(f, "Length and Transfer are mutually exclusive"),
            DecodeError::HeaderBlockTooLarge { limit } => {
                write!(f, "frame-too-large: header block exceeded {limit} bytes")
            }
            DecodeError::BodyTooLarge { limit } => {
                write!(f, "frame-too-large: body exceeded {limit} bytes")
            }
            DecodeError::NonPrintableHeaderValue(key) => {
                write!(f, "header {key:?} contains a non-printable byte")
            }
            DecodeError::NonUtf8Body => write!(f, "text/* body was not valid UTF-8"),
            DecodeError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DecodeError::BodyTooShort
        } else {
            DecodeError::Io(e)
        }
    }
}

/// Errors raised while building or emitting a frame.
#[derive(Debug)]
pub enum EncodeError {
    /// A header key contained characters outside `[A-Za-z0-9-]`.
    BadHeaderKey(String),
    /// A header value contained a byte outside the printable ASCII range.
    BadHeaderValue(String),
    /// Underlying I/O error while writing to the transport.
    Io(std::io::Error),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BadHeaderKey(k) => write!(f, "invalid header key: {k:?}"),
            EncodeError::BadHeaderValue(v) => write!(f, "invalid header value: {v:?}"),
            EncodeError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(e: std::io::Error) -> Self {
        EncodeError::Io(e)
    }
}
