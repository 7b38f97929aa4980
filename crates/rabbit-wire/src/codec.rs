use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{DecodeError, EncodeError};
use crate::frame::{Body, Frame, StartLine};
use crate::header::parse_header_line;
use crate::limits::{DEFAULT_BODY_MAX, DEFAULT_HEADER_BLOCK_MAX};

/// Reads one CRLF-terminated line from `reader`, without the terminator.
///
/// Spec §4.1: "Line terminator is CRLF; a lone LF is a parse error."
/// Returns `Ok(None)` if the stream closed cleanly with nothing read yet.
async fn read_crlf_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<String>, DecodeError> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') {
        // Stream ended mid-line.
        return Err(DecodeError::BodyTooShort);
    }
    buf.pop(); // trailing \n
    if buf.pop() != Some(b'\r') {
        return Err(DecodeError::LoneLineFeed);
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| DecodeError::MalformedStartLine)
}

/// Splits a start line into its verb/status word and argument tokens.
fn tokenize_start_line(line: &str) -> Result<StartLine, DecodeError> {
    let mut parts = line.split_ascii_whitespace();
    let word = parts.next().ok_or(DecodeError::MalformedStartLine)?;
    let args = parts.map(str::to_string).collect();
    Ok(StartLine::new(word, args))
}

/// Incremental codec for Rabbit text frames.
///
/// Spec §4.1: "Parsing is incremental: the codec consumes octets until a
/// complete header block plus body is available, then yields one frame."
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    header_block_max: usize,
    body_max: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            header_block_max: DEFAULT_HEADER_BLOCK_MAX,
            body_max: DEFAULT_BODY_MAX,
        }
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(header_block_max: usize, body_max: usize) -> Self {
        Self {
            header_block_max,
            body_max,
        }
    }

    /// Decode one frame from `reader`.
    ///
    /// Returns `Err(DecodeError::Eof)` on a clean close before any bytes of
    /// a new frame arrived; any other error indicates a malformed stream
    /// and, per spec §4.7, the caller should close the tunnel.
    pub async fn decode<R: AsyncBufRead + Unpin>(
        &self,
        reader: &mut R,
    ) -> Result<Frame, DecodeError> {
        let start_line = match read_crlf_line(reader).await? {
            Some(line) => line,
            None => return Err(DecodeError::Eof),
        };
        if start_line.is_empty() {
            return Err(DecodeError::MalformedStartLine);
        }
        let start = tokenize_start_line(&start_line)?;
        let mut frame = Frame::new(start);

        let mut header_bytes = 0usize;
        loop {
            let line = read_crlf_line(reader)
                .await?
                .ok_or(DecodeError::MissingEnd)?;
            header_bytes += line.len() + 2;
            if header_bytes > self.header_block_max {
                return Err(DecodeError::HeaderBlockTooLarge {
                    limit: self.header_block_max,
                });
            }
            match parse_header_line(&line)? {
                Some((key, value)) => frame.headers.push_raw(key, value),
                None => break, // End: sentinel
            }
        }

        let length = frame.headers.get("Length");
        let transfer = frame.headers.get("Transfer");
        frame.body = match (length, transfer) {
            (Some(_), Some(_)) => return Err(DecodeError::MixedTransfer),
            (Some(len_str), None) => {
                let len: usize = len_str
                    .parse()
                    .map_err(|_| DecodeError::BadLength(len_str.to_string()))?;
                if len > self.body_max {
                    return Err(DecodeError::BodyTooLarge {
                        limit: self.body_max,
                    });
                }
                let mut buf = vec![0u8; len];
                tokio::io::AsyncReadExt::read_exact(reader, &mut buf).await?;
                let view_is_text = frame
                    .headers
                    .get("View")
                    .map(|v| v.to_ascii_lowercase().starts_with("text/"))
                    .unwrap_or(false);
                if view_is_text && std::str::from_utf8(&buf).is_err() {
                    return Err(DecodeError::NonUtf8Body);
                }
                Body::Full(Bytes::from(buf))
            }
            (None, Some(kind)) => {
                if !kind.eq_ignore_ascii_case("chunked") {
                    return Err(DecodeError::BadHeader(format!("Transfer: {kind}")));
                }
                Body::Chunked
            }
            (None, None) => Body::None,
        };

        Ok(frame)
    }

    /// Serialize `frame` into `out`, appending to any existing contents.
    pub fn encode(&self, frame: &Frame, out: &mut BytesMut) {
        out.extend_from_slice(frame.start.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        for (k, v) in frame.headers.iter() {
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(v.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"End:\r\n");
        if let Body::Full(body) = &frame.body {
            out.extend_from_slice(body);
        }
    }

    /// Encode and flush `frame` directly to an async writer.
    pub async fn encode_to<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        frame: &Frame,
    ) -> Result<(), EncodeError> {
        let mut buf = BytesMut::new();
        self.encode(frame, &mut buf);
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StartLine;
    use std::io::Cursor;

    fn hello_frame() -> Frame {
        let mut f = Frame::new(StartLine::new("HELLO", vec!["RABBIT/1.0".to_string()]));
        f.headers.push("Caps", "lanes,async").unwrap();
        f
    }

    #[tokio::test]
    async fn round_trips_bodyless_frame() {
        let codec = FrameCodec::new();
        let frame = hello_frame();
        let mut buf = BytesMut::new();
        codec.encode(&frame, &mut buf);

        let mut reader = Cursor::new(buf.to_vec());
        let decoded = codec.decode(&mut reader).await.unwrap();
        assert_eq!(decoded, frame);
    }

    #[tokio::test]
    async fn round_trips_frame_with_length_body() {
        let codec = FrameCodec::new();
        let mut f = Frame::new(StartLine::new(
            "200",
            vec!["CONTENT".to_string()],
        ));
        f.headers.push("Lane", "3").unwrap();
        f.headers.push("Txn", "F1").unwrap();
        f.headers.push("Length", "28").unwrap();
        f.headers.push("View", "text/plain").unwrap();
        f.body = Body::Full(Bytes::from_static(b"Rabbit runs fast and light."));

        let mut buf = BytesMut::new();
        codec.encode(&f, &mut buf);
        let mut reader = Cursor::new(buf.to_vec());
        let decoded = codec.decode(&mut reader).await.unwrap();
        assert_eq!(decoded, f);
    }

    #[tokio::test]
    async fn rejects_lone_lf() {
        let codec = FrameCodec::new();
        let raw = b"HELLO RABBIT/1.0\nEnd:\r\n".to_vec();
        let mut reader = Cursor::new(raw);
        let err = codec.decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, DecodeError::LoneLineFeed));
    }

    #[tokio::test]
    async fn rejects_mixed_transfer() {
        let codec = FrameCodec::new();
        let raw = b"FETCH /0/x\r\nLength: 1\r\nTransfer: chunked\r\nEnd:\r\nX".to_vec();
        let mut reader = Cursor::new(raw);
        let err = codec.decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, DecodeError::MixedTransfer));
    }

    #[tokio::test]
    async fn chunked_envelope_has_no_body() {
        let codec = FrameCodec::new();
        let raw = b"FETCH /0/x\r\nLane: 3\r\nTxn: F1\r\nTransfer: chunked\r\nEnd:\r\n".to_vec();
        let mut reader = Cursor::new(raw);
        let decoded = codec.decode(&mut reader).await.unwrap();
        assert_eq!(decoded.body, Body::Chunked);
    }

    #[tokio::test]
    async fn missing_end_is_rejected() {
        let codec = FrameCodec::new();
        let raw = b"PING\r\nLane: 0\r\n".to_vec();
        let mut reader = Cursor::new(raw);
        let err = codec.decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, DecodeError::MissingEnd));
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes() {
        let codec = FrameCodec::new();
        let mut reader = Cursor::new(Vec::<u8>::new());
        let err = codec.decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, DecodeError::Eof));
    }

    #[tokio::test]
    async fn header_block_too_large_is_rejected() {
        let codec = FrameCodec::with_limits(16, DEFAULT_BODY_MAX);
        let raw = b"HELLO RABBIT/1.0\r\nCaps: lanes,async,ui,resume\r\nEnd:\r\n".to_vec();
        let mut reader = Cursor::new(raw);
        let err = codec.decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, DecodeError::HeaderBlockTooLarge { .. }));
    }
}
