use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rabbit_wire::{DecodeError, Frame, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::TransportError;

use super::TransportBackend;

/// Duplex byte-stream transport (TCP, TLS, QUIC stream, stdio, ...).
///
/// Spec §6: "ALPN `rabbit/1`; default TCP/QUIC port `7443`." This type
/// only needs an `AsyncRead + AsyncWrite`; the actual socket, and any
/// TLS/QUIC handshake beneath it, are the caller's concern (§1 names those
/// out of scope for the core).
#[derive(Clone)]
pub struct StreamTransport {
    inner: Arc<StreamInner>,
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport").finish_non_exhaustive()
    }
}

struct StreamInner {
    reader: AsyncMutex<BufReader<Box<dyn AsyncRead + Unpin + Send + Sync>>>,
    writer: AsyncMutex<Box<dyn AsyncWrite + Unpin + Send + Sync>>,
    closed: AtomicBool,
    codec: FrameCodec,
}

impl StreamTransport {
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::from_split(reader, writer)
    }

    pub fn from_split<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + Sync + 'static,
        W: AsyncWrite + Unpin + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(StreamInner {
                reader: AsyncMutex::new(BufReader::new(Box::new(reader))),
                writer: AsyncMutex::new(Box::new(writer)),
                closed: AtomicBool::new(false),
                codec: FrameCodec::new(),
            }),
        }
    }

    /// Create a transport from stdin/stdout, for conformance harnesses and
    /// CLI subjects.
    pub fn from_stdio() -> Self {
        Self::from_split(tokio::io::stdin(), tokio::io::stdout())
    }

    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(65536);
        (Self::new(a), Self::new(b))
    }

    fn is_closed_inner(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl TransportBackend for StreamTransport {
    async fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed_inner() {
            return Err(TransportError::Closed);
        }
        let mut writer = self.inner.writer.lock().await;
        self.inner
            .codec
            .encode_to(&mut *writer, &frame)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn recv_frame(&self) -> Result<Frame, TransportError> {
        if self.is_closed_inner() {
            return Err(TransportError::Closed);
        }
        let mut reader = self.inner.reader.lock().await;
        match self.inner.codec.decode(&mut *reader).await {
            Ok(frame) => Ok(frame),
            Err(DecodeError::Eof) => {
                self.close();
                Err(TransportError::Closed)
            }
            Err(e) => Err(TransportError::Decode(e.to_string())),
        }
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.is_closed_inner()
    }
}
