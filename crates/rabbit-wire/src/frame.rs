use bytes::Bytes;
use std::fmt;

use crate::header::Headers;

/// The first line of a frame: a verb/status word plus its arguments.
///
/// Spec §3: "a start-line (a verb/status plus arguments)". The codec does
/// not interpret `word` — verb parsing and selector resolution live above
/// this crate, in `rabbit-core`/`rabbit-proto`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartLine {
    pub word: String,
    pub args: Vec<String>,
}

impl StartLine {
    pub fn new(word: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            word: word.into(),
            args,
        }
    }
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.word)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// How a frame's body was delimited.
///
/// Spec §4.1: `Length` and `Transfer: chunked` are mutually exclusive; with
/// neither present the frame has no body. `Chunked` carries no bytes here —
/// the body arrives as subsequent `Part:` frames sharing `Lane:`+`Txn:`,
/// reassembled by the lane layer (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Body {
    #[default]
    None,
    Full(Bytes),
    Chunked,
}

impl Body {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Full(b) => Some(b),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Body::Full(b) => b.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A complete Rabbit frame: start line, headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub start: StartLine,
    pub headers: Headers,
    pub body: Body,
}

impl Frame {
    pub fn new(start: StartLine) -> Self {
        Self {
            start,
            headers: Headers::new(),
            body: Body::None,
        }
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Body::Full(body);
        self
    }

    pub fn with_chunked(mut self) -> Self {
        self.body = Body::Chunked;
        self
    }

    /// Value of the `Lane:` header, if present and a valid `u16`.
    pub fn lane(&self) -> Option<u16> {
        self.headers.get("Lane").and_then(|v| v.parse().ok())
    }

    /// Value of the `Txn:` header, if present.
    pub fn txn(&self) -> Option<&str> {
        self.headers.get("Txn")
    }

    /// Value of the `Seq:` header, if present and a valid `u64`.
    pub fn seq(&self) -> Option<u64> {
        self.headers.get("Seq").and_then(|v| v.parse().ok())
    }
}
