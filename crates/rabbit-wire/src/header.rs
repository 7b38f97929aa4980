use std::fmt;

use crate::error::{DecodeError, EncodeError};

/// Returns `true` if `key` matches `[A-Za-z0-9-]+`.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Returns `true` if `value` is printable ASCII (`0x20..=0x7E`).
fn is_printable_ascii(value: &str) -> bool {
    value.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// An ordered, case-insensitive-on-key header list.
///
/// Keys compare case-insensitively (per spec §3) but are stored and
/// re-emitted with their original case, and insertion order is preserved so
/// pass-through of unknown headers round-trips byte-for-byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a header, validating key and value per spec §3.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), EncodeError> {
        let key = key.into();
        let value = value.into();
        if !is_valid_key(&key) {
            return Err(EncodeError::BadHeaderKey(key));
        }
        if !is_printable_ascii(&value) {
            return Err(EncodeError::BadHeaderValue(value));
        }
        self.0.push((key, value));
        Ok(())
    }

    /// Append a header without validation; used by the decoder, which has
    /// already validated the line.
    pub(crate) fn push_raw(&mut self, key: String, value: String) {
        self.0.push((key, value));
    }

    /// First value for `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.0 {
            writeln!(f, "{k}: {v}")?;
        }
        Ok(())
    }
}

/// Parse a single `Key: Value` header line (without trailing CRLF).
///
/// Returns `None` if `line` is the `End:` sentinel.
pub(crate) fn parse_header_line(line: &str) -> Result<Option<(String, String)>, DecodeError> {
    let (key, rest) = line
        .split_once(':')
        .ok_or_else(|| DecodeError::BadHeader(line.to_string()))?;
    // The `End:` sentinel always has an empty value and terminates the block.
    if key.eq_ignore_ascii_case("end") && rest.is_empty() {
        return Ok(None);
    }
    if !is_valid_key(key) {
        return Err(DecodeError::BadHeader(line.to_string()));
    }
    // A single leading space after the colon is conventional but not
    // required; trim at most one.
    let value = rest.strip_prefix(' ').unwrap_or(rest);
    if !is_printable_ascii(value) {
        return Err(DecodeError::NonPrintableHeaderValue(key.to_string()));
    }
    Ok(Some((key.to_string(), value.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordinary_header() {
        assert_eq!(
            parse_header_line("Caps: lanes,async").unwrap(),
            Some(("Caps".to_string(), "lanes,async".to_string()))
        );
    }

    #[test]
    fn end_sentinel_terminates() {
        assert_eq!(parse_header_line("End:").unwrap(), None);
        assert_eq!(parse_header_line("end:").unwrap(), None);
    }

    #[test]
    fn rejects_bad_key_chars() {
        assert!(parse_header_line("Bad Key: x").is_err());
    }

    #[test]
    fn rejects_non_printable_value() {
        assert!(parse_header_line("Key: bad\u{0007}value").is_err());
    }

    #[test]
    fn headers_are_case_insensitive_on_lookup() {
        let mut h = Headers::new();
        h.push("Lane", "3").unwrap();
        assert_eq!(h.get("lane"), Some("3"));
        assert_eq!(h.get("LANE"), Some("3"));
    }
}
