//! Rabbitmap menu bodies (spec §3 "Rabbitmap line", glossary "Rabbitmap").

use std::fmt;

use crate::selector::ItemType;

/// One listed item in a menu.
///
/// Spec §3: "Tab-separated `<type><display>\t<selector>\t<host-or-=>\t`
/// (trailing tab before CRLF). `=` in the host column means 'same burrow
/// as carrier'."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RabbitmapEntry {
    pub item_type: ItemType,
    pub display: String,
    pub selector: String,
    /// `None` renders as `=` ("same burrow as carrier").
    pub host: Option<String>,
}

impl RabbitmapEntry {
    pub fn local(item_type: ItemType, display: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            item_type,
            display: display.into(),
            selector: selector.into(),
            host: None,
        }
    }

    pub fn remote(
        item_type: ItemType,
        display: impl Into<String>,
        selector: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            item_type,
            display: display.into(),
            selector: selector.into(),
            host: Some(host.into()),
        }
    }
}

impl fmt::Display for RabbitmapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = self.host.as_deref().unwrap_or("=");
        write!(
            f,
            "{}{}\t{}\t{}\t",
            self.item_type.as_char(),
            self.display,
            self.selector,
            host
        )
    }
}

/// A complete menu body: zero or more entries, one per line, terminated by
/// a lone `.` line (spec §3: "A trailing `.` on its own line closes a
/// menu/peer body.").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rabbitmap {
    pub entries: Vec<RabbitmapEntry>,
}

impl Rabbitmap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RabbitmapEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the menu body as CRLF-terminated lines ending in `.\r\n`,
    /// ready to be used as a frame body.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push_str("\r\n");
        }
        out.push_str(".\r\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_entries_with_trailing_tab_and_terminator() {
        let mut map = Rabbitmap::new();
        map.push(RabbitmapEntry::local(ItemType::Item, "readme", "/0/readme"));
        let rendered = map.render();
        assert_eq!(rendered, "0readme\t/0/readme\t=\t\r\n.\r\n");
    }

    #[test]
    fn empty_menu_is_just_the_terminator() {
        let map = Rabbitmap::new();
        assert_eq!(map.render(), ".\r\n");
    }

    #[test]
    fn remote_host_overrides_same_burrow_marker() {
        let entry = RabbitmapEntry::remote(ItemType::Menu, "friends", "/1/friends", "ed25519:abc");
        assert_eq!(entry.to_string(), "1friends\t/1/friends\ted25519:abc\t");
    }
}
