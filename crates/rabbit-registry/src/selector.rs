//! Selectors and the item-type taxonomy (spec §3 "Selector").
//!
//! A selector is path-like (`/<type><sub-path>`); the single character
//! immediately after the leading `/` names the item type and gates which
//! verbs are legal against it. The taxonomy below follows the same
//! type-character-as-first-path-segment idea as Gopher's item types, which
//! is the closest prior art for "hierarchical content networks" addressed
//! by a flat selector namespace: `0`/`1`/`7`/`9`/`i` carry their Gopher
//! meanings, `q` and `u` are this protocol's additions for topics and
//! external references.

use std::fmt;

/// The closed set of item types a selector's first segment can name (spec
/// §3: `{0,1,7,9,q,u,i}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// Plain fetchable item (text or arbitrary content).
    Item,
    /// A menu: `LIST`/`SEARCH` return a [`crate::rabbitmap::Rabbitmap`] for these.
    Menu,
    /// A search/index endpoint; legal target of `SEARCH`.
    Search,
    /// Opaque binary content.
    Binary,
    /// A topic: the only type legal for `SUBSCRIBE`/`PUBLISH`.
    Topic,
    /// A reference to an external URI, not fetchable through this burrow.
    Uri,
    /// An informational, non-selectable display line within a menu.
    Info,
}

impl ItemType {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(ItemType::Item),
            '1' => Some(ItemType::Menu),
            '7' => Some(ItemType::Search),
            '9' => Some(ItemType::Binary),
            'q' => Some(ItemType::Topic),
            'u' => Some(ItemType::Uri),
            'i' => Some(ItemType::Info),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            ItemType::Item => '0',
            ItemType::Menu => '1',
            ItemType::Search => '7',
            ItemType::Binary => '9',
            ItemType::Topic => 'q',
            ItemType::Uri => 'u',
            ItemType::Info => 'i',
        }
    }

    /// Whether `LIST` may target a selector of this type (spec §4.5:
    /// "resolver returns a Rabbitmap for a type-`1` selector").
    pub fn is_listable(self) -> bool {
        matches!(self, ItemType::Menu)
    }

    /// Whether `SUBSCRIBE`/`PUBLISH` may target a selector of this type
    /// (spec §3: "`SUBSCRIBE` requires `q`").
    pub fn is_topic(self) -> bool {
        matches!(self, ItemType::Topic)
    }

    /// Whether `SEARCH` may target a selector of this type.
    pub fn is_searchable(self) -> bool {
        matches!(self, ItemType::Search | ItemType::Menu)
    }

    /// Whether `FETCH` may target a selector of this type. `Menu`/`Topic`
    /// have their own verbs; `Uri`/`Info` are not fetchable content.
    pub fn is_fetchable(self) -> bool {
        matches!(self, ItemType::Item | ItemType::Binary)
    }
}

/// A parsed selector: its item type and the path used to resolve it.
///
/// Spec §3: "A path beginning with `/`, whose first path segment after `/`
/// is a single item-type character ... followed by an optional sub-path."
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    pub item_type: ItemType,
    /// The full selector text as received, e.g. `/0/readme`.
    raw: String,
}

/// Error parsing a selector string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorParseError {
    MissingLeadingSlash,
    Empty,
    UnknownItemType(char),
}

impl fmt::Display for SelectorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorParseError::MissingLeadingSlash => write!(f, "selector must start with '/'"),
            SelectorParseError::Empty => write!(f, "selector is empty"),
            SelectorParseError::UnknownItemType(c) => write!(f, "unknown item type {c:?}"),
        }
    }
}

impl std::error::Error for SelectorParseError {}

impl Selector {
    pub fn parse(raw: &str) -> Result<Self, SelectorParseError> {
        if raw.is_empty() {
            return Err(SelectorParseError::Empty);
        }
        if !raw.starts_with('/') {
            return Err(SelectorParseError::MissingLeadingSlash);
        }
        // The bare root selector "/" (spec §8 scenario S1: `LIST /`) names
        // the top-level menu; it has no type character of its own.
        if raw == "/" {
            return Ok(Self {
                item_type: ItemType::Menu,
                raw: raw.to_string(),
            });
        }
        let mut chars = raw[1..].chars();
        let type_char = chars.next().ok_or(SelectorParseError::Empty)?;
        let item_type =
            ItemType::from_char(type_char).ok_or(SelectorParseError::UnknownItemType(type_char))?;
        Ok(Self {
            item_type,
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The sub-path after the type character, e.g. `/0/readme` → `/readme`.
    /// The root selector `/` has an empty sub-path.
    pub fn sub_path(&self) -> &str {
        if self.raw == "/" {
            ""
        } else {
            &self.raw[2..]
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_menu_selector() {
        let sel = Selector::parse("/1").unwrap();
        assert_eq!(sel.item_type, ItemType::Menu);
        assert_eq!(sel.sub_path(), "");
    }

    #[test]
    fn parses_item_selector_with_sub_path() {
        let sel = Selector::parse("/0/readme").unwrap();
        assert_eq!(sel.item_type, ItemType::Item);
        assert_eq!(sel.sub_path(), "/readme");
    }

    #[test]
    fn rejects_missing_slash() {
        assert_eq!(
            Selector::parse("0/readme"),
            Err(SelectorParseError::MissingLeadingSlash)
        );
    }

    #[test]
    fn rejects_unknown_type_char() {
        assert_eq!(
            Selector::parse("/z/readme"),
            Err(SelectorParseError::UnknownItemType('z'))
        );
    }

    #[test]
    fn topic_selectors_are_not_fetchable() {
        let sel = Selector::parse("/q/news").unwrap();
        assert!(sel.item_type.is_topic());
        assert!(!sel.item_type.is_fetchable());
    }
}
