//! The closed verb set (spec §3 "Verb").

use std::fmt;

/// One of the verbs a start-line's leading word may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Hello,
    Auth,
    List,
    Fetch,
    Search,
    Describe,
    Subscribe,
    Publish,
    Event,
    Offer,
    Ping,
    Ack,
    Credit,
    Cancel,
}

impl Verb {
    pub fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "HELLO" => Verb::Hello,
            "AUTH" => Verb::Auth,
            "LIST" => Verb::List,
            "FETCH" => Verb::Fetch,
            "SEARCH" => Verb::Search,
            "DESCRIBE" => Verb::Describe,
            "SUBSCRIBE" => Verb::Subscribe,
            "PUBLISH" => Verb::Publish,
            "EVENT" => Verb::Event,
            "OFFER" => Verb::Offer,
            "PING" => Verb::Ping,
            "ACK" => Verb::Ack,
            "CREDIT" => Verb::Credit,
            "CANCEL" => Verb::Cancel,
            _ => return None,
        })
    }

    pub fn as_word(self) -> &'static str {
        match self {
            Verb::Hello => "HELLO",
            Verb::Auth => "AUTH",
            Verb::List => "LIST",
            Verb::Fetch => "FETCH",
            Verb::Search => "SEARCH",
            Verb::Describe => "DESCRIBE",
            Verb::Subscribe => "SUBSCRIBE",
            Verb::Publish => "PUBLISH",
            Verb::Event => "EVENT",
            Verb::Offer => "OFFER",
            Verb::Ping => "PING",
            Verb::Ack => "ACK",
            Verb::Credit => "CREDIT",
            Verb::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_word())
    }
}
