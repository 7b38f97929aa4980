use std::fmt;

/// Errors a [`crate::resolver::SelectorResolver`] may raise.
///
/// Spec §4.5: "Missing selector → `404`; permission denied → `403`" and
/// "Non-menu selector → `400`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    NotFound,
    Forbidden,
    /// The selector's item type does not support the attempted verb.
    WrongItemType,
    /// The selector string itself did not parse.
    BadSelector(String),
    /// The selector has moved; callers should redirect to the given
    /// selector (spec §9 Open Question (b)).
    Moved(String),
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::NotFound => write!(f, "selector not found"),
            ResolverError::Forbidden => write!(f, "permission denied"),
            ResolverError::WrongItemType => write!(f, "selector type does not support this verb"),
            ResolverError::BadSelector(s) => write!(f, "bad selector: {s}"),
            ResolverError::Moved(to) => write!(f, "moved to {to}"),
        }
    }
}

impl std::error::Error for ResolverError {}
