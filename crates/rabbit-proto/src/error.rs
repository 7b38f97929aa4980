use std::fmt;

use rabbit_core::StatusCode;
use rabbit_registry::ResolverError;

/// Errors the dispatcher maps onto a status response (spec §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    BadRequest(String),
    Forbidden,
    NotFound,
    WrongItemType,
    /// The verb targeted a selector type that doesn't support it, e.g.
    /// `SUBSCRIBE` on a non-`q` selector (spec §3).
    VerbNotLegalForType,
    /// The selector has moved; `Location:` should carry the new selector
    /// (spec §9 Open Question (b)).
    Moved(String),
    Internal(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::BadRequest(r) => write!(f, "bad request: {r}"),
            DispatchError::Forbidden => write!(f, "forbidden"),
            DispatchError::NotFound => write!(f, "not found"),
            DispatchError::WrongItemType => write!(f, "wrong item type"),
            DispatchError::VerbNotLegalForType => write!(f, "verb not legal for this selector type"),
            DispatchError::Moved(to) => write!(f, "moved to {to}"),
            DispatchError::Internal(r) => write!(f, "internal error: {r}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<ResolverError> for DispatchError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::NotFound => DispatchError::NotFound,
            ResolverError::Forbidden => DispatchError::Forbidden,
            ResolverError::WrongItemType => DispatchError::WrongItemType,
            ResolverError::BadSelector(s) => DispatchError::BadRequest(s),
            ResolverError::Moved(to) => DispatchError::Moved(to),
        }
    }
}

impl DispatchError {
    /// Map onto the wire status this error produces (spec §7's handler
    /// exceptions default to `520` with a stable reason phrase; everything
    /// named here has a more specific code).
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::BadRequest(_) => StatusCode::BadRequest,
            DispatchError::Forbidden => StatusCode::Forbidden,
            DispatchError::NotFound => StatusCode::Missing,
            DispatchError::WrongItemType | DispatchError::VerbNotLegalForType => {
                StatusCode::BadRequest
            }
            DispatchError::Moved(_) => StatusCode::Moved,
            DispatchError::Internal(_) => StatusCode::Internal,
        }
    }
}
