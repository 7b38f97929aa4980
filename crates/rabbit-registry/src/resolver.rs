//! The Selector Resolver collaborator interface (spec §6).
//!
//! Spec §6: "Selector resolver: `list(sel)`, `fetch(sel, accept_view)`,
//! `search(sel, query)`, `describe(sel)`, `permits(principal, verb, sel)`."
//! This crate defines the trait; storage and route-table population are
//! named out of scope for the core (spec §1) and live behind it.

use bytes::Bytes;

use crate::error::ResolverError;
use crate::rabbitmap::Rabbitmap;
use crate::selector::Selector;

/// The verb a `permits` check is being asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    List,
    Fetch,
    Search,
    Describe,
    Subscribe,
    Publish,
}

/// Fetched content returned by `fetch` (spec §4.5: "returns `200 CONTENT`
/// with `View:` reflecting the content type").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub view: String,
    pub body: Bytes,
}

impl FetchedContent {
    pub fn new(view: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            view: view.into(),
            body: body.into(),
        }
    }
}

/// Resolves selectors to menus, content, and schemas.
///
/// Implementations are expected to be cheap to clone/share (e.g. an
/// `Arc`-wrapped in-memory tree, or a thin client over a route table
/// populated elsewhere); the dispatcher holds one per burrow.
pub trait SelectorResolver: Send + Sync {
    /// `LIST <sel>` (spec §4.5): `sel` must name a menu (`ItemType::Menu`).
    fn list(&self, sel: &Selector) -> Result<Rabbitmap, ResolverError>;

    /// `FETCH <sel>`, optionally negotiating a `View:` via `accept_view`.
    fn fetch(&self, sel: &Selector, accept_view: Option<&str>) -> Result<FetchedContent, ResolverError>;

    /// `SEARCH <sel>` with a `Query:` header value; result is a menu of
    /// matches. Query syntax is implementation-defined (spec §4.5).
    fn search(&self, sel: &Selector, query: &str) -> Result<Rabbitmap, ResolverError>;

    /// `DESCRIBE <sel>`: a schema body for typed-menu rendering.
    fn describe(&self, sel: &Selector) -> Result<String, ResolverError>;

    /// Authorization check consulted by the dispatcher before acting on
    /// any verb. `principal` is the session identity's wire form (e.g.
    /// `anonymous` or `ed25519:<pubkey>`).
    fn permits(&self, principal: &str, verb: Verb, sel: &Selector) -> bool;
}
