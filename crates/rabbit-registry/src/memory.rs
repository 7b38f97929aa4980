//! An in-memory [`SelectorResolver`], standing in for whatever storage and
//! route-table layer a real burrow would wire in (spec §1 names storage
//! and route-table population out of scope for the core).

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::ResolverError;
use crate::rabbitmap::{Rabbitmap, RabbitmapEntry};
use crate::resolver::{FetchedContent, SelectorResolver, Verb};
use crate::selector::{ItemType, Selector};

#[derive(Debug, Clone)]
enum NodeContent {
    Menu { children: Vec<String> },
    Item { view: String, body: Bytes },
    Topic,
    Info,
    Uri { target: String },
    /// The selector that used to live here now lives at `target`
    /// (spec §9 Open Question (b): `301 MOVED` redirects).
    Redirect { target: String },
}

#[derive(Debug, Clone)]
struct Node {
    item_type: ItemType,
    display: String,
    content: NodeContent,
    schema: Option<String>,
}

/// A hand-populated, process-local selector tree.
///
/// `permits` defaults to allow-all; call [`MemoryRegistry::forbid`] to deny
/// a specific `(principal, selector)` pair for tests that exercise `403`.
#[derive(Default)]
pub struct MemoryRegistry {
    nodes: RwLock<HashMap<String, Node>>,
    denied: RwLock<Vec<(String, String)>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a menu node (type `1`) with the given child selectors, which
    /// must already exist or be inserted afterward.
    pub fn add_menu(&self, selector: &str, display: &str, children: Vec<String>) {
        self.nodes.write().insert(
            selector.to_string(),
            Node {
                item_type: ItemType::Menu,
                display: display.to_string(),
                content: NodeContent::Menu { children },
                schema: None,
            },
        );
    }

    /// Insert a fetchable item (type `0` or `9`).
    pub fn add_item(&self, selector: &str, display: &str, view: &str, body: impl Into<Bytes>) {
        let item_type = if view.starts_with("text/") {
            ItemType::Item
        } else {
            ItemType::Binary
        };
        self.nodes.write().insert(
            selector.to_string(),
            Node {
                item_type,
                display: display.to_string(),
                content: NodeContent::Item {
                    view: view.to_string(),
                    body: body.into(),
                },
                schema: None,
            },
        );
    }

    /// Insert a topic node (type `q`), legal for `SUBSCRIBE`/`PUBLISH`.
    pub fn add_topic(&self, selector: &str, display: &str) {
        self.nodes.write().insert(
            selector.to_string(),
            Node {
                item_type: ItemType::Topic,
                display: display.to_string(),
                content: NodeContent::Topic,
                schema: None,
            },
        );
    }

    /// Mark `selector` as moved to `target`: any verb against it now yields
    /// `301 MOVED` with `target` as the `Location:`, instead of resolving.
    pub fn add_redirect(&self, selector: &str, target: &str) {
        self.nodes.write().insert(
            selector.to_string(),
            Node {
                item_type: ItemType::Info,
                display: format!("moved to {target}"),
                content: NodeContent::Redirect {
                    target: target.to_string(),
                },
                schema: None,
            },
        );
    }

    pub fn set_schema(&self, selector: &str, schema: impl Into<String>) {
        if let Some(node) = self.nodes.write().get_mut(selector) {
            node.schema = Some(schema.into());
        }
    }

    /// Deny `verb`-shaped access for `principal` on `selector` (used by
    /// tests to exercise `403 FORBIDDEN`).
    pub fn forbid(&self, principal: &str, selector: &str) {
        self.denied
            .write()
            .push((principal.to_string(), selector.to_string()));
    }

    fn get(&self, sel: &Selector) -> Result<Node, ResolverError> {
        let node = self
            .nodes
            .read()
            .get(sel.as_str())
            .cloned()
            .ok_or(ResolverError::NotFound)?;
        if let NodeContent::Redirect { target } = node.content {
            return Err(ResolverError::Moved(target));
        }
        Ok(node)
    }
}

impl SelectorResolver for MemoryRegistry {
    fn list(&self, sel: &Selector) -> Result<Rabbitmap, ResolverError> {
        let node = self.get(sel)?;
        if !sel.item_type.is_listable() {
            return Err(ResolverError::WrongItemType);
        }
        let children = match node.content {
            NodeContent::Menu { children } => children,
            _ => return Err(ResolverError::WrongItemType),
        };
        let nodes = self.nodes.read();
        let mut map = Rabbitmap::new();
        for child_sel in &children {
            if let Some(child) = nodes.get(child_sel) {
                map.push(RabbitmapEntry::local(
                    child.item_type,
                    child.display.clone(),
                    child_sel.clone(),
                ));
            }
        }
        Ok(map)
    }

    fn fetch(&self, sel: &Selector, accept_view: Option<&str>) -> Result<FetchedContent, ResolverError> {
        let node = self.get(sel)?;
        if !sel.item_type.is_fetchable() {
            return Err(ResolverError::WrongItemType);
        }
        match node.content {
            NodeContent::Item { view, body } => {
                if let Some(wanted) = accept_view {
                    if wanted != "*/*" && wanted != view {
                        return Err(ResolverError::WrongItemType);
                    }
                }
                Ok(FetchedContent::new(view, body))
            }
            _ => Err(ResolverError::WrongItemType),
        }
    }

    fn search(&self, sel: &Selector, query: &str) -> Result<Rabbitmap, ResolverError> {
        if !sel.item_type.is_searchable() {
            return Err(ResolverError::WrongItemType);
        }
        let query = query.to_ascii_lowercase();
        let nodes = self.nodes.read();
        let mut map = Rabbitmap::new();
        for (child_sel, node) in nodes.iter() {
            if node.display.to_ascii_lowercase().contains(&query)
                || child_sel.to_ascii_lowercase().contains(&query)
            {
                map.push(RabbitmapEntry::local(
                    node.item_type,
                    node.display.clone(),
                    child_sel.clone(),
                ));
            }
        }
        Ok(map)
    }

    fn describe(&self, sel: &Selector) -> Result<String, ResolverError> {
        let node = self.get(sel)?;
        Ok(node.schema.unwrap_or_else(|| {
            format!(
                "type: {}\nselector: {}\ndisplay: {}\n",
                node.item_type.as_char(),
                sel.as_str(),
                node.display
            )
        }))
    }

    fn permits(&self, principal: &str, _verb: Verb, sel: &Selector) -> bool {
        !self
            .denied
            .read()
            .iter()
            .any(|(p, s)| p == principal && s == sel.as_str())
    }
}
