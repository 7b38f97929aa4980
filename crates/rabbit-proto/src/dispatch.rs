//! Verb Dispatcher (spec §4.5): interprets `LIST`/`FETCH`/`SEARCH`/
//! `DESCRIBE`/`OFFER`/`PING` against a [`SelectorResolver`] and an
//! optional [`Discovery`] collaborator. `SUBSCRIBE`/`PUBLISH`/`EVENT` are
//! handled by [`crate::subscription`] instead, since they need the
//! cross-lane topic registry this type does not own.

use std::sync::Arc;

use bytes::Bytes;
use rabbit_registry::{FetchedContent, Rabbitmap, Selector, SelectorResolver, Verb as ResolverVerb};
use rabbit_wire::{Body, Frame, StartLine};

use crate::discovery::Discovery;
use crate::error::DispatchError;
use crate::verb::Verb;

/// What the caller should do with a dispatched response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A complete response frame, body included if any.
    Single(Frame),
    /// The body exceeds the non-chunked limit (spec §4.5: "Bodies larger
    /// than the non-chunked limit MUST be sent chunked"): `envelope` is
    /// the `Transfer: chunked` response with no body, and `chunks` are
    /// the `Part:` bodies the caller (lane layer) should frame as
    /// `BEGIN`/`MORE`/`END`.
    Chunked { envelope: Frame, chunks: Vec<Bytes> },
}

/// Interprets request verbs against a selector resolver.
pub struct Dispatcher<R: SelectorResolver> {
    resolver: Arc<R>,
    discovery: Option<Arc<dyn Discovery>>,
    non_chunked_body_max: usize,
}

fn echo_correlation(req: &Frame, resp: &mut Frame) {
    if let Some(lane) = req.headers.get("Lane") {
        resp.headers.push("Lane", lane.to_string()).unwrap();
    }
    if let Some(txn) = req.headers.get("Txn") {
        resp.headers.push("Txn", txn.to_string()).unwrap();
    }
}

fn status_response(code: &str, reason: &str, req: &Frame) -> Frame {
    let mut resp = Frame::new(StartLine::new(code, vec![reason.to_string()]));
    echo_correlation(req, &mut resp);
    resp
}

/// Builds the `301 MOVED` response for a selector that has moved to `to`
/// (spec §9 Open Question (b)): a mandatory client-followed redirect
/// carried in the `Location:` header.
fn moved_response(to: &str, req: &Frame) -> Frame {
    let mut resp = status_response("301", "MOVED", req);
    resp.headers.push("Location", to.to_string()).unwrap();
    resp
}

impl<R: SelectorResolver> Dispatcher<R> {
    pub fn new(resolver: Arc<R>, non_chunked_body_max: usize) -> Self {
        Self {
            resolver,
            discovery: None,
            non_chunked_body_max,
        }
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    fn selector_of(&self, req: &Frame) -> Result<Selector, DispatchError> {
        let raw = req
            .start
            .args
            .first()
            .ok_or_else(|| DispatchError::BadRequest("missing selector".to_string()))?;
        Selector::parse(raw).map_err(|e| DispatchError::BadRequest(e.to_string()))
    }

    fn check_permits(&self, principal: &str, verb: ResolverVerb, sel: &Selector) -> Result<(), DispatchError> {
        if self.resolver.permits(principal, verb, sel) {
            Ok(())
        } else {
            Err(DispatchError::Forbidden)
        }
    }

    /// Dispatch `LIST`/`FETCH`/`SEARCH`/`DESCRIBE`/`OFFER`/`PING`.
    ///
    /// Returns `Err(None)` for verbs this dispatcher doesn't own (e.g.
    /// `SUBSCRIBE`), so the caller can fall through to the subscription
    /// engine.
    pub fn dispatch(
        &self,
        principal: &str,
        req: &Frame,
    ) -> Result<DispatchOutcome, Option<DispatchError>> {
        let verb = Verb::from_word(&req.start.word).ok_or(None)?;
        match verb {
            Verb::List => self.handle_list(principal, req).map_err(Some),
            Verb::Fetch => self.handle_fetch(principal, req).map_err(Some),
            Verb::Search => self.handle_search(principal, req).map_err(Some),
            Verb::Describe => self.handle_describe(principal, req).map_err(Some),
            Verb::Offer => self.handle_offer(req).map_err(Some),
            Verb::Ping => Ok(self.handle_ping(req)),
            _ => Err(None),
        }
    }

    fn handle_list(&self, principal: &str, req: &Frame) -> Result<DispatchOutcome, DispatchError> {
        let sel = self.selector_of(req)?;
        self.check_permits(principal, ResolverVerb::List, &sel)?;
        match self.resolver.list(&sel) {
            Ok(menu) => Ok(DispatchOutcome::Single(self.menu_response("200", "MENU", req, &menu))),
            Err(e) => match DispatchError::from(e) {
                DispatchError::Moved(to) => Ok(DispatchOutcome::Single(moved_response(&to, req))),
                other => Err(other),
            },
        }
    }

    fn handle_search(&self, principal: &str, req: &Frame) -> Result<DispatchOutcome, DispatchError> {
        let sel = self.selector_of(req)?;
        self.check_permits(principal, ResolverVerb::Search, &sel)?;
        let query = req.headers.get("Query").unwrap_or("");
        let menu = self.resolver.search(&sel, query)?;
        Ok(DispatchOutcome::Single(self.menu_response("200", "MENU", req, &menu)))
    }

    fn handle_describe(&self, principal: &str, req: &Frame) -> Result<DispatchOutcome, DispatchError> {
        let sel = self.selector_of(req)?;
        self.check_permits(principal, ResolverVerb::Describe, &sel)?;
        let schema = match self.resolver.describe(&sel) {
            Ok(schema) => schema,
            Err(e) => match DispatchError::from(e) {
                DispatchError::Moved(to) => return Ok(DispatchOutcome::Single(moved_response(&to, req))),
                other => return Err(other),
            },
        };
        let mut resp = status_response("200", "DESCRIPTION", req);
        resp.headers.push("Length", schema.len().to_string()).unwrap();
        resp.body = Body::Full(Bytes::from(schema));
        Ok(DispatchOutcome::Single(resp))
    }

    fn handle_fetch(&self, principal: &str, req: &Frame) -> Result<DispatchOutcome, DispatchError> {
        let sel = self.selector_of(req)?;
        self.check_permits(principal, ResolverVerb::Fetch, &sel)?;
        let accept = req.headers.get("Accept");
        let FetchedContent { view, body } = match self.resolver.fetch(&sel, accept) {
            Ok(content) => content,
            Err(e) => match DispatchError::from(e) {
                DispatchError::Moved(to) => return Ok(DispatchOutcome::Single(moved_response(&to, req))),
                other => return Err(other),
            },
        };

        if body.len() <= self.non_chunked_body_max {
            let mut resp = status_response("200", "CONTENT", req);
            resp.headers.push("View", view).unwrap();
            resp.headers.push("Length", body.len().to_string()).unwrap();
            resp.body = Body::Full(body);
            Ok(DispatchOutcome::Single(resp))
        } else {
            let mut envelope = status_response("200", "CONTENT", req);
            envelope.headers.push("View", view).unwrap();
            envelope.headers.push("Transfer", "chunked").unwrap();
            let chunks = body
                .chunks(self.non_chunked_body_max)
                .map(Bytes::copy_from_slice)
                .collect();
            Ok(DispatchOutcome::Chunked {
                envelope,
                chunks,
            })
        }
    }

    fn handle_offer(&self, req: &Frame) -> Result<DispatchOutcome, DispatchError> {
        let sel = req.start.args.first().map(String::as_str).unwrap_or("");
        if sel != "/warren" {
            return Err(DispatchError::BadRequest(format!(
                "OFFER expects /warren, got {sel:?}"
            )));
        }
        let peers = self
            .discovery
            .as_ref()
            .map(|d| d.peers())
            .unwrap_or_default();
        let mut body = String::new();
        for peer in &peers {
            body.push_str(&peer.burrow);
            body.push_str(": ");
            body.push_str(&peer.identity);
            body.push_str("\r\n");
        }
        body.push_str(".\r\n");

        let mut resp = status_response("200", "PEERS", req);
        resp.headers.push("Length", body.len().to_string()).unwrap();
        resp.body = Body::Full(Bytes::from(body));
        Ok(DispatchOutcome::Single(resp))
    }

    fn handle_ping(&self, req: &Frame) -> DispatchOutcome {
        DispatchOutcome::Single(status_response("200", "PONG", req))
    }

    fn menu_response(&self, code: &str, reason: &str, req: &Frame, menu: &Rabbitmap) -> Frame {
        let body = menu.render();
        let mut resp = status_response(code, reason, req);
        resp.headers.push("Length", body.len().to_string()).unwrap();
        resp.body = Body::Full(Bytes::from(body));
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabbit_registry::MemoryRegistry;

    fn registry_with_readme() -> Arc<MemoryRegistry> {
        let reg = MemoryRegistry::new();
        reg.add_menu("/", "root", vec!["/0/readme".to_string()]);
        reg.add_item(
            "/0/readme",
            "readme",
            "text/plain",
            Bytes::from_static(b"Rabbit runs fast and light."),
        );
        Arc::new(reg)
    }

    fn list_request() -> Frame {
        let mut frame = Frame::new(StartLine::new("LIST", vec!["/".to_string()]));
        frame.headers.push("Lane", "1").unwrap();
        frame.headers.push("Txn", "L1").unwrap();
        frame
    }

    #[test]
    fn s1_list_returns_menu_body_ending_in_dot() {
        let dispatcher = Dispatcher::new(registry_with_readme(), 1024);
        let outcome = dispatcher.dispatch("anonymous", &list_request()).unwrap();
        let DispatchOutcome::Single(resp) = outcome else {
            panic!("expected a single response");
        };
        assert_eq!(resp.start.word, "200");
        assert_eq!(resp.start.args, vec!["MENU".to_string()]);
        assert_eq!(resp.headers.get("Lane"), Some("1"));
        assert_eq!(resp.headers.get("Txn"), Some("L1"));
        let body = resp.body.as_bytes().unwrap();
        assert!(std::str::from_utf8(body).unwrap().ends_with(".\r\n"));
    }

    #[test]
    fn s2_fetch_returns_exact_content_frame() {
        let dispatcher = Dispatcher::new(registry_with_readme(), 1024);
        let mut frame = Frame::new(StartLine::new("FETCH", vec!["/0/readme".to_string()]));
        frame.headers.push("Lane", "3").unwrap();
        frame.headers.push("Txn", "F1").unwrap();
        let outcome = dispatcher.dispatch("anonymous", &frame).unwrap();
        let DispatchOutcome::Single(resp) = outcome else {
            panic!("expected a single response");
        };
        assert_eq!(resp.start.args, vec!["CONTENT".to_string()]);
        assert_eq!(resp.headers.get("Length"), Some("28"));
        assert_eq!(resp.headers.get("View"), Some("text/plain"));
        assert_eq!(
            resp.body.as_bytes().unwrap().as_ref(),
            b"Rabbit runs fast and light."
        );
    }

    #[test]
    fn fetch_missing_selector_yields_404() {
        let dispatcher = Dispatcher::new(registry_with_readme(), 1024);
        let frame = Frame::new(StartLine::new("FETCH", vec!["/0/missing".to_string()]));
        let err = dispatcher.dispatch("anonymous", &frame).unwrap_err().unwrap();
        assert_eq!(err, DispatchError::NotFound);
        assert_eq!(err.status(), rabbit_core::StatusCode::Missing);
    }

    #[test]
    fn fetch_forbidden_selector_yields_403() {
        let reg = MemoryRegistry::new();
        reg.add_item("/0/secret", "secret", "text/plain", Bytes::from_static(b"shh"));
        reg.forbid("anonymous", "/0/secret");
        let dispatcher = Dispatcher::new(Arc::new(reg), 1024);
        let frame = Frame::new(StartLine::new("FETCH", vec!["/0/secret".to_string()]));
        let err = dispatcher.dispatch("anonymous", &frame).unwrap_err().unwrap();
        assert_eq!(err, DispatchError::Forbidden);
    }

    #[test]
    fn oversized_fetch_is_chunked() {
        let reg = MemoryRegistry::new();
        reg.add_item("/0/big", "big", "text/plain", Bytes::from(vec![b'x'; 10]));
        let dispatcher = Dispatcher::new(Arc::new(reg), 4);
        let frame = Frame::new(StartLine::new("FETCH", vec!["/0/big".to_string()]));
        let outcome = dispatcher.dispatch("anonymous", &frame).unwrap();
        let DispatchOutcome::Chunked { envelope, chunks } = outcome else {
            panic!("expected chunked outcome");
        };
        assert_eq!(envelope.headers.get("Transfer"), Some("chunked"));
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), 10);
    }

    #[test]
    fn ping_replies_pong_on_same_lane() {
        let dispatcher = Dispatcher::new(registry_with_readme(), 1024);
        let mut frame = Frame::new(StartLine::new("PING", vec![]));
        frame.headers.push("Lane", "0").unwrap();
        let outcome = dispatcher.dispatch("anonymous", &frame).unwrap();
        let DispatchOutcome::Single(resp) = outcome else {
            panic!("expected a single response");
        };
        assert_eq!(resp.start.args, vec!["PONG".to_string()]);
        assert_eq!(resp.headers.get("Lane"), Some("0"));
    }

    #[test]
    fn offer_warren_lists_peers_terminated_by_dot() {
        use crate::discovery::{PeerInfo, StaticDiscovery};

        let discovery = Arc::new(StaticDiscovery::new(vec![PeerInfo::new(
            "burrow-a",
            "ed25519:deadbeef",
        )]));
        let dispatcher = Dispatcher::new(registry_with_readme(), 1024).with_discovery(discovery);
        let frame = Frame::new(StartLine::new("OFFER", vec!["/warren".to_string()]));
        let outcome = dispatcher.dispatch("anonymous", &frame).unwrap();
        let DispatchOutcome::Single(resp) = outcome else {
            panic!("expected a single response");
        };
        assert_eq!(resp.start.args, vec!["PEERS".to_string()]);
        let body = std::str::from_utf8(resp.body.as_bytes().unwrap()).unwrap().to_string();
        assert!(body.contains("burrow-a: ed25519:deadbeef"));
        assert!(body.ends_with(".\r\n"));
    }

    #[test]
    fn fetch_on_a_moved_selector_yields_301_with_location() {
        let reg = MemoryRegistry::new();
        reg.add_redirect("/0/old-readme", "/0/readme");
        reg.add_item("/0/readme", "readme", "text/plain", Bytes::from_static(b"moved here"));
        let dispatcher = Dispatcher::new(Arc::new(reg), 1024);
        let frame = Frame::new(StartLine::new("FETCH", vec!["/0/old-readme".to_string()]));
        let outcome = dispatcher.dispatch("anonymous", &frame).unwrap();
        let DispatchOutcome::Single(resp) = outcome else {
            panic!("expected a single response");
        };
        assert_eq!(resp.start.word, "301");
        assert_eq!(resp.headers.get("Location"), Some("/0/readme"));
    }

    #[test]
    fn subscribe_falls_through_to_caller() {
        let dispatcher = Dispatcher::new(registry_with_readme(), 1024);
        let frame = Frame::new(StartLine::new("SUBSCRIBE", vec!["/q/news".to_string()]));
        assert_eq!(dispatcher.dispatch("anonymous", &frame), Err(None));
    }
}
