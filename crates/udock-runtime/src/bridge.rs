#![forbid(unsafe_code)]

//! Bridge to the mounted rendering context.
//!
//! [`MessageBridge`] owns the lifetime and protocol exchange with one
//! rendering context at a time, translating inbound [`PlayerMessage`]s into
//! [`BridgeUpdate`]s for the session and posting outbound [`HostMessage`]s
//! through the mount's [`PlayerLink`].
//!
//! # State machine
//!
//! ```text
//! Idle ──mount──> Mounting ──Ready──> HandshakeSent ──Started──> Active
//!                    │                     │                       │
//!                    └────────── teardown ─┴───────────────────────┘
//!                                   │
//!                                TornDown ──mount──> Mounting
//! ```
//!
//! # Invariants
//!
//! 1. At most one handshake context is live: `mount` invalidates the
//!    previous mount's token before any new token is spawned.
//! 2. The pending definition/restore point are cleared exactly once, at the
//!    moment they are handed to the player — never re-sent spontaneously.
//! 3. No `DataTransfer` is posted before the player's `ReadyNotification`
//!    for the current mount.
//! 4. Inbound post-handshake messages are applied only when they echo the
//!    live token; stale or tokenless messages are discarded without state
//!    change.
//!
//! # Failure Modes
//!
//! Malformed and unrecognized messages never reach the bridge (the session
//! drops them at decode time). A `Ready` with no pending definition and a
//! page request with no mounted context are ignored after a debug log line.

use udock_backend::PlayerLink;
use udock_core::protocol::{HostMessage, PlayerMessage, SessionToken};

// ---------------------------------------------------------------------------
// Phases and updates
// ---------------------------------------------------------------------------

/// Lifecycle phase of the current rendering context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    /// No context has been mounted yet.
    Idle,
    /// Context created, awaiting the player's readiness signal.
    Mounting,
    /// Handshake payload delivered, awaiting the started acknowledgment.
    HandshakeSent,
    /// Steady-state bidirectional exchange.
    Active,
    /// Context discarded; equivalent to `Idle` for mounting purposes.
    TornDown,
}

/// Page-state change reported by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUpdate {
    /// Full replacement of the navigable page set, when reported.
    pub valid_pages: Option<Vec<String>>,
    /// New current page. When the player reports a page set without a
    /// selection, this is resolved to the set's first page.
    pub current_page: Option<String>,
}

/// State change extracted from an accepted inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeUpdate {
    /// New restore point for the mounted unit.
    RestorePoint(String),
    /// New response payload for the mounted unit.
    Response(String),
    /// Activity-log entry for the mounted unit.
    LogEntry(String),
    /// Navigable page set and/or current page changed.
    Pages(PageUpdate),
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Manages one rendering context: mount, handshake, exchange, teardown.
pub struct MessageBridge {
    phase: BridgePhase,
    token: Option<SessionToken>,
    pending_definition: Option<String>,
    pending_restore_point: Option<String>,
    link: Option<Box<dyn PlayerLink>>,
}

impl std::fmt::Debug for MessageBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBridge")
            .field("phase", &self.phase)
            .field("token", &self.token)
            .field("pending_definition", &self.pending_definition.is_some())
            .field(
                "pending_restore_point",
                &self.pending_restore_point.is_some(),
            )
            .field("link", &self.link.is_some())
            .finish()
    }
}

impl MessageBridge {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: BridgePhase::Idle,
            token: None,
            pending_definition: None,
            pending_restore_point: None,
            link: None,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    /// `true` while a rendering context is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.link.is_some()
    }

    /// Mount a fresh rendering context and stage its handshake payload.
    ///
    /// The previous mount, if any, is torn down first; its token is
    /// invalidated before the new context can produce any accepted message.
    pub fn mount(&mut self, link: Box<dyn PlayerLink>, definition: String, restore_point: String) {
        if self.link.is_some() {
            self.teardown();
        }
        self.token = None;
        self.pending_definition = Some(definition);
        self.pending_restore_point = Some(restore_point);
        self.link = Some(link);
        self.phase = BridgePhase::Mounting;
        tracing::debug!(target: "udock.bridge", "rendering context mounted, awaiting readiness");
    }

    /// Discard the current rendering context and everything scoped to it.
    pub fn teardown(&mut self) {
        self.token = None;
        self.pending_definition = None;
        self.pending_restore_point = None;
        self.link = None;
        self.phase = BridgePhase::TornDown;
        tracing::debug!(target: "udock.bridge", "rendering context torn down");
    }

    /// Process one decoded inbound message, returning the state changes the
    /// session should apply.
    pub fn handle_message(&mut self, message: PlayerMessage) -> Vec<BridgeUpdate> {
        match message {
            PlayerMessage::Ready => self.handle_ready(),
            PlayerMessage::Started {
                session_id,
                valid_pages,
                current_page,
            } => {
                if !self.accepts_token(session_id.as_deref(), "StartedNotification") {
                    return Vec::new();
                }
                self.handle_started(valid_pages, current_page)
            }
            PlayerMessage::ChangedData {
                session_id,
                valid_pages,
                current_page,
                restore_point,
                response,
            } => {
                if !self.accepts_token(session_id.as_deref(), "ChangedDataTransfer") {
                    return Vec::new();
                }
                Self::handle_changed(valid_pages, current_page, restore_point, response)
            }
        }
    }

    /// Post a page-navigation request to the mounted player.
    ///
    /// Returns `true` if a request was posted. Ignored when no context is
    /// mounted, the handshake has not completed, or the target page is
    /// empty.
    pub fn request_page(&mut self, new_page: &str) -> bool {
        if new_page.is_empty() {
            return false;
        }
        let (Some(link), Some(token)) = (self.link.as_mut(), self.token.as_ref()) else {
            tracing::debug!(target: "udock.bridge", page = %new_page, "page request with no mounted player, ignored");
            return false;
        };
        link.post(&HostMessage::PageNavigationRequest {
            session_id: token.as_str().to_string(),
            new_page: new_page.to_string(),
        });
        true
    }

    // -- inbound handlers ---------------------------------------------------

    fn handle_ready(&mut self) -> Vec<BridgeUpdate> {
        let Some(definition) = self.pending_definition.take() else {
            tracing::debug!(target: "udock.bridge", "readiness with no pending definition, ignored");
            return Vec::new();
        };
        let restore_point = self.pending_restore_point.take().unwrap_or_default();

        let Some(link) = self.link.as_mut() else {
            // Pending fields are already consumed; a context that vanished
            // mid-handshake gets nothing re-sent.
            tracing::warn!(target: "udock.bridge", "readiness with no live link, handshake dropped");
            return Vec::new();
        };

        let token = SessionToken::fresh();
        link.post(&HostMessage::DataTransfer {
            session_id: token.as_str().to_string(),
            unit_definition: definition,
            restore_point,
        });
        self.token = Some(token);
        self.phase = BridgePhase::HandshakeSent;
        tracing::debug!(target: "udock.bridge", "handshake payload delivered");
        vec![BridgeUpdate::LogEntry("ready".to_string())]
    }

    fn handle_started(
        &mut self,
        valid_pages: Vec<String>,
        current_page: Option<String>,
    ) -> Vec<BridgeUpdate> {
        self.phase = BridgePhase::Active;
        // A single page is no navigation at all.
        if valid_pages.len() > 1 {
            let current = current_page.or_else(|| valid_pages.first().cloned());
            vec![BridgeUpdate::Pages(PageUpdate {
                valid_pages: Some(valid_pages),
                current_page: current,
            })]
        } else {
            vec![BridgeUpdate::Pages(PageUpdate {
                valid_pages: Some(Vec::new()),
                current_page: None,
            })]
        }
    }

    fn handle_changed(
        valid_pages: Option<Vec<String>>,
        current_page: Option<String>,
        restore_point: Option<String>,
        response: Option<String>,
    ) -> Vec<BridgeUpdate> {
        let mut updates = Vec::new();

        match (valid_pages, current_page) {
            (Some(pages), current) => {
                let current = current.or_else(|| pages.first().cloned());
                updates.push(BridgeUpdate::Pages(PageUpdate {
                    valid_pages: Some(pages),
                    current_page: current,
                }));
            }
            (None, Some(current)) => {
                updates.push(BridgeUpdate::Pages(PageUpdate {
                    valid_pages: None,
                    current_page: Some(current),
                }));
            }
            (None, None) => {}
        }

        if let Some(rp) = restore_point {
            updates.push(BridgeUpdate::RestorePoint(rp));
        }
        if let Some(resp) = response {
            updates.push(BridgeUpdate::Response(resp));
        }
        updates
    }

    /// Token gate for post-handshake inbound messages.
    fn accepts_token(&self, wire: Option<&str>, tag: &str) -> bool {
        match (self.token.as_ref(), wire) {
            (Some(token), Some(wire)) if token.matches(wire) => true,
            (Some(_), Some(wire)) => {
                tracing::debug!(target: "udock.bridge", %tag, stale = %wire, "token mismatch, message discarded");
                false
            }
            (Some(_), None) => {
                tracing::debug!(target: "udock.bridge", %tag, "tokenless message discarded");
                false
            }
            (None, _) => {
                tracing::debug!(target: "udock.bridge", %tag, "message with no live mount discarded");
                false
            }
        }
    }
}

impl Default for MessageBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every posted message for assertions.
    struct CapturingLink {
        posted: Rc<RefCell<Vec<HostMessage>>>,
    }

    impl PlayerLink for CapturingLink {
        fn post(&mut self, message: &HostMessage) {
            self.posted.borrow_mut().push(message.clone());
        }
    }

    fn capturing_link() -> (Box<dyn PlayerLink>, Rc<RefCell<Vec<HostMessage>>>) {
        let posted = Rc::new(RefCell::new(Vec::new()));
        (
            Box::new(CapturingLink {
                posted: Rc::clone(&posted),
            }),
            posted,
        )
    }

    fn mounted_bridge() -> (MessageBridge, Rc<RefCell<Vec<HostMessage>>>) {
        let mut bridge = MessageBridge::new();
        let (link, posted) = capturing_link();
        bridge.mount(link, "<def/>".into(), "rp0".into());
        (bridge, posted)
    }

    /// Drive the handshake and return the minted token.
    fn complete_handshake(bridge: &mut MessageBridge, posted: &Rc<RefCell<Vec<HostMessage>>>) -> String {
        bridge.handle_message(PlayerMessage::Ready);
        let token = match &posted.borrow()[0] {
            HostMessage::DataTransfer { session_id, .. } => session_id.clone(),
            other => panic!("expected DataTransfer, got {other:?}"),
        };
        bridge.handle_message(PlayerMessage::Started {
            session_id: Some(token.clone()),
            valid_pages: vec!["p1".into(), "p2".into()],
            current_page: None,
        });
        token
    }

    // --- Handshake ---

    #[test]
    fn no_data_transfer_before_ready() {
        let (mut bridge, posted) = mounted_bridge();
        assert_eq!(bridge.phase(), BridgePhase::Mounting);
        assert!(posted.borrow().is_empty());

        bridge.handle_message(PlayerMessage::Ready);
        assert_eq!(bridge.phase(), BridgePhase::HandshakeSent);
        assert_eq!(posted.borrow().len(), 1);
    }

    #[test]
    fn ready_delivers_staged_definition_and_restore_point() {
        let (mut bridge, posted) = mounted_bridge();
        let updates = bridge.handle_message(PlayerMessage::Ready);

        match &posted.borrow()[0] {
            HostMessage::DataTransfer {
                unit_definition,
                restore_point,
                session_id,
            } => {
                assert_eq!(unit_definition, "<def/>");
                assert_eq!(restore_point, "rp0");
                assert!(!session_id.is_empty());
            }
            other => panic!("expected DataTransfer, got {other:?}"),
        }
        assert_eq!(updates, vec![BridgeUpdate::LogEntry("ready".into())]);
    }

    #[test]
    fn pending_payload_is_delivered_exactly_once() {
        let (mut bridge, posted) = mounted_bridge();
        bridge.handle_message(PlayerMessage::Ready);
        // A second readiness (e.g. player-internal reload) gets nothing.
        bridge.handle_message(PlayerMessage::Ready);
        assert_eq!(posted.borrow().len(), 1);
    }

    #[test]
    fn ready_without_mount_is_ignored() {
        let mut bridge = MessageBridge::new();
        let updates = bridge.handle_message(PlayerMessage::Ready);
        assert!(updates.is_empty());
        assert_eq!(bridge.phase(), BridgePhase::Idle);
    }

    #[test]
    fn started_with_live_token_activates() {
        let (mut bridge, posted) = mounted_bridge();
        complete_handshake(&mut bridge, &posted);
        assert_eq!(bridge.phase(), BridgePhase::Active);
    }

    #[test]
    fn started_selects_first_page_when_none_given() {
        let (mut bridge, posted) = mounted_bridge();
        bridge.handle_message(PlayerMessage::Ready);
        let token = match &posted.borrow()[0] {
            HostMessage::DataTransfer { session_id, .. } => session_id.clone(),
            other => panic!("expected DataTransfer, got {other:?}"),
        };
        let updates = bridge.handle_message(PlayerMessage::Started {
            session_id: Some(token),
            valid_pages: vec!["p1".into(), "p2".into()],
            current_page: None,
        });
        assert_eq!(
            updates,
            vec![BridgeUpdate::Pages(PageUpdate {
                valid_pages: Some(vec!["p1".into(), "p2".into()]),
                current_page: Some("p1".into()),
            })]
        );
    }

    #[test]
    fn started_with_single_page_clears_navigation() {
        let (mut bridge, posted) = mounted_bridge();
        bridge.handle_message(PlayerMessage::Ready);
        let token = match &posted.borrow()[0] {
            HostMessage::DataTransfer { session_id, .. } => session_id.clone(),
            other => panic!("expected DataTransfer, got {other:?}"),
        };
        let updates = bridge.handle_message(PlayerMessage::Started {
            session_id: Some(token),
            valid_pages: vec!["only".into()],
            current_page: Some("only".into()),
        });
        assert_eq!(
            updates,
            vec![BridgeUpdate::Pages(PageUpdate {
                valid_pages: Some(Vec::new()),
                current_page: None,
            })]
        );
    }

    // --- Token filtering ---

    #[test]
    fn tokenless_started_is_discarded() {
        let (mut bridge, _posted) = mounted_bridge();
        bridge.handle_message(PlayerMessage::Ready);
        let updates = bridge.handle_message(PlayerMessage::Started {
            session_id: None,
            valid_pages: vec!["p1".into(), "p2".into()],
            current_page: None,
        });
        assert!(updates.is_empty());
        assert_eq!(bridge.phase(), BridgePhase::HandshakeSent);
    }

    #[test]
    fn stale_token_changed_data_is_discarded() {
        let (mut bridge, posted) = mounted_bridge();
        let old_token = complete_handshake(&mut bridge, &posted);

        // Remount: previous token is invalidated before a new one exists.
        let (link2, posted2) = capturing_link();
        bridge.mount(link2, "<def2/>".into(), "rp2".into());
        bridge.handle_message(PlayerMessage::Ready);
        let new_token = match &posted2.borrow()[0] {
            HostMessage::DataTransfer { session_id, .. } => session_id.clone(),
            other => panic!("expected DataTransfer, got {other:?}"),
        };
        assert_ne!(old_token, new_token);

        let stale = bridge.handle_message(PlayerMessage::ChangedData {
            session_id: Some(old_token),
            valid_pages: None,
            current_page: None,
            restore_point: Some("stale".into()),
            response: None,
        });
        assert!(stale.is_empty());

        let live = bridge.handle_message(PlayerMessage::ChangedData {
            session_id: Some(new_token),
            valid_pages: None,
            current_page: None,
            restore_point: Some("fresh".into()),
            response: None,
        });
        assert_eq!(live, vec![BridgeUpdate::RestorePoint("fresh".into())]);
    }

    #[test]
    fn changed_data_before_any_handshake_is_discarded() {
        let (mut bridge, _posted) = mounted_bridge();
        let updates = bridge.handle_message(PlayerMessage::ChangedData {
            session_id: Some("whatever".into()),
            valid_pages: None,
            current_page: None,
            restore_point: Some("rp".into()),
            response: None,
        });
        assert!(updates.is_empty());
    }

    // --- ChangedDataTransfer field extraction ---

    #[test]
    fn changed_data_routes_all_present_fields() {
        let (mut bridge, posted) = mounted_bridge();
        let token = complete_handshake(&mut bridge, &posted);

        let updates = bridge.handle_message(PlayerMessage::ChangedData {
            session_id: Some(token),
            valid_pages: Some(vec!["p1".into(), "p2".into(), "p3".into()]),
            current_page: Some("p3".into()),
            restore_point: Some("rp9".into()),
            response: Some("resp9".into()),
        });
        assert_eq!(
            updates,
            vec![
                BridgeUpdate::Pages(PageUpdate {
                    valid_pages: Some(vec!["p1".into(), "p2".into(), "p3".into()]),
                    current_page: Some("p3".into()),
                }),
                BridgeUpdate::RestorePoint("rp9".into()),
                BridgeUpdate::Response("resp9".into()),
            ]
        );
    }

    #[test]
    fn changed_data_with_pages_but_no_current_selects_first() {
        let (mut bridge, posted) = mounted_bridge();
        let token = complete_handshake(&mut bridge, &posted);

        let updates = bridge.handle_message(PlayerMessage::ChangedData {
            session_id: Some(token),
            valid_pages: Some(vec!["pA".into(), "pB".into()]),
            current_page: None,
            restore_point: None,
            response: None,
        });
        assert_eq!(
            updates,
            vec![BridgeUpdate::Pages(PageUpdate {
                valid_pages: Some(vec!["pA".into(), "pB".into()]),
                current_page: Some("pA".into()),
            })]
        );
    }

    #[test]
    fn changed_data_with_current_page_only() {
        let (mut bridge, posted) = mounted_bridge();
        let token = complete_handshake(&mut bridge, &posted);

        let updates = bridge.handle_message(PlayerMessage::ChangedData {
            session_id: Some(token),
            valid_pages: None,
            current_page: Some("p2".into()),
            restore_point: None,
            response: None,
        });
        assert_eq!(
            updates,
            vec![BridgeUpdate::Pages(PageUpdate {
                valid_pages: None,
                current_page: Some("p2".into()),
            })]
        );
    }

    // --- Page requests ---

    #[test]
    fn page_request_posts_with_live_token() {
        let (mut bridge, posted) = mounted_bridge();
        let token = complete_handshake(&mut bridge, &posted);

        assert!(bridge.request_page("p2"));
        match posted.borrow().last() {
            Some(HostMessage::PageNavigationRequest {
                session_id,
                new_page,
            }) => {
                assert_eq!(session_id, &token);
                assert_eq!(new_page, "p2");
            }
            other => panic!("expected PageNavigationRequest, got {other:?}"),
        }
    }

    #[test]
    fn page_request_ignored_when_unmounted() {
        let mut bridge = MessageBridge::new();
        assert!(!bridge.request_page("p2"));
    }

    #[test]
    fn page_request_ignored_before_handshake() {
        let (mut bridge, posted) = mounted_bridge();
        assert!(!bridge.request_page("p2"));
        assert!(posted.borrow().is_empty());
    }

    #[test]
    fn page_request_ignored_for_empty_page() {
        let (mut bridge, posted) = mounted_bridge();
        complete_handshake(&mut bridge, &posted);
        let before = posted.borrow().len();
        assert!(!bridge.request_page(""));
        assert_eq!(posted.borrow().len(), before);
    }

    // --- Teardown ---

    #[test]
    fn teardown_clears_everything_scoped_to_the_mount() {
        let (mut bridge, posted) = mounted_bridge();
        complete_handshake(&mut bridge, &posted);

        bridge.teardown();
        assert_eq!(bridge.phase(), BridgePhase::TornDown);
        assert!(!bridge.is_mounted());
        assert!(!bridge.request_page("p2"));

        // Readiness after teardown has no pending payload to deliver.
        let posted_before = posted.borrow().len();
        bridge.handle_message(PlayerMessage::Ready);
        assert_eq!(posted.borrow().len(), posted_before);
    }

    #[test]
    fn remount_goes_back_to_mounting() {
        let (mut bridge, posted) = mounted_bridge();
        complete_handshake(&mut bridge, &posted);
        bridge.teardown();

        let (link2, _posted2) = capturing_link();
        bridge.mount(link2, "<def2/>".into(), String::new());
        assert_eq!(bridge.phase(), BridgePhase::Mounting);
    }
}
