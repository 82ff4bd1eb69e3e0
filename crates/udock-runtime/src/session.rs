#![forbid(unsafe_code)]

//! The test session: glue between navigation, bridge, and autosave.
//!
//! [`TestSession`] owns everything scoped to one learner's run through a
//! booklet: the navigation state, the bridge to the mounted player, the
//! autosave pipelines, and the handles to the two backend seams
//! ([`PlayerHost`] and [`UnitGateway`]). There is no ambient shared state;
//! the session is constructed on booklet load and torn down at the end.
//!
//! # Event loop
//!
//! The session is single-threaded and cooperative. [`TestSession::run`]
//! consumes a channel of [`SessionEvent`]s with a poll timeout derived from
//! the earliest armed autosave deadline, so coalesced values flush promptly
//! without busy-waiting. Every state-mutating entry point also takes an
//! explicit `now`, which is what makes the whole machine drivable with
//! virtual time from tests.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Instant;

use udock_backend::{Authorisation, PlayerHost, UnitGateway};
use udock_core::protocol::decode_player_message;
use udock_core::unit::{Booklet, BookletStatus};
use udock_core::{LogEntryKey, SessionPolicy};

use crate::autosave::AutosavePipeline;
use crate::bridge::{BridgePhase, BridgeUpdate, MessageBridge};
use crate::navigation::NavigationState;

/// An input to the session's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Raw message from the rendering context (JSON wire form).
    FromPlayer(String),
    /// Request to show the unit at the given position.
    GoToUnit(i32),
    /// Request to show a different page inside the current unit.
    PageRequest(String),
    /// End the session.
    End,
}

/// One learner's run through a booklet.
pub struct TestSession<H: PlayerHost, G: UnitGateway> {
    nav: NavigationState,
    bridge: MessageBridge,
    autosave: AutosavePipeline,
    host: H,
    gateway: G,
    auth: Authorisation,
    policy: SessionPolicy,
    pending_page_request: Option<String>,
}

impl<H: PlayerHost, G: UnitGateway> TestSession<H, G> {
    #[must_use]
    pub fn new(
        booklet: Booklet,
        host: H,
        gateway: G,
        auth: Authorisation,
        policy: SessionPolicy,
    ) -> Self {
        let autosave = AutosavePipeline::new(&policy);
        Self {
            nav: NavigationState::new(booklet),
            bridge: MessageBridge::new(),
            autosave,
            host,
            gateway,
            auth,
            policy,
            pending_page_request: None,
        }
    }

    /// Install the booklet into the running session and resume at the
    /// stored last position (negative for "none").
    pub fn start(&mut self, last_position: i32, now: Instant) {
        tracing::info!(
            target: "udock.session",
            key = %LogEntryKey::BookletLoadStart,
            units = self.nav.booklet().len(),
            "booklet load"
        );
        tracing::info!(
            target: "udock.session",
            key = %LogEntryKey::BookletLoadComplete,
            unlocked = self.nav.booklet().unlocked_unit_count(),
            "booklet installed"
        );
        self.go_to_unit_by_position(last_position, now);
    }

    /// Change the current unit.
    ///
    /// Tears down the previous rendering context (dropping its unflushed
    /// autosave remainder), then resolves, stages, and mounts the new
    /// target. Out-of-range positions leave the session with no unit
    /// selected and nothing mounted.
    pub fn go_to_unit_by_position(&mut self, pos: i32, now: Instant) {
        if self.bridge.is_mounted() {
            if let Some(unit) = self.nav.current_unit() {
                tracing::debug!(
                    target: "udock.session",
                    key = %LogEntryKey::UnitLeave,
                    unit = %unit.id,
                    "leaving unit"
                );
            }
            self.bridge.teardown();
            self.host.unmount();
            self.autosave.unbind();
        }
        self.pending_page_request = None;

        let Some(selected) = self.nav.go_to_unit_by_position(pos) else {
            tracing::debug!(target: "udock.session", requested = pos, "no unit selected");
            return;
        };

        let (unit_id, player_type, definition, persisted_restore_point) = {
            let Some(unit) = self.nav.booklet().unit_at(selected) else {
                return;
            };
            (
                unit.id.clone(),
                unit.player_type.clone(),
                unit.definition.clone(),
                unit.restore_point.clone(),
            )
        };

        // The transient cache wins; the unit's persisted restore point is
        // the fallback for the very first load.
        let restore_point = self
            .gateway
            .get_unit_restore_point(&unit_id)
            .unwrap_or(persisted_restore_point);

        match self.host.mount(&player_type) {
            Ok(link) => {
                self.bridge.mount(link, definition, restore_point);
                self.autosave.bind_unit(&unit_id);
                self.autosave
                    .push_log_entry(LogEntryKey::UnitEnter.as_str().to_string(), now);
                tracing::debug!(
                    target: "udock.session",
                    key = %LogEntryKey::UnitEnter,
                    unit = %unit_id,
                    position = selected,
                    "unit staged for handshake"
                );
            }
            Err(e) => {
                tracing::warn!(target: "udock.session", unit = %unit_id, error = %e, "mount failed");
            }
        }
    }

    /// Feed one raw message from the rendering context.
    ///
    /// Malformed or unrecognized messages are logged and dropped here;
    /// token filtering happens inside the bridge.
    pub fn on_player_message(&mut self, raw: &str, now: Instant) {
        let message = match decode_player_message(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(target: "udock.session", error = %e, "inbound message ignored");
                return;
            }
        };

        for update in self.bridge.handle_message(message) {
            match update {
                BridgeUpdate::RestorePoint(value) => {
                    // Mirror immediately so in-process readers see the
                    // current value without waiting for persistence.
                    if let Some(unit) = self.nav.booklet_mut().current_unit_mut() {
                        unit.restore_point = value.clone();
                    }
                    self.autosave.push_restore_point(value, now);
                }
                BridgeUpdate::Response(value) => {
                    self.autosave.push_response(value, now);
                }
                BridgeUpdate::LogEntry(entry) => {
                    self.autosave.push_log_entry(entry, now);
                }
                BridgeUpdate::Pages(pages) => {
                    let reported = pages.current_page.clone();
                    self.nav.apply_pages(pages);
                    if let (Some(requested), Some(reported)) =
                        (self.pending_page_request.as_deref(), reported.as_deref())
                        && requested == reported
                    {
                        self.autosave.push_log_entry(
                            LogEntryKey::PageNavigationComplete.as_str().to_string(),
                            now,
                        );
                        self.pending_page_request = None;
                    }
                }
            }
        }
    }

    /// Ask the mounted player to show a different page.
    ///
    /// Ignored when nothing is mounted or the page id is empty.
    pub fn request_page(&mut self, page: &str, now: Instant) {
        if self.bridge.request_page(page) {
            self.pending_page_request = Some(page.to_string());
            self.autosave
                .push_log_entry(LogEntryKey::PageNavigationStart.as_str().to_string(), now);
        }
    }

    /// Flush every autosave window whose deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        self.autosave
            .flush_due(now, &mut self.gateway, &self.auth);
    }

    /// Earliest pending autosave deadline, for deriving the poll timeout.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.autosave.next_deadline()
    }

    /// End the session: tear down the context, cancel pending windows, and
    /// clear navigation state.
    pub fn end(&mut self, _now: Instant) {
        if let Some(unit) = self.nav.current_unit() {
            tracing::debug!(
                target: "udock.session",
                key = %LogEntryKey::UnitLeave,
                unit = %unit.id,
                "session end"
            );
        }
        self.bridge.teardown();
        self.host.unmount();
        self.autosave.unbind();
        self.pending_page_request = None;
        self.nav.reset();
        tracing::info!(target: "udock.session", "session ended");
    }

    /// Drive the session until [`SessionEvent::End`] or channel disconnect.
    ///
    /// The poll timeout tracks the earliest armed autosave deadline, falling
    /// back to the policy's idle timeout when nothing is pending.
    pub fn run(&mut self, events: &Receiver<SessionEvent>) {
        loop {
            let now = Instant::now();
            self.tick(now);

            let timeout = match self.next_deadline() {
                Some(deadline) => deadline.saturating_duration_since(now),
                None => self.policy.poll_timeout(),
            };

            match events.recv_timeout(timeout) {
                Ok(SessionEvent::FromPlayer(raw)) => {
                    self.on_player_message(&raw, Instant::now());
                }
                Ok(SessionEvent::GoToUnit(pos)) => {
                    self.go_to_unit_by_position(pos, Instant::now());
                }
                Ok(SessionEvent::PageRequest(page)) => {
                    self.request_page(&page, Instant::now());
                }
                Ok(SessionEvent::End) | Err(RecvTimeoutError::Disconnected) => {
                    self.end(Instant::now());
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Navigation state, for outer chrome.
    #[must_use]
    pub fn navigation(&self) -> &NavigationState {
        &self.nav
    }

    /// Current bridge phase.
    #[must_use]
    pub fn bridge_phase(&self) -> BridgePhase {
        self.bridge.phase()
    }

    /// Display status for the current booklet state.
    #[must_use]
    pub fn status(&self) -> BookletStatus {
        self.nav.status()
    }

    /// The gateway, for inspection.
    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}
