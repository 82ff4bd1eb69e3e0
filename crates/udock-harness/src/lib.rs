#![forbid(unsafe_code)]

//! Test doubles for driving a UnitDock session without a real player or
//! backend.
//!
//! - [`StubHost`] mounts [`RecordingLink`]s and exposes every posted
//!   message through a shared [`HostProbe`].
//! - [`RecordingGateway`] records persistence calls in arrival order and
//!   can be told to decline or fail them.
//! - [`StepClock`] produces the explicit `Instant`s the runtime's state
//!   machines take, so tests advance virtual time instead of sleeping.
//!
//! Everything here is single-threaded by design, matching the session's
//! cooperative event loop; shared handles use `Rc<RefCell<_>>`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use udock_backend::{
    Authorisation, MountError, PlayerHost, PlayerLink, ServerError, UnitGateway,
};
use udock_core::protocol::HostMessage;

// ---------------------------------------------------------------------------
// Player host double
// ---------------------------------------------------------------------------

/// One mounted rendering context, as seen by the host double.
#[derive(Debug, Clone)]
pub struct MountRecord {
    /// Renderer type requested at mount time.
    pub player_type: String,
    /// Messages posted into this mount, in order.
    pub posted: Rc<RefCell<Vec<HostMessage>>>,
}

#[derive(Debug, Default)]
struct HostLog {
    mounts: Vec<MountRecord>,
    unmounts: usize,
}

/// Shared view into a [`StubHost`]'s activity.
#[derive(Debug, Clone, Default)]
pub struct HostProbe {
    log: Rc<RefCell<HostLog>>,
}

impl HostProbe {
    /// Number of contexts mounted so far.
    #[must_use]
    pub fn mount_count(&self) -> usize {
        self.log.borrow().mounts.len()
    }

    /// Number of unmount calls so far.
    #[must_use]
    pub fn unmount_count(&self) -> usize {
        self.log.borrow().unmounts
    }

    /// Renderer type of the `n`th mount.
    #[must_use]
    pub fn player_type(&self, mount: usize) -> Option<String> {
        self.log
            .borrow()
            .mounts
            .get(mount)
            .map(|m| m.player_type.clone())
    }

    /// Messages posted into the `n`th mount, in order.
    #[must_use]
    pub fn posted(&self, mount: usize) -> Vec<HostMessage> {
        self.log
            .borrow()
            .mounts
            .get(mount)
            .map(|m| m.posted.borrow().clone())
            .unwrap_or_default()
    }

    /// Messages posted into the most recent mount.
    #[must_use]
    pub fn last_posted(&self) -> Vec<HostMessage> {
        let log = self.log.borrow();
        log.mounts
            .last()
            .map(|m| m.posted.borrow().clone())
            .unwrap_or_default()
    }

    /// Session token carried by the `n`th mount's `DataTransfer`, if the
    /// handshake completed.
    #[must_use]
    pub fn handshake_token(&self, mount: usize) -> Option<String> {
        self.posted(mount).iter().find_map(|m| match m {
            HostMessage::DataTransfer { session_id, .. } => Some(session_id.clone()),
            HostMessage::PageNavigationRequest { .. } => None,
        })
    }
}

/// Link double that records every posted message.
pub struct RecordingLink {
    posted: Rc<RefCell<Vec<HostMessage>>>,
}

impl PlayerLink for RecordingLink {
    fn post(&mut self, message: &HostMessage) {
        self.posted.borrow_mut().push(message.clone());
    }
}

/// [`PlayerHost`] double handing out [`RecordingLink`]s.
#[derive(Debug, Default)]
pub struct StubHost {
    log: Rc<RefCell<HostLog>>,
    refuse_mounts: bool,
}

impl StubHost {
    /// A host that mounts successfully.
    #[must_use]
    pub fn new() -> (Self, HostProbe) {
        let log = Rc::new(RefCell::new(HostLog::default()));
        let probe = HostProbe {
            log: Rc::clone(&log),
        };
        (
            Self {
                log,
                refuse_mounts: false,
            },
            probe,
        )
    }

    /// A host that refuses every mount (no player for any type).
    #[must_use]
    pub fn refusing() -> (Self, HostProbe) {
        let (mut host, probe) = Self::new();
        host.refuse_mounts = true;
        (host, probe)
    }
}

impl PlayerHost for StubHost {
    fn unmount(&mut self) {
        self.log.borrow_mut().unmounts += 1;
    }

    fn mount(&mut self, player_type: &str) -> Result<Box<dyn PlayerLink>, MountError> {
        if self.refuse_mounts {
            return Err(MountError {
                player_type: player_type.to_string(),
            });
        }
        let posted = Rc::new(RefCell::new(Vec::new()));
        self.log.borrow_mut().mounts.push(MountRecord {
            player_type: player_type.to_string(),
            posted: Rc::clone(&posted),
        });
        Ok(Box::new(RecordingLink { posted }))
    }
}

// ---------------------------------------------------------------------------
// Gateway double
// ---------------------------------------------------------------------------

/// One persistence call observed by a [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    RestorePoint { unit_id: String, value: String },
    Responses { unit_id: String, value: String },
    Log { unit_id: String, entries: Vec<String> },
}

#[derive(Debug, Default)]
struct GatewayInner {
    calls: Vec<GatewayCall>,
    cache: HashMap<String, String>,
    decline: bool,
    fail: Option<ServerError>,
}

/// Recording [`UnitGateway`] with a shared handle.
///
/// Clones share the same call log and cache, so a test can move one clone
/// into the session and keep the other for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    inner: Rc<RefCell<GatewayInner>>,
}

impl RecordingGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the restore-point cache.
    pub fn seed_restore_point(&self, unit_id: impl Into<String>, value: impl Into<String>) {
        self.inner
            .borrow_mut()
            .cache
            .insert(unit_id.into(), value.into());
    }

    /// Decline (`Ok(false)`) every subsequent setter call.
    pub fn decline_writes(&self) {
        self.inner.borrow_mut().decline = true;
    }

    /// Fail every subsequent setter call with the given server error.
    pub fn fail_writes(&self, error: ServerError) {
        self.inner.borrow_mut().fail = Some(error);
    }

    /// Accept writes again.
    pub fn accept_writes(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.decline = false;
        inner.fail = None;
    }

    /// Every observed call, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner.borrow().calls.clone()
    }

    /// Observed restore-point calls only.
    #[must_use]
    pub fn restore_point_calls(&self) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::RestorePoint { unit_id, value } => {
                    Some((unit_id.clone(), value.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Observed response calls only.
    #[must_use]
    pub fn response_calls(&self) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Responses { unit_id, value } => {
                    Some((unit_id.clone(), value.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Observed log calls only.
    #[must_use]
    pub fn log_calls(&self) -> Vec<(String, Vec<String>)> {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Log { unit_id, entries } => {
                    Some((unit_id.clone(), entries.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn outcome(&self) -> Result<bool, ServerError> {
        let inner = self.inner.borrow();
        if let Some(e) = &inner.fail {
            return Err(e.clone());
        }
        Ok(!inner.decline)
    }
}

impl UnitGateway for RecordingGateway {
    fn set_unit_restore_point(
        &mut self,
        _auth: &Authorisation,
        unit_id: &str,
        restore_point: &str,
    ) -> Result<bool, ServerError> {
        self.inner.borrow_mut().calls.push(GatewayCall::RestorePoint {
            unit_id: unit_id.to_string(),
            value: restore_point.to_string(),
        });
        let outcome = self.outcome();
        if outcome == Ok(true) {
            self.inner
                .borrow_mut()
                .cache
                .insert(unit_id.to_string(), restore_point.to_string());
        }
        outcome
    }

    fn set_unit_responses(
        &mut self,
        _auth: &Authorisation,
        unit_id: &str,
        responses: &str,
    ) -> Result<bool, ServerError> {
        self.inner.borrow_mut().calls.push(GatewayCall::Responses {
            unit_id: unit_id.to_string(),
            value: responses.to_string(),
        });
        self.outcome()
    }

    fn set_unit_log(
        &mut self,
        _auth: &Authorisation,
        unit_id: &str,
        entries: &[String],
    ) -> Result<bool, ServerError> {
        self.inner.borrow_mut().calls.push(GatewayCall::Log {
            unit_id: unit_id.to_string(),
            entries: entries.to_vec(),
        });
        self.outcome()
    }

    fn get_unit_restore_point(&self, unit_id: &str) -> Option<String> {
        self.inner.borrow().cache.get(unit_id).cloned()
    }
}

// ---------------------------------------------------------------------------
// Virtual time
// ---------------------------------------------------------------------------

/// Step-wise virtual clock for driving `now`-parameterized state machines.
#[derive(Debug, Clone, Copy)]
pub struct StepClock {
    now: Instant,
}

impl StepClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Instant::now(),
        }
    }

    /// The current virtual instant.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Advance and return the new instant.
    pub fn advance(&mut self, by: Duration) -> Instant {
        self.now += by;
        self.now
    }

    /// Advance by milliseconds and return the new instant.
    pub fn advance_ms(&mut self, ms: u64) -> Instant {
        self.advance(Duration::from_millis(ms))
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new()
    }
}
