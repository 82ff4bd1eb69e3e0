#![forbid(unsafe_code)]
#![doc = "Backend traits for UnitDock: persistence gateway and player mount boundary."]
#![doc = ""]
#![doc = "This crate defines the two seams between the session runtime and the outside"]
#![doc = "world: the [`UnitGateway`] persistence contract (concrete transport lives in"]
#![doc = "an adapter crate) and the [`PlayerHost`]/[`PlayerLink`] pair through which a"]
#![doc = "sandboxed rendering context is mounted and reached."]

use std::collections::HashMap;

use thiserror::Error;
use udock_core::protocol::HostMessage;

// ---------------------------------------------------------------------------
// Authorisation and errors
// ---------------------------------------------------------------------------

/// Opaque session authorisation handed to every persistence call.
///
/// Acquisition (login, code entry) is a collaborator concern; the runtime
/// only carries the value through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorisation {
    token: String,
}

impl Authorisation {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw bearer value.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// A failure reported by the backend store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server error {code}: {label}")]
pub struct ServerError {
    /// Numeric error code (HTTP status in the reference transport).
    pub code: u16,
    /// Human-readable label for operator logs.
    pub label: String,
}

impl ServerError {
    #[must_use]
    pub fn new(code: u16, label: impl Into<String>) -> Self {
        Self {
            code,
            label: label.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Persistence gateway
// ---------------------------------------------------------------------------

/// Persistence contract for learner state.
///
/// Each setter returns `Ok(true)` when the store accepted the payload,
/// `Ok(false)` when it declined without a transport failure, and
/// `Err(ServerError)` on a server-side failure. Callers treat the latter
/// two identically (log and carry on); autosave is best-effort, not a
/// durable queue.
pub trait UnitGateway {
    /// Persist a unit's restore point.
    fn set_unit_restore_point(
        &mut self,
        auth: &Authorisation,
        unit_id: &str,
        restore_point: &str,
    ) -> Result<bool, ServerError>;

    /// Persist a unit's response payload.
    fn set_unit_responses(
        &mut self,
        auth: &Authorisation,
        unit_id: &str,
        responses: &str,
    ) -> Result<bool, ServerError>;

    /// Persist a batch of serialized activity-log entries, in arrival order.
    fn set_unit_log(
        &mut self,
        auth: &Authorisation,
        unit_id: &str,
        entries: &[String],
    ) -> Result<bool, ServerError>;

    /// Host-local restore-point cache lookup.
    ///
    /// Not necessarily backed by the network; `None` on the very first load
    /// of a unit, in which case the caller falls back to the unit's
    /// persisted restore point.
    fn get_unit_restore_point(&self, unit_id: &str) -> Option<String>;
}

// ---------------------------------------------------------------------------
// Player mount boundary
// ---------------------------------------------------------------------------

/// Reply channel into one mounted rendering context.
///
/// The link is minted at mount time and is valid only for that mount; the
/// bridge drops it on teardown. Posting is fire-and-forget: the host never
/// blocks on the player, and a send into a dead context is the player's
/// problem, not the host's.
pub trait PlayerLink {
    /// Post a message into the rendering context.
    fn post(&mut self, message: &HostMessage);
}

/// Mount failure: no player available for the requested renderer type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no item player available for renderer type `{player_type}`")]
pub struct MountError {
    pub player_type: String,
}

/// Factory for rendering contexts.
///
/// One context at a time: `unmount` discards the previous context (in the
/// reference embedding, removing the container's DOM children) before
/// `mount` creates the next.
pub trait PlayerHost {
    /// Discard the current rendering context, if any.
    fn unmount(&mut self);

    /// Create a rendering context for the given renderer type and return
    /// the reply channel into it.
    fn mount(&mut self, player_type: &str) -> Result<Box<dyn PlayerLink>, MountError>;
}

// ---------------------------------------------------------------------------
// In-memory gateway
// ---------------------------------------------------------------------------

/// In-memory [`UnitGateway`] for development and tests.
///
/// Setters store into process-local maps; the restore-point setter also
/// feeds the host-local cache, so a re-mount within the same session
/// restores from cache rather than the unit's stale persisted value.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    restore_points: HashMap<String, String>,
    responses: HashMap<String, String>,
    logs: HashMap<String, Vec<String>>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the restore-point cache (test setup).
    pub fn seed_restore_point(&mut self, unit_id: impl Into<String>, value: impl Into<String>) {
        self.restore_points.insert(unit_id.into(), value.into());
    }

    /// All log entries persisted for a unit, flattened across batches.
    #[must_use]
    pub fn logged_entries(&self, unit_id: &str) -> &[String] {
        self.logs.get(unit_id).map_or(&[], Vec::as_slice)
    }

    /// Last persisted response payload for a unit.
    #[must_use]
    pub fn responses_for(&self, unit_id: &str) -> Option<&str> {
        self.responses.get(unit_id).map(String::as_str)
    }
}

impl UnitGateway for MemoryGateway {
    fn set_unit_restore_point(
        &mut self,
        _auth: &Authorisation,
        unit_id: &str,
        restore_point: &str,
    ) -> Result<bool, ServerError> {
        self.restore_points
            .insert(unit_id.to_string(), restore_point.to_string());
        Ok(true)
    }

    fn set_unit_responses(
        &mut self,
        _auth: &Authorisation,
        unit_id: &str,
        responses: &str,
    ) -> Result<bool, ServerError> {
        self.responses
            .insert(unit_id.to_string(), responses.to_string());
        Ok(true)
    }

    fn set_unit_log(
        &mut self,
        _auth: &Authorisation,
        unit_id: &str,
        entries: &[String],
    ) -> Result<bool, ServerError> {
        self.logs
            .entry(unit_id.to_string())
            .or_default()
            .extend_from_slice(entries);
        Ok(true)
    }

    fn get_unit_restore_point(&self, unit_id: &str) -> Option<String> {
        self.restore_points.get(unit_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> Authorisation {
        Authorisation::new("t0")
    }

    #[test]
    fn memory_gateway_accepts_and_caches_restore_points() {
        let mut gw = MemoryGateway::new();
        assert_eq!(gw.get_unit_restore_point("u1"), None);
        assert_eq!(gw.set_unit_restore_point(&auth(), "u1", "rp1"), Ok(true));
        assert_eq!(gw.get_unit_restore_point("u1"), Some("rp1".into()));
    }

    #[test]
    fn memory_gateway_overwrites_restore_point() {
        let mut gw = MemoryGateway::new();
        gw.set_unit_restore_point(&auth(), "u1", "rp1").unwrap();
        gw.set_unit_restore_point(&auth(), "u1", "rp2").unwrap();
        assert_eq!(gw.get_unit_restore_point("u1"), Some("rp2".into()));
    }

    #[test]
    fn memory_gateway_appends_log_batches() {
        let mut gw = MemoryGateway::new();
        gw.set_unit_log(&auth(), "u1", &["\"a\"".into()]).unwrap();
        gw.set_unit_log(&auth(), "u1", &["\"b\"".into(), "\"c\"".into()])
            .unwrap();
        assert_eq!(gw.logged_entries("u1"), ["\"a\"", "\"b\"", "\"c\""]);
    }

    #[test]
    fn memory_gateway_keeps_units_separate() {
        let mut gw = MemoryGateway::new();
        gw.set_unit_responses(&auth(), "u1", "r1").unwrap();
        gw.set_unit_responses(&auth(), "u2", "r2").unwrap();
        assert_eq!(gw.responses_for("u1"), Some("r1"));
        assert_eq!(gw.responses_for("u2"), Some("r2"));
    }

    #[test]
    fn server_error_display() {
        let e = ServerError::new(503, "unavailable");
        assert_eq!(e.to_string(), "server error 503: unavailable");
    }
}
