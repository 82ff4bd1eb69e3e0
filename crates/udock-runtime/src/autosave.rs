#![forbid(unsafe_code)]

//! Coalescing autosave pipelines.
//!
//! The player emits state updates far faster than they are worth persisting.
//! Three independent pipelines turn that stream into bounded gateway calls:
//!
//! - **Restore point**: quiet-window coalescing ([`DebounceCell`]) — each new
//!   value resets the window; only the last value of a quiet period is
//!   persisted.
//! - **Response**: same policy, independent window. A burst on one channel
//!   never delays or merges with the other.
//! - **Activity log**: fixed accumulation window ([`BatchWindow`]) — every
//!   entry arriving within the window ships in one batch, in arrival order.
//!
//! All windows are explicit deadlines polled with a caller-supplied `now`;
//! there are no ambient timers. Teardown cancels every armed window, which
//! is what makes "no gateway call after unmount" hold on every exit path.
//!
//! Persistence is best-effort: a declined or failed call is logged and not
//! retried; the next update for the unit starts a fresh attempt.

use std::time::{Duration, Instant};

use udock_backend::{Authorisation, UnitGateway};
use udock_core::SessionPolicy;

// ---------------------------------------------------------------------------
// Coalescing primitives
// ---------------------------------------------------------------------------

/// Last-write-wins value cell with a quiet-period deadline.
///
/// `push` stores the value and re-arms the deadline; `take_due` yields the
/// value only once the deadline has passed with no further pushes.
#[derive(Debug)]
pub struct DebounceCell {
    window: Duration,
    value: Option<String>,
    deadline: Option<Instant>,
}

impl DebounceCell {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            value: None,
            deadline: None,
        }
    }

    /// Store a new value and restart the quiet window.
    pub fn push(&mut self, value: String, now: Instant) {
        self.value = Some(value);
        self.deadline = Some(now + self.window);
    }

    /// Take the coalesced value if its quiet window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.value.take()
            }
            _ => None,
        }
    }

    /// Drop any pending value and disarm the deadline.
    pub fn cancel(&mut self) {
        self.value = None;
        self.deadline = None;
    }

    /// The armed deadline, if a value is pending.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Fixed-window accumulator for activity-log entries.
///
/// The window arms on the first retained entry after a flush and does not
/// extend on further pushes. Empty entries are filtered out before they
/// reach the buffer; a window never fires empty.
#[derive(Debug)]
pub struct BatchWindow {
    window: Duration,
    entries: Vec<String>,
    deadline: Option<Instant>,
}

impl BatchWindow {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Vec::new(),
            deadline: None,
        }
    }

    /// Append an entry, arming the window if this is the first of a batch.
    ///
    /// Empty entries are discarded here; they neither arm the window nor
    /// occupy the batch.
    pub fn push(&mut self, entry: String, now: Instant) {
        if entry.is_empty() {
            return;
        }
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
        self.entries.push(entry);
    }

    /// Take the accumulated batch if the window has elapsed.
    ///
    /// Each retained entry is serialized independently (JSON string
    /// encoding) before it is handed back, matching the wire contract of
    /// the log persistence call.
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<String>> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                let entries = std::mem::take(&mut self.entries);
                let serialized: Vec<String> = entries
                    .iter()
                    .filter_map(|e| serde_json::to_string(e).ok())
                    .collect();
                if serialized.is_empty() {
                    None
                } else {
                    Some(serialized)
                }
            }
            _ => None,
        }
    }

    /// Drop accumulated entries and disarm the window.
    pub fn cancel(&mut self) {
        self.entries.clear();
        self.deadline = None;
    }

    /// The armed deadline, if a batch is accumulating.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The three autosave pipelines for the currently bound unit.
///
/// Binding follows the mounted unit: navigation cancels all windows before
/// rebinding, so a departing unit's unflushed remainder is dropped rather
/// than misfiled under its successor.
#[derive(Debug)]
pub struct AutosavePipeline {
    restore_point: DebounceCell,
    response: DebounceCell,
    log: BatchWindow,
    unit_id: Option<String>,
}

impl AutosavePipeline {
    #[must_use]
    pub fn new(policy: &SessionPolicy) -> Self {
        Self {
            restore_point: DebounceCell::new(policy.restore_point_debounce()),
            response: DebounceCell::new(policy.response_debounce()),
            log: BatchWindow::new(policy.log_batch_window()),
            unit_id: None,
        }
    }

    /// Bind to a newly mounted unit, cancelling anything left from the
    /// previous binding.
    pub fn bind_unit(&mut self, unit_id: impl Into<String>) {
        self.cancel_all();
        self.unit_id = Some(unit_id.into());
    }

    /// Drop the unit binding and every pending window.
    pub fn unbind(&mut self) {
        self.cancel_all();
        self.unit_id = None;
    }

    /// The unit currently receiving autosave traffic.
    #[must_use]
    pub fn bound_unit(&self) -> Option<&str> {
        self.unit_id.as_deref()
    }

    pub fn push_restore_point(&mut self, value: String, now: Instant) {
        if self.unit_id.is_none() {
            tracing::debug!(target: "udock.autosave", "restore point with no bound unit, dropped");
            return;
        }
        self.restore_point.push(value, now);
    }

    pub fn push_response(&mut self, value: String, now: Instant) {
        if self.unit_id.is_none() {
            tracing::debug!(target: "udock.autosave", "response with no bound unit, dropped");
            return;
        }
        self.response.push(value, now);
    }

    pub fn push_log_entry(&mut self, entry: String, now: Instant) {
        if self.unit_id.is_none() {
            tracing::debug!(target: "udock.autosave", "log entry with no bound unit, dropped");
            return;
        }
        self.log.push(entry, now);
    }

    /// Earliest armed deadline across the three windows.
    ///
    /// The driver derives its poll timeout from this, so flushes happen
    /// promptly without busy-waiting.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.restore_point.deadline(),
            self.response.deadline(),
            self.log.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Flush every window whose deadline has passed.
    pub fn flush_due(&mut self, now: Instant, gateway: &mut dyn UnitGateway, auth: &Authorisation) {
        let Some(unit_id) = self.unit_id.clone() else {
            return;
        };

        if let Some(value) = self.restore_point.take_due(now) {
            match gateway.set_unit_restore_point(auth, &unit_id, &value) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(target: "udock.autosave", unit = %unit_id, "restore point declined by store");
                }
                Err(e) => {
                    tracing::warn!(target: "udock.autosave", unit = %unit_id, error = %e, "restore point persistence failed");
                }
            }
        }

        if let Some(value) = self.response.take_due(now) {
            match gateway.set_unit_responses(auth, &unit_id, &value) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(target: "udock.autosave", unit = %unit_id, "responses declined by store");
                }
                Err(e) => {
                    tracing::warn!(target: "udock.autosave", unit = %unit_id, error = %e, "response persistence failed");
                }
            }
        }

        if let Some(entries) = self.log.take_due(now) {
            match gateway.set_unit_log(auth, &unit_id, &entries) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(target: "udock.autosave", unit = %unit_id, "log batch declined by store");
                }
                Err(e) => {
                    tracing::warn!(target: "udock.autosave", unit = %unit_id, error = %e, "log persistence failed");
                }
            }
        }
    }

    /// Cancel all three windows without flushing.
    pub fn cancel_all(&mut self) {
        self.restore_point.cancel();
        self.response.cancel();
        self.log.cancel();
    }
}
