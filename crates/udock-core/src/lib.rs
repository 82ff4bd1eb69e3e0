#![forbid(unsafe_code)]

//! UnitDock Core
//!
//! Data model and wire vocabulary for the UnitDock test-delivery host.
//!
//! # Key Components
//!
//! - [`Unit`] / [`Booklet`] - the ordered test content a session works through
//! - [`PlayerMessage`] / [`HostMessage`] - the tagged message protocol spoken
//!   with a sandboxed item player
//! - [`SessionToken`] - per-mount token correlating outbound and inbound
//!   protocol messages
//! - [`LogEntryKey`] - well-known activity-log entry vocabulary
//! - [`SessionPolicy`] - policy-as-data tunables (debounce/batch windows)
//!
//! # Role in UnitDock
//! `udock-core` holds the passive vocabulary shared by every other crate.
//! It performs no I/O and owns no timers; the runtime crate drives all
//! state machines built from these types.

pub mod activity_log;
pub mod policy;
pub mod protocol;
pub mod unit;

pub use activity_log::LogEntryKey;
pub use policy::{PolicyError, SessionPolicy};
pub use protocol::{HostMessage, PlayerMessage, ProtocolError, SessionToken, decode_player_message};
pub use unit::{Booklet, BookletStatus, Unit};
