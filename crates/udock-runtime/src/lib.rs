#![forbid(unsafe_code)]

//! UnitDock Runtime
//!
//! The session runtime ties the core vocabulary and the backend seams into
//! a working test-delivery host.
//!
//! # Key Components
//!
//! - [`TestSession`] - owns one learner's run: navigation, bridge, autosave
//! - [`MessageBridge`] - lifecycle and protocol exchange with one rendering
//!   context at a time
//! - [`AutosavePipeline`] - the three coalescing persistence pipelines
//! - [`NavigationState`] - current unit, page state, display status
//!
//! # How it fits in the system
//! The runtime is the center of the architecture: renderer messages come in
//! through [`TestSession::on_player_message`], navigation requests through
//! [`TestSession::go_to_unit_by_position`], and persistence goes out through
//! the `udock-backend` gateway trait. Everything is single-threaded and
//! driven by explicit `Instant`s; [`TestSession::run`] provides the
//! cooperative loop for production embeddings.

pub mod autosave;
pub mod bridge;
pub mod navigation;
pub mod session;

pub use autosave::{AutosavePipeline, BatchWindow, DebounceCell};
pub use bridge::{BridgePhase, BridgeUpdate, MessageBridge, PageUpdate};
pub use navigation::NavigationState;
pub use session::{SessionEvent, TestSession};
