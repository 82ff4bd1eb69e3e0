#![forbid(unsafe_code)]

//! Wire protocol spoken with a sandboxed item player.
//!
//! The player runs in an isolated rendering context with no shared memory;
//! the only channel is structured one-way message passing. Messages are JSON
//! objects tagged on `type`, dispatched by a single match on the tag.
//!
//! # Message flow
//!
//! ```text
//!   host                              player
//!    |  (mount context)                 |
//!    |<----- ReadyNotification -------- |   player announces load completion
//!    |------ DataTransfer ------------->|   definition + restore point + token
//!    |<----- StartedNotification ------ |   navigable page set
//!    |<----- ChangedDataTransfer ------ |   incremental state updates (repeats)
//!    |------ PageNavigationRequest ---->|   host-driven page change
//! ```
//!
//! Readiness and data transfer are split into two round-trips because the
//! player may not exist yet when the host resolves a navigation target; the
//! player must announce itself before it can safely receive content.
//!
//! # Session tokens
//!
//! Every outbound message carries the [`SessionToken`] minted for the current
//! mount. Inbound post-handshake messages must echo it; the bridge discards
//! messages whose token does not match the live mount, so replies from a
//! just-torn-down context cannot reach the new mount's channels.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Inbound messages (player -> host)
// ---------------------------------------------------------------------------

/// A message received from the item player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerMessage {
    /// The player finished loading and can receive content.
    ///
    /// Pre-handshake: carries no token.
    #[serde(rename = "ReadyNotification")]
    Ready,

    /// The player consumed the handshake payload and reports its page set.
    #[serde(rename = "StartedNotification")]
    Started {
        /// Token echo; must match the live mount to be accepted.
        #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Navigable page identifiers. Fewer than two entries means the
        /// unit has no meaningful page navigation.
        #[serde(rename = "validPages", default)]
        valid_pages: Vec<String>,
        /// Initially shown page; defaults to the first valid page.
        #[serde(rename = "currentPage", default, skip_serializing_if = "Option::is_none")]
        current_page: Option<String>,
    },

    /// Incremental state update; any subset of fields may be present.
    #[serde(rename = "ChangedDataTransfer")]
    ChangedData {
        /// Token echo; must match the live mount to be accepted.
        #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Full replacement of the navigable page set, when present.
        #[serde(rename = "validPages", default, skip_serializing_if = "Option::is_none")]
        valid_pages: Option<Vec<String>>,
        /// New current page, when present.
        #[serde(rename = "currentPage", default, skip_serializing_if = "Option::is_none")]
        current_page: Option<String>,
        /// New restore point, when present.
        #[serde(rename = "restorePoint", default, skip_serializing_if = "Option::is_none")]
        restore_point: Option<String>,
        /// New response payload, when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
}

/// Message type tags the host recognizes on the inbound channel.
const INBOUND_TYPES: [&str; 3] = [
    "ReadyNotification",
    "StartedNotification",
    "ChangedDataTransfer",
];

// ---------------------------------------------------------------------------
// Outbound messages (host -> player)
// ---------------------------------------------------------------------------

/// A message posted to the item player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    /// Handshake payload: the unit definition and restore point for this
    /// mount, plus the freshly minted session token.
    #[serde(rename = "DataTransfer")]
    DataTransfer {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "unitDefinition")]
        unit_definition: String,
        #[serde(rename = "restorePoint")]
        restore_point: String,
    },

    /// Ask the player to show a different page.
    #[serde(rename = "PageNavigationRequest")]
    PageNavigationRequest {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "newPage")]
        new_page: String,
    },
}

impl HostMessage {
    /// Serialize to the JSON wire form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Why an inbound message was rejected.
///
/// All variants are handled identically by the bridge (logged, ignored, no
/// state change); the distinction exists for the log line.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not valid JSON at all.
    #[error("message is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    /// Valid JSON without a string `type` field.
    #[error("message has no type tag")]
    MissingType,
    /// A `type` tag the host does not know.
    #[error("unrecognized message type `{0}`")]
    UnrecognizedType(String),
    /// A known type whose payload does not match the schema.
    #[error("invalid `{tag}` payload: {source}")]
    InvalidPayload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a raw inbound message.
///
/// Unknown and malformed messages are errors for the caller to log and
/// ignore; they never panic and never partially apply.
pub fn decode_player_message(raw: &str) -> Result<PlayerMessage, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(ProtocolError::Malformed)?;
    let tag = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !INBOUND_TYPES.contains(&tag) {
        return Err(ProtocolError::UnrecognizedType(tag.to_string()));
    }
    let tag = tag.to_string();
    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload { tag, source })
}

// ---------------------------------------------------------------------------
// Session tokens
// ---------------------------------------------------------------------------

static TOKEN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Per-mount session token.
///
/// Minted once per handshake; a new mount invalidates the previous mount's
/// token before a new one is spawned. Uniqueness within a host process is
/// guaranteed by the monotonic sequence component; the timestamp component
/// keeps tokens distinct across host restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a fresh token.
    #[must_use]
    pub fn fresh() -> Self {
        let seq = TOKEN_SEQ.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self(format!("{nanos:x}-{seq:x}"))
    }

    /// The wire form carried in `sessionId` fields.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if the given wire value matches this token.
    #[must_use]
    pub fn matches(&self, wire: &str) -> bool {
        self.0 == wire
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
