#![forbid(unsafe_code)]

//! Well-known activity-log entry vocabulary.
//!
//! Units accumulate a free-form activity log; most entries originate in the
//! player, but the host contributes these well-known keys at lifecycle
//! boundaries. Keys are persisted in their canonical upper-case wire form.

use std::fmt;

/// Host-originated activity-log entry keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogEntryKey {
    UnitEnter,
    UnitLeave,
    BookletLoadStart,
    BookletLoadComplete,
    PageNavigationStart,
    PageNavigationComplete,
    PresentationComplete,
    ResponsesComplete,
}

impl LogEntryKey {
    /// Canonical wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnitEnter => "UNITENTER",
            Self::UnitLeave => "UNITLEAVE",
            Self::BookletLoadStart => "BOOKLETLOADSTART",
            Self::BookletLoadComplete => "BOOKLETLOADCOMPLETE",
            Self::PageNavigationStart => "PAGENAVIGATIONSTART",
            Self::PageNavigationComplete => "PAGENAVIGATIONCOMPLETE",
            Self::PresentationComplete => "PRESENTATIONCOMPLETE",
            Self::ResponsesComplete => "RESPONSESCOMPLETE",
        }
    }
}

impl fmt::Display for LogEntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
