#![forbid(unsafe_code)]

//! Unit and booklet data model.
//!
//! A [`Booklet`] is the position-stable, ordered sequence of [`Unit`]s a
//! test session works through, plus the current selection. Insertion order
//! is presentation order. The booklet is created once per session load,
//! replaced wholesale on reload, and destroyed on session end.
//!
//! # Invariants
//!
//! 1. The current position, if set, always indexes an existing unit.
//! 2. Units are never reordered or removed after construction; only their
//!    restore-point payload changes (through the autosave flow).

/// One test unit: an opaque item definition plus the learner's in-progress
/// state for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Stable identifier used in persistence calls.
    pub id: String,
    /// Display label for navigation chrome.
    pub label: String,
    /// Locked units count toward length but are not offered for work.
    pub locked: bool,
    /// Tag selecting which item player renders this unit.
    pub player_type: String,
    /// Opaque unit definition payload handed to the player at handshake.
    pub definition: String,
    /// Last known restore point (opaque, player-defined serialization).
    ///
    /// Empty means "none recorded". Mirrored from the player's update
    /// stream as soon as a new value arrives.
    pub restore_point: String,
    /// Unresolved response payload carried over from a previous session,
    /// if any.
    pub response: String,
}

impl Unit {
    /// Create a unit with no recorded state.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        player_type: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            locked: false,
            player_type: player_type.into(),
            definition: definition.into(),
            restore_point: String::new(),
            response: String::new(),
        }
    }

    /// Mark the unit as locked.
    #[must_use]
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Set the persisted restore point carried in from the backend.
    #[must_use]
    pub fn with_restore_point(mut self, restore_point: impl Into<String>) -> Self {
        self.restore_point = restore_point.into();
        self
    }

    /// Set the unresolved response payload carried in from the backend.
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }
}

/// Display state derived from the booklet contents and current selection.
///
/// The three unselected variants are deliberately distinct: an empty booklet
/// and an all-locked booklet read very differently to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookletStatus {
    /// A unit is selected and showing.
    UnitSelected,
    /// The booklet holds no units at all; there is nothing to show.
    NoUnits,
    /// Every unit is locked; the test cannot be continued.
    AllLocked,
    /// Units are selectable but none is active yet.
    ChooseUnit,
}

/// Ordered sequence of units plus the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booklet {
    units: Vec<Unit>,
    current: Option<usize>,
}

impl Booklet {
    /// Create a booklet from its units, with nothing selected.
    #[must_use]
    pub fn new(units: Vec<Unit>) -> Self {
        Self {
            units,
            current: None,
        }
    }

    /// Number of units, locked or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// `true` if the booklet holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The unit at `pos`, if in range.
    #[must_use]
    pub fn unit_at(&self, pos: usize) -> Option<&Unit> {
        self.units.get(pos)
    }

    /// Mutable access to the unit at `pos`, if in range.
    pub fn unit_at_mut(&mut self, pos: usize) -> Option<&mut Unit> {
        self.units.get_mut(pos)
    }

    /// The currently selected position, if any.
    #[must_use]
    pub fn current_position(&self) -> Option<usize> {
        self.current
    }

    /// The currently selected unit, if any.
    #[must_use]
    pub fn current_unit(&self) -> Option<&Unit> {
        self.current.and_then(|pos| self.units.get(pos))
    }

    /// Mutable access to the currently selected unit, if any.
    pub fn current_unit_mut(&mut self) -> Option<&mut Unit> {
        match self.current {
            Some(pos) => self.units.get_mut(pos),
            None => None,
        }
    }

    /// Select the unit at `pos`, or clear the selection when `pos` is out
    /// of range (including every negative value).
    ///
    /// Returns the resulting selection. Out-of-range requests are a normal
    /// navigation outcome, not an error.
    pub fn go_to_unit_by_position(&mut self, pos: i32) -> Option<usize> {
        self.current = usize::try_from(pos)
            .ok()
            .filter(|p| *p < self.units.len());
        self.current
    }

    /// Count of units available for work.
    #[must_use]
    pub fn unlocked_unit_count(&self) -> usize {
        self.units.iter().filter(|u| !u.locked).count()
    }

    /// Whether side navigation should be offered at all.
    ///
    /// With one or zero workable units there is nothing to navigate between.
    #[must_use]
    pub fn show_navigation(&self) -> bool {
        self.unlocked_unit_count() > 1
    }

    /// Derive the display status for the current booklet state.
    #[must_use]
    pub fn status(&self) -> BookletStatus {
        if self.current.is_some() {
            BookletStatus::UnitSelected
        } else if self.units.is_empty() {
            BookletStatus::NoUnits
        } else if self.units.iter().all(|u| u.locked) {
            BookletStatus::AllLocked
        } else {
            BookletStatus::ChooseUnit
        }
    }
}
