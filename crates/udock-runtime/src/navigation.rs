#![forbid(unsafe_code)]

//! Navigation state: which unit is showing, and where the player is in it.
//!
//! [`NavigationState`] is the single source of truth for the current unit.
//! It owns the [`Booklet`] and mirrors the player-reported page state so
//! outer chrome can render unit and page navigation without reaching into
//! the bridge.

use udock_core::unit::{Booklet, BookletStatus, Unit};

use crate::bridge::PageUpdate;

/// Owns the booklet, the current selection, and the mirrored page state.
#[derive(Debug)]
pub struct NavigationState {
    booklet: Booklet,
    valid_pages: Vec<String>,
    current_page: Option<String>,
    page_title: Option<String>,
}

impl NavigationState {
    #[must_use]
    pub fn new(booklet: Booklet) -> Self {
        Self {
            booklet,
            valid_pages: Vec::new(),
            current_page: None,
            page_title: None,
        }
    }

    /// The owned booklet.
    #[must_use]
    pub fn booklet(&self) -> &Booklet {
        &self.booklet
    }

    /// Mutable booklet access (autosave mirroring writes through here).
    pub fn booklet_mut(&mut self) -> &mut Booklet {
        &mut self.booklet
    }

    /// Change the current unit; out-of-range positions clear the selection.
    ///
    /// Page state belongs to the departing rendering context and is cleared
    /// either way. Returns the resulting selection.
    pub fn go_to_unit_by_position(&mut self, pos: i32) -> Option<usize> {
        let selected = self.booklet.go_to_unit_by_position(pos);
        self.clear_pages();
        self.page_title = selected.and_then(|p| {
            self.booklet
                .unit_at(p)
                .map(|u| format!("{}. {}", p + 1, u.label))
        });
        selected
    }

    /// The currently selected position, if any.
    #[must_use]
    pub fn current_position(&self) -> Option<usize> {
        self.booklet.current_position()
    }

    /// The currently selected unit, if any.
    #[must_use]
    pub fn current_unit(&self) -> Option<&Unit> {
        self.booklet.current_unit()
    }

    /// Display status derived from the booklet and selection.
    #[must_use]
    pub fn status(&self) -> BookletStatus {
        self.booklet.status()
    }

    /// Title for the active unit, e.g. `"2. Fractions"`; `None` when no
    /// unit is selected.
    #[must_use]
    pub fn page_title(&self) -> Option<&str> {
        self.page_title.as_deref()
    }

    /// Navigable pages reported by the mounted player.
    #[must_use]
    pub fn valid_pages(&self) -> &[String] {
        &self.valid_pages
    }

    /// The player's current page, if it reported one.
    #[must_use]
    pub fn current_page(&self) -> Option<&str> {
        self.current_page.as_deref()
    }

    /// Apply a page-state change from the bridge.
    pub fn apply_pages(&mut self, update: PageUpdate) {
        if let Some(pages) = update.valid_pages {
            self.valid_pages = pages;
            self.current_page = update.current_page;
        } else if let Some(current) = update.current_page {
            self.current_page = Some(current);
        }
    }

    /// Drop page state (context torn down or navigation in flight).
    pub fn clear_pages(&mut self) {
        self.valid_pages.clear();
        self.current_page = None;
    }

    /// Clear everything at session end: selection, title, pages.
    pub fn reset(&mut self) {
        self.booklet.go_to_unit_by_position(-1);
        self.page_title = None;
        self.clear_pages();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav_of(n: usize) -> NavigationState {
        let units = (0..n)
            .map(|i| Unit::new(format!("u{i}"), format!("Unit {i}"), "html", "<def/>"))
            .collect();
        NavigationState::new(Booklet::new(units))
    }

    #[test]
    fn selecting_sets_title_with_one_based_position() {
        let mut nav = nav_of(3);
        nav.go_to_unit_by_position(1);
        assert_eq!(nav.page_title(), Some("2. Unit 1"));
    }

    #[test]
    fn clearing_selection_clears_title() {
        let mut nav = nav_of(3);
        nav.go_to_unit_by_position(1);
        nav.go_to_unit_by_position(-1);
        assert_eq!(nav.page_title(), None);
    }

    #[test]
    fn navigation_clears_page_state() {
        let mut nav = nav_of(3);
        nav.go_to_unit_by_position(0);
        nav.apply_pages(PageUpdate {
            valid_pages: Some(vec!["p1".into(), "p2".into()]),
            current_page: Some("p2".into()),
        });
        nav.go_to_unit_by_position(1);
        assert!(nav.valid_pages().is_empty());
        assert_eq!(nav.current_page(), None);
    }

    #[test]
    fn page_set_replacement_overwrites_current() {
        let mut nav = nav_of(1);
        nav.apply_pages(PageUpdate {
            valid_pages: Some(vec!["p1".into(), "p2".into()]),
            current_page: Some("p1".into()),
        });
        nav.apply_pages(PageUpdate {
            valid_pages: Some(vec!["q1".into(), "q2".into()]),
            current_page: Some("q2".into()),
        });
        assert_eq!(nav.valid_pages(), ["q1", "q2"]);
        assert_eq!(nav.current_page(), Some("q2"));
    }

    #[test]
    fn current_page_only_update_keeps_page_set() {
        let mut nav = nav_of(1);
        nav.apply_pages(PageUpdate {
            valid_pages: Some(vec!["p1".into(), "p2".into()]),
            current_page: Some("p1".into()),
        });
        nav.apply_pages(PageUpdate {
            valid_pages: None,
            current_page: Some("p2".into()),
        });
        assert_eq!(nav.valid_pages(), ["p1", "p2"]);
        assert_eq!(nav.current_page(), Some("p2"));
    }

    #[test]
    fn reset_clears_selection_and_pages() {
        let mut nav = nav_of(2);
        nav.go_to_unit_by_position(0);
        nav.apply_pages(PageUpdate {
            valid_pages: Some(vec!["p1".into(), "p2".into()]),
            current_page: None,
        });
        nav.reset();
        assert_eq!(nav.current_position(), None);
        assert_eq!(nav.page_title(), None);
        assert!(nav.valid_pages().is_empty());
    }
}
