//! Ephemeral page selection for building a new part
//!
//! A [`Selection`] tracks the set of pages picked during one editing session,
//! plus the anchor page used by shift-click range gestures. It is plain local
//! state: single writer, no suspension points, discarded on commit or cancel.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// The mutable page selection of one editing session.
#[derive(Debug, Clone)]
pub struct Selection {
    page_count: u32,
    selected: BTreeSet<u32>,
    anchor: Option<u32>,
}

impl Selection {
    /// Open an empty selection over a document with `page_count` pages.
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            selected: BTreeSet::new(),
            anchor: None,
        }
    }

    /// Flip a single page and make it the anchor for later range gestures.
    pub fn toggle(&mut self, page: u32) -> Result<()> {
        self.check(page)?;
        if !self.selected.remove(&page) {
            self.selected.insert(page);
        }
        self.anchor = Some(page);
        Ok(())
    }

    /// Add every page (if `force_select`) or remove every page (otherwise).
    ///
    /// The anchor is left untouched so repeated range gestures keep expanding
    /// from the same origin.
    pub fn bulk_toggle(
        &mut self,
        pages: impl IntoIterator<Item = u32>,
        force_select: bool,
    ) -> Result<()> {
        let pages: Vec<u32> = pages.into_iter().collect();
        for page in &pages {
            self.check(*page)?;
        }
        for page in pages {
            if force_select {
                self.selected.insert(page);
            } else {
                self.selected.remove(&page);
            }
        }
        Ok(())
    }

    /// Shift-click: toggle the whole range between the anchor and `target`.
    ///
    /// With no anchor this degrades to a plain [`Selection::toggle`]. The range
    /// is selected iff strictly fewer than half of its pages are currently
    /// selected; at exactly half the whole range is deselected. That boundary
    /// is deliberate and easy to get backwards.
    pub fn range_gesture(&mut self, target: u32) -> Result<()> {
        self.check(target)?;

        let anchor = match self.anchor {
            Some(anchor) => anchor,
            None => return self.toggle(target),
        };

        let lo = anchor.min(target);
        let hi = anchor.max(target);
        let range_len = hi - lo + 1;
        let selected_in_range = self.selected.range(lo..=hi).count() as u32;

        // select iff selected_in_range < range_len / 2, computed without
        // integer-division truncation
        let force_select = 2 * selected_in_range < range_len;
        self.bulk_toggle(lo..=hi, force_select)
    }

    /// Empty the selection and forget the anchor.
    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    pub fn is_selected(&self, page: u32) -> bool {
        self.selected.contains(&page)
    }

    /// Selected pages in ascending order.
    pub fn pages(&self) -> Vec<u32> {
        self.selected.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn anchor(&self) -> Option<u32> {
        self.anchor
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Min/max of the selection, the range a new part would be created with.
    pub fn page_range(&self) -> Option<(u32, u32)> {
        match (self.selected.first(), self.selected.last()) {
            (Some(first), Some(last)) => Some((*first, *last)),
            _ => None,
        }
    }

    fn check(&self, page: u32) -> Result<()> {
        if page < 1 || page > self.page_count {
            return Err(Error::OutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(())
    }
}
