//! Headless chip row: the ordered list of subviews (one chip per facet plus
//! one trailing free-text input) kept in sync with the query.
//!
//! Structural query changes trigger a full rebuild — cheap, and it guarantees
//! rendered order always equals query order. Value-level changes only mark
//! the affected chip dirty so the user's focus and caret survive rapid
//! toggling. Focus restoration after a rebuild waits until every newly
//! created subview has reported mounted.

use std::collections::HashMap;

use tracing::trace;

use crate::query::{FacetId, SearchQuery};
use crate::types::{Category, Interval};

// ---------------------------------------------------------------------------
// Subviews
// ---------------------------------------------------------------------------

/// Rendered state of one facet chip.
#[derive(Debug, Clone, PartialEq)]
pub struct ChipView {
    pub facet_id: FacetId,
    /// Display text: value labels joined by the facet separator, group-by
    /// values annotated with their interval label.
    pub text: String,
    /// Set when the underlying facet changed without a rebuild; rendered as
    /// a trailing `*` marker.
    pub dirty: bool,
}

/// The trailing free-text input subview.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputView {
    pub text: String,
    /// Caret position in characters, `0..=text.chars().count()`.
    pub cursor: usize,
}

impl InputView {
    pub fn at_start(&self) -> bool {
        self.cursor == 0
    }

    pub fn at_end(&self) -> bool {
        self.cursor >= self.text.chars().count()
    }
}

// ---------------------------------------------------------------------------
// Chip row
// ---------------------------------------------------------------------------

/// Ordered subview sequence: `chips[0..n]` then the input at index `n`.
pub struct ChipRow {
    chips: Vec<ChipView>,
    input: InputView,
    focused: Option<usize>,
    /// Suppress autofocus after rebuilds; popping a virtual keyboard on a
    /// touch device right after picking a filter is unwanted.
    touch_mode: bool,
    pending_mounts: usize,
}

impl ChipRow {
    pub fn new(touch_mode: bool) -> Self {
        ChipRow {
            chips: Vec::new(),
            input: InputView::default(),
            focused: None,
            touch_mode,
            pending_mounts: 0,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn chips(&self) -> &[ChipView] {
        &self.chips
    }

    pub fn input(&self) -> &InputView {
        &self.input
    }

    /// Total subviews: all chips plus the trailing input.
    pub fn subview_count(&self) -> usize {
        self.chips.len() + 1
    }

    pub fn input_index(&self) -> usize {
        self.chips.len()
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    pub fn focused_chip(&self) -> Option<&ChipView> {
        self.focused.and_then(|i| self.chips.get(i))
    }

    pub fn is_input_focused(&self) -> bool {
        self.focused == Some(self.input_index())
    }

    /// A rebuild is in flight until every subview has reported mounted.
    pub fn is_rebuilding(&self) -> bool {
        self.pending_mounts > 0
    }

    /// The chip immediately preceding the input, if any. Backspace in an
    /// empty input destroys this facet.
    pub fn chip_before_input(&self) -> Option<FacetId> {
        self.chips.last().map(|c| c.facet_id)
    }

    // -- input state --------------------------------------------------------

    pub fn set_input_text(&mut self, text: impl Into<String>) {
        self.input.text = text.into();
        self.input.cursor = self.input.text.chars().count();
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.input.cursor = cursor.min(self.input.text.chars().count());
    }

    // -- rebuild protocol ---------------------------------------------------

    /// Full rebuild from the current query: drop every subview, recreate
    /// chips in query order, append a fresh input. Focus is restored only
    /// once all subviews have mounted (see [`ChipRow::subview_mounted`]).
    ///
    /// Rebuilds are idempotent; a rebuild issued while a previous one still
    /// awaits mounts simply supersedes it.
    pub fn rebuild(&mut self, query: &SearchQuery, intervals: &HashMap<String, Interval>) {
        self.chips = query
            .facets()
            .iter()
            .map(|facet| {
                let mut parts = Vec::with_capacity(facet.values.len());
                for value in &facet.values {
                    let mut label = value.label.clone();
                    if facet.category == Category::GroupBy {
                        let interval = value
                            .value
                            .as_str()
                            .and_then(|token| intervals.get(token));
                        if let Some(interval) = interval {
                            label.push_str(&format!(" ({})", interval.label()));
                        }
                    }
                    parts.push(label);
                }
                ChipView {
                    facet_id: facet.id,
                    text: parts.join(facet.separator()),
                    dirty: false,
                }
            })
            .collect();
        self.input = InputView::default();
        self.focused = None;
        self.pending_mounts = self.subview_count();
        trace!(chips = self.chips.len(), "chip row rebuilt, awaiting mounts");
    }

    /// One subview finished mounting. When the last one lands, focus moves
    /// to the last subview (the input) unless running in touch mode.
    pub fn subview_mounted(&mut self) {
        if self.pending_mounts == 0 {
            return;
        }
        self.pending_mounts -= 1;
        if self.pending_mounts == 0 && !self.touch_mode {
            self.focused = Some(self.subview_count() - 1);
        }
    }

    /// Drive the whole mount barrier at once; used by headless hosts and
    /// tests that have no real mount lifecycle.
    pub fn complete_mounts(&mut self) {
        while self.pending_mounts > 0 {
            self.subview_mounted();
        }
    }

    /// Mark the chip of `facet_id` visually changed without rebuilding.
    pub fn mark_dirty(&mut self, facet_id: FacetId) {
        if let Some(chip) = self.chips.iter_mut().find(|c| c.facet_id == facet_id) {
            if !chip.dirty {
                chip.dirty = true;
                chip.text.push('*');
            }
        }
    }

    // -- focus traversal ----------------------------------------------------

    pub fn focus(&mut self, index: usize) {
        if index < self.subview_count() {
            self.focused = Some(index);
        }
    }

    pub fn focus_input(&mut self) {
        self.focused = Some(self.input_index());
    }

    /// Move focus to the following subview, wrapping past the end.
    pub fn focus_next(&mut self) {
        let current = self.focused.unwrap_or(self.input_index());
        self.focused = Some((current + 1) % self.subview_count());
    }

    /// Move focus to the preceding subview, wrapping past the start.
    pub fn focus_previous(&mut self) {
        let current = self.focused.unwrap_or(self.input_index());
        let count = self.subview_count();
        self.focused = Some((current + count - 1) % count);
    }

    /// Blur the row: the input clears its text, nothing keeps focus.
    pub fn blur(&mut self) {
        self.input = InputView::default();
        self.focused = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FacetDescriptor, FacetValue, SearchField, SearchQuery};
    use std::sync::Arc;

    struct TestField(&'static str);

    impl SearchField for TestField {
        fn key(&self) -> &str {
            self.0
        }
    }

    fn query_with(keys: &[&'static str]) -> SearchQuery {
        let mut q = SearchQuery::new();
        for key in keys {
            q.add(vec![FacetDescriptor::new(
                Category::Filters,
                Arc::new(TestField(key)),
                vec![FacetValue::new(*key, key.to_uppercase())],
            )]);
        }
        while q.pop_event().is_some() {}
        q
    }

    fn rebuilt(keys: &[&'static str]) -> ChipRow {
        let mut row = ChipRow::new(false);
        row.rebuild(&query_with(keys), &HashMap::new());
        row.complete_mounts();
        row
    }

    #[test]
    fn rebuild_projects_query_order() {
        let row = rebuilt(&["b", "a", "c"]);
        let texts: Vec<_> = row.chips().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["B", "A", "C"]);
        assert_eq!(row.subview_count(), 4, "three chips plus the input");
    }

    #[test]
    fn values_join_with_separator() {
        let mut q = SearchQuery::new();
        q.add(vec![FacetDescriptor::new(
            Category::Filters,
            Arc::new(TestField("status")),
            vec![FacetValue::new(1, "Open"), FacetValue::new(2, "Done")],
        )]);
        let mut row = ChipRow::new(false);
        row.rebuild(&q, &HashMap::new());
        assert_eq!(row.chips()[0].text, "Open or Done");
    }

    #[test]
    fn groupby_values_carry_interval_label() {
        let mut q = SearchQuery::new();
        q.add(vec![FacetDescriptor::new(
            Category::GroupBy,
            Arc::new(TestField("groupby")),
            vec![FacetValue::new("create_date", "Created")],
        )]);
        let mut intervals = HashMap::new();
        intervals.insert("create_date".to_string(), Interval::Week);
        let mut row = ChipRow::new(false);
        row.rebuild(&q, &intervals);
        assert_eq!(row.chips()[0].text, "Created (Week)");
    }

    #[test]
    fn focus_restored_only_after_all_mounts() {
        let mut row = ChipRow::new(false);
        row.rebuild(&query_with(&["a", "b"]), &HashMap::new());
        assert!(row.is_rebuilding());
        assert_eq!(row.focused(), None);

        row.subview_mounted();
        row.subview_mounted();
        assert_eq!(row.focused(), None, "focus must wait for the last mount");

        row.subview_mounted();
        assert!(!row.is_rebuilding());
        assert_eq!(row.focused(), Some(row.input_index()));
    }

    #[test]
    fn touch_mode_suppresses_autofocus() {
        let mut row = ChipRow::new(true);
        row.rebuild(&query_with(&["a"]), &HashMap::new());
        row.complete_mounts();
        assert_eq!(row.focused(), None);
    }

    #[test]
    fn focus_next_wraps_to_first() {
        let mut row = rebuilt(&["a", "b"]);
        row.focus(row.input_index());
        row.focus_next();
        assert_eq!(row.focused(), Some(0));
    }

    #[test]
    fn focus_previous_wraps_to_last() {
        let mut row = rebuilt(&["a", "b"]);
        row.focus(0);
        row.focus_previous();
        assert_eq!(row.focused(), Some(row.input_index()));
    }

    #[test]
    fn mark_dirty_appends_marker_once() {
        let mut row = rebuilt(&["a"]);
        let id = row.chips()[0].facet_id;
        row.mark_dirty(id);
        row.mark_dirty(id);
        assert_eq!(row.chips()[0].text, "A*");
        assert!(row.chips()[0].dirty);
    }

    #[test]
    fn rebuild_clears_dirty_markers_and_input() {
        let mut row = rebuilt(&["a"]);
        let id = row.chips()[0].facet_id;
        row.mark_dirty(id);
        row.set_input_text("pending");

        row.rebuild(&query_with(&["a"]), &HashMap::new());
        assert!(!row.chips()[0].dirty);
        assert_eq!(row.input().text, "");
    }

    #[test]
    fn chip_before_input_is_last_chip() {
        let row = rebuilt(&["a", "b"]);
        assert_eq!(row.chip_before_input(), Some(row.chips()[1].facet_id));
        let empty = rebuilt(&[]);
        assert_eq!(empty.chip_before_input(), None);
    }

    #[test]
    fn blur_clears_input_text() {
        let mut row = rebuilt(&["a"]);
        row.set_input_text("half-typed");
        row.blur();
        assert_eq!(row.input().text, "");
        assert_eq!(row.focused(), None);
    }

    #[test]
    fn input_boundary_checks() {
        let mut row = rebuilt(&[]);
        row.set_input_text("ab");
        assert!(row.input().at_end());
        assert!(!row.input().at_start());
        row.set_cursor(0);
        assert!(row.input().at_start());
        row.set_cursor(1);
        assert!(!row.input().at_start());
        assert!(!row.input().at_end());
    }
}
