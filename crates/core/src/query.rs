//! Facet query model: an ordered collection of facets with merge-on-add,
//! value toggling, auto-pruning of emptied facets, and a typed event queue
//! drained by the controller.
//!
//! The collection enforces one facet per `(category, field key)` pair via an
//! auxiliary index; iteration order is insertion order and drives chip order.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::types::Category;

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// A field a facet can be built on. Implementations extract the query
/// fragments the consuming view understands; all extractors are pure.
///
/// `key()` is the merge identity of the field within its category: two
/// descriptors with equal `(category, key)` land in the same facet.
pub trait SearchField {
    fn key(&self) -> &str;

    /// Domain fragment contributed by `facet`, if any.
    fn domain(&self, _facet: &Facet) -> Option<Value> {
        None
    }

    /// Context fragment contributed by `facet`, if any.
    fn context(&self, _facet: &Facet) -> Option<Value> {
        None
    }

    /// Group-by fragments contributed by `facet`. A single facet may
    /// contribute several group-by levels, hence the vector.
    fn groupby(&self, _facet: &Facet) -> Option<Vec<Value>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

/// One value held by a facet. Identity for toggling is full `(value, label)`
/// equality; two values with the same payload but different labels coexist.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetValue {
    pub value: Value,
    pub label: String,
}

impl FacetValue {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        FacetValue {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Stable handle of a facet within one query. Never reused for the lifetime
/// of the query, so chip views can hold it across rebuilds.
pub type FacetId = u64;

/// Merge key: at most one facet per key may exist in a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FacetKey {
    pub category: Category,
    pub field: String,
}

/// Descriptor handed to [`SearchQuery::add`] / [`SearchQuery::toggle`].
#[derive(Clone)]
pub struct FacetDescriptor {
    pub category: Category,
    pub field: Arc<dyn SearchField>,
    pub separator: Option<String>,
    pub values: Vec<FacetValue>,
}

impl FacetDescriptor {
    pub fn new(category: Category, field: Arc<dyn SearchField>, values: Vec<FacetValue>) -> Self {
        FacetDescriptor {
            category,
            field,
            separator: None,
            values,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn key(&self) -> FacetKey {
        FacetKey {
            category: self.category,
            field: self.field.key().to_string(),
        }
    }
}

/// A named group of values sharing a category and field, rendered as one chip.
#[derive(Clone)]
pub struct Facet {
    pub id: FacetId,
    pub category: Category,
    pub field: Arc<dyn SearchField>,
    pub separator: Option<String>,
    pub values: Vec<FacetValue>,
}

impl Facet {
    pub fn key(&self) -> FacetKey {
        FacetKey {
            category: self.category,
            field: self.field.key().to_string(),
        }
    }

    /// Separator between rendered values; defaults to " or ".
    pub fn separator(&self) -> &str {
        self.separator.as_deref().unwrap_or(" or ")
    }

    pub fn contains(&self, value: &FacetValue) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// JSON form used by favorite records. The field handle is not
    /// serializable and is deliberately left out, as only its key matters
    /// for restoring.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "category": self.category.as_str(),
            "field": self.field.key(),
            "separator": self.separator,
            "values": self.values.iter().map(|v| {
                serde_json::json!({ "value": v.value, "label": v.label })
            }).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Debug for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facet")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("field", &self.field.key())
            .field("values", &self.values)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Query events
// ---------------------------------------------------------------------------

/// Typed change notifications recorded by query mutations.
///
/// Events accumulate in a queue and are drained by the controller; removals
/// triggered from chip callbacks while a rebuild is running are thereby
/// deferred until the rebuild finishes instead of recursing into it.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    /// A facet was inserted (or a bare re-render was requested).
    Added,
    /// Values of an existing facet changed. The facet may have been pruned
    /// by the time the event is processed.
    Changed(FacetId),
    /// A facet was explicitly removed.
    Removed(FacetId),
    /// The whole collection was replaced.
    Reset { prevent_search: bool },
}

// ---------------------------------------------------------------------------
// Search query
// ---------------------------------------------------------------------------

/// Ordered collection of facets for one search bar instance.
pub struct SearchQuery {
    facets: Vec<Facet>,
    index: HashMap<FacetKey, FacetId>,
    next_id: FacetId,
    events: VecDeque<QueryEvent>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        SearchQuery {
            facets: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
            events: VecDeque::new(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    pub fn len(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    pub fn get(&self, id: FacetId) -> Option<&Facet> {
        self.facets.iter().find(|f| f.id == id)
    }

    pub fn find(&self, key: &FacetKey) -> Option<&Facet> {
        self.index.get(key).and_then(|&id| self.get(id))
    }

    // -- events -------------------------------------------------------------

    /// Pop the next pending notification, if any. Mutations enqueued while
    /// earlier events are being processed are seen by the same drain loop.
    pub fn pop_event(&mut self) -> Option<QueryEvent> {
        self.events.pop_front()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Request a re-render without touching facet state. Used when a
    /// completion selection carries no facet but the input must be cleared.
    pub fn touch(&mut self) {
        self.events.push_back(QueryEvent::Added);
    }

    /// Request a re-render plus search dispatch without changing facets.
    /// Used when render-relevant auxiliary state changes, e.g. the selected
    /// interval of an active date group-by.
    pub fn touch_reset(&mut self) {
        self.events.push_back(QueryEvent::Reset {
            prevent_search: false,
        });
    }

    // -- mutations ----------------------------------------------------------

    /// Add descriptors, merging values into an existing facet when one with
    /// the same `(category, field key)` already exists. No deduplication:
    /// duplicate values coexist unless the caller uses [`SearchQuery::toggle`].
    ///
    /// A descriptor with an empty value list nets to a no-op: the facet it
    /// would create is pruned before it is ever observable.
    pub fn add(&mut self, descriptors: Vec<FacetDescriptor>) -> &mut Self {
        self.add_inner(descriptors, false);
        self
    }

    /// Like [`SearchQuery::add`] but without notifications; callers batching
    /// several silent mutations are expected to emit one `Reset` afterwards.
    pub fn add_silent(&mut self, descriptors: Vec<FacetDescriptor>) -> Vec<FacetId> {
        self.add_inner(descriptors, true)
    }

    fn add_inner(&mut self, descriptors: Vec<FacetDescriptor>, silent: bool) -> Vec<FacetId> {
        let mut touched = Vec::new();
        for descriptor in descriptors {
            if descriptor.values.is_empty() {
                trace!(field = descriptor.field.key(), "empty-valued descriptor pruned on add");
                continue;
            }
            let key = descriptor.key();
            if let Some(&id) = self.index.get(&key) {
                if let Some(facet) = self.facets.iter_mut().find(|f| f.id == id) {
                    facet.values.extend(descriptor.values);
                    touched.push(id);
                    if !silent {
                        self.emit_changed(id);
                    }
                    continue;
                }
            }
            let id = self.next_id;
            self.next_id += 1;
            debug!(facet = id, field = descriptor.field.key(), "facet added");
            self.facets.push(Facet {
                id,
                category: descriptor.category,
                field: descriptor.field,
                separator: descriptor.separator,
                values: descriptor.values,
            });
            self.index.insert(key, id);
            touched.push(id);
            if !silent {
                self.events.push_back(QueryEvent::Added);
            }
        }
        touched
    }

    /// Flip membership of each descriptor value in the matching facet,
    /// then emit a single change notification. With no matching facet this
    /// delegates to [`SearchQuery::add`].
    ///
    /// Flips are applied silently and committed as one event so observers
    /// never see intermediate half-toggled states.
    pub fn toggle(&mut self, descriptor: FacetDescriptor) -> &mut Self {
        let key = descriptor.key();
        let Some(&id) = self.index.get(&key) else {
            return self.add(vec![descriptor]);
        };
        if let Some(facet) = self.facets.iter_mut().find(|f| f.id == id) {
            for value in descriptor.values {
                if let Some(pos) = facet.values.iter().position(|v| *v == value) {
                    facet.values.remove(pos);
                } else {
                    facet.values.push(value);
                }
            }
        }
        self.emit_changed(id);
        self
    }

    /// Remove a facet outright. Unknown ids are a no-op.
    pub fn remove(&mut self, id: FacetId) -> &mut Self {
        if self.remove_inner(id) {
            self.events.push_back(QueryEvent::Removed(id));
        }
        self
    }

    /// Remove without notification; used by batched filter updates.
    pub fn remove_silent(&mut self, id: FacetId) -> bool {
        self.remove_inner(id)
    }

    fn remove_inner(&mut self, id: FacetId) -> bool {
        let Some(pos) = self.facets.iter().position(|f| f.id == id) else {
            return false;
        };
        let facet = self.facets.remove(pos);
        self.index.remove(&facet.key());
        debug!(facet = id, "facet removed");
        true
    }

    /// Replace the whole collection atomically. `prevent_search` travels in
    /// the reset notification so that default-loading does not dispatch a
    /// search to the parent view.
    pub fn reset(&mut self, descriptors: Vec<FacetDescriptor>, prevent_search: bool) -> &mut Self {
        self.facets.clear();
        self.index.clear();
        self.add_inner(descriptors, true);
        self.events.push_back(QueryEvent::Reset { prevent_search });
        self
    }

    /// Commit a value-level change: prune the facet if its value list became
    /// empty (silently, no removal event storm), then record the change.
    fn emit_changed(&mut self, id: FacetId) {
        if let Some(facet) = self.get(id) {
            if facet.values.is_empty() {
                trace!(facet = id, "facet emptied, pruning");
                self.remove_inner(id);
            }
        }
        self.events.push_back(QueryEvent::Changed(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestField(&'static str);

    impl SearchField for TestField {
        fn key(&self) -> &str {
            self.0
        }
    }

    fn field(key: &'static str) -> Arc<dyn SearchField> {
        Arc::new(TestField(key))
    }

    fn descriptor(key: &'static str, values: Vec<FacetValue>) -> FacetDescriptor {
        FacetDescriptor::new(Category::Filters, field(key), values)
    }

    fn drain(q: &mut SearchQuery) -> Vec<QueryEvent> {
        let mut out = Vec::new();
        while let Some(ev) = q.pop_event() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn add_merges_on_category_and_field() {
        let mut q = SearchQuery::new();
        q.add(vec![descriptor("status", vec![FacetValue::new(1, "A")])]);
        q.add(vec![descriptor("status", vec![FacetValue::new(2, "B")])]);

        assert_eq!(q.len(), 1);
        let facet = &q.facets()[0];
        assert_eq!(facet.values.len(), 2);
        assert_eq!(facet.values[0].label, "A");
        assert_eq!(facet.values[1].label, "B");
    }

    #[test]
    fn same_field_different_category_stays_separate() {
        let mut q = SearchQuery::new();
        q.add(vec![FacetDescriptor::new(
            Category::Filters,
            field("date"),
            vec![FacetValue::new("f", "Filter")],
        )]);
        q.add(vec![FacetDescriptor::new(
            Category::GroupBy,
            field("date"),
            vec![FacetValue::new("g", "Group")],
        )]);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn add_does_not_deduplicate_values() {
        let mut q = SearchQuery::new();
        q.add(vec![descriptor("status", vec![FacetValue::new(1, "A")])]);
        q.add(vec![descriptor("status", vec![FacetValue::new(1, "A")])]);
        assert_eq!(q.facets()[0].values.len(), 2);
    }

    #[test]
    fn add_with_empty_values_is_a_noop() {
        let mut q = SearchQuery::new();
        q.add(vec![descriptor("status", vec![])]);
        assert!(q.is_empty());
        assert_eq!(drain(&mut q), vec![]);
    }

    #[test]
    fn toggle_on_empty_query_creates_facet() {
        let mut q = SearchQuery::new();
        q.toggle(descriptor("status", vec![FacetValue::new(1, "A")]));
        assert_eq!(q.len(), 1);
        assert_eq!(drain(&mut q), vec![QueryEvent::Added]);
    }

    #[test]
    fn toggle_twice_removes_facet_again() {
        let mut q = SearchQuery::new();
        q.toggle(descriptor("status", vec![FacetValue::new(1, "A")]));
        drain(&mut q);
        q.toggle(descriptor("status", vec![FacetValue::new(1, "A")]));
        assert!(q.is_empty(), "facet should be pruned once its last value toggles off");
    }

    #[test]
    fn toggle_pairing_restores_untouched_value_order() {
        let mut q = SearchQuery::new();
        q.add(vec![descriptor(
            "status",
            vec![
                FacetValue::new(1, "A"),
                FacetValue::new(2, "B"),
                FacetValue::new(3, "C"),
            ],
        )]);
        q.toggle(descriptor("status", vec![FacetValue::new(2, "B")]));
        q.toggle(descriptor("status", vec![FacetValue::new(2, "B")]));

        let labels: Vec<_> = q.facets()[0].values.iter().map(|v| v.label.as_str()).collect();
        // B re-enters at the end; A and C keep their relative order.
        assert_eq!(labels, vec!["A", "C", "B"]);
        assert_eq!(q.facets()[0].values.len(), 3);
    }

    #[test]
    fn multi_value_toggle_emits_one_change() {
        let mut q = SearchQuery::new();
        q.add(vec![descriptor("status", vec![FacetValue::new(1, "A")])]);
        drain(&mut q);

        q.toggle(descriptor(
            "status",
            vec![
                FacetValue::new(2, "B"),
                FacetValue::new(3, "C"),
                FacetValue::new(1, "A"),
            ],
        ));
        let events = drain(&mut q);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], QueryEvent::Changed(_)));

        let labels: Vec<_> = q.facets()[0].values.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "C"]);
    }

    #[test]
    fn value_identity_is_value_plus_label() {
        let mut q = SearchQuery::new();
        q.add(vec![descriptor("status", vec![FacetValue::new(1, "A")])]);
        // Same payload, different label: no removal, coexists.
        q.toggle(descriptor("status", vec![FacetValue::new(1, "Alias")]));
        assert_eq!(q.facets()[0].values.len(), 2);
    }

    #[test]
    fn merge_on_add_emits_change_not_add() {
        let mut q = SearchQuery::new();
        q.add(vec![descriptor("status", vec![FacetValue::new(1, "A")])]);
        drain(&mut q);
        q.add(vec![descriptor("status", vec![FacetValue::new(2, "B")])]);
        assert!(matches!(drain(&mut q)[..], [QueryEvent::Changed(_)]));
    }

    #[test]
    fn insertion_order_is_iteration_order() {
        let mut q = SearchQuery::new();
        for key in ["c", "a", "b"] {
            q.add(vec![FacetDescriptor::new(
                Category::Filters,
                Arc::new(TestField(key)),
                vec![FacetValue::new(key, key)],
            )]);
        }
        let order: Vec<_> = q.facets().iter().map(|f| f.field.key().to_string()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn remove_unknown_facet_is_noop() {
        let mut q = SearchQuery::new();
        q.remove(42);
        assert_eq!(drain(&mut q), vec![]);
    }

    #[test]
    fn reset_carries_prevent_search_flag() {
        let mut q = SearchQuery::new();
        q.reset(
            vec![descriptor("status", vec![FacetValue::new(1, "A")])],
            true,
        );
        assert_eq!(q.len(), 1);
        assert_eq!(drain(&mut q), vec![QueryEvent::Reset { prevent_search: true }]);
    }

    #[test]
    fn removed_facet_frees_its_merge_slot() {
        let mut q = SearchQuery::new();
        q.add(vec![descriptor("status", vec![FacetValue::new(1, "A")])]);
        let id = q.facets()[0].id;
        q.remove(id);
        q.add(vec![descriptor("status", vec![FacetValue::new(2, "B")])]);
        assert_eq!(q.len(), 1);
        assert_ne!(q.facets()[0].id, id, "ids are never reused");
    }
}
