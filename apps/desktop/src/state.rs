//! Global search-bar state using Dioxus signals.
//!
//! The demo drives one [`SearchBar`] over a mock "documents" model: status
//! filters, a couple of date group-bys, and a free-text completion source
//! over the name and reference fields.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dioxus::prelude::*;
use serde_json::{json, Value};
use tracing::debug;

use facetbar_core::{
    Category, CompletionItem, CompletionSource, Facet, FacetDescriptor, FacetValue, FieldType,
    FilterDefinition, GroupId, ItemId, MenuSink, SearchBar, SearchBarConfig, SearchBarEvent,
    SearchData, SearchField,
};

// ---------------------------------------------------------------------------
// Demo model
// ---------------------------------------------------------------------------

/// Free-text search field: each term becomes an `ilike` leaf on one model
/// field, OR-joined when the facet holds several terms.
struct TextField {
    name: &'static str,
}

impl SearchField for TextField {
    fn key(&self) -> &str {
        self.name
    }

    fn domain(&self, facet: &Facet) -> Option<Value> {
        let mut out: Vec<Value> = Vec::new();
        for _ in 1..facet.values.len() {
            out.push(json!("|"));
        }
        for value in &facet.values {
            out.push(json!([self.name, "ilike", value.value]));
        }
        Some(Value::Array(out))
    }
}

/// Proposes one field-search completion per text field of the demo model.
pub struct RecordCompletionSource;

impl CompletionSource for RecordCompletionSource {
    fn complete(&self, term: &str) -> Vec<CompletionItem> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }
        [("name", "Name"), ("reference", "Reference")]
            .into_iter()
            .map(|(field, label)| CompletionItem {
                label: format!("Search {label} for: {term}"),
                facet: Some(FacetDescriptor::new(
                    Category::Field,
                    Arc::new(TextField { name: field }),
                    vec![FacetValue::new(term, term)],
                )),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Menu sink
// ---------------------------------------------------------------------------

/// Deactivates menu items when their facet leaves the query. Keeps its own
/// item registry so it never reads the `BAR` signal from inside the
/// controller's event loop.
struct SignalMenuSink {
    items: Vec<(Category, GroupId, ItemId)>,
}

impl MenuSink for SignalMenuSink {
    fn unset_groups(&mut self, category: Category, group_ids: &[GroupId]) {
        let mut active = MENU_ACTIVE.write();
        for &(cat, group, item) in &self.items {
            if cat == category && group_ids.contains(&group) {
                active.remove(&item);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Global signals
// ---------------------------------------------------------------------------

/// The search bar instance — built once on first read.
pub static BAR: GlobalSignal<SearchBar> = Signal::global(demo_bar);

/// Last dispatched search payload, shown in the payload panel.
pub static LAST_SEARCH: GlobalSignal<Option<SearchData>> = Signal::global(|| None);

/// Number of searches dispatched this session.
pub static SEARCH_COUNT: GlobalSignal<usize> = Signal::global(|| 0);

/// Menu items currently rendered as active.
pub static MENU_ACTIVE: GlobalSignal<HashSet<ItemId>> = Signal::global(initial_menu_active);

/// Open autocomplete entries for the typed term.
pub static COMPLETIONS: GlobalSignal<Vec<CompletionItem>> = Signal::global(Vec::new);

/// Index of the highlighted autocomplete entry.
pub static ACTIVE_COMPLETION: GlobalSignal<usize> = Signal::global(|| 0);

fn demo_bar() -> SearchBar {
    let mut fields = HashMap::new();
    fields.insert("state".to_string(), FieldType::Selection);
    fields.insert("user_id".to_string(), FieldType::Many2One);
    fields.insert("create_date".to_string(), FieldType::DateTime);
    fields.insert("date_deadline".to_string(), FieldType::Date);

    let mut bar = SearchBar::new(SearchBarConfig {
        search_defaults: vec!["open".to_string()],
        fields,
        ..Default::default()
    });
    bar.register_definitions(vec![
        vec![
            FilterDefinition::new("open", "Open").with_domain(json!([["state", "=", "open"]])),
            FilterDefinition::new("done", "Done").with_domain(json!([["state", "=", "done"]])),
            FilterDefinition::new("cancelled", "Cancelled")
                .with_domain(json!([["state", "=", "cancel"]])),
        ],
        vec![
            FilterDefinition::new("my_documents", "My Documents")
                .with_domain(json!([["user_id", "=", 1]])),
            FilterDefinition::new("overdue", "Overdue")
                .with_domain(json!([["date_deadline", "<", "today"]])),
        ],
        vec![
            FilterDefinition::new("by_state", "Status").with_context(r#"{"group_by": "state"}"#),
            FilterDefinition::new("by_owner", "Owner").with_context(r#"{"group_by": "user_id"}"#),
            FilterDefinition::new("by_created", "Created On")
                .with_context(r#"{"group_by": "create_date:month"}"#),
            FilterDefinition::new("by_deadline", "Deadline")
                .with_context(r#"{"group_by": "date_deadline:week"}"#),
        ],
    ]);

    // The sink needs the generated item ids, so it is installed after
    // registration.
    let mut items = Vec::new();
    for item in bar.filter_items() {
        items.push((Category::Filters, item.group_id, item.item_id));
    }
    for item in bar.groupby_items() {
        items.push((Category::GroupBy, item.group_id, item.item_id));
    }
    bar.set_menu_sink(Box::new(SignalMenuSink { items }));

    bar.set_default_filters();
    bar
}

fn initial_menu_active() -> HashSet<ItemId> {
    let bar = BAR.read();
    let mut active = HashSet::new();
    for item in bar.filter_items() {
        if item.is_active {
            active.insert(item.item_id);
        }
    }
    for item in bar.groupby_items() {
        if item.is_active {
            active.insert(item.item_id);
        }
    }
    active
}

// ---------------------------------------------------------------------------
// Event pump
// ---------------------------------------------------------------------------

/// Drain the bar's upward events into the display signals. Call after every
/// bar mutation.
///
/// The virtual DOM reuses elements across renders, so per-subview mount
/// callbacks never add up to the rebuild barrier; the barrier is driven to
/// completion here instead, the way headless hosts do.
pub fn pump_events() {
    let mut events = Vec::new();
    {
        let mut bar = BAR.write();
        while let Some(event) = bar.poll_event() {
            events.push(event);
        }
        bar.complete_mounts();
    }
    for event in events {
        match event {
            SearchBarEvent::Search(data) => {
                *SEARCH_COUNT.write() += 1;
                *LAST_SEARCH.write() = Some(data);
            }
            SearchBarEvent::NavigationDown => {
                debug!("navigation handed down past the search bar");
            }
        }
    }
}

/// Take and apply the autocomplete entry at `index`.
pub fn select_completion(index: usize) {
    let item = {
        let mut completions = COMPLETIONS.write();
        if index >= completions.len() {
            return;
        }
        completions.remove(index)
    };
    COMPLETIONS.write().clear();
    *ACTIVE_COMPLETION.write() = 0;
    {
        let mut bar = BAR.write();
        bar.set_autocomplete_state(Default::default());
        bar.select_completion(item);
    }
    pump_events();
}

/// Close the dropdown without selecting anything.
pub fn close_completions() {
    COMPLETIONS.write().clear();
    *ACTIVE_COMPLETION.write() = 0;
    BAR.write().set_autocomplete_state(Default::default());
}
