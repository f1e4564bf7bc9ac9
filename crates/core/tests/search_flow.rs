//! End-to-end controller tests: a search bar configured like a typical
//! business list view (status filters, a date group-by), driven through
//! menu toggles, completion selections, and keyboard input, asserting the
//! emitted search payloads and chip row state along the way.

use std::collections::HashMap;

use serde_json::json;

use facetbar_core::{
    AutocompleteState, Category, CompletionItem, FieldType, FilterDefinition, Interval, Key,
    SearchBar, SearchBarConfig, SearchBarEvent, SearchData,
};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn list_view_bar(defaults: &[&str]) -> SearchBar {
    let mut fields = HashMap::new();
    fields.insert("state".to_string(), FieldType::Selection);
    fields.insert("create_date".to_string(), FieldType::DateTime);

    let mut bar = SearchBar::new(SearchBarConfig {
        search_defaults: defaults.iter().map(|s| s.to_string()).collect(),
        fields,
        ..Default::default()
    });
    bar.register_definitions(vec![
        vec![
            FilterDefinition::new("open", "Open").with_domain(json!([["state", "=", "open"]])),
            FilterDefinition::new("done", "Done").with_domain(json!([["state", "=", "done"]])),
        ],
        vec![
            FilterDefinition::new("by_state", "State").with_context(r#"{"group_by": "state"}"#),
            FilterDefinition::new("by_created", "Created")
                .with_context(r#"{"group_by": "create_date:month"}"#),
        ],
    ]);
    bar
}

fn drain_searches(bar: &mut SearchBar) -> Vec<SearchData> {
    let mut out = Vec::new();
    while let Some(ev) = bar.poll_event() {
        if let SearchBarEvent::Search(data) = ev {
            out.push(data);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Full flows
// ---------------------------------------------------------------------------

#[test]
fn defaults_then_interactive_toggles() {
    let mut bar = list_view_bar(&["open"]);
    bar.set_default_filters();
    assert!(
        drain_searches(&mut bar).is_empty(),
        "default loading is search-suppressed"
    );
    assert_eq!(bar.row().chips().len(), 1);

    // User adds the Done filter: merges into the same facet, one dispatch.
    let done = bar.filter_items()[1].item_id;
    bar.toggle_menu_item(Category::Filters, done, None);
    let searches = drain_searches(&mut bar);
    assert_eq!(searches.len(), 1);
    assert_eq!(
        searches[0].domains,
        vec![json!(["|", ["state", "=", "open"], ["state", "=", "done"]])]
    );

    // Then groups by creation date: separate facet, interval from shorthand.
    let by_created = bar
        .groupby_items()
        .iter()
        .find(|i| i.description == "Created")
        .map(|i| i.item_id)
        .unwrap();
    bar.toggle_menu_item(Category::GroupBy, by_created, None);
    let searches = drain_searches(&mut bar);
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].groupbys, vec![json!("create_date")]);
    assert_eq!(
        searches[0].interval_mapping.get("create_date"),
        Some(&Interval::Month)
    );
    assert_eq!(bar.query().len(), 2);
    assert_eq!(bar.row().chips().len(), 2);
    assert_eq!(bar.row().chips()[1].text, "Created (Month)");
}

#[test]
fn payload_orders_follow_chip_order() {
    let mut bar = list_view_bar(&[]);
    let open = bar.filter_items()[0].item_id;
    let by_state = bar
        .groupby_items()
        .iter()
        .find(|i| i.description == "State")
        .map(|i| i.item_id)
        .unwrap();

    bar.toggle_menu_item(Category::GroupBy, by_state, None);
    bar.toggle_menu_item(Category::Filters, open, None);
    drain_searches(&mut bar);

    // Group-by facet was added first, so it renders first; domains and
    // groupbys each keep facet order.
    let chips: Vec<_> = bar.row().chips().iter().map(|c| c.text.as_str()).collect();
    assert_eq!(chips, vec!["State", "Open"]);
    let data = bar.search_data();
    assert_eq!(data.domains, vec![json!([["state", "=", "open"]])]);
    assert_eq!(data.groupbys, vec![json!("state")]);
}

#[test]
fn keyboard_walkthrough_removes_chips() {
    let mut bar = list_view_bar(&[]);
    let open = bar.filter_items()[0].item_id;
    let by_state = bar
        .groupby_items()
        .iter()
        .find(|i| i.description == "State")
        .map(|i| i.item_id)
        .unwrap();
    bar.toggle_menu_item(Category::Filters, open, None);
    bar.toggle_menu_item(Category::GroupBy, by_state, None);
    bar.complete_mounts();
    drain_searches(&mut bar);

    // Focus lands on the input; walk left onto the group-by chip.
    assert!(bar.row().is_input_focused());
    assert!(bar.handle_key(Key::Left));
    assert_eq!(bar.row().focused(), Some(1));

    // Delete it; the rebuild puts focus back after mounts complete.
    assert!(bar.handle_key(Key::Delete));
    bar.complete_mounts();
    assert_eq!(bar.query().len(), 1);
    assert!(bar.row().is_input_focused());

    // Backspace in the (empty) input eats the remaining chip.
    assert!(bar.handle_key(Key::Backspace));
    assert!(bar.query().is_empty());
    let searches = drain_searches(&mut bar);
    assert_eq!(searches.len(), 2);
    assert!(searches[1].domains.is_empty());
}

#[test]
fn completion_selection_adds_field_facet() {
    let mut bar = list_view_bar(&[]);
    bar.set_input_text("urgent");

    // The dropdown (external) resolved the term to a filter facet.
    let descriptor = {
        use facetbar_core::{FacetDescriptor, FacetValue, FilterGroupField};
        use std::sync::Arc;
        let field = Arc::new(FilterGroupField::new(
            Category::Filters,
            vec![FilterDefinition::new("urgent", "Urgent")
                .with_domain(json!([["priority", "=", "high"]]))],
        ));
        FacetDescriptor::new(
            Category::Filters,
            field as Arc<dyn facetbar_core::SearchField>,
            vec![FacetValue::new("urgent", "Urgent")],
        )
    };
    bar.select_completion(CompletionItem {
        label: "Filter: Urgent".into(),
        facet: Some(descriptor),
    });

    assert_eq!(bar.query().len(), 1);
    let searches = drain_searches(&mut bar);
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].domains, vec![json!([["priority", "=", "high"]])]);
    // The rebuild replaced the input subview, clearing the typed term.
    assert_eq!(bar.row().input().text, "");
}

#[test]
fn down_key_defers_to_expanded_dropdown() {
    let mut bar = list_view_bar(&[]);
    bar.complete_mounts();
    bar.set_autocomplete_state(AutocompleteState {
        expanded: true,
        expandable: false,
    });
    assert!(!bar.handle_key(Key::Down), "expanded dropdown owns Down");

    bar.set_autocomplete_state(AutocompleteState::default());
    assert!(bar.handle_key(Key::Down));
    let mut saw_navigation = false;
    while let Some(ev) = bar.poll_event() {
        if ev == SearchBarEvent::NavigationDown {
            saw_navigation = true;
        }
    }
    assert!(saw_navigation);
}

#[test]
fn favorite_snapshot_round_trip() {
    let mut bar = list_view_bar(&["open"]);
    bar.set_default_filters();
    let record = bar.favorite_record("my open records", true);
    assert!(record.is_default);
    let facets = record.facets.as_array().unwrap();
    assert_eq!(facets.len(), 1);
    assert_eq!(facets[0]["category"], json!("filters"));
    assert_eq!(facets[0]["values"][0]["label"], json!("Open"));

    // Applying a favorite replaces the query; interactive application
    // dispatches a search.
    bar.apply_favorite(vec![], false);
    assert!(bar.query().is_empty());
    assert_eq!(drain_searches(&mut bar).len(), 1);
}

#[test]
fn removal_during_pending_rebuild_is_deferred_not_nested() {
    let mut bar = list_view_bar(&[]);
    let open = bar.filter_items()[0].item_id;
    bar.toggle_menu_item(Category::Filters, open, None);
    drain_searches(&mut bar);

    // The chip's remove control is clicked while the rebuild still awaits
    // subview mounts. The removal goes through the event queue, so the
    // follow-up rebuild supersedes the pending one instead of nesting.
    assert!(bar.row().is_rebuilding());
    let id = bar.query().facets()[0].id;
    bar.remove_facet(id);
    bar.complete_mounts();

    assert!(bar.query().is_empty());
    assert!(bar.row().chips().is_empty());
    assert!(bar.row().is_input_focused());
    assert_eq!(drain_searches(&mut bar).len(), 1);
}
