//! Search bar controller: owns the query and the chip row, drains query
//! events with an explicit render policy (full rebuild on structural
//! changes, dirty-mark on value changes), routes keyboard input, keeps the
//! external menu widgets reconciled with query state, and emits the search
//! payload upward.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::chip_row::ChipRow;
use crate::menus::{
    FilterGroupField, FilterMenuItem, GroupByMenuItem, GroupId, IntervalBinding, ItemId, MenuSink,
    NullMenuSink,
};
use crate::payload::{build_search_data, SearchData};
use crate::query::{
    FacetDescriptor, FacetId, QueryEvent, SearchField, SearchQuery,
};
use crate::types::{Category, FieldType, FilterDefinition, Interval};

// ---------------------------------------------------------------------------
// Collaborator interfaces
// ---------------------------------------------------------------------------

/// UI preference storage injected into the controller (whether the filter
/// button row is shown). Hosts back this with whatever store they have.
pub trait Preferences {
    fn filters_visible(&self) -> bool;
    fn set_filters_visible(&mut self, visible: bool);
}

/// Default in-memory preferences: filters row visible.
pub struct InMemoryPreferences {
    visible: bool,
}

impl Default for InMemoryPreferences {
    fn default() -> Self {
        InMemoryPreferences { visible: true }
    }
}

impl Preferences for InMemoryPreferences {
    fn filters_visible(&self) -> bool {
        self.visible
    }

    fn set_filters_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

/// A saved favorite filter, keyed by the consuming action. The facet
/// payload is opaque to the core; the host rebuilds descriptors from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteRecord {
    pub name: String,
    pub is_default: bool,
    pub facets: Value,
}

/// Persistence of favorite filters; loading/saving failures are the
/// store's concern and only gate whether favorites render.
pub trait FavoriteStore {
    fn load(&self, action_id: &str) -> Vec<FavoriteRecord>;
    fn save(&mut self, action_id: &str, record: FavoriteRecord);
}

/// One autocomplete dropdown entry. Selecting an item with a facet
/// descriptor adds it to the query; a bare item only clears the input.
pub struct CompletionItem {
    pub label: String,
    pub facet: Option<FacetDescriptor>,
}

/// Provider of completion items for a typed term; the dropdown widget
/// itself lives outside the core.
pub trait CompletionSource {
    fn complete(&self, term: &str) -> Vec<CompletionItem>;
}

/// What the controller needs to know about the dropdown to route keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutocompleteState {
    /// The dropdown is currently open.
    pub expanded: bool,
    /// The focused dropdown entry can expand further to the right.
    pub expandable: bool,
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Keys the search bar handles beyond plain text entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Down,
    Backspace,
    Delete,
}

/// Events emitted upward to the consuming view.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchBarEvent {
    Search(SearchData),
    /// Down pressed while the dropdown is closed: the view should move its
    /// own navigation focus down.
    NavigationDown,
}

/// An ad-hoc filter added programmatically by the consuming view.
#[derive(Debug, Clone)]
pub struct AdHocFilter {
    pub domain: Value,
    pub help: String,
}

/// Static configuration of one search bar instance.
#[derive(Default)]
pub struct SearchBarConfig {
    pub touch_mode: bool,
    pub disable_filters: bool,
    pub disable_groupby: bool,
    pub disable_favorites: bool,
    /// Names of filter/group-by definitions active when defaults load.
    pub search_defaults: Vec<String>,
    /// Field metadata of the consuming model; date-ness decides whether a
    /// group-by gets an interval binding.
    pub fields: HashMap<String, FieldType>,
}

// ---------------------------------------------------------------------------
// Bookkeeping tables
// ---------------------------------------------------------------------------

struct FilterMapping {
    item_id: ItemId,
    group_id: GroupId,
    name: String,
}

struct GroupByMapping {
    item_id: ItemId,
    group_id: GroupId,
    name: String,
    field_name: String,
}

struct GroupMapping {
    group_id: GroupId,
    category: Category,
    field: Arc<FilterGroupField>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct SearchBar {
    config: SearchBarConfig,
    query: SearchQuery,
    row: ChipRow,
    filter_items: Vec<FilterMenuItem>,
    groupby_items: Vec<GroupByMenuItem>,
    filters_mapping: Vec<FilterMapping>,
    groupbys_mapping: Vec<GroupByMapping>,
    groups_mapping: Vec<GroupMapping>,
    interval_mapping: Vec<IntervalBinding>,
    selected_filter_groups: Vec<GroupId>,
    selected_groupby_groups: Vec<GroupId>,
    autocomplete: AutocompleteState,
    prefs: Box<dyn Preferences>,
    menu_sink: Box<dyn MenuSink>,
    out: VecDeque<SearchBarEvent>,
}

impl SearchBar {
    pub fn new(config: SearchBarConfig) -> Self {
        let touch_mode = config.touch_mode;
        SearchBar {
            config,
            query: SearchQuery::new(),
            row: ChipRow::new(touch_mode),
            filter_items: Vec::new(),
            groupby_items: Vec::new(),
            filters_mapping: Vec::new(),
            groupbys_mapping: Vec::new(),
            groups_mapping: Vec::new(),
            interval_mapping: Vec::new(),
            selected_filter_groups: Vec::new(),
            selected_groupby_groups: Vec::new(),
            autocomplete: AutocompleteState::default(),
            prefs: Box::new(InMemoryPreferences::default()),
            menu_sink: Box::new(NullMenuSink),
            out: VecDeque::new(),
        }
    }

    pub fn with_preferences(mut self, prefs: Box<dyn Preferences>) -> Self {
        self.prefs = prefs;
        self
    }

    pub fn with_menu_sink(mut self, sink: Box<dyn MenuSink>) -> Self {
        self.menu_sink = sink;
        self
    }

    /// Install the menu sink after construction; hosts that build their
    /// menu widgets from the registered items need the item lists first.
    pub fn set_menu_sink(&mut self, sink: Box<dyn MenuSink>) {
        self.menu_sink = sink;
    }

    // -- accessors ----------------------------------------------------------

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn row(&self) -> &ChipRow {
        &self.row
    }

    pub fn filter_items(&self) -> &[FilterMenuItem] {
        &self.filter_items
    }

    pub fn groupby_items(&self) -> &[GroupByMenuItem] {
        &self.groupby_items
    }

    pub fn filters_visible(&self) -> bool {
        self.prefs.filters_visible()
    }

    /// Flip the filter-row visibility preference and return the new state.
    pub fn toggle_filters_visible(&mut self) -> bool {
        let next = !self.prefs.filters_visible();
        self.prefs.set_filters_visible(next);
        next
    }

    /// Build the current search payload without emitting it.
    pub fn search_data(&self) -> SearchData {
        build_search_data(&self.query, &self.interval_mapping)
    }

    /// Pop the next pending upward event.
    pub fn poll_event(&mut self) -> Option<SearchBarEvent> {
        self.out.pop_front()
    }

    // -- registration -------------------------------------------------------

    /// Register the filter/group-by definitions parsed from the view
    /// description, one inner vector per menu group. Definitions are
    /// classified here; a group mixing both categories is split.
    ///
    /// Precondition (caller contract): definition names are unique across
    /// groups of the same category.
    pub fn register_definitions(&mut self, groups: Vec<Vec<FilterDefinition>>) {
        for group in groups {
            let mut filters = Vec::new();
            let mut groupbys = Vec::new();
            for mut def in group {
                if def.invisible {
                    continue;
                }
                match def.classify() {
                    Category::GroupBy => groupbys.push(def),
                    _ => filters.push(def),
                }
            }
            if !filters.is_empty() && !self.config.disable_filters {
                self.register_filter_group(filters);
            }
            if !groupbys.is_empty() && !self.config.disable_groupby {
                self.register_groupby_group(groupbys);
            }
        }
    }

    fn register_filter_group(&mut self, defs: Vec<FilterDefinition>) {
        let group_id = Uuid::new_v4();
        for def in &defs {
            let item_id = Uuid::new_v4();
            self.filter_items.push(FilterMenuItem {
                is_active: self.config.search_defaults.contains(&def.name),
                description: def.label.clone(),
                item_id,
                group_id,
                domain: def.domain.clone(),
            });
            self.filters_mapping.push(FilterMapping {
                item_id,
                group_id,
                name: def.name.clone(),
            });
        }
        self.groups_mapping.push(GroupMapping {
            group_id,
            category: Category::Filters,
            field: Arc::new(FilterGroupField::new(Category::Filters, defs)),
        });
    }

    fn register_groupby_group(&mut self, defs: Vec<FilterDefinition>) {
        let group_id = Uuid::new_v4();
        for def in &defs {
            let item_id = Uuid::new_v4();
            let field_name = def
                .field_name
                .clone()
                .unwrap_or_else(|| def.name.clone());
            let default_option = if self.field_is_date(&field_name) {
                Some(def.default_interval.unwrap_or(Interval::DEFAULT))
            } else {
                None
            };
            if let Some(interval) = default_option {
                self.interval_mapping.push(IntervalBinding {
                    item_id,
                    field_name: field_name.clone(),
                    interval,
                });
            }
            self.groupby_items.push(GroupByMenuItem {
                is_active: self.config.search_defaults.contains(&def.name),
                description: def.label.clone(),
                item_id,
                group_id,
                field_name: field_name.clone(),
                default_option,
            });
            self.groupbys_mapping.push(GroupByMapping {
                item_id,
                group_id,
                name: def.name.clone(),
                field_name,
            });
        }
        self.groups_mapping.push(GroupMapping {
            group_id,
            category: Category::GroupBy,
            field: Arc::new(FilterGroupField::new(Category::GroupBy, defs)),
        });
    }

    fn field_is_date(&self, field_name: &str) -> bool {
        self.config
            .fields
            .get(field_name)
            .map(|t| t.is_date())
            .unwrap_or(false)
    }

    // -- defaults and favorites ---------------------------------------------

    /// Reset the query to the configured default filters. Suppresses the
    /// search dispatch: loading defaults must not query the server twice.
    pub fn set_default_filters(&mut self) {
        let mut descriptors: Vec<FacetDescriptor> = Vec::new();
        for group in &self.groups_mapping {
            let active: Vec<_> = group
                .field
                .filters()
                .iter()
                .filter(|def| self.config.search_defaults.contains(&def.name))
                .collect();
            if active.is_empty() {
                continue;
            }
            let values = active
                .iter()
                .map(|def| group.field.value_for(def))
                .collect();
            descriptors.push(FacetDescriptor::new(
                group.category,
                Arc::<FilterGroupField>::clone(&group.field) as Arc<dyn SearchField>,
                values,
            ));
        }
        debug!(defaults = descriptors.len(), "loading default filters");
        self.query.reset(descriptors, true);
        self.process_events();
    }

    /// Replace the query with a favorite's facets. `prevent_search` mirrors
    /// default loading; interactive favorite toggles pass `false`.
    pub fn apply_favorite(&mut self, descriptors: Vec<FacetDescriptor>, prevent_search: bool) {
        self.query.reset(descriptors, prevent_search);
        self.process_events();
    }

    /// Snapshot the current query as a favorite record.
    pub fn favorite_record(&self, name: impl Into<String>, is_default: bool) -> FavoriteRecord {
        FavoriteRecord {
            name: name.into(),
            is_default,
            facets: Value::Array(self.query.facets().iter().map(|f| f.to_json()).collect()),
        }
    }

    // -- query mutation entry points ----------------------------------------

    /// A facet descriptor selected from the autocomplete dropdown, or a
    /// bare selection that only clears the input.
    pub fn select_completion(&mut self, item: CompletionItem) {
        let addable = item
            .facet
            .as_ref()
            .and_then(|f| f.values.first())
            .map(|v| match &v.value {
                Value::String(s) => !s.trim().is_empty(),
                Value::Null => false,
                _ => true,
            })
            .unwrap_or(false);
        match item.facet {
            Some(facet) if addable => {
                self.query.add(vec![facet]);
            }
            _ => self.query.touch(),
        }
        self.process_events();
    }

    /// Toggle a facet descriptor directly (typed search fields).
    pub fn toggle_facet(&mut self, descriptor: FacetDescriptor) {
        self.query.toggle(descriptor);
        self.process_events();
    }

    /// Remove the facet behind a chip (remove control clicked).
    pub fn remove_facet(&mut self, id: FacetId) {
        self.query.remove(id);
        self.process_events();
    }

    /// Add filters and remove previously added ones in one batch, emitting a
    /// single reset. Returns the added facet ids for a later removal call.
    pub fn update_filters(
        &mut self,
        new_filters: Vec<AdHocFilter>,
        to_remove: Vec<FacetId>,
    ) -> Vec<FacetId> {
        let mut added = Vec::new();
        for filter in new_filters {
            let def = FilterDefinition::new(Uuid::new_v4().to_string(), filter.help.clone())
                .with_domain(filter.domain.clone());
            let field = Arc::new(FilterGroupField::new(Category::Filters, vec![def.clone()]));
            let value = field.value_for(&def);
            added.extend(self.query.add_silent(vec![FacetDescriptor::new(
                Category::Filters,
                field as Arc<dyn SearchField>,
                vec![value],
            )]));
        }
        for id in to_remove {
            self.query.remove_silent(id);
        }
        self.query.touch_reset();
        self.process_events();
        added
    }

    // -- menu event handlers ------------------------------------------------

    /// A menu item was toggled in an external menu widget. For group-bys an
    /// accompanying option id selects the date interval.
    pub fn toggle_menu_item(
        &mut self,
        category: Category,
        item_id: ItemId,
        option: Option<Interval>,
    ) {
        match category {
            Category::GroupBy => {
                let Some(mapping) = self.groupbys_mapping.iter().find(|m| m.item_id == item_id)
                else {
                    return;
                };
                let (group_id, name) = (mapping.group_id, mapping.name.clone());
                if let Some(interval) = option {
                    self.bind_interval(item_id, interval);
                }
                self.toggle_group_entry(group_id, &name);
            }
            _ => {
                let Some(mapping) = self.filters_mapping.iter().find(|m| m.item_id == item_id)
                else {
                    return;
                };
                let (group_id, name) = (mapping.group_id, mapping.name.clone());
                self.toggle_group_entry(group_id, &name);
            }
        }
    }

    /// A menu item's option changed. A group-by interval change re-renders
    /// and re-dispatches without toggling the facet; a filter option change
    /// is a plain toggle.
    pub fn change_item_option(
        &mut self,
        category: Category,
        item_id: ItemId,
        option: Option<Interval>,
    ) {
        match category {
            Category::GroupBy => {
                if let Some(interval) = option {
                    self.bind_interval(item_id, interval);
                }
                self.query.touch_reset();
                self.process_events();
            }
            _ => self.toggle_menu_item(category, item_id, None),
        }
    }

    /// Register and activate a user-defined group-by.
    pub fn add_custom_groupby(
        &mut self,
        description: impl Into<String>,
        field_name: impl Into<String>,
        option: Option<Interval>,
    ) -> (GroupId, ItemId) {
        let field_name = field_name.into();
        let def = FilterDefinition::groupby(field_name.clone(), description, field_name.clone());
        let group_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        if let Some(interval) = option {
            self.interval_mapping.push(IntervalBinding {
                item_id,
                field_name: field_name.clone(),
                interval,
            });
        }
        let field = Arc::new(FilterGroupField::new(Category::GroupBy, vec![def.clone()]));
        self.groupbys_mapping.push(GroupByMapping {
            item_id,
            group_id,
            name: def.name.clone(),
            field_name,
        });
        self.groups_mapping.push(GroupMapping {
            group_id,
            category: Category::GroupBy,
            field: Arc::<FilterGroupField>::clone(&field),
        });
        self.query.toggle(field.descriptor_for(&def));
        self.process_events();
        (group_id, item_id)
    }

    /// Register and activate user-defined filters as one new menu group.
    pub fn add_custom_filters(&mut self, defs: Vec<FilterDefinition>) -> GroupId {
        let group_id = Uuid::new_v4();
        for def in &defs {
            self.filters_mapping.push(FilterMapping {
                item_id: Uuid::new_v4(),
                group_id,
                name: def.name.clone(),
            });
        }
        let field = Arc::new(FilterGroupField::new(Category::Filters, defs));
        let values = field
            .filters()
            .iter()
            .map(|def| field.value_for(def))
            .collect();
        self.query.add_silent(vec![FacetDescriptor::new(
            Category::Filters,
            Arc::<FilterGroupField>::clone(&field) as Arc<dyn SearchField>,
            values,
        )]);
        self.groups_mapping.push(GroupMapping {
            group_id,
            category: Category::Filters,
            field,
        });
        self.query.touch_reset();
        self.process_events();
        group_id
    }

    fn toggle_group_entry(&mut self, group_id: GroupId, name: &str) {
        let Some(group) = self.groups_mapping.iter().find(|g| g.group_id == group_id) else {
            return;
        };
        let Some(def) = group.field.find_by_name(name) else {
            return;
        };
        let descriptor = group.field.descriptor_for(&def.clone());
        self.query.toggle(descriptor);
        self.process_events();
    }

    fn bind_interval(&mut self, item_id: ItemId, interval: Interval) {
        if let Some(binding) = self
            .interval_mapping
            .iter_mut()
            .find(|b| b.item_id == item_id)
        {
            binding.interval = interval;
            return;
        }
        if let Some(mapping) = self.groupbys_mapping.iter().find(|m| m.item_id == item_id) {
            self.interval_mapping.push(IntervalBinding {
                item_id,
                field_name: mapping.field_name.clone(),
                interval,
            });
        }
    }

    // -- autocomplete and keyboard ------------------------------------------

    pub fn set_autocomplete_state(&mut self, state: AutocompleteState) {
        self.autocomplete = state;
    }

    pub fn set_input_text(&mut self, text: impl Into<String>) {
        self.row.set_input_text(text);
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.row.set_cursor(cursor);
    }

    pub fn focus_subview(&mut self, index: usize) {
        self.row.focus(index);
    }

    /// A subview of the chip row finished mounting in the host UI.
    pub fn subview_mounted(&mut self) {
        self.row.subview_mounted();
    }

    /// Drive the whole mount barrier; headless hosts call this right after
    /// processing events.
    pub fn complete_mounts(&mut self) {
        self.row.complete_mounts();
    }

    /// The input lost focus: clear it, close the dropdown.
    pub fn blur(&mut self) {
        self.row.blur();
        self.autocomplete.expanded = false;
    }

    /// Route a key press. Returns `true` when the bar consumed the key;
    /// `false` leaves it to the host text field (caret movement, editing).
    ///
    /// Key events originate from the input element, so a row without an
    /// explicit focus index (nothing toggled yet, or after a blur) routes
    /// as if the input were focused.
    pub fn handle_key(&mut self, key: Key) -> bool {
        let input_focused = self.row.is_input_focused() || self.row.focused().is_none();
        match key {
            Key::Left => {
                if input_focused && !self.row.input().at_start() {
                    return false;
                }
                self.row.focus_previous();
                true
            }
            Key::Right => {
                if input_focused && !self.row.input().at_end() {
                    return false;
                }
                if self.autocomplete.expandable {
                    // The dropdown expands to the right instead.
                    return false;
                }
                self.row.focus_next();
                true
            }
            Key::Down => {
                if self.autocomplete.expanded {
                    return false;
                }
                self.out.push_back(SearchBarEvent::NavigationDown);
                true
            }
            Key::Backspace => {
                if input_focused {
                    if !self.row.input().text.is_empty() {
                        return false;
                    }
                    if let Some(id) = self.row.chip_before_input() {
                        self.remove_facet(id);
                        return true;
                    }
                    false
                } else {
                    self.remove_focused_chip()
                }
            }
            Key::Delete => {
                if input_focused {
                    false
                } else {
                    self.remove_focused_chip()
                }
            }
        }
    }

    fn remove_focused_chip(&mut self) -> bool {
        let Some(chip) = self.row.focused_chip() else {
            return false;
        };
        let id = chip.facet_id;
        self.remove_facet(id);
        true
    }

    // -- event processing ---------------------------------------------------

    /// Drain the query's notification queue and apply the render policy.
    ///
    /// Structural events rebuild the row and reconcile menus; value changes
    /// only dirty-mark the chip, unless the change emptied (and thereby
    /// pruned) the facet, in which case the chip has to go. Removals
    /// enqueued by chip callbacks during a rebuild are picked up by this
    /// same loop, after the rebuild — never nested inside it.
    pub fn process_events(&mut self) {
        while let Some(event) = self.query.pop_event() {
            trace!(?event, "processing query event");
            match event {
                QueryEvent::Added | QueryEvent::Removed(_) => {
                    self.rebuild();
                    self.dispatch_search();
                }
                QueryEvent::Reset { prevent_search } => {
                    self.rebuild();
                    if !prevent_search {
                        self.dispatch_search();
                    }
                }
                QueryEvent::Changed(id) => {
                    if self.query.get(id).is_some() {
                        self.row.mark_dirty(id);
                    } else {
                        // The change emptied the facet; it was pruned.
                        self.rebuild();
                    }
                    self.dispatch_search();
                }
            }
        }
    }

    fn rebuild(&mut self) {
        let intervals: HashMap<String, Interval> = self
            .interval_mapping
            .iter()
            .map(|b| (b.field_name.clone(), b.interval))
            .collect();
        self.row.rebuild(&self.query, &intervals);
        self.reconcile_menus();
    }

    fn dispatch_search(&mut self) {
        self.out
            .push_back(SearchBarEvent::Search(self.search_data()));
    }

    // -- menu reconciliation ------------------------------------------------

    /// Recompute which menu groups the query currently represents and ask
    /// the menu widgets to deactivate the ones that dropped out. Recomputed
    /// from scratch on every rebuild; not a subscription.
    fn reconcile_menus(&mut self) {
        let mut filter_groups: Vec<GroupId> = Vec::new();
        let mut groupby_groups: Vec<GroupId> = Vec::new();
        for facet in self.query.facets() {
            for value in &facet.values {
                let Some(token) = value.value.as_str() else {
                    continue;
                };
                match facet.category {
                    Category::Filters => {
                        if let Some(m) = self.filters_mapping.iter().find(|m| m.name == token) {
                            if !filter_groups.contains(&m.group_id) {
                                filter_groups.push(m.group_id);
                            }
                        }
                    }
                    Category::GroupBy => {
                        if let Some(m) =
                            self.groupbys_mapping.iter().find(|m| m.field_name == token)
                        {
                            if !groupby_groups.contains(&m.group_id) {
                                groupby_groups.push(m.group_id);
                            }
                        }
                    }
                    Category::Field => {}
                }
            }
        }

        let stale_filters: Vec<GroupId> = self
            .selected_filter_groups
            .iter()
            .copied()
            .filter(|id| !filter_groups.contains(id))
            .collect();
        let stale_groupbys: Vec<GroupId> = self
            .selected_groupby_groups
            .iter()
            .copied()
            .filter(|id| !groupby_groups.contains(id))
            .collect();

        self.selected_filter_groups = filter_groups;
        self.selected_groupby_groups = groupby_groups;

        if !stale_filters.is_empty() {
            self.menu_sink.unset_groups(Category::Filters, &stale_filters);
        }
        if !stale_groupbys.is_empty() {
            self.menu_sink.unset_groups(Category::GroupBy, &stale_groupbys);
        }
    }
}
