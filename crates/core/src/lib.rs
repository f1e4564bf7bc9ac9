//! FacetBar core — a headless faceted search bar for business-application
//! clients.
//!
//! The crate models one search bar instance: an ordered facet query with
//! merge/toggle semantics ([`query`]), a chip row kept in sync with it
//! ([`chip_row`]), menu bookkeeping and reconciliation ([`menus`]), the
//! search payload handed to the consuming view ([`payload`]), and the
//! controller wiring it all together ([`controller`]). Rendering, the
//! autocomplete dropdown, and the menu widgets live in the host UI and talk
//! to the core through the traits exposed here.

pub mod chip_row;
pub mod controller;
pub mod menus;
pub mod payload;
pub mod query;
pub mod types;

pub use chip_row::{ChipRow, ChipView, InputView};
pub use controller::{
    AdHocFilter, AutocompleteState, CompletionItem, CompletionSource, FavoriteRecord,
    FavoriteStore, InMemoryPreferences, Key, Preferences, SearchBar, SearchBarConfig,
    SearchBarEvent,
};
pub use menus::{
    FilterGroupField, FilterMenuItem, GroupByMenuItem, GroupId, IntervalBinding, ItemId, MenuSink,
    NullMenuSink,
};
pub use payload::{build_search_data, SearchData};
pub use query::{
    Facet, FacetDescriptor, FacetId, FacetKey, FacetValue, QueryEvent, SearchField, SearchQuery,
};
pub use types::{Category, FieldType, FilterDefinition, Interval};
