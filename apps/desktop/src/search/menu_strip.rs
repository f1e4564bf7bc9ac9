//! Filter and group-by menus rendered as an inline button strip, driven by
//! the items registered on the search bar.

use dioxus::prelude::*;

use facetbar_core::{Category, Interval, ItemId};

use crate::state::*;

const INTERVALS: [Interval; 5] = [
    Interval::Day,
    Interval::Week,
    Interval::Month,
    Interval::Quarter,
    Interval::Year,
];

#[component]
pub fn MenuStrip() -> Element {
    let (filters_visible, filter_items, groupby_items, intervals) = {
        let bar = BAR.read();
        (
            bar.filters_visible(),
            bar.filter_items().to_vec(),
            bar.groupby_items().to_vec(),
            bar.search_data().interval_mapping,
        )
    };
    let active = MENU_ACTIVE.read().clone();

    rsx! {
        div {
            class: "menu-strip",

            button {
                class: "menu-visibility-toggle",
                class: if filters_visible { "open" },
                onclick: move |_| {
                    BAR.write().toggle_filters_visible();
                },
                if filters_visible { "Hide filters" } else { "Show filters" }
            }

            if filters_visible {
                div {
                    class: "menu-section",
                    span { class: "menu-section-label", "FILTERS" }
                    for item in filter_items.iter() {
                        button {
                            key: "{item.item_id}",
                            class: "menu-item",
                            class: if active.contains(&item.item_id) { "active" },
                            onclick: {
                                let item_id = item.item_id;
                                move |_| toggle_item(Category::Filters, item_id)
                            },
                            "{item.description}"
                        }
                    }
                }

                div {
                    class: "menu-section",
                    span { class: "menu-section-label", "GROUP BY" }
                    for item in groupby_items.iter() {
                        div {
                            key: "{item.item_id}",
                            class: "menu-groupby-entry",
                            button {
                                class: "menu-item",
                            class: if active.contains(&item.item_id) { "active" },
                                onclick: {
                                    let item_id = item.item_id;
                                    move |_| toggle_item(Category::GroupBy, item_id)
                                },
                                "{item.description}"
                            }
                            if item.default_option.is_some() && active.contains(&item.item_id) {
                                IntervalSelect {
                                    item_id: item.item_id,
                                    selected: intervals
                                        .get(&item.field_name)
                                        .copied()
                                        .unwrap_or(Interval::DEFAULT),
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Interval picker next to an active date group-by.
#[component]
fn IntervalSelect(item_id: ItemId, selected: Interval) -> Element {
    rsx! {
        select {
            class: "interval-select",
            onchange: move |e: Event<FormData>| {
                if let Some(interval) = Interval::parse(&e.value()) {
                    BAR.write()
                        .change_item_option(Category::GroupBy, item_id, Some(interval));
                    pump_events();
                }
            },
            for interval in INTERVALS {
                option {
                    value: "{interval.as_str()}",
                    selected: interval == selected,
                    "{interval.label()}"
                }
            }
        }
    }
}

/// Flip the item's visual state and toggle its facet entry. Reconciliation
/// clears the visual state of items whose facet drops out some other way.
fn toggle_item(category: Category, item_id: ItemId) {
    {
        let mut active = MENU_ACTIVE.write();
        if !active.remove(&item_id) {
            active.insert(item_id);
        }
    }
    BAR.write().toggle_menu_item(category, item_id, None);
    pump_events();
}
