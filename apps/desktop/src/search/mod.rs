//! Search panel — facet chip row + autocomplete dropdown + menu strip.

mod facet_row;
mod menu_strip;

use dioxus::prelude::*;
use facet_row::FacetRow;
use menu_strip::MenuStrip;

use crate::state::pump_events;

/// Search panel spanning the full width of the content area.
#[component]
pub fn SearchPanel() -> Element {
    // Flush the events queued by default-filter loading on first render.
    use_hook(pump_events);

    rsx! {
        div {
            class: "search-panel",
            FacetRow {}
            MenuStrip {}
        }
    }
}
