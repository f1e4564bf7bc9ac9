//! Root application component — search bar on top, payload panel below.

use dioxus::prelude::*;

use crate::search::SearchPanel;
use crate::state::*;

static VARIABLES_CSS: Asset = asset!("/assets/styles/variables.css");
static APP_CSS: Asset = asset!("/assets/styles/app.css");

#[component]
pub fn App() -> Element {
    rsx! {
        document::Stylesheet { href: VARIABLES_CSS }
        document::Stylesheet { href: APP_CSS }

        div {
            class: "app-shell",

            // Titlebar (drag region)
            div {
                class: "titlebar",
                span { class: "titlebar-title", "FacetBar" }
            }

            // Main content area
            div {
                class: "content-area",

                SearchPanel {}

                PayloadPanel {}
            }

            StatusBar {}
        }
    }
}

/// Pretty-printed view of the last dispatched search payload.
#[component]
fn PayloadPanel() -> Element {
    let last = LAST_SEARCH.read();

    let Some(ref data) = *last else {
        return rsx! {
            div {
                class: "payload-empty",
                span { "Toggle a filter or type to search..." }
            }
        };
    };

    let rendered =
        serde_json::to_string_pretty(data).unwrap_or_else(|_| "<unserializable>".to_string());

    rsx! {
        div {
            class: "payload-panel",
            div { class: "payload-header", "Search payload" }
            pre { class: "payload-json", "{rendered}" }
        }
    }
}

/// Status bar at the bottom of the app
#[component]
fn StatusBar() -> Element {
    let bar = BAR.read();
    let search_count = SEARCH_COUNT.read();

    let facet_count = bar.query().len();
    let chip_count = bar.row().chips().len();

    rsx! {
        div {
            class: "statusbar",
            span { class: "statusbar-facets", "{facet_count} facets" }
            span { class: "statusbar-sep", "|" }
            span { class: "statusbar-chips", "{chip_count} chips" }
            span { class: "statusbar-sep", "|" }
            span { class: "statusbar-searches", "{search_count} searches" }
        }
    }
}
