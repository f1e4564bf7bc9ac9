//! Facet chip row: one chip per facet, a trailing free-text input, and the
//! autocomplete dropdown with debounced completion lookup.

use dioxus::prelude::*;

use facetbar_core::{AutocompleteState, CompletionSource, Key as BarKey};

use crate::state::*;

#[component]
pub fn FacetRow() -> Element {
    let mut debounce_gen = use_signal(|| 0u64);

    let (chips, input_text, focused, input_index) = {
        let bar = BAR.read();
        let row = bar.row();
        (
            row.chips().to_vec(),
            row.input().text.clone(),
            row.focused(),
            row.input_index(),
        )
    };
    let completion_labels: Vec<String> = COMPLETIONS
        .read()
        .iter()
        .map(|c| c.label.clone())
        .collect();
    let active_completion = *ACTIVE_COMPLETION.read();

    rsx! {
        div {
            class: "facet-row",

            // Search icon
            svg {
                class: "facet-row-icon",
                width: "16",
                height: "16",
                view_box: "0 0 24 24",
                fill: "none",
                stroke: "currentColor",
                stroke_width: "2",
                circle { cx: "11", cy: "11", r: "8" }
                line { x1: "21", y1: "21", x2: "16.65", y2: "16.65" }
            }

            // Chips
            for (i, chip) in chips.iter().enumerate() {
                div {
                    key: "{chip.facet_id}",
                    class: "facet-chip",
                    class: if focused == Some(i) { "focused" },
                    class: if chip.dirty { "dirty" },
                    onclick: move |_| {
                        BAR.write().focus_subview(i);
                    },
                    span { class: "facet-chip-text", "{chip.text}" }
                    button {
                        class: "facet-chip-remove",
                        onclick: {
                            let id = chip.facet_id;
                            move |e: Event<MouseData>| {
                                e.stop_propagation();
                                BAR.write().remove_facet(id);
                                pump_events();
                            }
                        },
                        "\u{00D7}"
                    }
                }
            }

            // Free-text input
            input {
                class: "facet-input",
                class: if focused == Some(input_index) { "focused" },
                r#type: "text",
                placeholder: if chips.is_empty() { "Search..." } else { "" },
                value: "{input_text}",
                autofocus: true,
                onfocus: move |_| {
                    let idx = BAR.read().row().input_index();
                    BAR.write().focus_subview(idx);
                },
                oninput: move |e: Event<FormData>| {
                    let value = e.value();
                    {
                        let mut bar = BAR.write();
                        bar.set_input_text(value.clone());
                        bar.set_cursor(value.chars().count());
                    }

                    if value.trim().is_empty() {
                        close_completions();
                        return;
                    }

                    // Debounce: increment generation, spawn delayed lookup
                    let generation = *debounce_gen.read() + 1;
                    *debounce_gen.write() = generation;

                    spawn(async move {
                        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
                        if *debounce_gen.read() != generation {
                            return;
                        }
                        let items = RecordCompletionSource.complete(&value);
                        let expanded = !items.is_empty();
                        *COMPLETIONS.write() = items;
                        *ACTIVE_COMPLETION.write() = 0;
                        BAR.write().set_autocomplete_state(AutocompleteState {
                            expanded,
                            expandable: false,
                        });
                    });
                },
                onkeydown: on_keydown,
            }
        }

        // Autocomplete dropdown
        if !completion_labels.is_empty() {
            div {
                class: "completion-dropdown",
                for (i, label) in completion_labels.iter().enumerate() {
                    div {
                        key: "{i}",
                        class: "completion-item",
                        class: if i == active_completion { "active" },
                        onclick: move |_| select_completion(i),
                        "{label}"
                    }
                }
            }
        }
    }
}

/// Route key presses: dropdown navigation first, then the core keymap.
/// Keys the bar consumes are withheld from the text field.
fn on_keydown(e: Event<KeyboardData>) {
    match e.key() {
        Key::Enter => {
            if !COMPLETIONS.read().is_empty() {
                e.prevent_default();
                select_completion(*ACTIVE_COMPLETION.read());
            }
        }
        Key::Escape => close_completions(),
        Key::ArrowUp => {
            let count = COMPLETIONS.read().len();
            if count > 0 {
                e.prevent_default();
                let mut idx = ACTIVE_COMPLETION.write();
                *idx = (*idx + count - 1) % count;
            }
        }
        other => {
            let mapped = match other {
                Key::ArrowLeft => Some(BarKey::Left),
                Key::ArrowRight => Some(BarKey::Right),
                Key::ArrowDown => Some(BarKey::Down),
                Key::Backspace => Some(BarKey::Backspace),
                Key::Delete => Some(BarKey::Delete),
                _ => None,
            };
            let Some(key) = mapped else {
                return;
            };
            if BAR.write().handle_key(key) {
                e.prevent_default();
                pump_events();
            } else if key == BarKey::Down {
                // The bar declined: the open dropdown owns Down.
                let count = COMPLETIONS.read().len();
                if count > 0 {
                    e.prevent_default();
                    let mut idx = ACTIVE_COMPLETION.write();
                    *idx = (*idx + 1) % count;
                }
            }
        }
    }
}
