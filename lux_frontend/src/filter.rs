//! Category filter buttons and text search over the event cards.

use std::rc::Rc;

use lux_core::browse::{CardIndex, FilterState};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Document, Element, Event, HtmlInputElement, NodeList};
use yew::prelude::*;

#[derive(Debug, Clone, Default, PartialEq)]
struct Filter(FilterState);

enum FilterAction {
    Query(String),
    Category(String),
}

impl Reducible for Filter {
    type Action = FilterAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut state = self.0.clone();
        match action {
            FilterAction::Query(query) => state.set_query(&query),
            FilterAction::Category(key) => state.set_category(&key),
        }
        Rc::new(Filter(state))
    }
}

#[derive(Properties, PartialEq)]
pub struct FilterBarProps {
    /// Computed once from the cards when mounting.
    pub index: Rc<CardIndex>,
    /// The `.event-card` elements, in the order of `index`.
    pub cards: Rc<Vec<Element>>,
    pub search: Option<HtmlInputElement>,
    pub results: Option<Element>,
}

#[function_component]
pub fn FilterBar(props: &FilterBarProps) -> Html {
    let filter = use_reducer_eq(Filter::default);

    {
        let filter = filter.clone();
        use_effect_with_deps(
            move |search: &Option<HtmlInputElement>| {
                let listener = search.clone().map(|input| {
                    let restored = input.value();
                    if !restored.trim().is_empty() {
                        filter.dispatch(FilterAction::Query(restored));
                    }
                    let target = input.clone();
                    let on_input = Closure::<dyn Fn(Event)>::new(move |_: Event| {
                        filter.dispatch(FilterAction::Query(target.value()));
                    });
                    if let Err(err) = input
                        .add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())
                    {
                        log::warn!("search unavailable: {err:?}");
                    }
                    (input, on_input)
                });
                move || {
                    if let Some((input, on_input)) = listener {
                        if let Err(err) = input.remove_event_listener_with_callback(
                            "input",
                            on_input.as_ref().unchecked_ref(),
                        ) {
                            log::debug!("cannot detach search listener: {err:?}");
                        }
                    }
                }
            },
            props.search.clone(),
        );
    }

    {
        let index = props.index.clone();
        let cards = props.cards.clone();
        let results = props.results.clone();
        use_effect_with_deps(
            move |filter: &Filter| {
                let visibility = filter.0.visibility(&index);
                for (card, visible) in cards.iter().zip(&visibility) {
                    let result = if *visible {
                        card.remove_attribute("hidden")
                    } else {
                        card.set_attribute("hidden", "")
                    };
                    if let Err(err) = result {
                        log::debug!("cannot toggle card: {err:?}");
                    }
                }
                if let Some(results) = &results {
                    let shown = visibility.iter().filter(|visible| **visible).count();
                    results.set_text_content(Some(&filter.0.summary(&index, shown)));
                }
                || ()
            },
            (*filter).clone(),
        );
    }

    let counts = props.index.category_counts(&filter.0);
    html! {
        <div class="filter-buttons" role="group" aria-label="Filter by category">
            { for counts.into_iter().map(|count| {
                let active = count.key == filter.0.active_category();
                let onclick = {
                    let filter = filter.clone();
                    let key = count.key.clone();
                    Callback::from(move |_: MouseEvent| {
                        filter.dispatch(FilterAction::Category(key.clone()))
                    })
                };
                html! {
                    <button
                        type="button"
                        class={classes!("filter-button", active.then_some("active"))}
                        aria-pressed={if active { "true" } else { "false" }}
                        data-category={count.key}
                        {onclick}
                    >
                        { format!("{} ({})", count.label, count.count) }
                    </button>
                }
            }) }
        </div>
    }
}

/// Index the event cards and render the filter bar into `#category-filters`.
///
/// Pages without that container or without cards are left alone.
pub fn mount(document: &Document) {
    let Some(container) = document.get_element_by_id("category-filters") else {
        log::debug!("no #category-filters, filtering disabled");
        return;
    };
    let cards = elements(document.query_selector_all(".event-card"));
    if cards.is_empty() {
        return;
    }

    let mut index = CardIndex::default();
    for card in &cards {
        let tags: Vec<String> = elements(card.query_selector_all(".event-tag"))
            .iter()
            .filter_map(|tag| tag.text_content())
            .collect();
        index.push(
            tags.iter().map(String::as_str),
            &card.text_content().unwrap_or_default(),
        );
    }
    log::info!("indexed {} event cards", index.len());

    let search = document
        .get_element_by_id("event-search")
        .and_then(|element| element.dyn_into::<HtmlInputElement>().ok());
    let props = FilterBarProps {
        index: Rc::new(index),
        cards: Rc::new(cards),
        search,
        results: document.get_element_by_id("results-count"),
    };
    yew::Renderer::<FilterBar>::with_root_and_props(container, props).render();
}

fn elements(nodes: Result<NodeList, JsValue>) -> Vec<Element> {
    let Ok(nodes) = nodes else {
        return Vec::new();
    };
    (0..nodes.length())
        .filter_map(|position| nodes.get(position))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}
