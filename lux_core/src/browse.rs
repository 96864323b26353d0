//! The browsing model behind the landing page: theme preference, category
//! and text filtering of event cards, and subscription link rewriting.
//!
//! Nothing in here touches the DOM, the front end feeds it what it reads from
//! the page and applies what it returns.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// Key of the category filter that matches every card.
pub static ALL_CATEGORIES: &str = "all";
static ALL_CATEGORIES_LABEL: &str = "All";

/// Key the theme preference is stored under.
pub static THEME_STORAGE_KEY: &str = "lux-theme";

/// Lowercase, collapse whitespace runs into one space and trim.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

/// Rewrite an `http(s)://` URL to the `webcal://` scheme.
///
/// Anything else, including relative paths, is returned unchanged.
pub fn to_webcal(url: &str) -> String {
    for scheme in ["https://", "http://"] {
        let prefix = url.get(..scheme.len());
        if prefix.is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme)) {
            return format!("webcal://{}", &url[scheme.len()..]);
        }
    }
    String::from(url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// The stored theme if there is a valid one, the default otherwise.
    pub fn from_stored(stored: Option<&str>) -> Self {
        match stored.map(str::trim) {
            Some("light") => Theme::Light,
            Some("dark") => Theme::Dark,
            _ => Theme::default(),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Visible text of the toggle control, naming the theme it switches to.
    pub fn toggle_text(self) -> &'static str {
        match self {
            Theme::Light => "Dark mode",
            Theme::Dark => "Light mode",
        }
    }

    pub fn toggle_label(self) -> &'static str {
        match self {
            Theme::Light => "Switch to dark theme",
            Theme::Dark => "Switch to light theme",
        }
    }

    /// The toggle is a pressed button while the dark theme is active.
    pub fn aria_pressed(self) -> &'static str {
        match self {
            Theme::Light => "false",
            Theme::Dark => "true",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("theme preference cannot be stored: {0}")]
pub struct ThemeStoreError(pub String);

/// Where the theme preference lives between visits.
pub trait ThemeStore {
    fn load(&self) -> Option<String>;
    fn save(&mut self, value: &str) -> Result<(), ThemeStoreError>;
}

/// Theme state plus its persistence.
#[derive(Debug)]
pub struct ThemeController<S: ThemeStore> {
    store: S,
    theme: Theme,
}

impl<S: ThemeStore> ThemeController<S> {
    pub fn new(store: S) -> Self {
        let theme = Theme::from_stored(store.load().as_deref());
        ThemeController { store, theme }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Flip the theme and try to persist it.
    ///
    /// A failing store only costs persistence, the new theme applies anyway.
    pub fn toggle(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        if let Err(err) = self.store.save(self.theme.as_str()) {
            log::debug!("{err}");
        }
        self.theme
    }
}

/// What filtering needs to know about one event card, computed once at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    categories: BTreeSet<String>,
    text: String,
}

impl Card {
    pub fn new<'a>(tags: impl IntoIterator<Item = &'a str>, text: &str) -> Self {
        Card {
            categories: tags
                .into_iter()
                .map(normalize)
                .filter(|key| !key.is_empty())
                .collect(),
            text: normalize(text),
        }
    }

    pub fn has_category(&self, key: &str) -> bool {
        self.categories.contains(key)
    }

    pub fn contains_text(&self, normalized_query: &str) -> bool {
        self.text.contains(normalized_query)
    }
}

/// One filter button: a category key, its display label and how many cards it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub key: String,
    pub label: String,
    pub count: usize,
}

/// All cards of a page in document order, plus the display label of every category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardIndex {
    cards: Vec<Card>,
    labels: BTreeMap<String, String>,
}

impl CardIndex {
    /// Register a card from its tag texts and its full text content.
    pub fn push<'a>(&mut self, tags: impl IntoIterator<Item = &'a str> + Clone, text: &str) {
        for tag in tags.clone() {
            let key = normalize(tag);
            if !key.is_empty() {
                self.labels
                    .entry(key)
                    .or_insert_with(|| tag.split_whitespace().collect::<Vec<&str>>().join(" "));
            }
        }
        self.cards.push(Card::new(tags, text));
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        if key == ALL_CATEGORIES {
            return ALL_CATEGORIES_LABEL;
        }
        self.labels.get(key).map_or(key, String::as_str)
    }

    /// The `all` entry followed by every category sorted by label.
    ///
    /// Counts only include cards matching `state`'s text query, so the buttons
    /// tell how many results a click would show.
    pub fn category_counts(&self, state: &FilterState) -> Vec<CategoryCount> {
        let matching: Vec<&Card> = self
            .cards
            .iter()
            .filter(|card| state.matches_query(card))
            .collect();
        let mut categories: Vec<CategoryCount> = self
            .labels
            .iter()
            .map(|(key, label)| CategoryCount {
                key: key.clone(),
                label: label.clone(),
                count: matching.iter().filter(|card| card.has_category(key)).count(),
            })
            .collect();
        categories.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.key.cmp(&b.key))
        });
        categories.insert(
            0,
            CategoryCount {
                key: String::from(ALL_CATEGORIES),
                label: String::from(ALL_CATEGORIES_LABEL),
                count: matching.len(),
            },
        );
        categories
    }
}

/// Active category and free-text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    active_category: String,
    query: String,
    normalized_query: String,
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState {
            active_category: String::from(ALL_CATEGORIES),
            query: String::new(),
            normalized_query: String::new(),
        }
    }
}

impl FilterState {
    pub fn active_category(&self) -> &str {
        &self.active_category
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = String::from(query.trim());
        self.normalized_query = normalize(query);
    }

    /// Select a category; empty keys select `all`.
    pub fn set_category(&mut self, key: &str) {
        let key = normalize(key);
        self.active_category = if key.is_empty() {
            String::from(ALL_CATEGORIES)
        } else {
            key
        };
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.set_query(query);
        self
    }

    pub fn with_category(mut self, key: &str) -> Self {
        self.set_category(key);
        self
    }

    fn matches_query(&self, card: &Card) -> bool {
        self.normalized_query.is_empty() || card.contains_text(&self.normalized_query)
    }

    fn matches_category(&self, card: &Card) -> bool {
        self.active_category == ALL_CATEGORIES || card.has_category(&self.active_category)
    }

    pub fn is_visible(&self, card: &Card) -> bool {
        self.matches_category(card) && self.matches_query(card)
    }

    /// Visibility of every card of `index`, in document order.
    pub fn visibility(&self, index: &CardIndex) -> Vec<bool> {
        index.cards().iter().map(|card| self.is_visible(card)).collect()
    }

    /// The line shown above the results, e.g. `Showing 3 of 40 events matching "fouer" in Fairs`.
    pub fn summary(&self, index: &CardIndex, visible: usize) -> String {
        let total = index.len();
        let noun = if total == 1 { "event" } else { "events" };
        let mut summary = format!("Showing {visible} of {total} {noun}");
        if !self.query.is_empty() {
            summary.push_str(&format!(" matching \"{}\"", self.query));
        }
        if self.active_category != ALL_CATEGORIES {
            summary.push_str(&format!(" in {}", index.label(&self.active_category)));
        }
        summary
    }
}
