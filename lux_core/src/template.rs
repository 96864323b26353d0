//! The editable template file the calendar is generated from.

use std::{
    collections::HashSet,
    fs::read_to_string,
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::rule::{RecurrenceRule, RuleError};

pub static DEFAULT_TEMPLATE_PATH: &str = "luxembourg_activity_templates.json";
static DEFAULT_UID_DOMAIN: &str = "local";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read template file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid template JSON")]
    Json(#[from] serde_json::Error),
    #[error("template must include a non-empty 'events' list")]
    NoEvents,
    #[error("missing or blank '{field}' in {context}")]
    Blank {
        field: &'static str,
        context: String,
    },
    #[error("template '{0}' must define at least one category")]
    NoCategories(String),
    #[error("template id '{0}' is used more than once")]
    DuplicateId(String),
    #[error("invalid rule in template '{id}'")]
    Rule {
        id: String,
        #[source]
        source: RuleError,
    },
}

/// The whole template document: calendar metadata and event definitions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateFile {
    pub calendar: CalendarMeta,
    pub events: Vec<EventTemplate>,
}

/// Calendar-level metadata. Text fields may contain `{start_year}` and `{end_year}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CalendarMeta {
    pub calname: String,
    pub caldesc: String,
    pub prodid: String,
    /// Refresh interval hint for subscribers, e.g. `P1D`.
    pub published_ttl: String,
    /// Right-hand side of every generated UID.
    #[serde(default = "default_uid_domain")]
    pub uid_domain: String,
}

/// One holiday or festivity definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventTemplate {
    #[serde(alias = "uid_base")]
    pub id: String,
    pub summary: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_categories")]
    pub categories: Vec<String>,
    pub rule: RecurrenceRule,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl TemplateFile {
    /// Read and validate a template file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        if !path.exists() {
            return Err(TemplateError::NotFound(path.to_path_buf()));
        }
        let json = read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let template = Self::from_json(&json)?;
        log::debug!(
            "loaded {} event templates from {}",
            template.events.len(),
            path.display()
        );
        Ok(template)
    }

    /// Parse and validate a template document.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let template: TemplateFile = serde_json::from_str(json)?;
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        let meta = &self.calendar;
        for (field, value) in [
            ("calname", &meta.calname),
            ("caldesc", &meta.caldesc),
            ("prodid", &meta.prodid),
            ("published_ttl", &meta.published_ttl),
            ("uid_domain", &meta.uid_domain),
        ] {
            require(field, value, || String::from("calendar"))?;
        }
        if self.events.is_empty() {
            return Err(TemplateError::NoEvents);
        }
        let mut ids = HashSet::new();
        for (index, event) in self.events.iter().enumerate() {
            require("id", &event.id, || format!("events[{index}]"))?;
            require("summary", &event.summary, || format!("event '{}'", event.id))?;
            require("description", &event.description, || {
                format!("event '{}'", event.id)
            })?;
            if event.categories.is_empty() {
                return Err(TemplateError::NoCategories(event.id.clone()));
            }
            if !ids.insert(event.id.as_str()) {
                return Err(TemplateError::DuplicateId(event.id.clone()));
            }
            event.rule.validate().map_err(|source| TemplateError::Rule {
                id: event.id.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// The templates that produce events.
    pub fn enabled_events(&self) -> impl Iterator<Item = (usize, &EventTemplate)> {
        self.events.iter().enumerate().filter(|(_, event)| event.enabled)
    }
}

fn require(
    field: &'static str,
    value: &str,
    context: impl FnOnce() -> String,
) -> Result<(), TemplateError> {
    if value.trim().is_empty() {
        return Err(TemplateError::Blank {
            field,
            context: context(),
        });
    }
    Ok(())
}

fn default_uid_domain() -> String {
    String::from(DEFAULT_UID_DOMAIN)
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CategoriesRepr {
    One(String),
    Many(Vec<String>),
}

/// Accept a single category or a list; blank entries and duplicates are dropped.
fn deserialize_categories<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match CategoriesRepr::deserialize(deserializer)? {
        CategoriesRepr::One(category) => vec![category],
        CategoriesRepr::Many(categories) => categories,
    };
    let mut categories: Vec<String> = Vec::with_capacity(raw.len());
    for category in raw {
        let category = category.trim();
        if !category.is_empty() && !categories.iter().any(|known| known == category) {
            categories.push(String::from(category));
        }
    }
    Ok(categories)
}
