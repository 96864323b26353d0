//! Writes the calendar file and the landing page of the static site.

use std::{
    fmt,
    fs::create_dir_all,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use askama::Template;
use regex::Regex;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::{browse::to_webcal, calendar::CalendarDocument};

static PAGE_NAME: &str = "index.html";
static STYLESHEET_NAME: &str = "style.css";
static STYLESHEET: &str = include_str!("../assets/style.css");
static DATE_LABEL_FORMAT: &str = "%a %-d %B %Y";
static SITE_URL_PATTERN: &str = r"^(?i:https?)://([^/?#\s]+)(/[^?#\s]*)?$";

/// The calendar file name used when none is given.
pub fn default_file_name(start_year: i32, end_year: i32) -> String {
    format!("luxembourg_holidays_festivities_fairs_{start_year}_{end_year}.ics")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid site URL '{0}', expected an absolute http(s) URL")]
pub struct InvalidSiteUrl(String);

/// Base URL the site is served from, stored without scheme and trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrl {
    location: String,
}

impl SiteUrl {
    pub fn parse(raw: &str) -> Result<Self, InvalidSiteUrl> {
        let invalid = || InvalidSiteUrl(String::from(raw));
        let regex = Regex::new(SITE_URL_PATTERN).map_err(|_| invalid())?;
        let captures = regex.captures(raw.trim()).ok_or_else(invalid)?;
        let host = captures.get(1).ok_or_else(invalid)?.as_str();
        let path = captures.get(2).map_or("", |path| path.as_str());
        Ok(SiteUrl {
            location: format!("{host}{}", path.trim_end_matches('/')),
        })
    }

    /// Absolute HTTPS URL of a file published at the site root.
    pub fn https(&self, file_name: &str) -> String {
        format!("https://{}/{file_name}", self.location)
    }

    /// The same URL with the calendar subscription scheme.
    pub fn webcal(&self, file_name: &str) -> String {
        to_webcal(&self.https(file_name))
    }
}

impl FromStr for SiteUrl {
    type Err = InvalidSiteUrl;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        SiteUrl::parse(raw)
    }
}

impl fmt::Display for SiteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}", self.location)
    }
}

/// Links pointing to the published calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionLinks {
    /// Target of the subscribe and download links, relative without a site URL.
    pub href: String,
    pub webcal: Option<String>,
}

impl SubscriptionLinks {
    pub fn new(file_name: &str, site_url: Option<&SiteUrl>) -> Self {
        match site_url {
            Some(site_url) => SubscriptionLinks {
                href: site_url.https(file_name),
                webcal: Some(site_url.webcal(file_name)),
            },
            None => SubscriptionLinks {
                href: String::from(file_name),
                webcal: None,
            },
        }
    }
}

/// The files written by [`publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub calendar_path: PathBuf,
    pub page_path: PathBuf,
    pub stylesheet_path: PathBuf,
    pub links: SubscriptionLinks,
}

struct EventCard<'a> {
    date: String,
    date_label: String,
    summary: &'a str,
    description: &'a str,
    categories: &'a Vec<String>,
}

#[derive(Template)]
#[template(path = "index.html")]
struct LandingPage<'a> {
    title: &'a str,
    description: &'a str,
    start_year: i32,
    end_year: i32,
    subscribe_href: &'a str,
    download_href: &'a str,
    stylesheet: &'a str,
    cards: Vec<EventCard<'a>>,
}

/// Render the landing page listing every event of `document`.
pub fn render_landing_page(
    document: &CalendarDocument,
    links: &SubscriptionLinks,
) -> Result<String> {
    let page = LandingPage {
        title: &document.name,
        description: &document.description,
        start_year: document.start_year,
        end_year: document.end_year,
        subscribe_href: links.webcal.as_deref().unwrap_or(&links.href),
        download_href: &links.href,
        stylesheet: STYLESHEET_NAME,
        cards: document
            .events
            .iter()
            .map(|event| EventCard {
                date: event.date.format("%Y-%m-%d").to_string(),
                date_label: event.date.format(DATE_LABEL_FORMAT).to_string(),
                summary: &event.summary,
                description: &event.description,
                categories: &event.categories,
            })
            .collect(),
    };
    let html = page.render().context("failed to render the landing page")?;
    Ok(html)
}

/// Write the calendar file, replacing any previous version atomically.
pub fn write_calendar(document: &CalendarDocument, path: &Path) -> Result<()> {
    write_atomic(path, &document.generate())?;
    log::info!(
        "wrote {} with {} events for {}-{}",
        path.display(),
        document.events.len(),
        document.start_year,
        document.end_year
    );
    Ok(())
}

/// Write the calendar, the landing page and the stylesheet into `site_dir`.
///
/// Everything is rendered before the first file is touched.
pub fn publish(
    document: &CalendarDocument,
    site_dir: &Path,
    file_name: &str,
    site_url: Option<&SiteUrl>,
) -> Result<PublishReport> {
    let links = SubscriptionLinks::new(file_name, site_url);
    let calendar = document.generate();
    let page = render_landing_page(document, &links)?;

    let report = PublishReport {
        calendar_path: site_dir.join(file_name),
        page_path: site_dir.join(PAGE_NAME),
        stylesheet_path: site_dir.join(STYLESHEET_NAME),
        links,
    };
    write_atomic(&report.calendar_path, &calendar)?;
    write_atomic(&report.page_path, &page)?;
    write_atomic(&report.stylesheet_path, STYLESHEET)?;
    log::info!(
        "published {} events to {}",
        document.events.len(),
        site_dir.display()
    );
    Ok(report)
}

/// Write through a temporary file in the destination directory and rename it over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut file = NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed to create a temporary file in {}", dir.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    // Temporary files are private, published files have to be world readable.
    #[cfg(unix)]
    {
        use std::{fs::Permissions, os::unix::fs::PermissionsExt};
        file.as_file()
            .set_permissions(Permissions::from_mode(0o644))
            .with_context(|| format!("failed to set permissions of {}", path.display()))?;
    }
    file.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}
