//! Generates the shipped Luxembourg template end to end.

use std::{path::PathBuf, str::FromStr};

use chrono::NaiveDate;
use lux_core::{
    calendar::{build, BuildOptions},
    template::{TemplateFile, DEFAULT_TEMPLATE_PATH},
};

fn template_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(DEFAULT_TEMPLATE_PATH)
}

fn load() -> TemplateFile {
    TemplateFile::load(&template_path()).unwrap()
}

fn date_of(template: &TemplateFile, year: i32, uid: &str) -> Option<NaiveDate> {
    build(template, &BuildOptions::years(year, year))
        .unwrap()
        .events
        .into_iter()
        .find(|event| event.uid == format!("{uid}-{year}@festivities.lu"))
        .map(|event| event.date)
}

#[test]
fn test_shipped_template_is_valid() {
    let template = load();
    assert!(template.events.len() > 20);
    assert!(template.events.iter().any(|event| !event.enabled));
}

#[test]
fn test_public_holidays() {
    let template = load();
    let document = build(&template, &BuildOptions::years(2026, 2028)).unwrap();
    assert_eq!(
        document.name,
        "Luxembourg holidays, festivities and fairs 2026-2028"
    );
    for year in 2026..=2028 {
        let public_holidays = document
            .events
            .iter()
            .filter(|event| event.date.format("%Y").to_string() == year.to_string())
            .filter(|event| event.categories.iter().any(|c| c == "Public holiday"))
            .count();
        assert_eq!(public_holidays, 11, "{year}");
    }
    let enabled = template.events.iter().filter(|event| event.enabled).count();
    assert_eq!(document.events.len(), enabled * 3);
}

#[test]
fn test_resolved_dates() {
    let template = load();
    for (year, uid, expected) in [
        (2025, "easter-monday", "2025-04-21"),
        (2025, "ascension-day", "2025-05-29"),
        (2025, "whit-monday", "2025-06-09"),
        (2026, "buergbrennen", "2026-02-22"),
        (2026, "mothers-day", "2026-05-10"),
        (2026, "national-day", "2026-06-23"),
        (2026, "schueberfouer", "2026-08-28"),
        (2026, "winter-time", "2026-10-25"),
        (2026, "winter-lights", "2026-11-27"),
    ] {
        assert_eq!(
            date_of(&template, year, uid),
            Some(NaiveDate::from_str(expected).unwrap()),
            "{uid}"
        );
    }
    assert_eq!(date_of(&template, 2026, "good-friday"), None);
}

#[test]
fn test_generation_is_deterministic() {
    let options = BuildOptions::years(2026, 2030);
    let first = build(&load(), &options).unwrap().generate();
    let second = build(&load(), &options).unwrap().generate();
    assert_eq!(first, second);
    assert!(!first.contains("good-friday"));
}

#[test]
fn test_generated_lines_are_folded() {
    let ics = build(&load(), &BuildOptions::years(2026, 2030))
        .unwrap()
        .generate();
    assert!(ics.ends_with("\r\n"));
    for line in ics.split_terminator("\r\n") {
        assert!(line.len() <= 75, "{line}");
        assert!(!line.contains('\n'), "{line}");
    }
    let unfolded = ics.replace("\r\n ", "");
    assert!(unfolded.contains("\r\nSUMMARY:Fête de la Musique\r\n"));
}

#[cfg(feature = "publish")]
#[test]
fn test_publish_site() {
    use lux_core::publish::{default_file_name, publish, SiteUrl};

    let document = build(&load(), &BuildOptions::years(2026, 2026)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let site_url = SiteUrl::parse("https://festivities.example.lu").unwrap();
    let report = publish(
        &document,
        dir.path(),
        &default_file_name(2026, 2026),
        Some(&site_url),
    )
    .unwrap();
    assert_eq!(
        report.links.webcal.as_deref(),
        Some("webcal://festivities.example.lu/luxembourg_holidays_festivities_fairs_2026_2026.ics")
    );
    let page = std::fs::read_to_string(&report.page_path).unwrap();
    assert_eq!(
        page.matches("class=\"event-card\"").count(),
        document.events.len()
    );
}
