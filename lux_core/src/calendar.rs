//! Expands event templates over a year range and serializes the result as iCalendar.

use chrono::{Datelike, NaiveDate};
use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEvent, Property},
    ical_param, ical_property,
};
use thiserror::Error;

use crate::{
    rule::{RuleError, FIRST_GREGORIAN_YEAR},
    template::{EventTemplate, TemplateFile},
};

static FORMAT: &str = "%Y%m%d";

/// Maximum length of a physical line in octets, without the line break.
const LINE_OCTETS: usize = 75;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("end year {end} is before start year {start}")]
    InvertedRange { start: i32, end: i32 },
    #[error("year {0} is before 1583, the first year Easter can be computed for")]
    YearBeforeGregorian(i32),
    #[error("template '{id}' cannot be resolved for {year}")]
    Resolve {
        id: String,
        year: i32,
        #[source]
        source: RuleError,
    },
}

/// What to build: the inclusive year range and optional metadata overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub start_year: i32,
    pub end_year: i32,
    pub calname: Option<String>,
    pub caldesc: Option<String>,
    pub prodid: Option<String>,
}

impl BuildOptions {
    pub fn years(start_year: i32, end_year: i32) -> Self {
        BuildOptions {
            start_year,
            end_year,
            ..BuildOptions::default()
        }
    }

    fn check(&self) -> Result<(), BuildError> {
        for year in [self.start_year, self.end_year] {
            if year < FIRST_GREGORIAN_YEAR {
                return Err(BuildError::YearBeforeGregorian(year));
            }
        }
        if self.end_year < self.start_year {
            return Err(BuildError::InvertedRange {
                start: self.start_year,
                end: self.end_year,
            });
        }
        Ok(())
    }
}

/// A template resolved for one year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub uid: String,
    pub date: NaiveDate,
    pub summary: String,
    pub description: String,
    pub categories: Vec<String>,
}

/// Everything that ends up in one calendar file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDocument {
    pub name: String,
    pub description: String,
    pub prod_id: String,
    pub published_ttl: String,
    pub start_year: i32,
    pub end_year: i32,
    pub events: Vec<CalendarEvent>,
}

/// Build the calendar document for all enabled templates.
///
/// Events of a year are ordered by date, ties keep the template order. The
/// first template that cannot be resolved aborts the build.
pub fn build(
    template: &TemplateFile,
    options: &BuildOptions,
) -> Result<CalendarDocument, BuildError> {
    options.check()?;
    let meta = &template.calendar;
    let tokens = |text: &str| replace_range_tokens(text, options.start_year, options.end_year);
    let pick = |value: &Option<String>, fallback: &str| {
        tokens(
            value
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(fallback),
        )
    };

    let mut events = Vec::new();
    for year in options.start_year..=options.end_year {
        let mut yearly = template
            .enabled_events()
            .map(|(index, event)| {
                let date = event.rule.resolve(year).map_err(|source| BuildError::Resolve {
                    id: event.id.clone(),
                    year,
                    source,
                })?;
                Ok((date, index, event))
            })
            .collect::<Result<Vec<(NaiveDate, usize, &EventTemplate)>, BuildError>>()?;
        yearly.sort_by_key(|(date, index, _)| (*date, *index));
        for (date, _, event) in yearly {
            log::debug!("{} resolves to {date}", event.id);
            events.push(CalendarEvent {
                uid: uid(&event.id, date.year(), &meta.uid_domain),
                date,
                summary: tokens(&event.summary),
                description: tokens(&event.description),
                categories: event.categories.clone(),
            });
        }
    }

    Ok(CalendarDocument {
        name: pick(&options.calname, &meta.calname),
        description: pick(&options.caldesc, &meta.caldesc),
        prod_id: pick(&options.prodid, &meta.prodid),
        published_ttl: meta.published_ttl.clone(),
        start_year: options.start_year,
        end_year: options.end_year,
        events,
    })
}

impl CalendarDocument {
    pub fn to_ical(&self) -> IcalCalendar {
        let mut calendar = IcalCalendarBuilder::version("2.0")
            .gregorian()
            .prodid(self.prod_id.clone())
            .build();
        calendar.properties.extend([
            ical_property!("X-WR-CALNAME", escape_text(&self.name)),
            ical_property!("X-WR-CALDESC", escape_text(&self.description)),
            ical_property!("X-PUBLISHED-TTL", &self.published_ttl),
        ]);
        calendar
            .events
            .extend(self.events.iter().map(CalendarEvent::to_ical));
        calendar
    }

    /// The calendar file contents: CRLF line breaks, long lines folded.
    pub fn generate(&self) -> String {
        let calendar = self.to_ical();
        let mut ics = String::new();
        push_line(&mut ics, "BEGIN:VCALENDAR");
        for property in &calendar.properties {
            push_line(&mut ics, &content_line(property));
        }
        for event in &calendar.events {
            push_line(&mut ics, "BEGIN:VEVENT");
            for property in &event.properties {
                push_line(&mut ics, &content_line(property));
            }
            push_line(&mut ics, "END:VEVENT");
        }
        push_line(&mut ics, "END:VCALENDAR");
        ics
    }
}

fn content_line(property: &Property) -> String {
    let mut line = property.name.clone();
    for (name, values) in property.params.iter().flatten() {
        let values = values
            .iter()
            .map(|value| {
                if value.contains([':', ';', ',']) {
                    format!("\"{value}\"")
                } else {
                    value.clone()
                }
            })
            .collect::<Vec<String>>()
            .join(",");
        line.push_str(&format!(";{name}={values}"));
    }
    line.push(':');
    line.push_str(property.value.as_deref().unwrap_or_default());
    line
}

/// Append `line` folded at character boundaries, each physical line ending in CRLF.
fn push_line(ics: &mut String, line: &str) {
    let mut octets = 0;
    for character in line.chars() {
        if octets + character.len_utf8() > LINE_OCTETS {
            ics.push_str("\r\n ");
            octets = 1;
        }
        ics.push(character);
        octets += character.len_utf8();
    }
    ics.push_str("\r\n");
}

impl CalendarEvent {
    pub fn to_ical(&self) -> IcalEvent {
        let start = self.date.format(FORMAT).to_string();
        let end = self
            .date
            .succ_opt()
            .unwrap_or(self.date)
            .format(FORMAT)
            .to_string();
        let mut event = IcalEvent::new();
        event.properties = vec![
            ical_property!("UID", &self.uid),
            // Derived from the event date so that regenerating yields identical files.
            ical_property!("DTSTAMP", format!("{start}T000000Z")),
            ical_property!("DTSTART", &start, ical_param!("VALUE", "DATE")),
            ical_property!("DTEND", end, ical_param!("VALUE", "DATE")),
            ical_property!("SUMMARY", escape_text(&self.summary)),
            ical_property!("DESCRIPTION", escape_text(&self.description)),
            ical_property!(
                "CATEGORIES",
                self.categories
                    .iter()
                    .map(|category| escape_text(category))
                    .collect::<Vec<String>>()
                    .join(",")
            ),
            ical_property!("TRANSP", "TRANSPARENT"),
        ];
        event
    }
}

/// Substitute `{start_year}` and `{end_year}`.
pub fn replace_range_tokens(text: &str, start_year: i32, end_year: i32) -> String {
    text.replace("{start_year}", &start_year.to_string())
        .replace("{end_year}", &end_year.to_string())
}

/// Escape a TEXT value: backslashes, line breaks, semicolons and commas.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(character) = chars.next() {
        match character {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {
                chars.next_if_eq(&'\n');
                escaped.push_str("\\n");
            }
            _ => escaped.push(character),
        }
    }
    escaped
}

/// A stable unique id for a template in a specific year.
///
/// Subscribers match updates by this id, changing it duplicates their events.
fn uid(id: &str, year: i32, domain: &str) -> String {
    let id = id.split_whitespace().collect::<Vec<&str>>().join("-");
    format!("{id}-{year}@{domain}")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;

    use super::*;
    use crate::{
        rule::RecurrenceRule,
        template::{CalendarMeta, EventTemplate},
    };

    fn event(id: &str, summary: &str, rule: RecurrenceRule) -> EventTemplate {
        EventTemplate {
            id: String::from(id),
            summary: String::from(summary),
            description: format!("{summary} in Luxembourg, {{start_year}} edition"),
            categories: vec![String::from("Public holiday")],
            rule,
            enabled: true,
        }
    }

    fn get_test_template() -> TemplateFile {
        TemplateFile {
            calendar: CalendarMeta {
                calname: String::from("Holidays {start_year}-{end_year}"),
                caldesc: String::from("Public holidays; festivities, fairs"),
                prodid: String::from("-//lux//holidays {end_year}//EN"),
                published_ttl: String::from("P1D"),
                uid_domain: String::from("lux.example"),
            },
            events: vec![
                event(
                    "national-day",
                    "National Day",
                    RecurrenceRule::Fixed { month: 6, day: 23 },
                ),
                event(
                    "easter-monday",
                    "Easter Monday",
                    RecurrenceRule::EasterOffset { days: 1 },
                ),
                event(
                    "new-year",
                    "New Year's Day",
                    RecurrenceRule::Fixed { month: 1, day: 1 },
                ),
            ],
        }
    }

    /// Undo line folding and split into content lines.
    fn content_lines(ics: &str) -> Vec<String> {
        ics.replace("\r\n ", "")
            .split_terminator("\r\n")
            .map(String::from)
            .collect()
    }

    fn ymd(value: &str) -> NaiveDate {
        NaiveDate::from_str(value).unwrap()
    }

    #[test]
    fn test_build_orders_events_by_date() {
        let document = build(&get_test_template(), &BuildOptions::years(2025, 2026)).unwrap();
        let resolved: Vec<(&str, NaiveDate)> = document
            .events
            .iter()
            .map(|event| (event.uid.as_str(), event.date))
            .collect();
        assert_eq!(
            resolved,
            vec![
                ("new-year-2025@lux.example", ymd("2025-01-01")),
                ("easter-monday-2025@lux.example", ymd("2025-04-21")),
                ("national-day-2025@lux.example", ymd("2025-06-23")),
                ("new-year-2026@lux.example", ymd("2026-01-01")),
                ("easter-monday-2026@lux.example", ymd("2026-04-06")),
                ("national-day-2026@lux.example", ymd("2026-06-23")),
            ]
        );
    }

    #[test]
    fn test_build_substitutes_tokens() {
        let options = BuildOptions::years(2026, 2028);
        let document = build(&get_test_template(), &options).unwrap();
        assert_eq!(document.name, "Holidays 2026-2028");
        assert_eq!(document.prod_id, "-//lux//holidays 2028//EN");
        assert_eq!(
            document.events[0].description,
            "New Year's Day in Luxembourg, 2026 edition"
        );
        assert_eq!(replace_range_tokens("{end_year}/{end_year}", 1, 2), "2/2");
    }

    #[test]
    fn test_build_overrides() {
        let options = BuildOptions {
            calname: Some(String::from("Feierdeeg {start_year}")),
            caldesc: Some(String::from("  ")),
            ..BuildOptions::years(2026, 2026)
        };
        let document = build(&get_test_template(), &options).unwrap();
        assert_eq!(document.name, "Feierdeeg 2026");
        assert_eq!(document.description, "Public holidays; festivities, fairs");
    }

    #[test]
    fn test_build_disabled_templates() {
        let mut template = get_test_template();
        template.events[1].enabled = false;
        let document = build(&template, &BuildOptions::years(2024, 2028)).unwrap();
        assert_eq!(document.events.len(), 10);
        assert!(document
            .events
            .iter()
            .all(|event| !event.uid.starts_with("easter-monday")));

        template.events[1].enabled = true;
        let document = build(&template, &BuildOptions::years(2024, 2028)).unwrap();
        let easter_mondays = document
            .events
            .iter()
            .filter(|event| event.uid.starts_with("easter-monday"))
            .count();
        assert_eq!(easter_mondays, 5);
    }

    #[test]
    fn test_build_rejects_bad_ranges() {
        let template = get_test_template();
        assert_eq!(
            build(&template, &BuildOptions::years(2027, 2026)),
            Err(BuildError::InvertedRange {
                start: 2027,
                end: 2026
            })
        );
        assert_eq!(
            build(&template, &BuildOptions::years(1500, 2026)),
            Err(BuildError::YearBeforeGregorian(1500))
        );
    }

    #[test]
    fn test_build_fails_with_template_id() {
        let mut template = get_test_template();
        template.events.push(event(
            "leap-day",
            "Leap day",
            RecurrenceRule::Fixed { month: 2, day: 29 },
        ));
        let result = build(&template, &BuildOptions::years(2028, 2029));
        match result {
            Err(BuildError::Resolve { id, year, .. }) => {
                assert_eq!(id, "leap-day");
                assert_eq!(year, 2029);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(
            escape_text("a,b;c\\d\ne\r\nf"),
            "a\\,b\\;c\\\\d\\ne\\nf"
        );
        assert_eq!(escape_text("Fête"), "Fête");
    }

    #[test]
    fn test_uid() {
        assert_eq!(uid("national day", 2026, "local"), "national-day-2026@local");
    }

    #[test]
    fn test_generate() {
        let document = build(&get_test_template(), &BuildOptions::years(2026, 2026)).unwrap();
        let ics = document.generate();
        assert!(ics.ends_with("\r\n"));
        let lines = content_lines(&ics);
        assert_eq!(lines.first().map(String::as_str), Some("BEGIN:VCALENDAR"));
        assert_eq!(lines.last().map(String::as_str), Some("END:VCALENDAR"));
        for expected in [
            "VERSION:2.0",
            "PRODID:-//lux//holidays 2026//EN",
            "CALSCALE:GREGORIAN",
            "X-WR-CALNAME:Holidays 2026-2026",
            "X-WR-CALDESC:Public holidays\\; festivities\\, fairs",
            "X-PUBLISHED-TTL:P1D",
        ] {
            assert!(lines.iter().any(|line| line == expected), "{expected}");
        }
        let begin = lines.iter().filter(|line| *line == "BEGIN:VEVENT").count();
        let end = lines.iter().filter(|line| *line == "END:VEVENT").count();
        assert_eq!((begin, end), (3, 3));

        let national_day: Vec<&String> = lines
            .iter()
            .skip_while(|line| *line != "UID:national-day-2026@lux.example")
            .take_while(|line| *line != "END:VEVENT")
            .collect();
        assert_eq!(
            national_day,
            vec![
                "UID:national-day-2026@lux.example",
                "DTSTAMP:20260623T000000Z",
                "DTSTART;VALUE=DATE:20260623",
                "DTEND;VALUE=DATE:20260624",
                "SUMMARY:National Day",
                "DESCRIPTION:National Day in Luxembourg\\, 2026 edition",
                "CATEGORIES:Public holiday",
                "TRANSP:TRANSPARENT",
            ]
        );
    }

    #[test]
    fn test_generate_multiple_categories() {
        let mut template = get_test_template();
        template.events[0].categories =
            vec![String::from("Festivity"), String::from("Fairs, markets")];
        let document = build(&template, &BuildOptions::years(2026, 2026)).unwrap();
        let lines = content_lines(&document.generate());
        assert!(lines
            .iter()
            .any(|line| line == "CATEGORIES:Festivity,Fairs\\, markets"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let template = get_test_template();
        let options = BuildOptions::years(2024, 2030);
        let first = build(&template, &options).unwrap().generate();
        let second = build(&template, &options).unwrap().generate();
        assert_eq!(first, second);
    }

    #[test]
    fn test_generate_folds_long_lines() {
        let mut template = get_test_template();
        let description = format!(
            "{}é{} Fête de la Musique, Léiffrawëschdag an der Pétrusse {}",
            "a".repeat(62),
            "b".repeat(20),
            "€".repeat(40)
        );
        template.events[0].description = description.clone();
        template.calendar.calname = "Lëtzebuerger Feierdeeg ".repeat(6);
        let document = build(&template, &BuildOptions::years(2026, 2026)).unwrap();
        let ics = document.generate();

        assert!(ics.ends_with("\r\n"));
        let physical: Vec<&str> = ics.split_terminator("\r\n").collect();
        for line in &physical {
            assert!(line.len() <= LINE_OCTETS, "{line}");
            assert!(!line.contains('\n') && !line.contains('\r'), "{line}");
        }
        assert!(physical.iter().any(|line| line.starts_with(' ')));

        let lines = content_lines(&ics);
        assert!(lines
            .iter()
            .any(|line| *line == format!("DESCRIPTION:{}", escape_text(&description))));
        assert!(lines
            .iter()
            .any(|line| *line == format!("X-WR-CALNAME:{}", template.calendar.calname)));
    }

    #[test]
    fn test_push_line() {
        let mut ics = String::new();
        push_line(&mut ics, "SUMMARY:short");
        assert_eq!(ics, "SUMMARY:short\r\n");

        let mut ics = String::new();
        let line = format!("DESCRIPTION:{}", "ë".repeat(60));
        push_line(&mut ics, &line);
        let physical: Vec<&str> = ics.split_terminator("\r\n").collect();
        assert_eq!(physical.len(), 2);
        assert_eq!(physical[0].len(), 74);
        assert!(physical.iter().all(|line| line.len() <= LINE_OCTETS));
        assert_eq!(ics.replace("\r\n ", ""), format!("{line}\r\n"));
    }
}
