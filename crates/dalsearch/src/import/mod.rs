/// Timetable import from the student-records portal
///
/// The portal renders a student's week as an HTML grid. Each populated day
/// cell holds an anchor whose lines (split on `<br>`) are:
///
/// ```text
/// CSCI 2110-T01
/// 30211 Class
/// 1:35 pm-2:25 pm
/// Kenneth Rowe 1020
/// ```
mod cache;
mod client;
mod error;

pub use cache::{CacheStats, CircuitBreaker, ImportCache, ImportCacheState, SessionKey};
pub use client::{Credentials, PortalClient, PortalConfig, SessionToken};
pub use error::ImportError;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::schedule::{ClassSession, ClockTime, Day, SessionKind, TimeSlot};

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.datadisplaytable").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static TIME_RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2}):(\d{2})\s*([ap]m)?\s*-\s*(\d{1,2}):(\d{2})\s*([ap]m)?").unwrap()
});

/// How 12-hour portal times are turned into 24-hour clock times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeridiemPolicy {
    /// Use the am/pm marker: `12 am` is midnight, pm hours below 12 get +12.
    #[default]
    Respect,
    /// Add 12 to every hour below 12, ignoring the marker.
    ///
    /// Matches the portal scraper this service replaced, which treated every
    /// class as an afternoon class.
    AlwaysAfternoon,
}

/// One populated day cell of the portal timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSessionRecord {
    pub day: Day,
    pub subject: String,
    pub course_number: String,
    pub section: String,
    pub crn: String,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub location: String,
}

/// Parses the portal timetable page with [`MeridiemPolicy::Respect`].
pub fn parse_timetable(html: &str) -> Result<Vec<RawSessionRecord>, ImportError> {
    parse_timetable_with(html, MeridiemPolicy::Respect)
}

/// Parses the portal timetable page into one record per session per day.
///
/// # Returns
/// * `Ok(records)` - possibly empty if the table has no classes
/// * `Err(ImportError::TableNotFound)` - if the page has no schedule table
pub fn parse_timetable_with(
    html: &str,
    policy: MeridiemPolicy,
) -> Result<Vec<RawSessionRecord>, ImportError> {
    let document = Html::parse_document(html);
    let table = document
        .select(&TABLE_SELECTOR)
        .next()
        .ok_or(ImportError::TableNotFound)?;

    let mut records = Vec::new();
    // rows still covered by a rowspan from an earlier row, per column
    let mut covered: Vec<usize> = Vec::new();

    for row in table.select(&ROW_SELECTOR) {
        let mut column = 0;
        for cell in row.select(&CELL_SELECTOR) {
            while covered.get(column).is_some_and(|rows| *rows > 0) {
                column += 1;
            }
            let rowspan = cell
                .value()
                .attr("rowspan")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(1);
            if covered.len() <= column {
                covered.resize(column + 1, 0);
            }
            // this row is counted by the decrement below
            covered[column] = rowspan;

            let cell_column = column;
            column += 1;

            let Some(anchor) = cell.select(&ANCHOR_SELECTOR).next() else {
                continue;
            };
            let Some(day) = Day::from_ordinal(cell_column) else {
                debug!(column = cell_column, "Skipping class outside Monday-Saturday");
                continue;
            };
            match parse_anchor(anchor, day, policy) {
                Some(record) => records.push(record),
                None => warn!(
                    day = %day,
                    text = %anchor.text().collect::<String>(),
                    "Skipping malformed timetable cell"
                ),
            }
        }

        for rows in covered.iter_mut() {
            *rows = rows.saturating_sub(1);
        }
    }

    info!("Parsed {} timetable records", records.len());
    Ok(records)
}

/// Splits an anchor's content into trimmed lines at `<br>` elements.
fn anchor_lines(anchor: ElementRef) -> Vec<String> {
    let mut lines = vec![String::new()];
    for child in anchor.children() {
        match child.value() {
            Node::Text(text) => {
                if let Some(line) = lines.last_mut() {
                    line.push_str(text);
                }
            }
            Node::Element(el) if el.name() == "br" => lines.push(String::new()),
            Node::Element(_) => {
                if let (Some(el), Some(line)) = (ElementRef::wrap(child), lines.last_mut()) {
                    line.extend(el.text());
                }
            }
            _ => {}
        }
    }
    lines.into_iter().map(|l| l.trim().to_string()).collect()
}

fn parse_anchor(anchor: ElementRef, day: Day, policy: MeridiemPolicy) -> Option<RawSessionRecord> {
    let lines = anchor_lines(anchor);
    if lines.len() < 3 {
        return None;
    }

    let (course, section) = lines[0].split_once('-')?;
    let mut course_parts = course.split_whitespace();
    let subject = course_parts.next()?.to_string();
    let course_number = course_parts.next()?.to_string();
    let section = section.trim().to_string();

    let crn = lines[1].split_whitespace().next()?.to_string();

    let (start_time, end_time) = parse_time_range(&lines[2], policy)?;
    let location = lines.get(3).cloned().unwrap_or_default();

    Some(RawSessionRecord {
        day,
        subject,
        course_number,
        section,
        crn,
        start_time,
        end_time,
        location,
    })
}

/// Parses `"h:mm am-h:mm pm"` into a start/end pair.
fn parse_time_range(text: &str, policy: MeridiemPolicy) -> Option<(ClockTime, ClockTime)> {
    let caps = TIME_RANGE_REGEX.captures(text)?;
    let start = to_24_hour(
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        caps.get(3).map(|m| m.as_str()),
        policy,
    )?;
    let end = to_24_hour(
        caps.get(4)?.as_str(),
        caps.get(5)?.as_str(),
        caps.get(6).map(|m| m.as_str()),
        policy,
    )?;
    Some((start, end))
}

fn to_24_hour(
    hour: &str,
    minute: &str,
    meridiem: Option<&str>,
    policy: MeridiemPolicy,
) -> Option<ClockTime> {
    let hour: u8 = hour.parse().ok()?;
    let minute: u8 = minute.parse().ok()?;
    let hour = match policy {
        MeridiemPolicy::AlwaysAfternoon if hour < 12 => hour + 12,
        MeridiemPolicy::AlwaysAfternoon => hour,
        MeridiemPolicy::Respect => match meridiem.map(str::to_ascii_lowercase).as_deref() {
            Some("pm") if hour < 12 => hour + 12,
            Some("am") if hour == 12 => 0,
            _ => hour,
        },
    };
    ClockTime::new(hour, minute)
}

/// Folds per-day records into sessions, one per CRN in first-seen order.
///
/// Every record for a CRN is assumed to share its time and location; the
/// first one seen wins.
pub fn fold_records(records: Vec<RawSessionRecord>, term: &str) -> Vec<ClassSession> {
    let mut sessions: Vec<ClassSession> = Vec::new();
    for record in records {
        if let Some(existing) = sessions.iter_mut().find(|s| s.crn == record.crn) {
            if !existing.days.contains(&record.day) {
                existing.days.push(record.day);
            }
            continue;
        }
        sessions.push(ClassSession {
            term: term.to_string(),
            kind: SessionKind::from_section(&record.section),
            course: format!("{}{}", record.subject, record.course_number),
            days: vec![record.day],
            time: TimeSlot::new(record.start_time, record.end_time),
            location: record.location,
            section: record.section,
            crn: record.crn,
        });
    }
    sessions
}
