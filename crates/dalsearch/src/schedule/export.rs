/// iCalendar export of selected sessions
use chrono::{Datelike, Duration, NaiveDate};

use super::types::{ClassSession, Day};

const PRODUCT_ID: &str = "-//DalSearch//Schedule Export//EN";

/// First calendar day of a term, from a `YYYYTT` code.
///
/// `10` is fall (starts the September before the named year), `20` winter
/// and `30` summer. Unknown suffixes fall back to September of the named year.
pub fn term_start_date(term: &str) -> Option<NaiveDate> {
    let year: i32 = term.get(0..4)?.parse().ok()?;
    match term.get(4..6)? {
        "10" => NaiveDate::from_ymd_opt(year - 1, 9, 1),
        "20" => NaiveDate::from_ymd_opt(year, 1, 6),
        "30" => NaiveDate::from_ymd_opt(year, 5, 1),
        _ => NaiveDate::from_ymd_opt(year, 9, 1),
    }
}

/// The first date on or after `from` that falls on `day`.
pub fn next_occurrence(from: NaiveDate, day: Day) -> NaiveDate {
    let current = from.weekday().num_days_from_monday() as i64;
    let target = day.weekday().num_days_from_monday() as i64;
    from + Duration::days((target - current + 7) % 7)
}

fn rrule_day(day: Day) -> &'static str {
    match day {
        Day::Monday => "MO",
        Day::Tuesday => "TU",
        Day::Wednesday => "WE",
        Day::Thursday => "TH",
        Day::Friday => "FR",
        Day::Saturday => "SA",
    }
}

/// Text values must escape `\`, `;`, `,` and newlines (RFC 5545 §3.3.11).
fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Longest content line in octets, excluding the CRLF (RFC 5545 §3.1).
const MAX_LINE_OCTETS: usize = 75;

/// Splits a content line into CRLF-terminated physical lines of at most
/// 75 octets. Continuations start with a space, which counts toward the limit.
/// Splits never fall inside a UTF-8 character.
fn fold_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3 + 2);
    let mut width = 0;
    for ch in line.chars() {
        if width + ch.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += ch.len_utf8();
    }
    out.push_str("\r\n");
    out
}

fn to_event(session: &ClassSession, time_zone: &str) -> Option<String> {
    let (start, end) = session.time.clock_range()?;
    let first_day = *session.days.iter().min()?;
    let term_start = term_start_date(&session.term)?;
    let date = next_occurrence(term_start, first_day).format("%Y%m%d");

    let mut days = session.days.clone();
    days.sort();
    days.dedup();
    let by_day = days.iter().map(|d| rrule_day(*d)).collect::<Vec<_>>().join(",");
    let day_codes = days.iter().map(|d| d.code()).collect::<Vec<_>>().join(",");
    let kind = serde_json::to_value(session.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    let lines = [
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}-{}@dalsearch", session.crn, session.term),
        format!("DTSTART;TZID={time_zone}:{date}T{start}00"),
        format!("DTEND;TZID={time_zone}:{date}T{end}00"),
        format!("RRULE:FREQ=WEEKLY;BYDAY={by_day}"),
        format!("LOCATION:{}", escape_text(&session.location)),
        format!(
            "SUMMARY:{}",
            escape_text(&format!("{} - {}", session.course, session.section))
        ),
        format!(
            "DESCRIPTION:{}",
            escape_text(&format!(
                "Type: {kind}\nDays: {day_codes}\nLocation: {}",
                session.location
            ))
        ),
        "END:VEVENT".to_string(),
    ];
    Some(lines.iter().map(|line| fold_line(line)).collect())
}

/// Renders a VCALENDAR with one weekly event per timed session.
///
/// Asynchronous sessions and sessions without days are left out.
pub fn to_ics<'a>(sessions: impl IntoIterator<Item = &'a ClassSession>, time_zone: &str) -> String {
    let mut out = String::new();
    let product = format!("PRODID:{PRODUCT_ID}");
    for line in ["BEGIN:VCALENDAR", "VERSION:2.0", product.as_str()] {
        out.push_str(&fold_line(line));
    }
    for session in sessions {
        if let Some(event) = to_event(session, time_zone) {
            out.push_str(&event);
        }
    }
    out.push_str(&fold_line("END:VCALENDAR"));
    out
}
