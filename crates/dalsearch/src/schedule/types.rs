/// Types for class sessions and their meeting times
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Sentinel used by the catalog for sessions without a fixed meeting time.
pub const ASYNC_SENTINEL: &str = "C/D";

/// A teaching day. Sunday is never scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    #[serde(rename = "M")]
    Monday,
    #[serde(rename = "T")]
    Tuesday,
    #[serde(rename = "W")]
    Wednesday,
    #[serde(rename = "R")]
    Thursday,
    #[serde(rename = "F")]
    Friday,
    #[serde(rename = "S")]
    Saturday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    /// Single-letter code used in the catalog (`M T W R F S`).
    pub fn code(self) -> &'static str {
        match self {
            Day::Monday => "M",
            Day::Tuesday => "T",
            Day::Wednesday => "W",
            Day::Thursday => "R",
            Day::Friday => "F",
            Day::Saturday => "S",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }

    /// Column of this day in the week grid.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Maps a Monday-based ordinal (0 = Monday .. 6 = Sunday) to a day.
    ///
    /// Sunday and anything past it yield `None`.
    pub fn from_ordinal(ordinal: usize) -> Option<Day> {
        Day::ALL.get(ordinal).copied()
    }

    pub fn from_code(code: &str) -> Option<Day> {
        Day::ALL.into_iter().find(|d| d.code() == code)
    }

    /// Weekday as understood by `chrono`.
    pub fn weekday(self) -> chrono::Weekday {
        match self {
            Day::Monday => chrono::Weekday::Mon,
            Day::Tuesday => chrono::Weekday::Tue,
            Day::Wednesday => chrono::Weekday::Wed,
            Day::Thursday => chrono::Weekday::Thu,
            Day::Friday => chrono::Weekday::Fri,
            Day::Saturday => chrono::Weekday::Sat,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("expected a 4-digit HHMM time, got {0:?}")]
    Format(String),

    #[error("time {0:?} is out of range")]
    Range(String),
}

/// A wall-clock time on the 24-hour clock, written as `"HHMM"`.
///
/// Field order makes the derived ordering match numeric order, which is the
/// same order as comparing the zero-padded strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn minutes_since_midnight(self) -> u32 {
        self.hour as u32 * 60 + self.minute as u32
    }

    /// 12-hour display form, e.g. `"1:05 PM"`. Hours 0 and 12 display as 12.
    pub fn to_12_hour(self) -> String {
        let meridiem = if self.hour < 12 { "AM" } else { "PM" };
        let hour = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", hour, self.minute, meridiem)
    }
}

impl FromStr for ClockTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeParseError::Format(s.to_string()));
        }
        let hour: u8 = s[..2]
            .parse()
            .map_err(|_| TimeParseError::Format(s.to_string()))?;
        let minute: u8 = s[2..]
            .parse()
            .map_err(|_| TimeParseError::Format(s.to_string()))?;
        ClockTime::new(hour, minute).ok_or_else(|| TimeParseError::Range(s.to_string()))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.hour, self.minute)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Either end of a meeting: a clock time, or `"C/D"` for asynchronous delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Time {
    Clock(ClockTime),
    Asynchronous,
}

impl TryFrom<String> for Time {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == ASYNC_SENTINEL {
            Ok(Time::Asynchronous)
        } else {
            value.parse().map(Time::Clock)
        }
    }
}

impl From<Time> for String {
    fn from(value: Time) -> Self {
        match value {
            Time::Clock(t) => t.to_string(),
            Time::Asynchronous => ASYNC_SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: Time,
    pub end: Time,
}

impl TimeSlot {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self {
            start: Time::Clock(start),
            end: Time::Clock(end),
        }
    }

    pub fn asynchronous() -> Self {
        Self {
            start: Time::Asynchronous,
            end: Time::Asynchronous,
        }
    }

    /// The start/end pair, if both ends are fixed clock times.
    pub fn clock_range(&self) -> Option<(ClockTime, ClockTime)> {
        match (self.start, self.end) {
            (Time::Clock(start), Time::Clock(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn is_asynchronous(&self) -> bool {
        self.clock_range().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    #[serde(rename = "Lec")]
    Lecture,
    #[serde(rename = "Tut")]
    Tutorial,
    #[serde(rename = "Lab")]
    Lab,
}

impl SessionKind {
    /// Infers the kind from a section code: `T..` is a tutorial, `B..` a lab.
    pub fn from_section(section: &str) -> Self {
        match section.chars().next() {
            Some('T') => SessionKind::Tutorial,
            Some('B') => SessionKind::Lab,
            _ => SessionKind::Lecture,
        }
    }
}

/// One scheduled meeting pattern of one course section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSession {
    /// Opaque term code, e.g. "202520"
    pub term: String,
    /// Section code, e.g. "T01"
    pub section: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub days: Vec<Day>,
    pub time: TimeSlot,
    /// Empty when the catalog has no room (missing or `null`)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,
    /// Course registration number; the unique key of a session
    pub crn: String,
    /// Subject + number, e.g. "CSCI1100"
    pub course: String,
}

/// Reads an optional string, treating `null` like a missing field.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ClassSession {
    pub fn meets_on(&self, day: Day) -> bool {
        self.days.contains(&day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_parse_and_display() {
        let t: ClockTime = "0905".parse().unwrap();
        assert_eq!(t.hour(), 9);
        assert_eq!(t.minute(), 5);
        assert_eq!(t.to_string(), "0905");
        assert_eq!(t.minutes_since_midnight(), 545);
    }

    #[test]
    fn test_clock_time_rejects_malformed() {
        assert!(matches!("9:05".parse::<ClockTime>(), Err(TimeParseError::Format(_))));
        assert!(matches!("abcd".parse::<ClockTime>(), Err(TimeParseError::Format(_))));
        assert!(matches!("2460".parse::<ClockTime>(), Err(TimeParseError::Range(_))));
    }

    #[test]
    fn test_clock_order_matches_string_order() {
        let times = ["0000", "0830", "0905", "1000", "1230", "2359"];
        for pair in times.windows(2) {
            let a: ClockTime = pair[0].parse().unwrap();
            let b: ClockTime = pair[1].parse().unwrap();
            assert!(a < b);
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_session_json_shape() {
        let json = r#"{
            "term": "202520",
            "section": "T01",
            "type": "Tut",
            "days": ["M", "R"],
            "time": { "start": "1005", "end": "1125" },
            "location": "Goldberg 127",
            "crn": "21345",
            "course": "CSCI1100"
        }"#;
        let session: ClassSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.kind, SessionKind::Tutorial);
        assert_eq!(session.days, vec![Day::Monday, Day::Thursday]);
        assert!(session.meets_on(Day::Thursday));
        assert!(!session.meets_on(Day::Friday));

        let back = serde_json::to_value(&session).unwrap();
        assert_eq!(back["time"]["start"], "1005");
        assert_eq!(back["type"], "Tut");
        assert_eq!(back["days"][1], "R");
    }

    #[test]
    fn test_null_or_missing_location_is_empty() {
        let with_null = r#"{"term": "202520", "section": "01", "type": "Lec", "days": ["M"],
            "time": {"start": "1005", "end": "1125"}, "location": null,
            "crn": "21345", "course": "CSCI1100"}"#;
        let session: ClassSession = serde_json::from_str(with_null).unwrap();
        assert_eq!(session.location, "");

        let without = with_null.replace(r#""location": null,"#, "");
        let session: ClassSession = serde_json::from_str(&without).unwrap();
        assert_eq!(session.location, "");
    }

    #[test]
    fn test_async_sentinel() {
        let slot: TimeSlot = serde_json::from_str(r#"{"start":"C/D","end":"C/D"}"#).unwrap();
        assert!(slot.is_asynchronous());
        assert_eq!(slot, TimeSlot::asynchronous());
        assert_eq!(serde_json::to_string(&slot).unwrap(), r#"{"start":"C/D","end":"C/D"}"#);
    }

    #[test]
    fn test_day_ordinals() {
        assert_eq!(Day::from_ordinal(0), Some(Day::Monday));
        assert_eq!(Day::from_ordinal(5), Some(Day::Saturday));
        assert_eq!(Day::from_ordinal(6), None);
        assert_eq!(Day::from_code("R"), Some(Day::Thursday));
        assert_eq!(Day::Thursday.index(), 3);
    }

    #[test]
    fn test_kind_from_section() {
        assert_eq!(SessionKind::from_section("T01"), SessionKind::Tutorial);
        assert_eq!(SessionKind::from_section("B02"), SessionKind::Lab);
        assert_eq!(SessionKind::from_section("01"), SessionKind::Lecture);
    }
}
