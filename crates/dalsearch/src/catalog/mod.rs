//! Course catalog snapshot and filtering.
//!
//! The snapshot is a JSON object keyed by `SUBJECT+NUMBER` (e.g. `"CSCI2110"`),
//! each value a [`Course`] with its sections for every offered term.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::schedule::{null_as_empty, ClassSession, ScheduleEntry, PALETTE};

/// Catalog locations that are not physical rooms.
const EXCLUDED_ROOMS: [&str; 3] = [
    " C/D, C/D",
    "Online-ASYNCHRONOUS SESSION",
    "Online-SYNCHRONOUS SESSION",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub enrolled: u32,
    pub capacity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Course {
    pub prerequisites: Vec<String>,
    pub equivalent: Option<String>,
    pub subject_code: String,
    pub course_code: String,
    pub title: String,
    pub credit_hours: f64,
    #[serde(deserialize_with = "null_as_empty")]
    pub description: String,
    pub term_classes: Vec<ClassSession>,
    #[serde(deserialize_with = "null_as_empty")]
    pub location: String,
    // the snapshot spells it this way
    pub enrollement: Enrollment,
    pub instructors_by_term: BTreeMap<String, Vec<String>>,
}

impl Course {
    /// `SUBJECT+NUMBER`, the catalog key.
    pub fn code(&self) -> String {
        format!("{}{}", self.subject_code, self.course_code)
    }

    /// Course level bucket: first digit of the number followed by `000`.
    pub fn level(&self) -> Option<String> {
        self.course_code
            .chars()
            .next()
            .filter(char::is_ascii_digit)
            .map(|d| format!("{d}000"))
    }
}

/// Catalog filter. `None` on a set means "no restriction".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseFilter {
    pub search_term: String,
    pub terms: Option<HashSet<String>>,
    pub course_levels: Option<HashSet<String>>,
    pub subject_codes: Option<HashSet<String>>,
    pub credit_hours: Option<Vec<f64>>,
}

impl CourseFilter {
    pub fn matches(&self, course: &Course) -> bool {
        let keyword = self.search_term.trim().to_lowercase();
        let keyword_match = keyword.is_empty()
            || course.title.to_lowercase().contains(&keyword)
            || course.subject_code.to_lowercase().contains(&keyword)
            || course.course_code.to_lowercase().contains(&keyword);
        if !keyword_match {
            return false;
        }

        if let Some(terms) = &self.terms {
            if !course.term_classes.iter().any(|s| terms.contains(&s.term)) {
                return false;
            }
        }
        if let Some(levels) = &self.course_levels {
            if !course.level().is_some_and(|level| levels.contains(&level)) {
                return false;
            }
        }
        if let Some(subjects) = &self.subject_codes {
            if !subjects.contains(&course.subject_code) {
                return false;
            }
        }
        if let Some(hours) = &self.credit_hours {
            if !hours.iter().any(|h| (h - course.credit_hours).abs() < f64::EPSILON) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderKey {
    #[default]
    Title,
    CreditHours,
    NumClasses,
    CourseCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct CourseOrderBy {
    pub key: OrderKey,
    pub direction: Direction,
}

impl CourseOrderBy {
    fn compare(&self, a: &Course, b: &Course) -> Ordering {
        let ordering = match self.key {
            OrderKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            OrderKey::CreditHours => a.credit_hours.total_cmp(&b.credit_hours),
            OrderKey::NumClasses => a.term_classes.len().cmp(&b.term_classes.len()),
            OrderKey::CourseCode => a.code().cmp(&b.code()),
        };
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

/// Final exam slot for one section of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamData {
    /// Section number as written in the exam schedule, e.g. `"1"`
    pub section: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub time: String,
}

/// Final exam schedule keyed by course code.
#[derive(Debug, Clone, Default)]
pub struct ExamSchedule {
    by_course: HashMap<String, Vec<ExamData>>,
}

impl ExamSchedule {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let exams = Self::from_json(&raw)?;
        info!(path = %path.display(), courses = exams.by_course.len(), "Loaded exam schedule");
        Ok(exams)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let by_course: HashMap<String, Vec<ExamData>> = serde_json::from_str(raw)?;
        Ok(Self {
            by_course: by_course
                .into_iter()
                .map(|(code, exams)| (code.to_uppercase(), exams))
                .collect(),
        })
    }

    /// The exam for a session's section.
    ///
    /// Exam sections are matched on the second character of the section
    /// code, so `"01"` looks up exam section `"1"`.
    pub fn exam_for(&self, session: &ClassSession) -> Option<&ExamData> {
        let section = session.section.get(1..2)?;
        self.by_course
            .get(&session.course.to_uppercase())?
            .iter()
            .find(|exam| exam.section == section)
    }
}

/// In-memory course catalog keyed by course code.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    courses: BTreeMap<String, Course>,
    exams: ExamSchedule,
}

impl Catalog {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&raw)?;
        info!(path = %path.display(), courses = catalog.len(), "Loaded course catalog");
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let courses: BTreeMap<String, Course> = serde_json::from_str(raw)?;
        Ok(Self {
            courses: courses
                .into_iter()
                .map(|(code, course)| (code.to_uppercase(), course))
                .collect(),
            exams: ExamSchedule::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// Looks up a course by code, case-insensitively.
    pub fn get(&self, code: &str) -> Option<&Course> {
        self.courses.get(&code.trim().to_uppercase())
    }

    /// Finds the section with the given CRN in any course.
    pub fn find_session(&self, crn: &str) -> Option<&ClassSession> {
        self.courses
            .values()
            .flat_map(|course| course.term_classes.iter())
            .find(|session| session.crn == crn)
    }

    pub fn with_exams(mut self, exams: ExamSchedule) -> Self {
        self.exams = exams;
        self
    }

    pub fn exam_for(&self, session: &ClassSession) -> Option<&ExamData> {
        self.exams.exam_for(session)
    }

    /// Timed sessions grouped by their room, in room-name order.
    ///
    /// Sessions without a location, with an online or `C/D` location, or
    /// without fixed clock times are left out.
    pub fn sessions_by_room(&self) -> BTreeMap<&str, Vec<&ClassSession>> {
        let mut rooms: BTreeMap<&str, Vec<&ClassSession>> = BTreeMap::new();
        for session in self.courses.values().flat_map(|c| c.term_classes.iter()) {
            let room = session.location.as_str();
            if room.trim().is_empty()
                || EXCLUDED_ROOMS.contains(&room)
                || session.time.clock_range().is_none()
            {
                continue;
            }
            rooms.entry(room).or_default().push(session);
        }
        rooms
    }

    /// A room's sessions as colourable schedule entries, for the layout engine.
    pub fn room_entries(&self, room: &str) -> Vec<ScheduleEntry> {
        self.sessions_by_room()
            .remove(room)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, session)| ScheduleEntry {
                session: session.clone(),
                color: PALETTE[i % PALETTE.len()].to_string(),
            })
            .collect()
    }

    /// Returns at most `limit` matching courses in the requested order.
    ///
    /// Ties keep course-code order.
    pub fn filter(&self, filter: &CourseFilter, order_by: CourseOrderBy, limit: usize) -> Vec<&Course> {
        let mut matched: Vec<&Course> = self
            .courses
            .values()
            .filter(|course| filter.matches(course))
            .collect();
        matched.sort_by(|a, b| order_by.compare(a, b));
        matched.truncate(limit);
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "CSCI2110": {
            "prerequisites": ["CSCI1110"],
            "equivalent": null,
            "subjectCode": "CSCI",
            "courseCode": "2110",
            "title": "Data Structures and Algorithms",
            "creditHours": 3,
            "description": "Fundamental data structures.",
            "termClasses": [
                {"term": "202520", "section": "01", "type": "Lec", "days": ["M", "W"],
                 "time": {"start": "1305", "end": "1425"}, "location": "Dunn 135",
                 "crn": "30200", "course": "CSCI2110"},
                {"term": "202520", "section": "T01", "type": "Tut", "days": ["T"],
                 "time": {"start": "1335", "end": "1425"}, "location": "Kenneth Rowe 1020",
                 "crn": "30211", "course": "CSCI2110"}
            ],
            "location": "Halifax",
            "enrollement": {"enrolled": 120, "capacity": 150},
            "instructorsByTerm": {"202520": ["A. Smith"]}
        },
        "MATH1000": {
            "subjectCode": "MATH",
            "courseCode": "1000",
            "title": "Differential and Integral Calculus I",
            "creditHours": 6,
            "termClasses": [
                {"term": "202610", "section": "01", "type": "Lec", "days": ["M", "W", "F"],
                 "time": {"start": "0835", "end": "0925"}, "location": "Chase 319",
                 "crn": "10234", "course": "MATH1000"}
            ]
        },
        "CSCI4141": {
            "subjectCode": "CSCI",
            "courseCode": "4141",
            "title": "Information Retrieval",
            "creditHours": 3,
            "termClasses": [
                {"term": "202610", "section": "01", "type": "Lec", "days": ["T", "R"],
                 "time": {"start": "C/D", "end": "C/D"}, "location": "Online",
                 "crn": "14141", "course": "CSCI4141"}
            ]
        }
    }"#;

    fn catalog() -> Catalog {
        Catalog::from_json(SNAPSHOT).unwrap()
    }

    fn codes(courses: &[&Course]) -> Vec<String> {
        courses.iter().map(|c| c.code()).collect()
    }

    #[test]
    fn test_get_and_find_session() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("csci2110").unwrap().title, "Data Structures and Algorithms");
        assert!(catalog.get("CSCI9999").is_none());

        let session = catalog.find_session("30211").unwrap();
        assert_eq!(session.course, "CSCI2110");
        assert_eq!(session.section, "T01");
        assert!(catalog.find_session("00000").is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let math = catalog().get("MATH1000").cloned().unwrap();
        assert!(math.prerequisites.is_empty());
        assert_eq!(math.enrollement, Enrollment::default());
        assert_eq!(math.level().as_deref(), Some("1000"));
    }

    #[test]
    fn test_keyword_filter() {
        let catalog = catalog();
        let filter = CourseFilter {
            search_term: "  DATA ".to_string(),
            ..Default::default()
        };
        let found = catalog.filter(&filter, CourseOrderBy::default(), 100);
        assert_eq!(codes(&found), vec!["CSCI2110"]);

        let filter = CourseFilter {
            search_term: "csci".to_string(),
            ..Default::default()
        };
        assert_eq!(catalog.filter(&filter, CourseOrderBy::default(), 100).len(), 2);
    }

    #[test]
    fn test_set_filters() {
        let catalog = catalog();
        let filter = CourseFilter {
            terms: Some(HashSet::from(["202610".to_string()])),
            course_levels: Some(HashSet::from(["4000".to_string()])),
            ..Default::default()
        };
        assert_eq!(codes(&catalog.filter(&filter, CourseOrderBy::default(), 100)), vec!["CSCI4141"]);

        let filter = CourseFilter {
            subject_codes: Some(HashSet::from(["MATH".to_string()])),
            credit_hours: Some(vec![6.0]),
            ..Default::default()
        };
        assert_eq!(codes(&catalog.filter(&filter, CourseOrderBy::default(), 100)), vec!["MATH1000"]);

        let filter = CourseFilter {
            credit_hours: Some(vec![1.5]),
            ..Default::default()
        };
        assert!(catalog.filter(&filter, CourseOrderBy::default(), 100).is_empty());
    }

    #[test]
    fn test_ordering_and_limit() {
        let catalog = catalog();
        let all = CourseFilter::default();

        let by_title = catalog.filter(&all, CourseOrderBy::default(), 100);
        assert_eq!(codes(&by_title), vec!["CSCI2110", "MATH1000", "CSCI4141"]);

        let by_classes_desc = CourseOrderBy {
            key: OrderKey::NumClasses,
            direction: Direction::Desc,
        };
        assert_eq!(catalog.filter(&all, by_classes_desc, 1)[0].code(), "CSCI2110");

        let by_hours_desc = CourseOrderBy {
            key: OrderKey::CreditHours,
            direction: Direction::Desc,
        };
        assert_eq!(
            codes(&catalog.filter(&all, by_hours_desc, 100)),
            vec!["MATH1000", "CSCI2110", "CSCI4141"]
        );

        let by_code = CourseOrderBy {
            key: OrderKey::CourseCode,
            direction: Direction::Asc,
        };
        assert_eq!(
            codes(&catalog.filter(&all, by_code, 2)),
            vec!["CSCI2110", "CSCI4141"]
        );
    }

    #[test]
    fn test_order_by_deserializes() {
        let order: CourseOrderBy =
            serde_json::from_str(r#"{"key": "numClasses", "direction": "desc"}"#).unwrap();
        assert_eq!(order.key, OrderKey::NumClasses);
        assert_eq!(order.direction, Direction::Desc);
    }

    #[test]
    fn test_null_locations_load() {
        let raw = r#"{
            "CSCI1100": {
                "subjectCode": "CSCI", "courseCode": "1100", "title": "Intro",
                "creditHours": 3, "location": null, "description": null,
                "termClasses": [
                    {"term": "202520", "section": "01", "type": "Lec", "days": ["M"],
                     "time": {"start": "1005", "end": "1125"}, "location": null,
                     "crn": "11111", "course": "CSCI1100"}
                ]
            }
        }"#;
        let catalog = Catalog::from_json(raw).unwrap();
        let course = catalog.get("CSCI1100").unwrap();
        assert_eq!(course.location, "");
        assert_eq!(course.term_classes[0].location, "");
        assert!(catalog.sessions_by_room().is_empty());
    }

    #[test]
    fn test_sessions_by_room_skips_online_and_untimed() {
        let cat = catalog();
        let rooms = cat.sessions_by_room();
        let names: Vec<&str> = rooms.keys().copied().collect();
        assert_eq!(names, vec!["Chase 319", "Dunn 135", "Kenneth Rowe 1020"]);
        assert_eq!(rooms["Dunn 135"][0].crn, "30200");

        let raw = r#"{
            "DISC1000": {
                "subjectCode": "DISC", "courseCode": "1000", "title": "Online",
                "termClasses": [
                    {"term": "202520", "section": "01", "type": "Lec", "days": ["M"],
                     "time": {"start": "1005", "end": "1125"},
                     "location": "Online-SYNCHRONOUS SESSION", "crn": "1", "course": "DISC1000"},
                    {"term": "202520", "section": "02", "type": "Lec", "days": ["M"],
                     "time": {"start": "1005", "end": "1125"},
                     "location": " C/D, C/D", "crn": "2", "course": "DISC1000"}
                ]
            }
        }"#;
        assert!(Catalog::from_json(raw).unwrap().sessions_by_room().is_empty());
    }

    #[test]
    fn test_room_entries_are_colored_in_order() {
        let entries = catalog().room_entries("Chase 319");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session.crn, "10234");
        assert_eq!(entries[0].color, PALETTE[0]);
        assert!(catalog().room_entries("Nowhere 000").is_empty());
    }

    #[test]
    fn test_exam_lookup_by_section_digit() {
        let exams = ExamSchedule::from_json(
            r#"{"CSCI2110": [
                {"section": "1", "date": "2025-04-14", "time": "9:00 AM"},
                {"section": "2", "date": "2025-04-16", "time": "2:00 PM"}
            ]}"#,
        )
        .unwrap();
        let catalog = catalog().with_exams(exams);

        let lecture = catalog.find_session("30200").unwrap().clone();
        assert_eq!(catalog.exam_for(&lecture).unwrap().date, "2025-04-14");

        // "T01" reads its second character, which no exam uses
        let tutorial = catalog.find_session("30211").unwrap().clone();
        assert!(catalog.exam_for(&tutorial).is_none());
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            Catalog::load_from_file("/nonexistent/catalog.json"),
            Err(CatalogError::Io { .. })
        ));
        assert!(matches!(Catalog::from_json("[1, 2"), Err(CatalogError::Parse(_))));
    }
}
