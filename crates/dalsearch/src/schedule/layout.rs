//! Turns conflict reports into grid geometry.
//!
//! Overlapping sessions are split into two half-width columns. The session
//! whose conflicting partner appears earlier in the list takes the right
//! half. Three or more sessions stacked in one slot still only get a 2-way
//! split and may draw on top of each other.

use serde::{Deserialize, Serialize};

use super::conflict::{find_conflict, ConflictReport};
use super::grid::TimeGrid;
use super::store::ScheduleEntry;
use super::types::{ClassSession, Day};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Width {
    Full,
    Half,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Offset {
    Left,
    Right,
}

/// Horizontal placement of one session within its day column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub width: Width,
    pub offset: Offset,
}

/// Whether the grid shows the whole week or a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", content = "day", rename_all = "lowercase")]
pub enum ViewMode {
    Week,
    Day(Day),
}

impl ViewMode {
    /// Days drawn in this view, in column order.
    pub fn days(self) -> Vec<Day> {
        match self {
            ViewMode::Week => Day::ALL.to_vec(),
            ViewMode::Day(day) => vec![day],
        }
    }

    pub fn column_for(self, day: Day) -> usize {
        match self {
            ViewMode::Week => day.index(),
            ViewMode::Day(_) => 0,
        }
    }
}

/// Horizontal placement for the session at `index` given its conflict report.
pub fn layout_for(index: usize, report: &ConflictReport) -> Placement {
    match report.conflict_index {
        None => Placement {
            width: Width::Full,
            offset: Offset::Left,
        },
        Some(other) if other < index => Placement {
            width: Width::Half,
            offset: Offset::Right,
        },
        Some(_) => Placement {
            width: Width::Half,
            offset: Offset::Left,
        },
    }
}

/// Everything the renderer needs to draw one session on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotGeometry {
    pub crn: String,
    pub course: String,
    pub day: Day,
    pub column: usize,
    pub start_row: usize,
    pub end_row: usize,
    /// `(end_row - start_row) * cell_height`
    pub height: u32,
    pub width: Width,
    pub offset: Offset,
    pub color: String,
    pub conflict: ConflictReport,
}

/// Lays out every timed session of `term` for the days shown by `view`.
///
/// Indices used for conflict ordering are positions within the term's
/// entries, so insertion order decides which half a session takes.
/// Sessions starting after the last grid row are not placed; sessions
/// ending after it are clamped to the bottom of the grid.
pub fn layout_view(
    entries: &[ScheduleEntry],
    term: &str,
    view: ViewMode,
    grid: &TimeGrid,
) -> Vec<SlotGeometry> {
    let in_term: Vec<&ScheduleEntry> = entries.iter().filter(|e| e.session.term == term).collect();
    let sessions: Vec<ClassSession> = in_term.iter().map(|e| e.session.clone()).collect();
    let cell_height = grid.config().cell_height;

    let mut slots = Vec::new();
    for day in view.days() {
        for (index, entry) in in_term.iter().enumerate() {
            let session = &entry.session;
            if !session.meets_on(day) {
                continue;
            }
            let Some((start, end)) = session.time.clock_range() else {
                continue;
            };
            let Some(start_row) = grid.row_for(start) else {
                continue;
            };
            let end_row = grid.row_for(end).unwrap_or(grid.num_rows()).max(start_row);

            let conflict = find_conflict(&sessions, index, day);
            let placement = layout_for(index, &conflict);

            slots.push(SlotGeometry {
                crn: session.crn.clone(),
                course: session.course.clone(),
                day,
                column: view.column_for(day),
                start_row,
                end_row,
                height: (end_row - start_row) as u32 * cell_height,
                width: placement.width,
                offset: placement.offset,
                color: entry.color.clone(),
                conflict,
            });
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::{SessionKind, TimeSlot};

    fn entry(crn: &str, days: &[Day], start: &str, end: &str) -> ScheduleEntry {
        ScheduleEntry {
            session: ClassSession {
                term: "202520".to_string(),
                section: "01".to_string(),
                kind: SessionKind::Lecture,
                days: days.to_vec(),
                time: TimeSlot::new(start.parse().unwrap(), end.parse().unwrap()),
                location: String::new(),
                crn: crn.to_string(),
                course: "CSCI2110".to_string(),
            },
            color: "#3498db".to_string(),
        }
    }

    #[test]
    fn test_layout_for_rules() {
        let none = ConflictReport::default();
        assert_eq!(
            layout_for(3, &none),
            Placement { width: Width::Full, offset: Offset::Left }
        );

        let earlier = ConflictReport { conflict_index: Some(1) };
        assert_eq!(
            layout_for(3, &earlier),
            Placement { width: Width::Half, offset: Offset::Right }
        );

        let later = ConflictReport { conflict_index: Some(4) };
        assert_eq!(
            layout_for(3, &later),
            Placement { width: Width::Half, offset: Offset::Left }
        );
    }

    #[test]
    fn test_two_way_split_follows_list_order() {
        let grid = TimeGrid::default();
        let entries = vec![
            entry("A", &[Day::Monday], "0900", "1130"),
            entry("B", &[Day::Monday], "1000", "1030"),
        ];
        let slots = layout_view(&entries, "202520", ViewMode::Day(Day::Monday), &grid);
        assert_eq!(slots.len(), 2);

        assert_eq!(slots[0].crn, "A");
        assert_eq!((slots[0].width, slots[0].offset), (Width::Half, Offset::Left));
        assert_eq!((slots[0].start_row, slots[0].end_row), (2, 7));
        assert_eq!(slots[0].height, 300);

        assert_eq!(slots[1].crn, "B");
        assert_eq!((slots[1].width, slots[1].offset), (Width::Half, Offset::Right));

        // reversing the list swaps the halves
        let reversed: Vec<_> = entries.into_iter().rev().collect();
        let slots = layout_view(&reversed, "202520", ViewMode::Day(Day::Monday), &grid);
        assert_eq!((slots[0].crn.as_str(), slots[0].offset), ("B", Offset::Left));
        assert_eq!((slots[1].crn.as_str(), slots[1].offset), ("A", Offset::Right));
    }

    #[test]
    fn test_week_view_columns_and_full_width() {
        let grid = TimeGrid::default();
        let entries = vec![
            entry("A", &[Day::Monday, Day::Wednesday], "1000", "1050"),
            entry("B", &[Day::Tuesday], "1000", "1050"),
        ];
        let slots = layout_view(&entries, "202520", ViewMode::Week, &grid);
        let cols: Vec<_> = slots.iter().map(|s| (s.crn.as_str(), s.column)).collect();
        assert_eq!(cols, vec![("A", 0), ("B", 1), ("A", 2)]);
        assert!(slots.iter().all(|s| s.width == Width::Full && !s.conflict.has_conflict()));
        assert!(slots.iter().all(|s| s.height == 2 * 60));
    }

    #[test]
    fn test_skips_other_terms_and_async() {
        let grid = TimeGrid::default();
        let mut other_term = entry("B", &[Day::Monday], "1000", "1100");
        other_term.session.term = "202610".to_string();
        let mut online = entry("C", &[Day::Monday], "1000", "1100");
        online.session.time = TimeSlot::asynchronous();

        let entries = vec![entry("A", &[Day::Monday], "1000", "1100"), other_term, online];
        let slots = layout_view(&entries, "202520", ViewMode::Week, &grid);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].width, Width::Full);
    }

    #[test]
    fn test_clamps_and_skips_outside_grid() {
        let grid = TimeGrid::default();
        let entries = vec![
            entry("late-end", &[Day::Friday], "2100", "2300"),
            entry("too-late", &[Day::Friday], "2200", "2300"),
        ];
        let slots = layout_view(&entries, "202520", ViewMode::Day(Day::Friday), &grid);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].crn, "late-end");
        assert_eq!((slots[0].start_row, slots[0].end_row), (26, 28));
    }

    #[test]
    fn test_view_mode_json() {
        let week: ViewMode = serde_json::from_str(r#"{"view":"week"}"#).unwrap();
        assert_eq!(week, ViewMode::Week);
        let day: ViewMode = serde_json::from_str(r#"{"view":"day","day":"R"}"#).unwrap();
        assert_eq!(day, ViewMode::Day(Day::Thursday));
    }
}
