//! Pairwise overlap detection between sessions on a single day.

use serde::Serialize;

use super::types::{ClassSession, ClockTime, Day};

/// Result of scanning a session list for conflicts with one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConflictReport {
    /// Lowest list index of another session that overlaps this one
    pub conflict_index: Option<usize>,
}

impl ConflictReport {
    pub fn has_conflict(&self) -> bool {
        self.conflict_index.is_some()
    }
}

/// `a` starts inside `b`, or ends inside `b`, with `b` treated as `[start, end)`.
fn starts_or_ends_within(a: (ClockTime, ClockTime), b: (ClockTime, ClockTime)) -> bool {
    let (a_start, a_end) = a;
    let (b_start, b_end) = b;
    (b_start <= a_start && a_start < b_end) || (b_start < a_end && a_end <= b_end)
}

/// Whether two sessions occupy overlapping time on `day`.
///
/// Both must belong to the same term, meet on `day` and have fixed clock
/// times. Sessions that only touch (one ends when the other starts) do not
/// conflict.
pub fn conflicts_on(a: &ClassSession, b: &ClassSession, day: Day) -> bool {
    if a.term != b.term || !a.meets_on(day) || !b.meets_on(day) {
        return false;
    }
    match (a.time.clock_range(), b.time.clock_range()) {
        (Some(a), Some(b)) => starts_or_ends_within(a, b) || starts_or_ends_within(b, a),
        _ => false,
    }
}

/// Finds the lowest index in `sessions` that conflicts with `sessions[index]` on `day`.
///
/// An out-of-range `index` reports no conflict.
pub fn find_conflict(sessions: &[ClassSession], index: usize, day: Day) -> ConflictReport {
    let Some(session) = sessions.get(index) else {
        return ConflictReport::default();
    };
    let conflict_index = sessions
        .iter()
        .enumerate()
        .filter(|(other_index, _)| *other_index != index)
        .find(|(_, other)| conflicts_on(session, other, day))
        .map(|(other_index, _)| other_index);

    ConflictReport { conflict_index }
}
