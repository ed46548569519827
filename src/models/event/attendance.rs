//! The attendance ledger embedded in each event.
//!
//! Marking a student moves their (student, event) pair through
//! unmarked -> {present, absent}, toggling between the two afterwards. Each
//! move yields a [Marking] that says how the student's balance and history
//! must follow, so the event ledger and the student never disagree about
//! which events earned points.

use std::fmt;
use std::str::FromStr;

use async_graphql::{ComplexObject, Enum, SimpleObject};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::event::Event;
use crate::models::{DateTime, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            other => Err(format!("unknown attendance status {}", other)),
        }
    }
}

#[derive(SimpleObject, Serialize, Clone, Debug, PartialEq)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// The student this attendance belongs to
    pub student_id: UserId,
    /// Whether the student was there
    pub status: AttendanceStatus,
    /// The points this attendance is currently worth
    pub points_awarded: i64,

    #[graphql(skip)]
    #[serde(with = "time::serde::rfc3339")]
    pub marked_at: OffsetDateTime,
}

#[ComplexObject]
impl AttendanceRecord {
    /// When the status last changed
    pub async fn marked_at(&self) -> DateTime {
        DateTime::from(self.marked_at)
    }
}

impl AttendanceRecord {
    fn new(
        student_id: UserId,
        status: AttendanceStatus,
        points_per_event: i64,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            student_id,
            status,
            points_awarded: points_for(status, points_per_event),
            marked_at: at,
        }
    }
}

/// What pointsAwarded must be for a record in `status`.
pub fn points_for(status: AttendanceStatus, points_per_event: i64) -> i64 {
    match status {
        AttendanceStatus::Present => points_per_event,
        AttendanceStatus::Absent => 0,
    }
}

/// How a mark moved a student's attendance at one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Enum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// The student had no attendance yet
    Created,
    /// The student was already marked with the requested status
    Unchanged,
    /// absent -> present
    Credited,
    /// present -> absent
    Debited,
}

impl Transition {
    pub fn between(previous: Option<AttendanceStatus>, requested: AttendanceStatus) -> Self {
        match (previous, requested) {
            (None, _) => Transition::Created,
            (Some(previous), requested) if previous == requested => Transition::Unchanged,
            (Some(_), AttendanceStatus::Present) => Transition::Credited,
            (Some(_), AttendanceStatus::Absent) => Transition::Debited,
        }
    }

    pub fn is_mutating(self) -> bool {
        self != Transition::Unchanged
    }
}

/// The result of marking one student on one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marking {
    pub transition: Transition,
    pub status: AttendanceStatus,
    /// Nominal change to the student's balance, before the zero floor
    pub points_delta: i64,
    /// Whether this mark moved the event from scheduled to completed
    pub completed_event: bool,
}

impl Marking {
    pub fn is_mutating(&self) -> bool {
        self.transition.is_mutating()
    }
}

impl Event {
    /// Records `requested` for the student and completes the event if this
    /// is its first mark. Repeating the current status changes nothing.
    pub fn mark(
        &mut self,
        student_id: UserId,
        requested: AttendanceStatus,
        at: OffsetDateTime,
    ) -> Marking {
        let points_per_event = self.points_per_event;
        let previous = self.record_for(student_id).map(|record| record.status);
        let transition = Transition::between(previous, requested);

        let points_delta = match transition {
            Transition::Created => points_for(requested, points_per_event),
            Transition::Unchanged => 0,
            Transition::Credited => points_per_event,
            Transition::Debited => -points_per_event,
        };

        if transition.is_mutating() {
            let record = self.attendance.entry(student_id).or_insert_with(|| {
                AttendanceRecord::new(student_id, requested, points_per_event, at)
            });
            record.status = requested;
            record.points_awarded = points_for(requested, points_per_event);
            record.marked_at = at;
        }

        let completed_event = transition.is_mutating() && self.complete();

        Marking {
            transition,
            status: requested,
            points_delta,
            completed_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Transition;
    use crate::models::event::EventStatus;
    use crate::tests::mock::mock_event;
    use crate::util::current_time;

    use super::AttendanceStatus::{Absent, Present};

    #[test]
    fn transitions_cover_every_pair() {
        assert_eq!(Transition::between(None, Present), Transition::Created);
        assert_eq!(Transition::between(None, Absent), Transition::Created);
        assert_eq!(Transition::between(Some(Present), Present), Transition::Unchanged);
        assert_eq!(Transition::between(Some(Absent), Absent), Transition::Unchanged);
        assert_eq!(Transition::between(Some(Absent), Present), Transition::Credited);
        assert_eq!(Transition::between(Some(Present), Absent), Transition::Debited);
    }

    #[test]
    fn first_present_mark_awards_points_and_completes() {
        let mut event = mock_event();
        let marking = event.mark(7, Present, current_time());

        assert_eq!(marking.transition, Transition::Created);
        assert_eq!(marking.points_delta, 10);
        assert!(marking.completed_event);
        assert_eq!(event.status, EventStatus::Completed);
        assert_eq!(event.record_for(7).unwrap().points_awarded, 10);
    }

    #[test]
    fn first_absent_mark_awards_nothing_but_still_completes() {
        let mut event = mock_event();
        let marking = event.mark(7, Absent, current_time());

        assert_eq!(marking.points_delta, 0);
        assert!(marking.completed_event);
        assert_eq!(event.record_for(7).unwrap().points_awarded, 0);
    }

    #[test]
    fn repeated_mark_is_a_no_op() {
        let mut event = mock_event();
        let first = current_time();
        event.mark(7, Present, first);
        let before = event.clone();

        let marking = event.mark(7, Present, current_time());

        assert_eq!(marking.transition, Transition::Unchanged);
        assert_eq!(marking.points_delta, 0);
        assert!(!marking.completed_event);
        assert_eq!(event, before);
    }

    #[test]
    fn toggling_keeps_points_awarded_derivable() {
        let mut event = mock_event();
        let now = current_time();

        event.mark(7, Present, now);
        let debit = event.mark(7, Absent, now);
        assert_eq!(debit.transition, Transition::Debited);
        assert_eq!(debit.points_delta, -10);
        assert_eq!(event.record_for(7).unwrap().points_awarded, 0);

        let credit = event.mark(7, Present, now);
        assert_eq!(credit.transition, Transition::Credited);
        assert_eq!(credit.points_delta, 10);
        assert!(!credit.completed_event);
        assert_eq!(event.record_for(7).unwrap().points_awarded, 10);
        assert_eq!(event.attendance.len(), 1);
    }

    #[test]
    fn students_are_marked_independently() {
        let mut event = mock_event();
        let now = current_time();

        assert_eq!(event.mark(1, Present, now).points_delta, 10);
        assert_eq!(event.mark(2, Present, now).points_delta, 10);
        assert_eq!(event.attendance.len(), 2);
    }
}
