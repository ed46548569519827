use std::fmt;
use std::str::FromStr;

use async_graphql::{ComplexObject, Enum, SimpleObject};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{RollcallError, RollcallResult};
use crate::models::event::attendance::Marking;
use crate::models::event::Event;
use crate::models::{ActivityId, DateTime, EventId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Coordinator,
    Student,
}

impl Role {
    /// Admins and coordinators run events and take attendance.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Coordinator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Coordinator => "coordinator",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "coordinator" => Ok(Role::Coordinator),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role {}", other)),
        }
    }
}

/// One credited event in a student's history.
#[derive(SimpleObject, Serialize, Clone, Debug, PartialEq)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceLogEntry {
    /// The event the points were earned at
    pub event_id: EventId,
    /// The activity that event belongs to
    pub activity_id: ActivityId,
    /// How many points the event was worth
    pub points_earned: i64,

    #[graphql(skip)]
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[ComplexObject]
impl AttendanceLogEntry {
    /// When the student was marked present
    pub async fn date(&self) -> DateTime {
        DateTime::from(self.date)
    }
}

#[derive(SimpleObject, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID
    pub id: UserId,
    /// The user's full name
    pub name: String,
    /// The user's email, which must be unique
    pub email: String,
    /// What the user is allowed to do
    pub role: Role,
    /// The user's point balance, never below zero
    pub points: i64,
    /// Every event the user is currently credited as present for, oldest first
    pub attendance_records: Vec<AttendanceLogEntry>,
}

impl User {
    pub fn ensure_staff(&self, action: &str) -> RollcallResult<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(RollcallError::Forbidden(format!(
                "Only admin or coordinator can {}",
                action
            )))
        }
    }

    /// Users may act on their own behalf, staff may act for anyone.
    pub fn ensure_acting_for(&self, student_id: UserId) -> RollcallResult<()> {
        if self.id == student_id || self.role.is_staff() {
            Ok(())
        } else {
            Err(RollcallError::Forbidden(
                "You can only register yourself for events".to_owned(),
            ))
        }
    }

    pub fn log_entry_for(&self, event_id: EventId) -> Option<&AttendanceLogEntry> {
        self.attendance_records
            .iter()
            .find(|entry| entry.event_id == event_id)
    }

    /// Applies the point and history side of an attendance mark on `event`.
    pub fn apply_marking(&mut self, event: &Event, marking: &Marking, at: OffsetDateTime) {
        if marking.points_delta > 0 {
            self.credit(event, marking.points_delta, at);
        } else if marking.points_delta < 0 {
            self.debit(event.id, -marking.points_delta);
        }
    }

    fn credit(&mut self, event: &Event, points: i64, at: OffsetDateTime) {
        self.points += points;

        if self.log_entry_for(event.id).is_none() {
            self.attendance_records.push(AttendanceLogEntry {
                event_id: event.id,
                activity_id: event.activity_id,
                points_earned: points,
                date: at,
            });
        }
    }

    // The floor swallows whatever the balance could not cover; a later
    // credit does not give it back.
    fn debit(&mut self, event_id: EventId, points: i64) {
        self.points = (self.points - points).max(0);
        self.attendance_records
            .retain(|entry| entry.event_id != event_id);
    }
}

#[cfg(test)]
mod tests {
    use crate::models::event::attendance::AttendanceStatus;
    use crate::tests::mock::{mock_admin, mock_event, mock_student};
    use crate::util::current_time;

    use super::Role;

    #[test]
    fn only_admins_and_coordinators_are_staff() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Coordinator.is_staff());
        assert!(!Role::Student.is_staff());
        assert!(mock_student().ensure_staff("mark attendance").is_err());
        assert!(mock_admin().ensure_staff("mark attendance").is_ok());
    }

    #[test]
    fn students_register_only_themselves() {
        let student = mock_student();

        assert!(student.ensure_acting_for(student.id).is_ok());
        assert!(student.ensure_acting_for(student.id + 1).is_err());
        assert!(mock_admin().ensure_acting_for(student.id).is_ok());
    }

    #[test]
    fn debit_is_floored_at_zero() {
        let now = current_time();
        let mut event = mock_event();
        let mut student = mock_student();

        let marking = event.mark(student.id, AttendanceStatus::Present, now);
        student.apply_marking(&event, &marking, now);
        student.points = 5;

        let marking = event.mark(student.id, AttendanceStatus::Absent, now);
        student.apply_marking(&event, &marking, now);

        assert_eq!(student.points, 0);
        assert!(student.attendance_records.is_empty());
    }

    #[test]
    fn credit_keeps_one_entry_per_event() {
        let now = current_time();
        let event = mock_event();
        let mut student = mock_student();

        student.credit(&event, 10, now);
        student.credit(&event, 10, now);

        assert_eq!(student.attendance_records.len(), 1);
        assert_eq!(student.log_entry_for(event.id).unwrap().points_earned, 10);
    }

    #[test]
    fn roles_round_trip_through_their_names() {
        for role in [Role::Admin, Role::Coordinator, Role::Student] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("owner".parse::<Role>().is_err());
    }
}
