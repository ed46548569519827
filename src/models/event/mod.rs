use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use async_graphql::{ComplexObject, Enum, InputObject, SimpleObject};
use serde::{Serialize, Serializer};
use time::Date;

use crate::error::{RollcallError, RollcallResult};
use crate::models::event::attendance::{AttendanceRecord, AttendanceStatus};
use crate::models::{ActivityId, DateScalar, EventId, UserId};

pub mod attendance;
pub mod registration;

pub const DEFAULT_POINTS_PER_EVENT: i64 = 10;

/// Where an event is in its life.
///
/// Events only ever move forward: the first attendance mark completes them
/// and nothing reopens them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Enum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Completed,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(EventStatus::Scheduled),
            "completed" => Ok(EventStatus::Completed),
            other => Err(format!("unknown event status {}", other)),
        }
    }
}

#[derive(SimpleObject, Serialize, Clone, Debug, PartialEq)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// The ID of the event
    pub id: EventId,
    /// The activity this event is held under
    pub activity_id: ActivityId,
    /// The name of the event
    pub title: String,
    /// General information or details about this event
    pub description: String,
    /// An optional grouping for the event (e.g. "workshop")
    pub category: Option<String>,
    /// When the event starts, as entered by the organizer
    pub time: Option<String>,
    /// Where this event will be held
    pub location: String,
    /// How many students may register, if limited
    pub capacity: Option<i32>,
    /// How many points attending this event is worth
    pub points_per_event: i64,
    /// Whether attendance has been taken yet
    pub status: EventStatus,
    /// The token students can register with instead of the event's ID
    pub registration_token: String,

    /// The day the event is held
    #[graphql(skip)]
    pub date: Date,
    #[graphql(skip)]
    #[serde(serialize_with = "sorted_ids")]
    pub attendees: HashSet<UserId>,
    #[graphql(skip)]
    #[serde(serialize_with = "sorted_records")]
    pub attendance: HashMap<UserId, AttendanceRecord>,
}

#[ComplexObject]
impl Event {
    /// The day the event is held
    pub async fn date(&self) -> DateScalar {
        DateScalar::from(self.date)
    }

    /// The IDs of the students registered for this event
    pub async fn attendees(&self) -> Vec<UserId> {
        self.attendee_ids()
    }

    /// All attendance taken at this event, by student ID
    pub async fn attendance(&self) -> Vec<AttendanceRecord> {
        self.attendance_records()
    }

    /// The attendance for a specific student at this event
    pub async fn attendance_for(&self, student_id: UserId) -> Option<AttendanceRecord> {
        self.record_for(student_id).cloned()
    }

    /// Registration and attendance counts for this event
    pub async fn summary(&self) -> EventSummary {
        EventSummary::for_event(self)
    }
}

impl Event {
    pub fn attendee_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.attendees.iter().copied().collect();
        ids.sort_unstable();

        ids
    }

    pub fn attendance_records(&self) -> Vec<AttendanceRecord> {
        let mut records: Vec<AttendanceRecord> = self.attendance.values().cloned().collect();
        records.sort_by_key(|record| record.student_id);

        records
    }

    pub fn record_for(&self, student_id: UserId) -> Option<&AttendanceRecord> {
        self.attendance.get(&student_id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == EventStatus::Completed
    }

    /// Moves the event to completed, returning whether this call did it.
    pub fn complete(&mut self) -> bool {
        match self.status {
            EventStatus::Scheduled => {
                self.status = EventStatus::Completed;
                true
            }
            EventStatus::Completed => false,
        }
    }

    pub fn apply_update(&mut self, update: EventUpdate) -> RollcallResult<()> {
        if let Some(points) = update.points_per_event {
            let points = validate_points(points)?;
            if points != self.points_per_event && !self.attendance.is_empty() {
                return Err(RollcallError::Rejected(
                    "Points per event cannot change once attendance has been taken".to_owned(),
                ));
            }
            self.points_per_event = points;
        }
        if let Some(capacity) = update.capacity {
            self.capacity = Some(validate_capacity(capacity)?);
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(date) = update.date {
            self.date = date.0;
        }
        if let Some(time) = update.time {
            self.time = Some(time);
        }
        if let Some(location) = update.location {
            self.location = location;
        }

        Ok(())
    }
}

fn validate_points(points: i64) -> RollcallResult<i64> {
    if points > 0 {
        Ok(points)
    } else {
        Err(RollcallError::BadRequest(
            "Points per event must be positive".to_owned(),
        ))
    }
}

fn validate_capacity(capacity: i32) -> RollcallResult<i32> {
    if capacity > 0 {
        Ok(capacity)
    } else {
        Err(RollcallError::BadRequest(
            "Capacity must be positive".to_owned(),
        ))
    }
}

fn sorted_ids<S: Serializer>(ids: &HashSet<UserId>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut ids: Vec<&UserId> = ids.iter().collect();
    ids.sort_unstable();
    serializer.collect_seq(ids)
}

fn sorted_records<S: Serializer>(
    records: &HashMap<UserId, AttendanceRecord>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut records: Vec<&AttendanceRecord> = records.values().collect();
    records.sort_by_key(|record| record.student_id);
    serializer.collect_seq(records)
}

#[derive(InputObject, Clone, Debug)]
pub struct NewEvent {
    pub activity_id: ActivityId,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub date: DateScalar,
    pub time: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    /// Defaults to 10
    pub points_per_event: Option<i64>,
}

impl NewEvent {
    /// Checks the form and fills in defaults for the store to insert.
    pub fn into_draft(self, registration_token: String) -> RollcallResult<EventDraft> {
        if self.title.trim().is_empty() {
            return Err(RollcallError::BadRequest(
                "Events must have a title".to_owned(),
            ));
        }

        Ok(EventDraft {
            activity_id: self.activity_id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            category: self.category,
            date: self.date.0,
            time: self.time,
            location: self.location.unwrap_or_default(),
            capacity: self.capacity.map(validate_capacity).transpose()?,
            points_per_event: validate_points(
                self.points_per_event.unwrap_or(DEFAULT_POINTS_PER_EVENT),
            )?,
            registration_token,
        })
    }
}

/// A validated event that has not been given an ID yet.
#[derive(Clone, Debug)]
pub struct EventDraft {
    pub activity_id: ActivityId,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub date: Date,
    pub time: Option<String>,
    pub location: String,
    pub capacity: Option<i32>,
    pub points_per_event: i64,
    pub registration_token: String,
}

impl EventDraft {
    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            activity_id: self.activity_id,
            title: self.title,
            description: self.description,
            category: self.category,
            time: self.time,
            location: self.location,
            capacity: self.capacity,
            points_per_event: self.points_per_event,
            status: EventStatus::Scheduled,
            registration_token: self.registration_token,
            date: self.date,
            attendees: HashSet::new(),
            attendance: HashMap::new(),
        }
    }
}

/// Changes to an event; absent fields are left alone.
#[derive(InputObject, Clone, Debug, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub date: Option<DateScalar>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub points_per_event: Option<i64>,
}

#[derive(SimpleObject, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// How many students registered
    pub registered: i64,
    /// How many students were marked present
    pub present: i64,
    /// How many students were marked absent
    pub absent: i64,
    /// Present students as a percentage of registered ones, to two decimals
    pub attendance_rate: f64,
}

impl EventSummary {
    pub fn for_event(event: &Event) -> Self {
        let registered = event.attendees.len() as i64;
        let present = event
            .attendance
            .values()
            .filter(|record| record.status == AttendanceStatus::Present)
            .count() as i64;
        let absent = event.attendance.len() as i64 - present;
        let attendance_rate = if registered > 0 {
            (present as f64 / registered as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        Self {
            registered,
            present,
            absent,
            attendance_rate,
        }
    }
}
