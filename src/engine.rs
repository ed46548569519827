//! The operations the API exposes, run against a [LedgerStore].
//!
//! Every operation that changes an event holds that event's lock from the
//! first read to the last write, so concurrent marks and registrations on one
//! event apply one after another. Marks also hold the student's lock, taken
//! after the event's, so marks for one student on different events cannot
//! overwrite each other's balance.

use std::sync::Arc;

use async_graphql::SimpleObject;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::{EventLocks, LedgerStore, StudentLocks};
use crate::error::{RollcallError, RollcallResult};
use crate::models::event::attendance::{AttendanceStatus, Marking, Transition};
use crate::models::event::{Event, EventUpdate, NewEvent};
use crate::models::user::User;
use crate::models::{ActivityId, EventId, UserId};
use crate::util::{current_time, generate_token};

/// What happened when a student's attendance was marked.
#[derive(SimpleObject, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceOutcome {
    /// A human-readable summary of the change
    pub message: String,
    /// The event after the mark
    pub event: Event,
    /// How the student's attendance moved
    pub transition: Transition,
    /// The nominal change to the student's points, before the zero floor
    pub points_delta: i64,
    /// The student's point balance after the mark
    pub balance: i64,
    /// Whether this mark completed the event
    pub event_completed: bool,
}

#[derive(SimpleObject, Serialize, Clone, Debug)]
pub struct RegistrationOutcome {
    /// A human-readable summary of the registration
    pub message: String,
    /// The event after the registration
    pub event: Event,
}

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn LedgerStore>,
    locks: Arc<EventLocks>,
    student_locks: Arc<StudentLocks>,
}

impl Engine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            locks: Arc::new(EventLocks::new()),
            student_locks: Arc::new(StudentLocks::new()),
        }
    }

    /// Resolves a session token into the user making the request.
    pub async fn caller_for_token(&self, token: &str) -> RollcallResult<User> {
        self.store
            .user_for_session_opt(token)
            .await?
            .ok_or(RollcallError::Unauthorized)
    }

    /// Marks a student present or absent, keeping the event's ledger, the
    /// student's balance, and the student's history in step.
    #[tracing::instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn mark_attendance(
        &self,
        caller: &User,
        event_id: EventId,
        student_id: UserId,
        status: AttendanceStatus,
    ) -> RollcallResult<AttendanceOutcome> {
        caller.ensure_staff("mark attendance")?;

        let _guard = self.locks.lock(event_id).await;
        let mut event = self.store.event_with_id(event_id).await?;
        let _student_guard = self.student_locks.lock(student_id).await;
        let mut student = self.student_with_id(student_id).await?;

        let now = current_time();
        let marking = event.mark(student_id, status, now);
        if !marking.is_mutating() {
            info!("attendance already marked as {}", status);
            return Ok(AttendanceOutcome {
                message: format!("Attendance already marked as {}", status),
                event,
                transition: marking.transition,
                points_delta: 0,
                balance: student.points,
                event_completed: false,
            });
        }

        student.apply_marking(&event, &marking, now);
        self.store.commit_marking(&student, &event, &marking).await?;

        if marking.completed_event {
            info!(title = %event.title, "event marked as completed");
        }
        info!(
            transition = ?marking.transition,
            points_delta = marking.points_delta,
            balance = student.points,
            "attendance marked as {}",
            status
        );

        Ok(AttendanceOutcome {
            message: attendance_message(&marking),
            event,
            transition: marking.transition,
            points_delta: marking.points_delta,
            balance: student.points,
            event_completed: marking.completed_event,
        })
    }

    /// Registers a student for an event ahead of time.
    #[tracing::instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn register_for_event(
        &self,
        caller: &User,
        event_id: EventId,
        student_id: UserId,
    ) -> RollcallResult<RegistrationOutcome> {
        caller.ensure_acting_for(student_id)?;

        let _guard = self.locks.lock(event_id).await;
        let event = self.store.event_with_id(event_id).await?;

        self.admit(event, student_id, "Registered for event").await
    }

    /// Registers a student using an event's registration token instead of its ID.
    #[tracing::instrument(skip(self, caller, token), fields(caller = caller.id))]
    pub async fn register_via_token(
        &self,
        caller: &User,
        token: &str,
        student_id: UserId,
    ) -> RollcallResult<RegistrationOutcome> {
        caller.ensure_acting_for(student_id)?;

        let event_id = self
            .store
            .event_with_token_opt(token)
            .await?
            .ok_or_else(|| RollcallError::NotFound("Invalid registration token".to_owned()))?
            .id;

        let _guard = self.locks.lock(event_id).await;
        let event = self.store.event_with_id(event_id).await?;

        self.admit(event, student_id, "Successfully registered via registration token")
            .await
    }

    // The caller must hold the event's lock.
    async fn admit(
        &self,
        mut event: Event,
        student_id: UserId,
        message: &str,
    ) -> RollcallResult<RegistrationOutcome> {
        self.student_with_id(student_id).await?;

        if let Err(err) = event.register(student_id) {
            warn!(event_id = event.id, student_id, "registration rejected: {}", err);
            return Err(err);
        }
        self.store.save_event(&event).await?;

        info!(
            event_id = event.id,
            student_id,
            attendees = event.attendees.len(),
            "student registered"
        );

        Ok(RegistrationOutcome {
            message: message.to_owned(),
            event,
        })
    }

    pub async fn event(&self, id: EventId) -> RollcallResult<Event> {
        self.store.event_with_id(id).await
    }

    pub async fn events(&self, activity_id: Option<ActivityId>) -> RollcallResult<Vec<Event>> {
        self.store.events(activity_id).await
    }

    /// Looks up a user; students may only look at themselves.
    pub async fn user(&self, caller: &User, id: UserId) -> RollcallResult<User> {
        if caller.id != id {
            caller.ensure_staff("view other users")?;
        }

        self.store.user_with_id(id).await
    }

    #[tracing::instrument(skip(self, caller, new_event), fields(caller = caller.id))]
    pub async fn create_event(&self, caller: &User, new_event: NewEvent) -> RollcallResult<Event> {
        caller.ensure_staff("create events")?;

        let draft = new_event.into_draft(generate_token())?;
        let event = self.store.create_event(draft).await?;
        info!(event_id = event.id, title = %event.title, "event created");

        Ok(event)
    }

    #[tracing::instrument(skip(self, caller, update), fields(caller = caller.id))]
    pub async fn update_event(
        &self,
        caller: &User,
        id: EventId,
        update: EventUpdate,
    ) -> RollcallResult<Event> {
        caller.ensure_staff("update events")?;

        let _guard = self.locks.lock(id).await;
        let mut event = self.store.event_with_id(id).await?;
        event.apply_update(update)?;
        self.store.save_event(&event).await?;
        info!(event_id = event.id, "event updated");

        Ok(event)
    }

    async fn student_with_id(&self, id: UserId) -> RollcallResult<User> {
        self.store
            .user_with_id_opt(id)
            .await?
            .ok_or_else(|| RollcallError::NotFound("Student not found".to_owned()))
    }
}

fn attendance_message(marking: &Marking) -> String {
    let mut message = match marking.transition {
        Transition::Created => format!("Attendance marked as {}.", marking.status),
        _ => format!(
            "Attendance updated to {}. Points adjusted by {}.",
            marking.status, marking.points_delta
        ),
    };
    if marking.completed_event {
        message.push_str(" Event marked as completed.");
    }

    message
}
