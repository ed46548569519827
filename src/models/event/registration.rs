use crate::error::{RollcallError, RollcallResult};
use crate::models::event::Event;
use crate::models::UserId;

impl Event {
    /// If the student cannot register for this event, this is why
    pub fn registration_issue_for(&self, student_id: UserId) -> Option<String> {
        if self.is_completed() {
            Some("Cannot register for a completed event (attendance already taken)".to_owned())
        } else if self.attendees.contains(&student_id) {
            Some("Already registered".to_owned())
        } else if self
            .capacity
            .map(|capacity| self.attendees.len() >= capacity as usize)
            .unwrap_or(false)
        {
            Some("Event is at capacity".to_owned())
        } else {
            None
        }
    }

    pub fn ensure_no_registration_issue(&self, student_id: UserId) -> RollcallResult<()> {
        if let Some(issue) = self.registration_issue_for(student_id) {
            Err(RollcallError::Rejected(issue))
        } else {
            Ok(())
        }
    }

    pub fn register(&mut self, student_id: UserId) -> RollcallResult<()> {
        self.ensure_no_registration_issue(student_id)?;
        self.attendees.insert(student_id);

        Ok(())
    }
}
