//! The ledger store: where events and users live between requests.
//!
//! The engine only talks to a [LedgerStore]. [MemoryStore] keeps everything
//! in process and backs the tests and local runs; [PgStore] keeps it in
//! PostgreSQL.

use async_trait::async_trait;

use crate::error::{RollcallError, RollcallResult};
use crate::models::event::attendance::Marking;
use crate::models::event::{Event, EventDraft};
use crate::models::user::User;
use crate::models::{ActivityId, EventId, UserId};

mod locks;
mod memory;
mod postgres;

pub use locks::{EventLocks, KeyedLocks, StudentLocks};
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn event_with_id_opt(&self, id: EventId) -> RollcallResult<Option<Event>>;

    async fn event_with_token_opt(&self, token: &str) -> RollcallResult<Option<Event>>;

    /// All events, or only those of one activity, ordered by date then ID.
    async fn events(&self, activity_id: Option<ActivityId>) -> RollcallResult<Vec<Event>>;

    async fn create_event(&self, draft: EventDraft) -> RollcallResult<Event>;

    /// Overwrites a stored event, including its attendees and attendance.
    async fn save_event(&self, event: &Event) -> RollcallResult<()>;

    async fn user_with_id_opt(&self, id: UserId) -> RollcallResult<Option<User>>;

    async fn user_for_session_opt(&self, token: &str) -> RollcallResult<Option<User>>;

    /// Overwrites a stored user's balance and attendance history.
    async fn save_user(&self, user: &User) -> RollcallResult<()>;

    async fn event_with_id(&self, id: EventId) -> RollcallResult<Event> {
        self.event_with_id_opt(id)
            .await?
            .ok_or_else(|| RollcallError::NotFound("Event not found".to_owned()))
    }

    async fn user_with_id(&self, id: UserId) -> RollcallResult<User> {
        self.user_with_id_opt(id)
            .await?
            .ok_or_else(|| RollcallError::NotFound("User not found".to_owned()))
    }

    /// Persists both sides of an attendance mark: the student, then the event.
    ///
    /// `student` and `event` already have `marking` applied. Nothing is
    /// rolled back if the event write fails after the student write
    /// succeeded. Stores that can write both in one transaction should
    /// override this.
    async fn commit_marking(
        &self,
        student: &User,
        event: &Event,
        _marking: &Marking,
    ) -> RollcallResult<()> {
        self.save_user(student).await?;

        if let Err(err) = self.save_event(event).await {
            tracing::error!(
                event_id = event.id,
                student_id = student.id,
                error = %err,
                "student saved but event was not, ledger needs manual reconciliation"
            );
            return Err(RollcallError::PartialWrite {
                event_id: event.id,
                student_id: student.id,
                source: Box::new(err),
            });
        }

        Ok(())
    }
}
