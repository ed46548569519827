use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::LedgerStore;
use crate::error::{RollcallError, RollcallResult};
use crate::models::event::{Event, EventDraft};
use crate::models::user::{Role, User};
use crate::models::{ActivityId, EventId, UserId};

#[derive(Debug, Default)]
struct Ledger {
    events: HashMap<EventId, Event>,
    users: HashMap<UserId, User>,
    sessions: HashMap<String, UserId>,
    last_event_id: EventId,
    last_user_id: UserId,
}

/// Keeps the whole ledger in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user with no points or history.
    pub async fn add_user(&self, name: &str, email: &str, role: Role) -> RollcallResult<User> {
        let mut ledger = self.ledger.write().await;
        if ledger.users.values().any(|user| user.email == email) {
            return Err(RollcallError::Rejected(format!(
                "Another user already has the email {}",
                email
            )));
        }

        ledger.last_user_id += 1;
        let user = User {
            id: ledger.last_user_id,
            name: name.to_owned(),
            email: email.to_owned(),
            role,
            points: 0,
            attendance_records: Vec::new(),
        };
        ledger.users.insert(user.id, user.clone());

        Ok(user)
    }

    /// Lets `token` authenticate as the given user.
    pub async fn add_session(&self, token: &str, user_id: UserId) -> RollcallResult<()> {
        let mut ledger = self.ledger.write().await;
        if !ledger.users.contains_key(&user_id) {
            return Err(RollcallError::NotFound("User not found".to_owned()));
        }
        ledger.sessions.insert(token.to_owned(), user_id);

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn event_with_id_opt(&self, id: EventId) -> RollcallResult<Option<Event>> {
        Ok(self.ledger.read().await.events.get(&id).cloned())
    }

    async fn event_with_token_opt(&self, token: &str) -> RollcallResult<Option<Event>> {
        Ok(self
            .ledger
            .read()
            .await
            .events
            .values()
            .find(|event| event.registration_token == token)
            .cloned())
    }

    async fn events(&self, activity_id: Option<ActivityId>) -> RollcallResult<Vec<Event>> {
        let ledger = self.ledger.read().await;
        let mut events: Vec<Event> = ledger
            .events
            .values()
            .filter(|event| activity_id.map_or(true, |id| event.activity_id == id))
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.date, event.id));

        Ok(events)
    }

    async fn create_event(&self, draft: EventDraft) -> RollcallResult<Event> {
        let mut ledger = self.ledger.write().await;
        if ledger
            .events
            .values()
            .any(|event| event.registration_token == draft.registration_token)
        {
            return Err(RollcallError::Internal(
                "registration token is already in use".to_owned(),
            ));
        }

        ledger.last_event_id += 1;
        let event = draft.into_event(ledger.last_event_id);
        ledger.events.insert(event.id, event.clone());

        Ok(event)
    }

    async fn save_event(&self, event: &Event) -> RollcallResult<()> {
        let mut ledger = self.ledger.write().await;
        let stored = ledger
            .events
            .get_mut(&event.id)
            .ok_or_else(|| RollcallError::NotFound("Event not found".to_owned()))?;
        *stored = event.clone();

        Ok(())
    }

    async fn user_with_id_opt(&self, id: UserId) -> RollcallResult<Option<User>> {
        Ok(self.ledger.read().await.users.get(&id).cloned())
    }

    async fn user_for_session_opt(&self, token: &str) -> RollcallResult<Option<User>> {
        let ledger = self.ledger.read().await;

        Ok(ledger
            .sessions
            .get(token)
            .and_then(|user_id| ledger.users.get(user_id))
            .cloned())
    }

    async fn save_user(&self, user: &User) -> RollcallResult<()> {
        let mut ledger = self.ledger.write().await;
        let stored = ledger
            .users
            .get_mut(&user.id)
            .ok_or_else(|| RollcallError::NotFound("User not found".to_owned()))?;
        *stored = user.clone();

        Ok(())
    }
}
