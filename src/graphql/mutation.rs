use async_graphql::{Context, ErrorExtensions, Object, Result};

use crate::engine::{AttendanceOutcome, Engine, RegistrationOutcome};
use crate::graphql::guards::LoggedIn;
use crate::models::event::attendance::AttendanceStatus;
use crate::models::event::{Event, EventUpdate, NewEvent};
use crate::models::user::User;
use crate::models::{EventId, UserId};

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Marks a student present or absent at an event, adjusting their points
    #[graphql(guard = "LoggedIn")]
    pub async fn mark_attendance(
        &self,
        ctx: &Context<'_>,
        event_id: EventId,
        student_id: UserId,
        status: AttendanceStatus,
    ) -> Result<AttendanceOutcome> {
        let engine: &Engine = ctx.data_unchecked();
        let caller: &User = ctx.data_unchecked();
        engine
            .mark_attendance(caller, event_id, student_id, status)
            .await
            .map_err(|err| err.extend())
    }

    /// Registers a student (by default the current user) for an event
    #[graphql(guard = "LoggedIn")]
    pub async fn register_for_event(
        &self,
        ctx: &Context<'_>,
        event_id: EventId,
        student_id: Option<UserId>,
    ) -> Result<RegistrationOutcome> {
        let engine: &Engine = ctx.data_unchecked();
        let caller: &User = ctx.data_unchecked();
        engine
            .register_for_event(caller, event_id, student_id.unwrap_or(caller.id))
            .await
            .map_err(|err| err.extend())
    }

    /// Registers a student (by default the current user) with an event's registration token
    #[graphql(guard = "LoggedIn")]
    pub async fn register_via_token(
        &self,
        ctx: &Context<'_>,
        token: String,
        student_id: Option<UserId>,
    ) -> Result<RegistrationOutcome> {
        let engine: &Engine = ctx.data_unchecked();
        let caller: &User = ctx.data_unchecked();
        engine
            .register_via_token(caller, &token, student_id.unwrap_or(caller.id))
            .await
            .map_err(|err| err.extend())
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn create_event(&self, ctx: &Context<'_>, new_event: NewEvent) -> Result<Event> {
        let engine: &Engine = ctx.data_unchecked();
        let caller: &User = ctx.data_unchecked();
        engine
            .create_event(caller, new_event)
            .await
            .map_err(|err| err.extend())
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn update_event(
        &self,
        ctx: &Context<'_>,
        id: EventId,
        update: EventUpdate,
    ) -> Result<Event> {
        let engine: &Engine = ctx.data_unchecked();
        let caller: &User = ctx.data_unchecked();
        engine
            .update_event(caller, id, update)
            .await
            .map_err(|err| err.extend())
    }
}
