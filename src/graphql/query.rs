use async_graphql::{Context, ErrorExtensions, Object, Result};

use crate::engine::Engine;
use crate::graphql::guards::LoggedIn;
use crate::models::event::Event;
use crate::models::user::User;
use crate::models::{ActivityId, EventId, UserId};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The user making the request, if logged in
    pub async fn me<'c>(&self, ctx: &'c Context<'c>) -> Option<User> {
        ctx.data_opt::<User>().cloned()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn user(&self, ctx: &Context<'_>, id: UserId) -> Result<User> {
        let engine: &Engine = ctx.data_unchecked();
        let caller: &User = ctx.data_unchecked();
        engine.user(caller, id).await.map_err(|err| err.extend())
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn event(&self, ctx: &Context<'_>, id: EventId) -> Result<Event> {
        let engine: &Engine = ctx.data_unchecked();
        engine.event(id).await.map_err(|err| err.extend())
    }

    /// All events, or only those held under one activity
    #[graphql(guard = "LoggedIn")]
    pub async fn events(
        &self,
        ctx: &Context<'_>,
        activity_id: Option<ActivityId>,
    ) -> Result<Vec<Event>> {
        let engine: &Engine = ctx.data_unchecked();
        engine.events(activity_id).await.map_err(|err| err.extend())
    }
}
