use async_graphql::{Context, Guard, Result};

use crate::models::user::User;

pub struct LoggedIn;

#[async_trait::async_trait]
impl Guard for LoggedIn {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        if ctx.data_opt::<User>().is_some() {
            Ok(())
        } else {
            Err("User must be logged in".into())
        }
    }
}
