use async_graphql::{EmptySubscription, Schema};

use crate::engine::Engine;
use crate::graphql::mutation::MutationRoot;
use crate::graphql::query::QueryRoot;

pub mod guards;
pub mod mutation;
pub mod query;

pub type RollcallSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(engine: Engine) -> RollcallSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(engine)
        .finish()
}
