mod hr;

use async_graphql::{EmptySubscription, Object, Schema, SimpleObject};
use products_hr::{Actor, HrModule, IdentityProvider};
use serde::Serialize;
use tracing::instrument;

pub use hr::{HrMutation, HrQuery};

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Shared resolver state.
#[derive(Clone)]
pub struct GraphqlData {
    pub hr: HrModule,
}

/// Identity of the caller for one request, read from `x-actor-id`.
#[derive(Clone, Debug, Default)]
pub struct RequestActor(pub Option<Actor>);

impl IdentityProvider for RequestActor {
    fn current_actor(&self) -> Option<Actor> {
        self.0.clone()
    }
}

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(data)
        .finish()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> HealthPayload {
        HealthPayload { ok: true }
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    async fn hr(&self) -> HrQuery {
        HrQuery
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn hr(&self) -> HrMutation {
        HrMutation
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}
