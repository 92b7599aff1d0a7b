//! Entity managers.
//!
//! Each manager turns a local entity into an XOS request, records the
//! identifiers XOS assigns and reports completion. Child managers push the
//! refreshed parent back through the parent's manager afterwards so XOS links
//! the child.

pub mod health_monitor;
pub mod listener;
pub mod load_balancer;
pub mod member;
pub mod pool;

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::XosClient;
use crate::config::XosConfig;
use crate::datastore::{CompletionHandler, Datastore};
use crate::error::{Result, XosError};
use crate::model::{BackendId, CompletionFlags, Context, Entity};

pub use health_monitor::HealthMonitorManager;
pub use listener::ListenerManager;
pub use load_balancer::LoadBalancerManager;
pub use member::MemberManager;
pub use pool::PoolManager;

/// Operations every entity manager offers.
#[async_trait]
pub trait EntityManager: Send + Sync {
    type Entity: Send + Sync;

    async fn create(&self, ctx: &Context, entity: &Self::Entity) -> Result<()>;

    async fn update(&self, ctx: &Context, old: &Self::Entity, entity: &Self::Entity)
    -> Result<()>;

    async fn delete(&self, ctx: &Context, entity: &Self::Entity) -> Result<()>;

    /// XOS exposes no status to refresh from.
    async fn refresh(&self, _ctx: &Context, _entity: &Self::Entity) -> Result<()> {
        Ok(())
    }

    /// XOS exposes no statistics.
    async fn stats(&self, _ctx: &Context, _entity: &Self::Entity) -> Result<()> {
        Ok(())
    }
}

/// What every manager talks to.
pub(crate) struct Backend {
    pub client: XosClient,
    pub config: XosConfig,
    pub datastore: Arc<dyn Datastore>,
    pub completion: Arc<dyn CompletionHandler>,
}

impl Backend {
    pub async fn succeeded(&self, ctx: &Context, entity: Entity, flags: CompletionFlags) {
        self.completion
            .successful_completion(ctx, entity, flags)
            .await;
    }

    pub async fn failed(&self, ctx: &Context, entity: Entity) {
        self.completion.failed_completion(ctx, entity).await;
    }
}

/// The entity's XOS correlation id, or `NotLinked` if it was never created
/// there.
pub(crate) fn linked<'a>(
    kind: &'static str,
    id: &str,
    backend_id: Option<&'a BackendId>,
) -> Result<&'a BackendId> {
    backend_id.ok_or_else(|| XosError::NotLinked {
        kind,
        id: id.to_string(),
    })
}
