//! Pool manager.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{Backend, EntityManager, LoadBalancerManager, linked};
use crate::error::Result;
use crate::model::{BackendId, CompletionFlags, Context, Entity, Pool, PoolUpdate};
use crate::resource::{Created, PoolArgs, PoolRecord, Resource, unwrap_envelope};

const KIND: &str = "pool";

#[derive(Clone)]
pub struct PoolManager {
    backend: Arc<Backend>,
    load_balancer: LoadBalancerManager,
}

impl PoolManager {
    pub(crate) fn new(backend: Arc<Backend>, load_balancer: LoadBalancerManager) -> Self {
        Self {
            backend,
            load_balancer,
        }
    }

    pub async fn get(&self, backend_id: &BackendId) -> Result<Value> {
        self.backend.client.get(&Resource::Pool.item(backend_id)).await
    }

    /// Drop the pool's reference to a health monitor before the monitor goes.
    pub async fn delete_healthmon(&self, pool: &Pool, hm_id: &BackendId) -> Result<()> {
        let pool_id = linked(KIND, &pool.id, pool.backend_id.as_ref())?;
        let record: PoolRecord = unwrap_envelope(self.get(pool_id).await?, Resource::Pool.envelope())?;
        if record.has_health_monitor(hm_id) {
            self.backend
                .client
                .put(
                    &Resource::Pool.item(pool_id),
                    &json!({ "health_monitor_id": null }),
                )
                .await?;
            debug!(pool_id = %pool.id, healthmonitor = %hm_id, "Detached health monitor from XOS pool");
        }
        Ok(())
    }
}

#[async_trait]
impl EntityManager for PoolManager {
    type Entity = Pool;

    async fn create(&self, ctx: &Context, pool: &Pool) -> Result<()> {
        let body = self
            .backend
            .client
            .post(Resource::Pool.collection(), &PoolArgs::from(pool))
            .await?;
        let created = Created::from_response(Resource::Pool, body)?;
        let display_name = created.display_name(Resource::Pool)?;

        self.backend
            .datastore
            .update_pool(
                ctx,
                &pool.id,
                PoolUpdate {
                    backend_id: created.backend_id.clone(),
                    name: display_name.clone(),
                },
            )
            .await?;

        let mut linked = pool.clone();
        linked.backend_id = Some(created.backend_id);
        linked.name = display_name;
        self.backend
            .succeeded(ctx, Entity::Pool(linked), CompletionFlags::NONE)
            .await;

        // Same read-then-write as for listeners; concurrent child creates on
        // one load balancer race here.
        let lb = self
            .backend
            .datastore
            .get_loadbalancer(ctx, &pool.loadbalancer_id)
            .await?;
        self.load_balancer.update(ctx, &lb, &lb).await?;

        info!(pool_id = %pool.id, lb_id = %pool.loadbalancer_id, "Created XOS pool");
        Ok(())
    }

    async fn update(&self, ctx: &Context, _old: &Pool, pool: &Pool) -> Result<()> {
        let pool_id = linked(KIND, &pool.id, pool.backend_id.as_ref())?;
        self.backend
            .client
            .put(&Resource::Pool.item(pool_id), &PoolArgs::from(pool))
            .await?;
        self.backend
            .succeeded(ctx, Entity::Pool(pool.clone()), CompletionFlags::NONE)
            .await;
        info!(pool_id = %pool.id, name = %pool.name, "Updated XOS pool");
        Ok(())
    }

    async fn delete(&self, ctx: &Context, pool: &Pool) -> Result<()> {
        match &pool.backend_id {
            Some(pool_id) => {
                let lb = self
                    .backend
                    .datastore
                    .get_loadbalancer(ctx, &pool.loadbalancer_id)
                    .await?;
                self.load_balancer.delete_pool(&lb, pool_id).await?;
                self.backend
                    .client
                    .delete(&Resource::Pool.item(pool_id))
                    .await?;
            }
            None => warn!(pool_id = %pool.id, "Pool was never created in XOS"),
        }

        self.backend
            .succeeded(ctx, Entity::Pool(pool.clone()), CompletionFlags::DELETE)
            .await;
        info!(pool_id = %pool.id, "Deleted XOS pool");
        Ok(())
    }
}
