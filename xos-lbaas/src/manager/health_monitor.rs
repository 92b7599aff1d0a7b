//! Health monitor manager.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Backend, EntityManager, PoolManager};
use crate::error::Result;
use crate::model::{CompletionFlags, Context, Entity, HealthMonitor, HealthMonitorUpdate};
use crate::resource::{Created, HealthMonitorArgs, Resource};

#[derive(Clone)]
pub struct HealthMonitorManager {
    backend: Arc<Backend>,
    pool: PoolManager,
}

impl HealthMonitorManager {
    pub(crate) fn new(backend: Arc<Backend>, pool: PoolManager) -> Self {
        Self { backend, pool }
    }
}

#[async_trait]
impl EntityManager for HealthMonitorManager {
    type Entity = HealthMonitor;

    async fn create(&self, ctx: &Context, hm: &HealthMonitor) -> Result<()> {
        let body = self
            .backend
            .client
            .post(
                Resource::HealthMonitor.collection(),
                &HealthMonitorArgs::from(hm),
            )
            .await?;
        let created = Created::from_response(Resource::HealthMonitor, body)?;
        let display_name = created.display_name(Resource::HealthMonitor)?;

        self.backend
            .datastore
            .update_healthmonitor(
                ctx,
                &hm.id,
                HealthMonitorUpdate {
                    backend_id: created.backend_id.clone(),
                    backend_name: display_name.clone(),
                },
            )
            .await?;

        let mut linked = hm.clone();
        linked.backend_id = Some(created.backend_id);
        linked.backend_name = Some(display_name);
        self.backend
            .succeeded(ctx, Entity::HealthMonitor(linked), CompletionFlags::NONE)
            .await;

        // The refreshed pool carries the monitor's display id, which the
        // pool payload links. Unversioned read-then-write like the other
        // parent updates.
        let pool = self.backend.datastore.get_pool(ctx, &hm.pool_id).await?;
        self.pool.update(ctx, &pool, &pool).await?;

        info!(healthmonitor_id = %hm.id, pool_id = %hm.pool_id, "Created XOS health monitor");
        Ok(())
    }

    async fn update(&self, _ctx: &Context, _old: &HealthMonitor, hm: &HealthMonitor) -> Result<()> {
        debug!(healthmonitor_id = %hm.id, "Health monitor updates are not forwarded to XOS");
        Ok(())
    }

    async fn delete(&self, ctx: &Context, hm: &HealthMonitor) -> Result<()> {
        match &hm.backend_id {
            Some(hm_id) => {
                let pool = self.backend.datastore.get_pool(ctx, &hm.pool_id).await?;
                self.pool.delete_healthmon(&pool, hm_id).await?;
                self.backend
                    .client
                    .delete(&Resource::HealthMonitor.item(hm_id))
                    .await?;
            }
            None => warn!(healthmonitor_id = %hm.id, "Health monitor was never created in XOS"),
        }

        self.backend
            .succeeded(ctx, Entity::HealthMonitor(hm.clone()), CompletionFlags::DELETE)
            .await;
        info!(healthmonitor_id = %hm.id, "Deleted XOS health monitor");
        Ok(())
    }
}
