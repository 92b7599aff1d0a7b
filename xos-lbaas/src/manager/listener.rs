//! Listener manager.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Backend, EntityManager, LoadBalancerManager};
use crate::error::Result;
use crate::model::{CompletionFlags, Context, Entity, Listener, ListenerUpdate};
use crate::resource::{Created, ListenerArgs, Resource};

#[derive(Clone)]
pub struct ListenerManager {
    backend: Arc<Backend>,
    load_balancer: LoadBalancerManager,
}

impl ListenerManager {
    pub(crate) fn new(backend: Arc<Backend>, load_balancer: LoadBalancerManager) -> Self {
        Self {
            backend,
            load_balancer,
        }
    }
}

#[async_trait]
impl EntityManager for ListenerManager {
    type Entity = Listener;

    async fn create(&self, ctx: &Context, listener: &Listener) -> Result<()> {
        let body = self
            .backend
            .client
            .post(Resource::Listener.collection(), &ListenerArgs::from(listener))
            .await?;
        let created = Created::from_response(Resource::Listener, body)?;
        let display_name = created.display_name(Resource::Listener)?;

        self.backend
            .datastore
            .update_listener(
                ctx,
                &listener.id,
                ListenerUpdate {
                    backend_id: created.backend_id.clone(),
                    name: display_name.clone(),
                },
            )
            .await?;

        let mut linked = listener.clone();
        linked.backend_id = Some(created.backend_id);
        linked.name = display_name;
        self.backend
            .succeeded(ctx, Entity::Listener(linked), CompletionFlags::NONE)
            .await;

        // The refreshed load balancer now lists this listener under its XOS
        // display id; pushing it links the two in XOS. This is a read then a
        // write with no version check, so a concurrent child create on the
        // same load balancer can overwrite the link.
        let lb = self
            .backend
            .datastore
            .get_loadbalancer(ctx, &listener.loadbalancer_id)
            .await?;
        self.load_balancer.update(ctx, &lb, &lb).await?;

        info!(
            listener_id = %listener.id,
            lb_id = %listener.loadbalancer_id,
            "Created XOS listener"
        );
        Ok(())
    }

    async fn update(&self, _ctx: &Context, _old: &Listener, listener: &Listener) -> Result<()> {
        debug!(listener_id = %listener.id, "Listener updates are not forwarded to XOS");
        Ok(())
    }

    async fn delete(&self, ctx: &Context, listener: &Listener) -> Result<()> {
        match &listener.backend_id {
            Some(listener_id) => {
                let lb = self
                    .backend
                    .datastore
                    .get_loadbalancer(ctx, &listener.loadbalancer_id)
                    .await?;
                // Detach first, or the load balancer keeps a dangling reference.
                self.load_balancer.delete_listener(&lb, listener_id).await?;
                self.backend
                    .client
                    .delete(&Resource::Listener.item(listener_id))
                    .await?;
            }
            None => warn!(listener_id = %listener.id, "Listener was never created in XOS"),
        }

        self.backend
            .succeeded(ctx, Entity::Listener(listener.clone()), CompletionFlags::DELETE)
            .await;
        info!(listener_id = %listener.id, "Deleted XOS listener");
        Ok(())
    }
}
