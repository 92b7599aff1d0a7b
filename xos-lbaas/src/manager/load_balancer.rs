//! Load balancer manager and the VIP completion task.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{Backend, EntityManager, linked};
use crate::client::XosClient;
use crate::datastore::PortFilter;
use crate::error::{Result, XosError};
use crate::model::{
    BackendId, CompletionFlags, Context, Entity, LoadBalancer, LoadBalancerUpdate,
};
use crate::network::{NetworkProvisioner, XosNetwork};
use crate::resource::{
    Created, LoadBalancerArgs, LoadBalancerRecord, Resource, unwrap_envelope,
};
use crate::tracker::{CompletionTracker, PollOutcome, poll_until};

const KIND: &str = "loadbalancer";

/// Fetch and unwrap a load balancer record.
pub async fn fetch_record(client: &XosClient, backend_id: &BackendId) -> Result<LoadBalancerRecord> {
    let body = client.get(&Resource::LoadBalancer.item(backend_id)).await?;
    unwrap_envelope(body, Resource::LoadBalancer.envelope())
}

#[derive(Clone)]
pub struct LoadBalancerManager {
    backend: Arc<Backend>,
    network: Arc<dyn NetworkProvisioner>,
    tracker: CompletionTracker,
}

impl LoadBalancerManager {
    pub(crate) fn new(backend: Arc<Backend>, network: Arc<dyn NetworkProvisioner>) -> Self {
        Self {
            backend,
            network,
            tracker: CompletionTracker::new(),
        }
    }

    /// True if XOS allocates the VIP, which is what creation waits for.
    pub fn allocates_vip(&self) -> bool {
        self.backend.config.allocates_vip
    }

    /// Listeners and pools must be created one by one.
    pub fn allows_create_graph(&self) -> bool {
        false
    }

    /// In-flight creations.
    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    pub async fn create_and_allocate_vip(&self, ctx: &Context, lb: &LoadBalancer) -> Result<()> {
        self.create(ctx, lb).await
    }

    pub async fn get(&self, backend_id: &BackendId) -> Result<Value> {
        self.backend
            .client
            .get(&Resource::LoadBalancer.item(backend_id))
            .await
    }

    /// Drop the load balancer's reference to a pool before the pool goes.
    pub async fn delete_pool(&self, lb: &LoadBalancer, pool_id: &BackendId) -> Result<()> {
        let lb_id = linked(KIND, &lb.id, lb.backend_id.as_ref())?;
        let record = fetch_record(&self.backend.client, lb_id).await?;
        if record.has_pool(pool_id) {
            self.backend
                .client
                .put(&Resource::LoadBalancer.item(lb_id), &json!({ "pool_id": null }))
                .await?;
            debug!(lb_id = %lb.id, pool = %pool_id, "Detached pool from XOS load balancer");
        }
        Ok(())
    }

    /// Drop the load balancer's reference to a listener before the listener goes.
    pub async fn delete_listener(&self, lb: &LoadBalancer, listener_id: &BackendId) -> Result<()> {
        let lb_id = linked(KIND, &lb.id, lb.backend_id.as_ref())?;
        let record = fetch_record(&self.backend.client, lb_id).await?;
        if record.has_listener(listener_id) {
            self.backend
                .client
                .put(
                    &Resource::LoadBalancer.item(lb_id),
                    &json!({ "listener_id": null }),
                )
                .await?;
            debug!(lb_id = %lb.id, listener = %listener_id, "Detached listener from XOS load balancer");
        }
        Ok(())
    }

    /// Make sure XOS has a network named after the VIP subnet's network.
    async fn ensure_xos_network(&self, ctx: &Context, lb: &LoadBalancer) -> Result<String> {
        let datastore = &self.backend.datastore;
        let subnet = datastore.get_subnet(ctx, &lb.vip_subnet_id).await?;
        let network = datastore.get_network(ctx, &subnet.network_id).await?;

        if self.network.network_exist(&network.name).await? {
            debug!(network = %network.name, "XOS network already exists");
            return Ok(network.name);
        }

        self.network
            .create(&XosNetwork {
                name: network.name.clone(),
                subnetpool: subnet.subnetpool_id,
                subnet_range: subnet.cidr,
                gateway_ip: subnet.gateway_ip,
            })
            .await?;
        Ok(network.name)
    }
}

#[async_trait]
impl EntityManager for LoadBalancerManager {
    type Entity = LoadBalancer;

    /// Submit the load balancer and return; a background task waits for the
    /// VIP and reports completion.
    async fn create(&self, ctx: &Context, lb: &LoadBalancer) -> Result<()> {
        let vip_network = self.ensure_xos_network(ctx, lb).await?;
        let args = LoadBalancerArgs::new(lb, Some(vip_network));

        let body = self
            .backend
            .client
            .post(Resource::LoadBalancer.collection(), &args)
            .await?;
        let created = Created::from_response(Resource::LoadBalancer, body)?;

        self.backend
            .datastore
            .update_loadbalancer(
                ctx,
                &lb.id,
                LoadBalancerUpdate {
                    backend_id: Some(created.backend_id.clone()),
                },
            )
            .await?;

        let mut pending = lb.clone();
        pending.backend_id = Some(created.backend_id.clone());
        let backend = Arc::clone(&self.backend);
        let ctx = ctx.clone();
        self.tracker
            .track(&lb.id, move |cancel| {
                complete_create(backend, ctx, pending, created.backend_id, cancel)
            })
            .await;

        info!(lb_id = %lb.id, name = %lb.name, "Created XOS load balancer");
        Ok(())
    }

    async fn update(&self, ctx: &Context, _old: &LoadBalancer, lb: &LoadBalancer) -> Result<()> {
        let lb_id = linked(KIND, &lb.id, lb.backend_id.as_ref())?;
        self.backend
            .client
            .put(
                &Resource::LoadBalancer.item(lb_id),
                &LoadBalancerArgs::new(lb, None),
            )
            .await?;
        self.backend
            .succeeded(ctx, Entity::LoadBalancer(lb.clone()), CompletionFlags::NONE)
            .await;
        info!(lb_id = %lb.id, name = %lb.name, "Updated XOS load balancer");
        Ok(())
    }

    /// A creation still waiting for its VIP is cancelled first; it reports
    /// its failure before the delete reports success.
    async fn delete(&self, ctx: &Context, lb: &LoadBalancer) -> Result<()> {
        if self.tracker.cancel(&lb.id).await {
            info!(lb_id = %lb.id, "Deleting load balancer with pending creation");
        }

        match &lb.backend_id {
            Some(lb_id) => {
                self.backend
                    .client
                    .delete(&Resource::LoadBalancer.item(lb_id))
                    .await?
            }
            None => warn!(lb_id = %lb.id, "Load balancer was never created in XOS"),
        }

        self.backend
            .succeeded(ctx, Entity::LoadBalancer(lb.clone()), CompletionFlags::DELETE)
            .await;
        info!(lb_id = %lb.id, name = %lb.name, "Deleted XOS load balancer");
        Ok(())
    }
}

/// Wait for XOS to allocate the VIP of a freshly created load balancer.
async fn complete_create(
    backend: Arc<Backend>,
    ctx: Context,
    mut lb: LoadBalancer,
    backend_id: BackendId,
    cancel: oneshot::Receiver<()>,
) {
    let allocates_vip = backend.config.allocates_vip;
    let outcome = poll_until(
        backend.config.poll_interval,
        backend.config.poll_timeout,
        cancel,
        || {
            let backend = Arc::clone(&backend);
            let backend_id = backend_id.clone();
            async move {
                let record = fetch_record(&backend.client, &backend_id).await?;
                Ok::<_, XosError>(
                    record
                        .allocated_vip()
                        .filter(|_| allocates_vip)
                        .map(str::to_string),
                )
            }
        },
    )
    .await;

    match outcome {
        PollOutcome::Completed(vip) => {
            let filter = PortFilter {
                ip_address: vip.clone(),
                subnet_id: lb.vip_subnet_id.clone(),
            };
            let ports = match backend.datastore.get_ports(&ctx, &filter).await {
                Ok(ports) => ports,
                Err(e) => {
                    error!(lb_id = %lb.id, error = %e, "Failed to look up VIP port");
                    backend.failed(&ctx, Entity::LoadBalancer(lb)).await;
                    return;
                }
            };

            // Only an unambiguous match identifies the VIP port.
            let port_id = match ports.as_slice() {
                [port] => Some(port.id.clone()),
                _ => None,
            };
            info!(lb_id = %lb.id, vip = %vip, port = ?port_id, "Load balancer VIP allocated");

            lb.vip_address = Some(vip);
            lb.vip_port_id = port_id;
            backend
                .succeeded(&ctx, Entity::LoadBalancer(lb), CompletionFlags::LB_CREATE)
                .await;
        }
        PollOutcome::TimedOut => {
            warn!(
                lb_id = %lb.id,
                timeout = ?backend.config.poll_timeout,
                "Timeout has expired for load balancer to complete an operation"
            );
            backend.failed(&ctx, Entity::LoadBalancer(lb)).await;
        }
        PollOutcome::Cancelled => {
            info!(lb_id = %lb.id, "Load balancer creation abandoned");
            backend.failed(&ctx, Entity::LoadBalancer(lb)).await;
        }
        PollOutcome::Failed(e) => {
            error!(lb_id = %lb.id, error = %e, "Polling XOS load balancer failed");
            backend.failed(&ctx, Entity::LoadBalancer(lb)).await;
        }
    }
}
