//! Driver root wiring the managers to one XOS endpoint.

use std::sync::Arc;

use tracing::info;

use crate::client::XosClient;
use crate::config::XosConfig;
use crate::datastore::{CompletionHandler, Datastore};
use crate::manager::{
    Backend, HealthMonitorManager, ListenerManager, LoadBalancerManager, MemberManager,
    PoolManager,
};
use crate::network::{NetworkProvisioner, XosNetworkManager};

/// API base for LBaaS tenant resources.
pub const TENANT_BASE: &str = "api/tenant";

pub struct XosDriver {
    pub load_balancer: LoadBalancerManager,
    pub listener: ListenerManager,
    pub pool: PoolManager,
    pub member: MemberManager,
    pub health_monitor: HealthMonitorManager,
    config: XosConfig,
}

impl XosDriver {
    pub fn new(
        config: XosConfig,
        datastore: Arc<dyn Datastore>,
        completion: Arc<dyn CompletionHandler>,
    ) -> Self {
        let network = Arc::new(XosNetworkManager::new(&config));
        Self::with_network(config, datastore, completion, network)
    }

    /// Like [`XosDriver::new`] with a caller-supplied network provisioner.
    pub fn with_network(
        config: XosConfig,
        datastore: Arc<dyn Datastore>,
        completion: Arc<dyn CompletionHandler>,
        network: Arc<dyn NetworkProvisioner>,
    ) -> Self {
        let client = XosClient::new(
            config.endpoint_root(),
            TENANT_BASE,
            &config.user,
            &config.password,
        );
        let backend = Arc::new(Backend {
            client,
            config: config.clone(),
            datastore,
            completion,
        });

        // Children hold their parent's manager to push re-synced parents.
        let load_balancer = LoadBalancerManager::new(Arc::clone(&backend), network);
        let listener = ListenerManager::new(Arc::clone(&backend), load_balancer.clone());
        let pool = PoolManager::new(Arc::clone(&backend), load_balancer.clone());
        let health_monitor = HealthMonitorManager::new(Arc::clone(&backend), pool.clone());

        info!(
            endpoint = %config.endpoint_root(),
            allocates_vip = config.allocates_vip,
            "XOS driver initialized"
        );

        Self {
            load_balancer,
            listener,
            pool,
            member: MemberManager::new(),
            health_monitor,
            config,
        }
    }

    pub fn allocates_vip(&self) -> bool {
        self.config.allocates_vip
    }

    pub fn config(&self) -> &XosConfig {
        &self.config
    }
}
