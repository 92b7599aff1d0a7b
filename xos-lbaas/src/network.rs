//! XOS core networks backing load balancer VIP subnets.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::XosClient;
use crate::config::XosConfig;
use crate::error::Result;

const NETWORKS_BASE: &str = "api/core/networks";

/// Network to create in XOS, mirrored from the caller's VIP subnet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XosNetwork {
    pub name: String,
    pub subnetpool: Option<String>,
    pub subnet_range: String,
    pub gateway_ip: Option<String>,
}

/// Provisions the network a load balancer VIP lives on.
#[async_trait]
pub trait NetworkProvisioner: Send + Sync {
    /// True if exactly one XOS network carries this name.
    async fn network_exist(&self, name: &str) -> Result<bool>;

    async fn create(&self, net: &XosNetwork) -> Result<()>;

    async fn delete(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct NetworkArgs<'a> {
    name: &'a str,
    subnet: &'a str,
    start_ip: Option<&'a str>,
    labels: Option<&'a str>,
    template: &'a str,
    owner: &'a str,
}

/// Network manager backed by the XOS core API.
pub struct XosNetworkManager {
    client: XosClient,
    owner: String,
    template: String,
}

impl XosNetworkManager {
    pub fn new(config: &XosConfig) -> Self {
        let root = config.endpoint_root();
        Self {
            client: XosClient::new(root, NETWORKS_BASE, &config.user, &config.password),
            owner: format!("{}/api/core/slices/{}/", root, config.lbaas_slice_id),
            template: format!(
                "{}/api/core/networktemplates/{}/",
                root, config.kuryr_template_id
            ),
        }
    }

    fn args<'a>(&'a self, net: &'a XosNetwork) -> NetworkArgs<'a> {
        NetworkArgs {
            name: &net.name,
            subnet: &net.subnet_range,
            start_ip: net.gateway_ip.as_deref(),
            labels: net.subnetpool.as_deref(),
            template: &self.template,
            owner: &self.owner,
        }
    }
}

#[async_trait]
impl NetworkProvisioner for XosNetworkManager {
    async fn network_exist(&self, name: &str) -> Result<bool> {
        let found = self.client.get_filtered("/", &[("name", name)]).await?;
        Ok(matches!(&found, Value::Array(nets) if nets.len() == 1))
    }

    async fn create(&self, net: &XosNetwork) -> Result<()> {
        let created = self.client.post("/", &self.args(net)).await?;
        info!(network = %net.name, response = %created, "Created XOS network");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        // Removal needs the XOS network id, which the driver never records.
        debug!(network = %name, "Leaving XOS network in place");
        Ok(())
    }
}
