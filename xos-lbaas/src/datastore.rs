//! Interfaces the driver consumes from its caller.
//!
//! The caller owns the entity records and decides what a completion means
//! for them (status columns, notifications). The driver only reads records,
//! writes back XOS identifiers and reports completion.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    CompletionFlags, Context, Entity, HealthMonitorUpdate, ListenerUpdate, LoadBalancer,
    LoadBalancerUpdate, Pool, PoolUpdate,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub network_id: String,
    pub cidr: String,
    pub gateway_ip: Option<String>,
    pub subnetpool_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Port {
    pub id: String,
}

/// Ports holding `ip_address` on `subnet_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortFilter {
    pub ip_address: String,
    pub subnet_id: String,
}

/// Store trait for the caller's entity and network records.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn get_loadbalancer(&self, ctx: &Context, id: &str) -> Result<LoadBalancer>;

    async fn get_pool(&self, ctx: &Context, id: &str) -> Result<Pool>;

    async fn update_loadbalancer(
        &self,
        ctx: &Context,
        id: &str,
        update: LoadBalancerUpdate,
    ) -> Result<()>;

    async fn update_listener(&self, ctx: &Context, id: &str, update: ListenerUpdate) -> Result<()>;

    async fn update_pool(&self, ctx: &Context, id: &str, update: PoolUpdate) -> Result<()>;

    async fn update_healthmonitor(
        &self,
        ctx: &Context,
        id: &str,
        update: HealthMonitorUpdate,
    ) -> Result<()>;

    async fn get_ports(&self, ctx: &Context, filter: &PortFilter) -> Result<Vec<Port>>;

    async fn get_subnet(&self, ctx: &Context, id: &str) -> Result<Subnet>;

    async fn get_network(&self, ctx: &Context, id: &str) -> Result<Network>;
}

/// Receives the outcome of every driver operation, exactly once per attempt.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn successful_completion(&self, ctx: &Context, entity: Entity, flags: CompletionFlags);

    async fn failed_completion(&self, ctx: &Context, entity: Entity);
}
