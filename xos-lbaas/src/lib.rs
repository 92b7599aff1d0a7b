//! XOS LBaaS driver.
//!
//! Forwards load balancer topology changes to the XOS control plane, writes
//! back the identifiers XOS assigns, and reports each operation's outcome to
//! the caller. Load balancer creation finishes asynchronously: a background
//! task polls XOS until it has allocated the VIP.

pub mod client;
pub mod config;
pub mod datastore;
pub mod driver;
pub mod error;
pub mod manager;
pub mod model;
pub mod network;
pub mod resource;
pub mod tracker;

pub use client::XosClient;
pub use config::{XosArgs, XosConfig};
pub use datastore::{CompletionHandler, Datastore, Network, Port, PortFilter, Subnet};
pub use driver::XosDriver;
pub use error::{Result, XosError};
pub use manager::{
    EntityManager, HealthMonitorManager, ListenerManager, LoadBalancerManager, MemberManager,
    PoolManager,
};
pub use model::{
    BackendId, CompletionFlags, Context, Entity, HealthMonitor, Listener, LoadBalancer, Member,
    Pool,
};
pub use network::{NetworkProvisioner, XosNetwork, XosNetworkManager};
pub use tracker::{CompletionTracker, PollOutcome, poll_until};
