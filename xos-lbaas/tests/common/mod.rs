//! Shared test utilities for xos-lbaas integration tests.
//!
//! `FakeXos` is a scriptable XOS stand-in served by axum; every request it
//! sees is recorded. `MemoryDatastore` and `ChannelCompletion` play the
//! caller's side of the driver.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc, oneshot};

use xos_lbaas::model::{HealthMonitorUpdate, ListenerUpdate, LoadBalancerUpdate, PoolUpdate};
use xos_lbaas::{
    CompletionFlags, CompletionHandler, Context, Datastore, Entity, HealthMonitor, Listener,
    LoadBalancer, Network, Pool, Port, PortFilter, Subnet, XosConfig, XosDriver, XosError,
};

// =============================================================================
// Fake XOS
// =============================================================================

/// A request as the fake backend received it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct FakeState {
    routes: HashMap<(Method, String), VecDeque<(StatusCode, Value)>>,
    requests: Vec<Recorded>,
}

pub struct FakeXos {
    pub addr: SocketAddr,
    state: Arc<Mutex<FakeState>>,
    shutdown_tx: oneshot::Sender<()>,
}

impl FakeXos {
    pub async fn spawn() -> Self {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let router = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue an answer for `method path`. Queued answers are served in
    /// order; the last one repeats. Unscripted requests get a 404.
    pub async fn on(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.state
            .lock()
            .await
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back((status, body));
    }

    pub async fn requests(&self) -> Vec<Recorded> {
        self.state.lock().await.requests.clone()
    }

    pub async fn requests_to(&self, method: Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// `METHOD path` of every request, in arrival order.
    pub async fn trace(&self) -> Vec<String> {
        self.requests()
            .await
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn handle(
    State(state): State<Arc<Mutex<FakeState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let recorded = Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };

    let mut state = state.lock().await;
    let reply = match state.routes.get_mut(&(method, recorded.path.clone())) {
        Some(queue) if queue.len() > 1 => queue.pop_front(),
        Some(queue) => queue.front().cloned(),
        None => None,
    };
    state.requests.push(recorded);

    match reply {
        Some((status, _)) if status == StatusCode::NO_CONTENT => status.into_response(),
        Some((status, body)) => (status, Json(body)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

// =============================================================================
// Caller side
// =============================================================================

#[derive(Default)]
pub struct Store {
    pub loadbalancers: HashMap<String, LoadBalancer>,
    pub pools: HashMap<String, Pool>,
    pub subnets: HashMap<String, Subnet>,
    pub networks: HashMap<String, Network>,
    pub ports: Vec<(Port, PortFilter)>,
    pub lb_updates: Vec<(String, LoadBalancerUpdate)>,
    pub listener_updates: Vec<(String, ListenerUpdate)>,
    pub pool_updates: Vec<(String, PoolUpdate)>,
    pub hm_updates: Vec<(String, HealthMonitorUpdate)>,
    pub port_lookups: usize,
}

/// In-memory datastore that applies updates to nested records, the way a
/// relational store would when the parent is re-read.
#[derive(Default)]
pub struct MemoryDatastore {
    pub state: Mutex<Store>,
}

fn not_found(kind: &str, id: &str) -> XosError {
    XosError::datastore(format!("{} {} not found", kind, id))
}

fn apply_pool_update(pool: &mut Pool, id: &str, update: &PoolUpdate) {
    if pool.id == id {
        pool.backend_id = Some(update.backend_id.clone());
        pool.name = update.name.clone();
    }
}

fn apply_hm_update(pool: &mut Pool, id: &str, update: &HealthMonitorUpdate) {
    if let Some(hm) = pool.healthmonitor.as_mut()
        && hm.id == id
    {
        hm.backend_id = Some(update.backend_id.clone());
        hm.backend_name = Some(update.backend_name.clone());
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get_loadbalancer(&self, _ctx: &Context, id: &str) -> xos_lbaas::Result<LoadBalancer> {
        let state = self.state.lock().await;
        state
            .loadbalancers
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("loadbalancer", id))
    }

    async fn get_pool(&self, _ctx: &Context, id: &str) -> xos_lbaas::Result<Pool> {
        let state = self.state.lock().await;
        state.pools.get(id).cloned().ok_or_else(|| not_found("pool", id))
    }

    async fn update_loadbalancer(
        &self,
        _ctx: &Context,
        id: &str,
        update: LoadBalancerUpdate,
    ) -> xos_lbaas::Result<()> {
        let mut state = self.state.lock().await;
        if let Some(lb) = state.loadbalancers.get_mut(id)
            && update.backend_id.is_some()
        {
            lb.backend_id = update.backend_id.clone();
        }
        state.lb_updates.push((id.to_string(), update));
        Ok(())
    }

    async fn update_listener(
        &self,
        _ctx: &Context,
        id: &str,
        update: ListenerUpdate,
    ) -> xos_lbaas::Result<()> {
        let mut state = self.state.lock().await;
        for lb in state.loadbalancers.values_mut() {
            for listener in lb.listeners.iter_mut().filter(|l| l.id == id) {
                listener.backend_id = Some(update.backend_id.clone());
                listener.name = update.name.clone();
            }
        }
        state.listener_updates.push((id.to_string(), update));
        Ok(())
    }

    async fn update_pool(&self, _ctx: &Context, id: &str, update: PoolUpdate) -> xos_lbaas::Result<()> {
        let mut state = self.state.lock().await;
        for pool in state.pools.values_mut() {
            apply_pool_update(pool, id, &update);
        }
        for lb in state.loadbalancers.values_mut() {
            for pool in lb.pools.iter_mut() {
                apply_pool_update(pool, id, &update);
            }
        }
        state.pool_updates.push((id.to_string(), update));
        Ok(())
    }

    async fn update_healthmonitor(
        &self,
        _ctx: &Context,
        id: &str,
        update: HealthMonitorUpdate,
    ) -> xos_lbaas::Result<()> {
        let mut state = self.state.lock().await;
        for pool in state.pools.values_mut() {
            apply_hm_update(pool, id, &update);
        }
        for lb in state.loadbalancers.values_mut() {
            for pool in lb.pools.iter_mut() {
                apply_hm_update(pool, id, &update);
            }
        }
        state.hm_updates.push((id.to_string(), update));
        Ok(())
    }

    async fn get_ports(&self, _ctx: &Context, filter: &PortFilter) -> xos_lbaas::Result<Vec<Port>> {
        let mut state = self.state.lock().await;
        state.port_lookups += 1;
        Ok(state
            .ports
            .iter()
            .filter(|(_, on)| on == filter)
            .map(|(port, _)| port.clone())
            .collect())
    }

    async fn get_subnet(&self, _ctx: &Context, id: &str) -> xos_lbaas::Result<Subnet> {
        let state = self.state.lock().await;
        state.subnets.get(id).cloned().ok_or_else(|| not_found("subnet", id))
    }

    async fn get_network(&self, _ctx: &Context, id: &str) -> xos_lbaas::Result<Network> {
        let state = self.state.lock().await;
        state.networks.get(id).cloned().ok_or_else(|| not_found("network", id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Succeeded(Entity, CompletionFlags),
    Failed(Entity),
}

/// Forwards every completion callback to a channel.
pub struct ChannelCompletion {
    tx: mpsc::UnboundedSender<Completion>,
}

impl ChannelCompletion {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl CompletionHandler for ChannelCompletion {
    async fn successful_completion(&self, _ctx: &Context, entity: Entity, flags: CompletionFlags) {
        let _ = self.tx.send(Completion::Succeeded(entity, flags));
    }

    async fn failed_completion(&self, _ctx: &Context, entity: Entity) {
        let _ = self.tx.send(Completion::Failed(entity));
    }
}

// =============================================================================
// Harness
// =============================================================================

pub const USER: &str = "admin@xos.test";
pub const PASSWORD: &str = "secret";
pub const LB_PATH: &str = "/api/tenant/loadbalancers/42/";
pub const NETWORKS_PATH: &str = "/api/core/networks/";

/// Driver wired to a fresh fake XOS and an empty datastore.
pub struct Harness {
    pub xos: FakeXos,
    pub datastore: Arc<MemoryDatastore>,
    pub completions: mpsc::UnboundedReceiver<Completion>,
    pub driver: XosDriver,
    pub ctx: Context,
}

impl Harness {
    pub async fn spawn(poll_timeout: Duration) -> Self {
        Self::spawn_with(|config| config.poll_timeout = poll_timeout).await
    }

    pub async fn spawn_with(tweak: impl FnOnce(&mut XosConfig)) -> Self {
        let xos = FakeXos::spawn().await;
        let mut config = XosConfig {
            endpoint: xos.endpoint(),
            user: USER.to_string(),
            password: PASSWORD.to_string(),
            poll_interval: Duration::from_millis(20),
            poll_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        tweak(&mut config);

        let datastore = Arc::new(MemoryDatastore::default());
        let (completion, completions) = ChannelCompletion::new();
        let driver = XosDriver::new(config, datastore.clone(), completion);

        Self {
            xos,
            datastore,
            completions,
            driver,
            ctx: Context::new(Some("project-1".to_string())),
        }
    }

    /// Next completion callback, failing the test if none arrives.
    pub async fn next_completion(&mut self) -> Completion {
        tokio::time::timeout(Duration::from_secs(5), self.completions.recv())
            .await
            .expect("No completion reported")
            .expect("Completion channel closed")
    }

    pub fn no_pending_completion(&mut self) -> bool {
        self.completions.try_recv().is_err()
    }

    /// VIP subnet `subnet-1` on network `tenant-net`.
    pub async fn seed_vip_subnet(&self) {
        let mut state = self.datastore.state.lock().await;
        state.subnets.insert(
            "subnet-1".to_string(),
            Subnet {
                id: "subnet-1".to_string(),
                network_id: "net-1".to_string(),
                cidr: "10.0.0.0/24".to_string(),
                gateway_ip: Some("10.0.0.1".to_string()),
                subnetpool_id: None,
            },
        );
        state.networks.insert(
            "net-1".to_string(),
            Network {
                id: "net-1".to_string(),
                name: "tenant-net".to_string(),
            },
        );
    }

    pub async fn seed_port(&self, id: &str, ip: &str) {
        self.datastore.state.lock().await.ports.push((
            Port { id: id.to_string() },
            PortFilter {
                ip_address: ip.to_string(),
                subnet_id: "subnet-1".to_string(),
            },
        ));
    }

    pub async fn seed_loadbalancer(&self, lb: LoadBalancer) {
        self.datastore
            .state
            .lock()
            .await
            .loadbalancers
            .insert(lb.id.clone(), lb);
    }

    pub async fn seed_pool(&self, pool: Pool) {
        self.datastore
            .state
            .lock()
            .await
            .pools
            .insert(pool.id.clone(), pool);
    }

    pub async fn shutdown(self) {
        self.xos.shutdown().await;
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn load_balancer() -> LoadBalancer {
    LoadBalancer {
        id: "lb-1".to_string(),
        name: "web".to_string(),
        vip_subnet_id: "subnet-1".to_string(),
        ..Default::default()
    }
}

/// `load_balancer()` as it looks once XOS has accepted it.
pub fn linked_load_balancer() -> LoadBalancer {
    LoadBalancer {
        backend_id: Some("42".into()),
        ..load_balancer()
    }
}

pub fn listener() -> Listener {
    Listener {
        id: "l-1".to_string(),
        name: "front".to_string(),
        protocol: "HTTP".to_string(),
        protocol_port: 80,
        backend_id: None,
        loadbalancer_id: "lb-1".to_string(),
    }
}

pub fn pool() -> Pool {
    Pool {
        id: "p-1".to_string(),
        name: "backends".to_string(),
        lb_algorithm: "ROUND_ROBIN".to_string(),
        protocol: "HTTP".to_string(),
        healthmonitor: None,
        backend_id: None,
        loadbalancer_id: "lb-1".to_string(),
    }
}

pub fn health_monitor() -> HealthMonitor {
    HealthMonitor {
        id: "hm-1".to_string(),
        monitor_type: "PING".to_string(),
        delay: 5,
        max_retries: 3,
        timeout: 2,
        backend_name: None,
        backend_id: None,
        pool_id: "p-1".to_string(),
    }
}
