//! XOS tenant resources: paths, request payloads and the parts of the
//! response records the driver reads.

use clap::ValueEnum;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, XosError};
use crate::model::{BackendId, HealthMonitor, Listener, LoadBalancer, Pool};

/// VIP address XOS reports until it has allocated one.
pub const UNSET_VIP: &str = "0.0.0.0";

/// Statistics port XOS expects on every listener.
pub const LISTENER_STAT_PORT: u16 = 10002;

/// Name sent for every health monitor; XOS assigns its own display id.
pub const HEALTH_MONITOR_NAME: &str = "ping";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    #[value(name = "loadbalancer")]
    LoadBalancer,
    Listener,
    Pool,
    #[value(name = "healthmonitor")]
    HealthMonitor,
}

impl Resource {
    pub fn collection(self) -> &'static str {
        match self {
            Resource::LoadBalancer => "/loadbalancers/",
            Resource::Listener => "/listeners/",
            Resource::Pool => "/pools/",
            Resource::HealthMonitor => "/healthmonitors/",
        }
    }

    pub fn item(self, id: &BackendId) -> String {
        format!("{}{}/", self.collection(), id)
    }

    /// Top-level key of the response body.
    pub fn envelope(self) -> &'static str {
        match self {
            Resource::LoadBalancer => "loadbalancer",
            Resource::Listener => "listener",
            Resource::Pool => "pool",
            Resource::HealthMonitor => "health_monitor",
        }
    }
}

/// Members live under their pool.
pub fn member_path(pool_id: &str, member_id: Option<&str>) -> String {
    match member_id {
        Some(id) => format!("/pools/{}/members/{}/", pool_id, id),
        None => format!("/pools/{}/members/", pool_id),
    }
}

/// Unwrap `{"<key>": {...}}` into `T`.
pub fn unwrap_envelope<T: DeserializeOwned>(body: Value, key: &str) -> Result<T> {
    let inner = match body {
        Value::Object(mut map) => map
            .remove(key)
            .ok_or_else(|| XosError::decode(format!("missing '{}' in response", key)))?,
        other => {
            return Err(XosError::decode(format!(
                "expected object with '{}', got {}",
                key, other
            )));
        }
    };
    Ok(serde_json::from_value(inner)?)
}

/// Identifiers XOS assigns to a freshly created resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// `id`: numeric display id, stored as the entity's name.
    pub display_id: Option<BackendId>,
    /// `<resource>_id`: correlation id used to address the resource.
    pub backend_id: BackendId,
}

impl Created {
    pub fn from_response(resource: Resource, body: Value) -> Result<Self> {
        let key = resource.envelope();
        let mut record: serde_json::Map<String, Value> = unwrap_envelope(body, key)?;
        let id_key = format!("{}_id", key);

        let backend_id = record
            .remove(&id_key)
            .ok_or_else(|| XosError::decode(format!("{} response has no '{}'", key, id_key)))?;
        let display_id = match record.remove("id") {
            Some(Value::Null) | None => None,
            Some(id) => Some(serde_json::from_value(id)?),
        };

        Ok(Self {
            display_id,
            backend_id: serde_json::from_value(backend_id)?,
        })
    }

    /// Display id as the name to persist; child resources always carry one.
    pub fn display_name(&self, resource: Resource) -> Result<String> {
        self.display_id
            .as_ref()
            .map(BackendId::to_string)
            .ok_or_else(|| XosError::decode(format!("{} response has no 'id'", resource.envelope())))
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadBalancerRecord {
    #[serde(default)]
    pub vip_address: Option<String>,
    #[serde(default)]
    pub listeners: Option<Vec<BackendId>>,
    #[serde(default)]
    pub pools: Option<Vec<BackendId>>,
}

impl LoadBalancerRecord {
    /// The VIP, once XOS has allocated one.
    pub fn allocated_vip(&self) -> Option<&str> {
        self.vip_address
            .as_deref()
            .filter(|addr| !addr.is_empty() && *addr != UNSET_VIP)
    }

    pub fn has_listener(&self, id: &BackendId) -> bool {
        self.listeners.as_deref().unwrap_or_default().contains(id)
    }

    pub fn has_pool(&self, id: &BackendId) -> bool {
        self.pools.as_deref().unwrap_or_default().contains(id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolRecord {
    #[serde(default)]
    pub health_monitors: Option<Vec<BackendId>>,
}

impl PoolRecord {
    pub fn has_health_monitor(&self, id: &BackendId) -> bool {
        self.health_monitors
            .as_deref()
            .unwrap_or_default()
            .contains(id)
    }
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerArgs {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_network_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<i64>,
}

impl LoadBalancerArgs {
    pub fn new(lb: &LoadBalancer, vip_network_name: Option<String>) -> Self {
        Self {
            name: lb.name.clone(),
            vip_network_name,
            listener: lb.listener_ref(),
            pool: lb.pool_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerArgs {
    pub name: String,
    pub protocol: String,
    pub protocol_port: u16,
    pub stat_port: u16,
}

impl From<&Listener> for ListenerArgs {
    fn from(l: &Listener) -> Self {
        Self {
            name: l.name.clone(),
            protocol: l.protocol.clone(),
            protocol_port: l.protocol_port,
            stat_port: LISTENER_STAT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolArgs {
    pub name: String,
    pub lb_algorithm: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_monitor_id: Option<i64>,
}

impl From<&Pool> for PoolArgs {
    fn from(p: &Pool) -> Self {
        Self {
            name: p.name.clone(),
            lb_algorithm: p.lb_algorithm.clone(),
            protocol: p.protocol.clone(),
            health_monitor_id: p.health_monitor_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMonitorArgs {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub delay: u32,
    pub max_retries: u32,
    pub timeout: u32,
}

impl From<&HealthMonitor> for HealthMonitorArgs {
    fn from(hm: &HealthMonitor) -> Self {
        Self {
            name: HEALTH_MONITOR_NAME,
            monitor_type: hm.monitor_type.clone(),
            delay: hm.delay,
            max_retries: hm.max_retries,
            timeout: hm.timeout,
        }
    }
}
