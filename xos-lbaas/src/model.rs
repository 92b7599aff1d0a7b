//! Local LBaaS entities as the caller's datastore hands them to the driver.
//!
//! XOS assigns each resource two identifiers: a correlation id
//! (`<resource>_id`) used to address it, and a numeric display id (`id`).
//! The correlation id is kept in a typed `backend_id` field that is persisted
//! under the caller's existing column (`description`, or `url_path` for
//! health monitors), so records round-trip without a schema change.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Request scope passed through to the datastore and completion callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub request_id: String,
    pub project_id: Option<String>,
}

impl Context {
    pub fn new(project_id: Option<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            project_id,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Identifier assigned by XOS.
///
/// XOS returns these as JSON strings or numbers depending on the resource;
/// both deserialize to the same textual form so ids compare equal no matter
/// where they were read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for BackendId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Signed(n) => Self(n.to_string()),
            Raw::Unsigned(n) => Self(n.to_string()),
        })
    }
}

/// Numeric XOS display id recorded in a name field.
///
/// Absent when the name is empty or not an integer, i.e. when the entity
/// has not been created in XOS yet.
pub fn display_ref(name: &str) -> Option<i64> {
    name.trim().parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub vip_subnet_id: String,
    #[serde(default)]
    pub vip_address: Option<String>,
    #[serde(default)]
    pub vip_port_id: Option<String>,
    #[serde(rename = "description", default)]
    pub backend_id: Option<BackendId>,
    #[serde(default)]
    pub listeners: Vec<Listener>,
    #[serde(default)]
    pub pools: Vec<Pool>,
}

impl LoadBalancer {
    /// XOS display id of the first listener, used to pre-link on create.
    pub fn listener_ref(&self) -> Option<i64> {
        self.listeners.first().and_then(Listener::display_ref)
    }

    /// XOS display id of the first pool, used to pre-link on create.
    pub fn pool_ref(&self) -> Option<i64> {
        self.pools.first().and_then(Pool::display_ref)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub protocol: String,
    pub protocol_port: u16,
    #[serde(rename = "description", default)]
    pub backend_id: Option<BackendId>,
    pub loadbalancer_id: String,
}

impl Listener {
    pub fn display_ref(&self) -> Option<i64> {
        display_ref(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub lb_algorithm: String,
    pub protocol: String,
    #[serde(default)]
    pub healthmonitor: Option<HealthMonitor>,
    #[serde(rename = "description", default)]
    pub backend_id: Option<BackendId>,
    pub loadbalancer_id: String,
}

impl Pool {
    pub fn display_ref(&self) -> Option<i64> {
        display_ref(&self.name)
    }

    /// XOS display id of the attached health monitor, if it has one.
    pub fn health_monitor_ref(&self) -> Option<i64> {
        self.healthmonitor
            .as_ref()
            .and_then(HealthMonitor::display_ref)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub pool_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMonitor {
    pub id: String,
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub delay: u32,
    pub max_retries: u32,
    pub timeout: u32,
    #[serde(rename = "name", default)]
    pub backend_name: Option<String>,
    #[serde(rename = "url_path", default)]
    pub backend_id: Option<BackendId>,
    pub pool_id: String,
}

impl HealthMonitor {
    pub fn display_ref(&self) -> Option<i64> {
        self.backend_name.as_deref().and_then(display_ref)
    }
}

// =============================================================================
// Datastore updates
// =============================================================================

/// Fields written back to a load balancer record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadBalancerUpdate {
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<BackendId>,
}

/// Fields written back to a listener record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerUpdate {
    #[serde(rename = "description")]
    pub backend_id: BackendId,
    pub name: String,
}

/// Fields written back to a pool record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolUpdate {
    #[serde(rename = "description")]
    pub backend_id: BackendId,
    pub name: String,
}

/// Fields written back to a health monitor record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMonitorUpdate {
    #[serde(rename = "url_path")]
    pub backend_id: BackendId,
    #[serde(rename = "name")]
    pub backend_name: String,
}

// =============================================================================
// Completion reporting
// =============================================================================

/// Any entity the driver reports completion for.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    LoadBalancer(LoadBalancer),
    Listener(Listener),
    Pool(Pool),
    Member(Member),
    HealthMonitor(HealthMonitor),
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::LoadBalancer(_) => "loadbalancer",
            Entity::Listener(_) => "listener",
            Entity::Pool(_) => "pool",
            Entity::Member(_) => "member",
            Entity::HealthMonitor(_) => "healthmonitor",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::LoadBalancer(e) => &e.id,
            Entity::Listener(e) => &e.id,
            Entity::Pool(e) => &e.id,
            Entity::Member(e) => &e.id,
            Entity::HealthMonitor(e) => &e.id,
        }
    }
}

/// Distinguishes what a successful completion finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionFlags {
    /// A load balancer create finished and its VIP is known.
    pub lb_create: bool,
    /// The entity was removed from XOS.
    pub delete: bool,
}

impl CompletionFlags {
    pub const NONE: Self = Self {
        lb_create: false,
        delete: false,
    };
    pub const LB_CREATE: Self = Self {
        lb_create: true,
        delete: false,
    };
    pub const DELETE: Self = Self {
        lb_create: false,
        delete: true,
    };
}
