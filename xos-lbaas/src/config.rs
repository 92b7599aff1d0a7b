//! Driver configuration.
//!
//! `XosArgs` can be flattened into any clap parser that embeds the driver;
//! `XosConfig` is what the driver itself consumes.

use std::time::Duration;

use clap::Args;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9000";
pub const DEFAULT_USER: &str = "xosadmin@opencord.org";

/// Runtime configuration for the XOS driver.
#[derive(Debug, Clone)]
pub struct XosConfig {
    /// XOS service endpoint URL.
    pub endpoint: String,
    /// XOS admin user.
    pub user: String,
    /// XOS admin password.
    pub password: String,
    /// True if XOS is responsible for allocating the VIP.
    pub allocates_vip: bool,
    /// Delay between status polls after a load balancer is created.
    pub poll_interval: Duration,
    /// Give up waiting for a VIP after this long.
    pub poll_timeout: Duration,
    /// Slice that owns networks created for load balancer VIPs.
    pub lbaas_slice_id: u32,
    /// Network template used for those networks.
    pub kuryr_template_id: u32,
}

impl Default for XosConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            allocates_vip: true,
            poll_interval: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(100),
            lbaas_slice_id: 1,
            kuryr_template_id: 1,
        }
    }
}

impl XosConfig {
    /// Endpoint without a trailing slash.
    pub fn endpoint_root(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

/// Command line options for the XOS driver.
#[derive(Args, Debug, Clone)]
pub struct XosArgs {
    /// XOS service endpoint URL
    #[arg(long = "xos-endpoint", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// XOS admin user
    #[arg(long = "xos-user", default_value = DEFAULT_USER)]
    pub user: String,

    /// XOS admin user password
    #[arg(long = "xos-password", default_value = "")]
    pub password: String,

    /// Do not expect XOS to allocate the VIP
    #[arg(long)]
    pub no_allocates_vip: bool,

    /// Interval in seconds to poll XOS after a load balancer is created
    #[arg(long, default_value = "3")]
    pub request_poll_interval: u64,

    /// Seconds after which polling XOS gives up
    #[arg(long, default_value = "100")]
    pub request_poll_timeout: u64,

    /// Slice ID for XOS LBaaS service
    #[arg(long, default_value = "1")]
    pub lbaas_slice_id: u32,

    /// Network template ID for Kuryr type network
    #[arg(long, default_value = "1")]
    pub kuryr_template_id: u32,
}

impl From<XosArgs> for XosConfig {
    fn from(args: XosArgs) -> Self {
        Self {
            endpoint: args.endpoint,
            user: args.user,
            password: args.password,
            allocates_vip: !args.no_allocates_vip,
            poll_interval: Duration::from_secs(args.request_poll_interval),
            poll_timeout: Duration::from_secs(args.request_poll_timeout),
            lbaas_slice_id: args.lbaas_slice_id,
            kuryr_template_id: args.kuryr_template_id,
        }
    }
}
