use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use xos_lbaas::driver::TENANT_BASE;
use xos_lbaas::manager::load_balancer::fetch_record;
use xos_lbaas::resource::Resource;
use xos_lbaas::{
    BackendId, NetworkProvisioner, PollOutcome, XosArgs, XosClient, XosConfig, XosError,
    XosNetworkManager, poll_until,
};

#[derive(Parser)]
#[command(name = "xos-lbaas")]
#[command(about = "Inspect the LBaaS resources of an XOS endpoint")]
struct Args {
    #[command(flatten)]
    xos: XosArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether exactly one XOS network has this name
    NetworkExists { name: String },

    /// Print a tenant resource by its XOS id
    Get {
        #[arg(value_enum)]
        kind: Resource,
        id: String,
    },

    /// Poll a load balancer until XOS has allocated its VIP
    WaitVip { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("xos_lbaas=info".parse()?))
        .init();

    let args = Args::parse();
    let config = XosConfig::from(args.xos);

    info!(endpoint = %config.endpoint_root(), "Using XOS endpoint");

    match args.command {
        Command::NetworkExists { name } => {
            let networks = XosNetworkManager::new(&config);
            let exists = networks
                .network_exist(&name)
                .await
                .with_context(|| format!("failed to look up network {}", name))?;
            println!("{}", exists);
        }
        Command::Get { kind, id } => {
            let client = tenant_client(&config);
            let body = client
                .get(&kind.item(&BackendId::new(id.clone())))
                .await
                .with_context(|| format!("failed to fetch {} {}", kind.envelope(), id))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::WaitVip { id } => {
            let client = tenant_client(&config);
            let backend_id = BackendId::new(id);

            let (cancel_tx, cancel_rx) = oneshot::channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = cancel_tx.send(());
                }
            });

            let outcome = poll_until(config.poll_interval, config.poll_timeout, cancel_rx, || {
                let client = client.clone();
                let backend_id = backend_id.clone();
                async move {
                    let record = fetch_record(&client, &backend_id).await?;
                    Ok::<_, XosError>(record.allocated_vip().map(str::to_string))
                }
            })
            .await;

            match outcome {
                PollOutcome::Completed(vip) => println!("{}", vip),
                PollOutcome::TimedOut => {
                    bail!("no VIP for load balancer {} after {:?}", backend_id, config.poll_timeout)
                }
                PollOutcome::Cancelled => warn!(id = %backend_id, "Interrupted"),
                PollOutcome::Failed(e) => {
                    return Err(e).context(format!("failed to poll load balancer {}", backend_id));
                }
            }
        }
    }

    Ok(())
}

fn tenant_client(config: &XosConfig) -> XosClient {
    XosClient::new(
        config.endpoint_root(),
        TENANT_BASE,
        &config.user,
        &config.password,
    )
}
