use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use nsxt_sdk::{BfdStatusCount, TransportZoneStatus, TunnelStatusCount};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nsxt_mock::{AppState, ManagerState, create_router};

#[derive(Parser)]
#[command(name = "nsxt-mock")]
#[command(about = "In-memory NSX-T manager serving the ns-services API over plain HTTP")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:8443")]
    listen: SocketAddr,

    /// Reads during which new objects stay invisible and deleted ones linger
    #[arg(long, default_value = "0")]
    visibility_lag: u32,

    /// Transport zone IDs to seed with a healthy tunnel status (can be repeated)
    #[arg(long)]
    transport_zone: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("nsxt_mock=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut state = ManagerState::with_visibility_lag(args.visibility_lag);
    for zone_id in &args.transport_zone {
        state.put_transport_zone_status(TransportZoneStatus {
            transport_zone_id: zone_id.clone(),
            num_transport_nodes: 2,
            tunnel_status: TunnelStatusCount {
                bfd_status: BfdStatusCount {
                    bfd_up_count: 2,
                    ..Default::default()
                },
                up_count: 2,
                down_count: 0,
                status: Some("UP".to_string()),
            },
        });
    }

    let app_state = Arc::new(AppState {
        state: Arc::new(RwLock::new(state)),
    });
    let router = create_router(app_state);

    let listener = TcpListener::bind(args.listen).await?;
    info!(
        addr = %listener.local_addr()?,
        visibility_lag = args.visibility_lag,
        "Mock NSX-T manager listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
