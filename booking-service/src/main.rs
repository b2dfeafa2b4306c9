use clap::Parser;
use concert_booking::{
    apply_env_overrides, parse_properties_file, wait_for_signal, ServiceConfig,
    ShutdownCoordinator, StoreBackend,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod routes;

const APPLICATION_ID: &str = "booking-service";

#[derive(Parser, Debug)]
#[command(name = "booking-service")]
#[command(about = "Concert booking over a Kafka request/response bridge")]
struct Args {
    /// Config file path (Java properties)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Port to listen on, overrides http.port
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Use the in-process bus instead of Kafka
    #[arg(long = "in-memory-transport")]
    in_memory_transport: bool,

    /// Persist the event store in RocksDB under this directory
    #[arg(short = 'd', long = "state-dir")]
    state_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!(
        requests_topic = %config.requests_topic,
        responses_topic = %config.responses_topic,
        reply_timeout_ms = config.reply_timeout_ms,
        processing_timeout_ms = config.processing_timeout_ms,
        "Starting Booking Service"
    );

    let store = app::build_store(&config).await?;
    let coordinator = ShutdownCoordinator::default();

    let state = if args.in_memory_transport {
        app::start_in_memory(&config, store, &coordinator).await?
    } else {
        app::start_kafka(&config, store, &coordinator).await?
    };

    let router = routes::router(state);
    let listener = tokio::net::TcpListener::bind((config.http_host.as_str(), config.http_port)).await?;
    info!("Booking Service listening on {}", listener.local_addr()?);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_signal())
        .await;

    if let Err(e) = coordinator.shutdown().await {
        error!("Failed to shutdown cleanly: {}", e);
    }
    served?;

    info!("Booking Service stopped");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Config file: {:?}", path);
            parse_properties_file(path, APPLICATION_ID)?
        }
        None => ServiceConfig {
            application_id: APPLICATION_ID.to_string(),
            ..ServiceConfig::default()
        },
    };

    config = apply_env_overrides(config)?;

    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(state_dir) = &args.state_dir {
        config.state_dir = state_dir.to_string_lossy().to_string();
        config.store_backend = StoreBackend::RocksDB;
    }

    Ok(config)
}
