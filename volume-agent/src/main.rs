//! Volume Agent - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use volume_agent::{
    api,
    config::Config,
    daemon,
    fs::OsFileSystem,
    recovery::{host_path, RecoveryReconciler},
    store::HttpRecordStore,
    utils,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Node this agent serves (overrides config and NODE_NAME)
    #[arg(long)]
    node_name: Option<String>,

    /// Namespace of backup and restore records (overrides config)
    #[arg(long)]
    namespace: Option<String>,

    /// Health endpoint port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env_overrides();

    if let Some(node_name) = &args.node_name {
        config.agent.node_name = node_name.clone();
    }
    if let Some(namespace) = &args.namespace {
        config.agent.namespace = namespace.clone();
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    if let Some(port) = args.port {
        config.health.port = port;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    utils::logger::init(&config.log.level, &config.log.format)?;
    api::health::init_start_time();

    tracing::info!(
        node = %config.agent.node_name,
        namespace = %config.agent.namespace,
        "Starting volume-agent v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = HttpRecordStore::new(&config.store)?;

    if config.agent.validate_host_path {
        host_path::validate_pod_volumes_host_path(
            &OsFileSystem,
            &store,
            &config.agent.host_pods_dir,
            &config.agent.node_name,
        )
        .await?;
    }

    // Must finish before any new operation can be picked up.
    let report = RecoveryReconciler::new(&store, &config.agent.namespace, &config.agent.node_name)
        .run()
        .await;

    let state = api::AppState::new(
        config.agent.node_name.clone(),
        config.agent.namespace.clone(),
        report,
    );
    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.health.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("Health endpoint: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(daemon::wait_for_shutdown())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
