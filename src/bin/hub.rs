use std::sync::Arc;

use clap::Parser;
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use wattgrid::{
    api::{ApiState, spawn_api_server},
    config::{Config, StorageConfig, read_config_file},
    hub::HubHandle,
    ingest::IngestPipeline,
    liveness::{DeviceRegistry, spawn_sweeper},
    mqtt::spawn_subscriber,
    storage::{MemorySink, StorageSink},
    thresholds::ThresholdEvaluator,
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("wattgrid", LevelFilter::TRACE),
        ("wattgrid_hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    dotenv::dotenv().ok();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    let storage: Arc<dyn StorageSink> = match config.storage {
        StorageConfig::Memory { capacity } => Arc::new(MemorySink::new(capacity)),
    };

    let registry = DeviceRegistry::new(config.liveness);

    // the hub exists before the pipeline, which takes it by injection
    let hub = HubHandle::spawn(config.hub);

    let pipeline = IngestPipeline::new(
        storage.clone(),
        registry.clone(),
        ThresholdEvaluator::new(config.thresholds),
        Arc::new(hub.clone()),
    );

    spawn_sweeper(registry.clone(), config.liveness);
    spawn_subscriber(config.mqtt.clone(), pipeline);

    let state = ApiState {
        registry,
        hub,
        storage,
        session_buffer: config.hub.session_buffer,
    };
    let addr = spawn_api_server(config.api.clone(), state).await?;

    info!("hub running, api on {addr}");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    Ok(())
}
