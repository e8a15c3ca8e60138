use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fleetwatch::{
    actors::scheduler::SchedulerHandle,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, SourceConfig, read_config_file},
    normalize::Normalizer,
    orchestrator::{CollectionEngine, CycleOptions},
    sources::{
        FactCacheAdapter, RemoteExecAdapter, SourceAdapter, TimeSeriesQueryAdapter,
        fact_cache::PlaybookRunner, remote_exec::OpenSshBackend,
    },
    store::SnapshotStore,
    thresholds::ThresholdPolicy,
};
use tracing::{debug, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("fleetwatch", LevelFilter::TRACE),
        ("hub", LevelFilter::TRACE),
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

fn build_adapter(config: &Config) -> Arc<dyn SourceAdapter> {
    match &config.source {
        SourceConfig::FactCache {
            playbook,
            inventory,
            cache_dir,
        } => Arc::new(FactCacheAdapter::new(Arc::new(PlaybookRunner::new(
            playbook.clone(),
            inventory.clone(),
            cache_dir.clone(),
        )))),
        SourceConfig::Timeseries { port } => Arc::new(TimeSeriesQueryAdapter::new(*port)),
        SourceConfig::RemoteExec { log_path } => {
            Arc::new(RemoteExecAdapter::new(Arc::new(OpenSshBackend), log_path))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;
    config.validate()?;

    let adapter = build_adapter(&config);
    let engine = CollectionEngine::new(
        config.hosts.clone(),
        adapter,
        Normalizer::new(config.identity),
        ThresholdPolicy {
            high_memory_percent: config.high_memory_percent,
        },
        CycleOptions {
            worker_limit: config.worker_limit,
            retry_attempts: config.retry_attempts,
        },
    );

    let store = SnapshotStore::new();
    let scheduler = SchedulerHandle::spawn(
        engine,
        store.clone(),
        Duration::from_secs(config.interval),
    );

    spawn_api_server(
        ApiConfig {
            bind_addr: config.listen,
            enable_cors: true,
        },
        ApiState::new(store),
    )
    .await?;

    debug!("hub running, waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;

    scheduler.shutdown().await?;
    Ok(())
}
