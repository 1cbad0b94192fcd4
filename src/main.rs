use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spire_engine::data::ItemRegistry;
use spire_engine::entity::EntityRegistry;
use spire_engine::{
    Catalog, ChannelNotifier, DataError, Engine, EngineConfig, InMemoryBossTracker, Workers, World,
    shutdown_channel,
};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spire_engine=info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("Startup failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), DataError> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("engine.toml"));
    let config = EngineConfig::load(&config_path)?;
    let data_dir = config.world.data_dir.clone();

    // Load game data
    let mut items = ItemRegistry::new();
    items.load_from_directory(&data_dir)?;
    let mut entities = EntityRegistry::new();
    entities.load_from_directory(&data_dir)?;
    let world = World::load(&data_dir.join("world.toml"))?;

    let items = Arc::new(items);
    let entities = Arc::new(entities);
    let bosses = Arc::new(InMemoryBossTracker::new(world.areas().iter().map(|a| a.id.clone())));
    let notifier = Arc::new(ChannelNotifier::new());

    let engine = Arc::new(
        Engine::new(config, world, entities.clone(), notifier, bosses)
            .with_catalog(Arc::new(Catalog::new(items, entities))),
    );
    engine.populate().await;

    let (shutdown, signal) = shutdown_channel();
    let workers = Workers::start(engine.clone(), &signal);
    info!("Engine running with {} workers, press Ctrl+C to stop", workers.len());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    shutdown.trigger();
    workers.join().await;
    info!("Engine stopped with {} players online", engine.online_count().await);
    Ok(())
}
