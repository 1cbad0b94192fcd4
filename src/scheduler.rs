//! Background workers: fixed-interval loops that stop on the shutdown signal.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::engine::Engine;
use crate::shutdown::ShutdownSignal;

/// Run `job` every `period` until shutdown. A zero period disables the worker.
///
/// The first run happens one full period after start. A run in progress when
/// shutdown fires is allowed to finish; no further run starts.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: ShutdownSignal,
    mut job: F,
) -> Option<JoinHandle<()>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if period.is_zero() {
        info!(worker = name, "Worker disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;
        info!(worker = name, period_ms = period.as_millis() as u64, "Worker started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => job().await,
            }
        }

        info!(worker = name, "Worker stopped");
    }))
}

/// Handles for every engine worker
pub struct Workers {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Workers {
    /// Start combat, respawn, population and regeneration workers
    pub fn start(engine: Arc<Engine>, shutdown: &ShutdownSignal) -> Self {
        let config = engine.config().clone();
        let mut handles = Vec::new();

        let combat = engine.clone();
        if let Some(handle) = spawn_periodic("combat", config.combat.tick(), shutdown.clone(), move || {
            let engine = combat.clone();
            async move { engine.combat_tick().await }
        }) {
            handles.push(("combat", handle));
        }

        let respawn = engine.clone();
        if let Some(handle) = spawn_periodic("respawn", config.respawn.sweep(), shutdown.clone(), move || {
            let engine = respawn.clone();
            async move {
                engine.respawn_sweep().await;
            }
        }) {
            handles.push(("respawn", handle));
        }

        if config.population.enabled {
            let population = engine.clone();
            if let Some(handle) =
                spawn_periodic("population", config.population.interval(), shutdown.clone(), move || {
                    let engine = population.clone();
                    async move {
                        engine.population_sweep().await;
                    }
                })
            {
                handles.push(("population", handle));
            }
        } else {
            info!(worker = "population", "Worker disabled");
        }

        let regen = engine;
        if let Some(handle) = spawn_periodic("regen", config.regen.interval(), shutdown.clone(), move || {
            let engine = regen.clone();
            async move {
                engine.regen_sweep().await;
            }
        }) {
            handles.push(("regen", handle));
        }

        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit
    pub async fn join(self) {
        let (names, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                error!(worker = name, "Worker panicked: {}", e);
            }
        }
    }
}
