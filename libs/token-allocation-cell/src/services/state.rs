use std::sync::Arc;

use tokio::sync::RwLock;

use shared_config::AppConfig;

use crate::services::engine::AllocationEngine;

/// The engine behind one lock. Every mutating call takes the write half, so
/// allocations, cancellations, emergencies and replays never interleave.
pub type SharedEngine = Arc<RwLock<AllocationEngine>>;

#[derive(Debug, Clone)]
pub struct AllocationState {
    pub config: Arc<AppConfig>,
    pub engine: SharedEngine,
}

impl AllocationState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_engine(config, AllocationEngine::new())
    }

    pub fn with_engine(config: Arc<AppConfig>, engine: AllocationEngine) -> Self {
        Self {
            config,
            engine: Arc::new(RwLock::new(engine)),
        }
    }
}
