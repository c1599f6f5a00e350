//! Shared application state.
//!
//! One instance per process, built in `main` and handed to every handler
//! behind an `Arc`. The caches and the throttle table are the only mutable
//! process-wide state; everything durable goes through the database.

use std::sync::Arc;

use barkeep_db::Database;

use crate::auth::AuthThrottle;
use crate::config::ServerConfig;
use crate::telemetry::{CapabilityCache, WeightCache};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub throttle: AuthThrottle,
    pub weights: WeightCache,
    pub capabilities: CapabilityCache,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        AppState {
            db,
            config,
            throttle: AuthThrottle::new(),
            weights: WeightCache::new(),
            capabilities: CapabilityCache::new(),
        }
    }
}

/// Handler-facing handle to the state.
pub type SharedState = Arc<AppState>;
