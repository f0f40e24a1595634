//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::RoomRegistry;
use crate::matchmaking::MatchLifecycle;
use crate::store::ResultRecorder;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lifecycle: Arc<MatchLifecycle>,
    pub registry: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config, recorder: ResultRecorder) -> Self {
        let config = Arc::new(config);

        let registry = Arc::new(RoomRegistry::new(config.game.room_settings(), recorder));
        let lifecycle = Arc::new(MatchLifecycle::new(registry.clone()));

        Self {
            config,
            lifecycle,
            registry,
        }
    }
}
