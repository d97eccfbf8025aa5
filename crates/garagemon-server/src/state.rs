use crate::identity::{IdentityLookup, NoIdentity};
use chrono::{DateTime, Utc};
use garagemon_core::actuator::Actuator;
use garagemon_core::config::Config;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub actuator: Arc<Actuator>,
    pub config: Arc<Config>,
    pub started_at: DateTime<Utc>,
    pub identity: Arc<dyn IdentityLookup>,
}

impl AppState {
    pub fn new(actuator: Arc<Actuator>, config: Arc<Config>) -> Self {
        Self {
            actuator,
            config,
            started_at: Utc::now(),
            identity: Arc::new(NoIdentity),
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityLookup>) -> Self {
        self.identity = identity;
        self
    }
}
