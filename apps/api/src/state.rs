use std::sync::Arc;

use crate::avatar::broker::SessionBroker;
use crate::config::Config;
use crate::jobs::catalog::JobCatalog;
use crate::jobs::recommend::Recommender;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Read-only after startup.
    pub catalog: Arc<JobCatalog>,
    /// Pluggable ranking. Default: ProfileRecommender.
    pub recommender: Arc<dyn Recommender>,
    pub broker: Arc<SessionBroker>,
}
