use std::sync::Arc;

use crate::services::JobService;
use crate::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobService>,
    pub store: Arc<dyn JobStore>,
}
