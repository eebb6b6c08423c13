use std::sync::Arc;

use jobs::InMemJobs;
use orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<InMemJobs<Orchestrator>>,
}

impl AppState {
    pub fn new_default() -> Self {
        let jobs = InMemJobs::new(Orchestrator::default());
        Self { jobs: Arc::new(jobs) }
    }
}
