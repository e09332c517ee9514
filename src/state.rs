use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::services::generative::ProblemGenerator;
use crate::services::llm_provider::GenerativeBackend;
use crate::services::practice::PracticeService;
use crate::services::session_store::SessionStore;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    backend: Arc<GenerativeBackend>,
    generator: Arc<ProblemGenerator>,
    practice: Arc<PracticeService>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<GenerativeBackend>) -> Self {
        let generator = Arc::new(ProblemGenerator::new(Arc::clone(&backend)));
        let practice = Arc::new(PracticeService::new(
            Arc::new(SessionStore::new()),
            Arc::clone(&generator),
            config.queue_target,
            config.prefetch_use_llm,
        ));

        Self {
            started_at: Instant::now(),
            backend,
            generator,
            practice,
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn backend(&self) -> &Arc<GenerativeBackend> {
        &self.backend
    }

    pub fn generator(&self) -> &Arc<ProblemGenerator> {
        &self.generator
    }

    pub fn practice(&self) -> &Arc<PracticeService> {
        &self.practice
    }
}
