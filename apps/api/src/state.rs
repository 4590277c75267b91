use std::sync::{Arc, PoisonError, RwLock};

use crate::chat::session::{ChatContext, ChatSessionManager};
use crate::config::Config;
use crate::screening::orchestrator::BatchOrchestrator;
use crate::screening::queue::ResumeQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub queue: Arc<ResumeQueue>,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub chat: ChatSessionManager,
    /// Free text; empty until the user sets it.
    pub job_description: Arc<RwLock<String>>,
}

impl AppState {
    pub fn new(
        config: Config,
        queue: Arc<ResumeQueue>,
        orchestrator: Arc<BatchOrchestrator>,
        chat: ChatSessionManager,
    ) -> Self {
        Self {
            config,
            queue,
            orchestrator,
            chat,
            job_description: Arc::new(RwLock::new(String::new())),
        }
    }

    pub fn job_description(&self) -> String {
        self.job_description
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_job_description(&self, text: String) {
        *self
            .job_description
            .write()
            .unwrap_or_else(PoisonError::into_inner) = text;
    }

    /// Current job description and processed results, as the chat sees them.
    pub fn chat_context(&self) -> ChatContext {
        ChatContext {
            job_description: self.job_description(),
            candidates: self.queue.processed(),
        }
    }
}
