//! Batch Orchestrator — walks the resume queue and analyzes one file at a time.
//!
//! Flow per item: claim (status → analyzing, published) → analyzer.analyze() →
//! settle (status → done | error, result attached, published).
//!
//! Exactly one analysis is in flight per run and exactly one run at a time.
//! `done` items are never re-analyzed; `error` items are retried on the next run.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::analysis::AnalysisOutcome;
use crate::models::resume::ResumeStatus;
use crate::screening::analyzer::ResumeAnalyzer;
use crate::screening::queue::{QueueEvent, ResumeQueue};

/// Counts for one finished batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct BatchOrchestrator {
    queue: Arc<ResumeQueue>,
    analyzer: Arc<dyn ResumeAnalyzer>,
    running: Arc<AtomicBool>,
}

impl BatchOrchestrator {
    pub fn new(queue: Arc<ResumeQueue>, analyzer: Arc<dyn ResumeAnalyzer>) -> Self {
        Self {
            queue,
            analyzer,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Guard clauses run before any analysis call. On success the run is claimed.
    fn begin(&self, job_description: &str) -> Result<RunningGuard, AppError> {
        if job_description.trim().is_empty() {
            return Err(AppError::Validation(
                "Please enter a Job Description first.".to_string(),
            ));
        }
        if self.queue.is_empty() {
            return Err(AppError::Validation(
                "Please upload at least one resume.".to_string(),
            ));
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::Conflict(
                "A batch analysis is already running".to_string(),
            ));
        }
        Ok(RunningGuard(self.running.clone()))
    }

    /// Runs a batch to completion on the current task.
    pub async fn run_batch(&self, job_description: &str) -> Result<BatchSummary, AppError> {
        let guard = self.begin(job_description)?;
        Ok(self.process(job_description, guard).await)
    }

    /// Validates and claims a run, then drives it on a background task.
    pub fn start(
        self: &Arc<Self>,
        job_description: String,
    ) -> Result<JoinHandle<BatchSummary>, AppError> {
        let guard = self.begin(&job_description)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            this.process(&job_description, guard).await
        }))
    }

    async fn process(&self, job_description: &str, guard: RunningGuard) -> BatchSummary {
        let pending_at_start = self.queue.pending_count();
        info!(pending_at_start, "Batch analysis started");
        self.queue.publish(QueueEvent::BatchStarted { pending_at_start });

        let mut attempted = HashSet::new();
        let mut summary = BatchSummary::default();

        while let Some((id, file)) = self.queue.claim_next(&attempted) {
            attempted.insert(id);
            debug!(%id, filename = %file.name, "Analyzing resume");

            let outcome = self.analyzer.analyze(job_description, &file).await;
            if let AnalysisOutcome::Failed { reason, .. } = &outcome {
                debug!(%id, %reason, "Resume will be marked as error");
            }
            debug!(
                %id,
                candidate = %outcome.result().candidate_name,
                score = outcome.result().match_score,
                "Analysis settled"
            );

            match self.queue.settle(id, outcome) {
                Some(ResumeStatus::Done) => summary.succeeded += 1,
                Some(_) => summary.failed += 1,
                None => debug!(%id, "Resume vanished before settlement"),
            }
        }

        drop(guard);

        let progress = self.queue.progress();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            completed = progress.completed,
            total = progress.total,
            "Batch analysis finished"
        );
        self.queue.publish(QueueEvent::BatchFinished {
            succeeded: summary.succeeded,
            failed: summary.failed,
            progress,
        });

        summary
    }
}
