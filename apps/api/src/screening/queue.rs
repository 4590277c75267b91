//! Resume Queue: the owned, ordered set of uploaded resumes.
//!
//! Every mutation publishes a `QueueEvent` on a broadcast channel so readers
//! (SSE subscribers, tests) observe status changes without polling.
//! Locks are never held across an `.await`.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::{AnalysisOutcome, AnalysisResult};
use crate::models::resume::{ResumeFile, ResumeStatus, ResumeView, UploadedResume};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Derived batch progress. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

impl Progress {
    pub fn from_items(items: &[UploadedResume]) -> Self {
        let completed = items.iter().filter(|r| r.status.is_settled()).count();
        let total = items.len();
        let percentage = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self {
            completed,
            total,
            percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    ResumeAdded {
        id: Uuid,
        filename: String,
    },
    ResumeRemoved {
        id: Uuid,
    },
    StatusChanged {
        id: Uuid,
        status: ResumeStatus,
        progress: Progress,
    },
    /// Items could be uploaded while the run is going; those are processed too,
    /// so the final count can exceed `pending_at_start`.
    BatchStarted {
        pending_at_start: usize,
    },
    BatchFinished {
        succeeded: usize,
        failed: usize,
        progress: Progress,
    },
}

pub struct ResumeQueue {
    items: RwLock<Vec<UploadedResume>>,
    events: broadcast::Sender<QueueEvent>,
}

impl Default for ResumeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ResumeQueue {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            items: RwLock::new(Vec::new()),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<UploadedResume>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<UploadedResume>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }

    pub fn add(&self, file: ResumeFile) -> ResumeView {
        let resume = UploadedResume::new(file);
        let view = resume.view();
        self.write().push(resume);
        self.publish(QueueEvent::ResumeAdded {
            id: view.id,
            filename: view.filename.clone(),
        });
        view
    }

    /// Removes an item. Rejected while the item is being analyzed.
    pub fn remove(&self, id: Uuid) -> Result<(), AppError> {
        {
            let mut items = self.write();
            let index = items
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
            if items[index].status == ResumeStatus::Analyzing {
                return Err(AppError::Conflict(format!(
                    "Resume {id} is being analyzed and cannot be removed"
                )));
            }
            items.remove(index);
        }
        self.publish(QueueEvent::ResumeRemoved { id });
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<ResumeView> {
        self.read().iter().find(|r| r.id == id).map(UploadedResume::view)
    }

    pub fn views(&self) -> Vec<ResumeView> {
        self.read().iter().map(UploadedResume::view).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn progress(&self) -> Progress {
        Progress::from_items(&self.read())
    }

    /// Number of items a batch run would process right now.
    pub fn pending_count(&self) -> usize {
        self.read()
            .iter()
            .filter(|r| r.status != ResumeStatus::Done)
            .count()
    }

    /// Atomically selects the first item (queue order) that is not `Done` and not yet
    /// attempted in the current run, and marks it `Analyzing`.
    pub fn claim_next(&self, attempted: &HashSet<Uuid>) -> Option<(Uuid, ResumeFile)> {
        let (id, file, progress) = {
            let mut items = self.write();
            let resume = items
                .iter_mut()
                .find(|r| r.status != ResumeStatus::Done && !attempted.contains(&r.id))?;
            resume.status = ResumeStatus::Analyzing;
            let claimed = (resume.id, resume.file.clone());
            (claimed.0, claimed.1, Progress::from_items(&items))
        };

        self.publish(QueueEvent::StatusChanged {
            id,
            status: ResumeStatus::Analyzing,
            progress,
        });
        Some((id, file))
    }

    /// Records the outcome of an analysis and returns the resulting status.
    pub fn settle(&self, id: Uuid, outcome: AnalysisOutcome) -> Option<ResumeStatus> {
        let status = if outcome.is_completed() {
            ResumeStatus::Done
        } else {
            ResumeStatus::Error
        };

        let progress = {
            let mut items = self.write();
            let resume = items.iter_mut().find(|r| r.id == id)?;
            resume.status = status;
            resume.result = Some(outcome.into_result());
            Progress::from_items(&items)
        };

        self.publish(QueueEvent::StatusChanged {
            id,
            status,
            progress,
        });
        Some(status)
    }

    /// Results of successfully analyzed resumes, in queue order.
    pub fn processed(&self) -> Vec<AnalysisResult> {
        self.read()
            .iter()
            .filter(|r| r.status == ResumeStatus::Done)
            .filter_map(|r| r.result.clone())
            .collect()
    }

    /// Every attached result, failures included, in queue order.
    pub fn results(&self) -> Vec<AnalysisResult> {
        self.read().iter().filter_map(|r| r.result.clone()).collect()
    }
}
