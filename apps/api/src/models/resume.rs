use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::analysis::AnalysisResult;

/// Processing state of an uploaded resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeStatus {
    Idle,
    Analyzing,
    Done,
    Error,
}

impl ResumeStatus {
    /// True once the item has settled, successfully or not.
    pub fn is_settled(self) -> bool {
        matches!(self, ResumeStatus::Done | ResumeStatus::Error)
    }
}

/// Raw uploaded file. Bytes are reference-counted so queue snapshots stay cheap.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl ResumeFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedResume {
    pub id: Uuid,
    pub file: ResumeFile,
    pub status: ResumeStatus,
    /// Present iff status is `Done` or `Error`.
    pub result: Option<AnalysisResult>,
    pub added_at: DateTime<Utc>,
}

impl UploadedResume {
    pub fn new(file: ResumeFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            file,
            status: ResumeStatus::Idle,
            result: None,
            added_at: Utc::now(),
        }
    }

    pub fn view(&self) -> ResumeView {
        ResumeView {
            id: self.id,
            filename: self.file.name.clone(),
            size: self.file.size,
            mime_type: self.file.mime_type.clone(),
            status: self.status,
            result: self.result.clone(),
            added_at: self.added_at,
        }
    }
}

/// Serializable view of a queue item (payload bytes omitted).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeView {
    pub id: Uuid,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub status: ResumeStatus,
    pub result: Option<AnalysisResult>,
    pub added_at: DateTime<Utc>,
}
