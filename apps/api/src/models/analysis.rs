use serde::{Deserialize, Serialize};

/// Summary attached to every failed analysis.
pub const FAILED_ANALYSIS_SUMMARY: &str =
    "Failed to analyze resume. Please check the file format and try again.";

/// Candidate name attached to every failed analysis.
pub const UNKNOWN_CANDIDATE: &str = "Unknown";

/// Structured assessment of one resume against the job description.
/// `filename` always comes from the uploaded file, never from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub candidate_name: String,
    pub match_score: u32, // 0 – 100
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub summary: String,
    pub filename: String,
}

impl AnalysisResult {
    /// The placeholder result attached to a resume whose analysis failed.
    pub fn sentinel(filename: impl Into<String>) -> Self {
        Self {
            candidate_name: UNKNOWN_CANDIDATE.to_string(),
            match_score: 0,
            matched_skills: vec![],
            missing_skills: vec![],
            summary: FAILED_ANALYSIS_SUMMARY.to_string(),
            filename: filename.into(),
        }
    }
}

/// Outcome of a single analysis call. A zero score inside `Completed` is a
/// genuine model judgement, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(AnalysisResult),
    Failed {
        reason: String,
        result: AnalysisResult,
    },
}

impl AnalysisOutcome {
    pub fn failed(filename: &str, reason: impl Into<String>) -> Self {
        AnalysisOutcome::Failed {
            reason: reason.into(),
            result: AnalysisResult::sentinel(filename),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, AnalysisOutcome::Completed(_))
    }

    pub fn result(&self) -> &AnalysisResult {
        match self {
            AnalysisOutcome::Completed(result) => result,
            AnalysisOutcome::Failed { result, .. } => result,
        }
    }

    pub fn into_result(self) -> AnalysisResult {
        match self {
            AnalysisOutcome::Completed(result) => result,
            AnalysisOutcome::Failed { result, .. } => result,
        }
    }
}
