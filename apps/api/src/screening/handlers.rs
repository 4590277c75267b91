use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;
use crate::models::resume::{ResumeFile, ResumeStatus, ResumeView};
use crate::screening::aggregator::{self, DashboardStats, ScoreBand};
use crate::screening::analyzer::resolve_mime_type;
use crate::screening::export::{to_csv, CSV_FILENAME};
use crate::screening::queue::Progress;
use crate::state::AppState;

/// Extensions the upload endpoint accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["pdf", "txt", "doc", "docx"];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptionBody {
    pub job_description: String,
}

#[derive(Serialize)]
pub struct QueueSnapshot {
    pub resumes: Vec<ResumeView>,
    pub progress: Progress,
    pub running: bool,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub added: Vec<ResumeView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDetail {
    pub id: Uuid,
    pub status: ResumeStatus,
    pub band: ScoreBand,
    pub result: AnalysisResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAccepted {
    /// Not yet analyzed when the run was accepted. Later uploads join the run.
    pub pending_at_start: usize,
    pub total: usize,
}

/// GET /api/v1/job-description
pub async fn handle_get_job_description(State(state): State<AppState>) -> Json<JobDescriptionBody> {
    Json(JobDescriptionBody {
        job_description: state.job_description(),
    })
}

/// PUT /api/v1/job-description
pub async fn handle_put_job_description(
    State(state): State<AppState>,
    Json(req): Json<JobDescriptionBody>,
) -> Json<JobDescriptionBody> {
    state.set_job_description(req.job_description.clone());
    Json(req)
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(State(state): State<AppState>) -> Json<QueueSnapshot> {
    Json(QueueSnapshot {
        resumes: state.queue.views(),
        progress: state.queue.progress(),
        running: state.orchestrator.is_running(),
    })
}

/// POST /api/v1/resumes (multipart, repeated `files` field)
///
/// The whole upload is validated before anything is queued, so one rejected
/// file leaves the queue unchanged.
pub async fn handle_upload_resumes(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("files") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Uploaded file has no name".to_string()))?;
        if !has_accepted_extension(&name) {
            return Err(AppError::Validation(format!(
                "Unsupported file type for '{name}'. Accepted: .pdf, .txt, .doc, .docx"
            )));
        }
        let declared = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        files.push(ResumeFile::new(
            name.clone(),
            resolve_mime_type(&name, &declared),
            bytes,
        ));
    }

    if files.is_empty() {
        return Err(AppError::Validation(
            "No files were uploaded in the 'files' field".to_string(),
        ));
    }

    let added: Vec<ResumeView> = files.into_iter().map(|f| state.queue.add(f)).collect();
    info!(count = added.len(), "Resumes uploaded");
    Ok((StatusCode::CREATED, Json(UploadResponse { added })))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.queue.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/resumes/:id/result
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultDetail>, AppError> {
    let view = state
        .queue
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    let result = view
        .result
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} has not been analyzed yet")))?;

    Ok(Json(ResultDetail {
        id,
        status: view.status,
        band: ScoreBand::from_score(result.match_score),
        result,
    }))
}

/// POST /api/v1/analysis/run
pub async fn handle_run_analysis(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RunAccepted>), AppError> {
    let pending_at_start = state.queue.pending_count();
    state.orchestrator.start(state.job_description())?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RunAccepted {
            pending_at_start,
            total: state.queue.len(),
        }),
    ))
}

/// GET /api/v1/analysis/events
///
/// Lagging subscribers skip the missed events; clients re-read the snapshot.
pub async fn handle_analysis_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.queue.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event("queue").data(json));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Queue event subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// GET /api/v1/dashboard
pub async fn handle_dashboard(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(aggregator::dashboard(&state.queue.processed()))
}

/// GET /api/v1/ranking
pub async fn handle_ranking(State(state): State<AppState>) -> Json<Vec<AnalysisResult>> {
    Json(aggregator::rank(&state.queue.processed()))
}

/// GET /api/v1/export.csv
pub async fn handle_export_csv(State(state): State<AppState>) -> impl IntoResponse {
    let csv = to_csv(&state.queue.results());
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{CSV_FILENAME}\""),
            ),
        ],
        csv,
    )
}

fn has_accepted_extension(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(e.body_text())
    }
}
