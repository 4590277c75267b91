pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::screening::handlers as screening;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Screening
        .route(
            "/api/v1/job-description",
            get(screening::handle_get_job_description).put(screening::handle_put_job_description),
        )
        .route(
            "/api/v1/resumes",
            get(screening::handle_list_resumes).post(screening::handle_upload_resumes),
        )
        .route("/api/v1/resumes/:id", delete(screening::handle_delete_resume))
        .route("/api/v1/resumes/:id/result", get(screening::handle_get_result))
        .route("/api/v1/analysis/run", post(screening::handle_run_analysis))
        .route("/api/v1/analysis/events", get(screening::handle_analysis_events))
        // Results
        .route("/api/v1/dashboard", get(screening::handle_dashboard))
        .route("/api/v1/ranking", get(screening::handle_ranking))
        .route("/api/v1/export.csv", get(screening::handle_export_csv))
        // Chat
        .route("/api/v1/chat", get(chat::handle_get_chat))
        .route("/api/v1/chat/messages", post(chat::handle_send_message))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
