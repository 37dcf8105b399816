pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::device::handlers as watch;
use crate::device::signature::verify_device_signature;
use crate::documents;
use crate::heartbeat::handlers as heartbeat;
use crate::interview::handlers as interview;
use crate::report::handlers as report;
use crate::resume::handlers as resume;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Watch endpoints are signed with the device secret once one exists.
    let signed = Router::new()
        .route("/api/watch/token/commit", post(watch::handle_token_commit))
        .route("/api/heartbeat/batch", post(heartbeat::handle_heartbeat_batch))
        .route_layer(middleware::from_fn_with_state(
            state.device_auth.clone(),
            verify_device_signature,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        // Resumes
        .route("/api/resumes", post(resume::handle_submit_resume))
        // Interviews
        .route("/api/interviews/demo", post(interview::handle_create_demo))
        .route(
            "/api/interviews/:id/questions",
            get(interview::handle_question_urls),
        )
        .route(
            "/api/interviews/audio/upload-url",
            post(interview::handle_audio_upload_url),
        )
        .route("/api/interviews/reply", post(interview::handle_reply))
        .route(
            "/api/interviews/reply/follow-up",
            post(interview::handle_reply_with_follow_up),
        )
        .route("/api/interviews/end", post(interview::handle_end_interview))
        // Reports
        .route("/api/reports", get(report::handle_list_reports))
        .route(
            "/api/reports/:id",
            get(report::handle_get_report).delete(report::handle_delete_report),
        )
        .route(
            "/api/reports/:id/heartbeat/questions-avg",
            get(report::handle_question_heartbeats),
        )
        // Heartbeats
        .route(
            "/api/heartbeat/interviews/:id/questions-avg",
            get(heartbeat::handle_question_averages),
        )
        // Watch
        .route("/api/watch/register", post(watch::handle_register_watch))
        .route(
            "/api/watch/me",
            get(watch::handle_my_watch).delete(watch::handle_unregister_watch),
        )
        // Documents
        .route(
            "/api/documents/upload-url",
            post(documents::handle_document_upload_url),
        )
        .route("/api/documents/ocr", post(documents::handle_ocr))
        .merge(signed)
        .with_state(state)
}
