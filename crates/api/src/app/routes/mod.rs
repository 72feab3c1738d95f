use axum::{
    Router,
    routing::{get, post},
};

pub mod queue_events;
pub mod queues;
pub mod sessions;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route(
            "/queues/:queue/jobs",
            post(queues::enqueue_job).get(queues::list_jobs),
        )
        .route("/queues/:queue/jobs/:id", get(queues::get_job))
        .route("/ws/queue-events", get(queue_events::queue_events_ws))
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:id/log", get(sessions::session_log))
        .route("/ws/sessions/:id", get(sessions::attach_ws))
}
