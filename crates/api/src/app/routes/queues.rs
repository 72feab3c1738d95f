//! Job endpoints: enqueue, snapshot, listing.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use netops_queue::{JobId, JobPayload, JobState};

use crate::app::errors::{json_error, queue_error_to_response};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

fn may_enqueue(principal: &PrincipalContext) -> bool {
    let p = principal.principal();
    p.is_admin() || p.roles.contains(&netops_auth::Role::Operator)
}

/// POST /queues/:queue/jobs
pub async fn enqueue_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(queue): Path<String>,
    Json(payload): Json<JobPayload>,
) -> axum::response::Response {
    if !may_enqueue(&principal) {
        return json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden");
    }
    if payload.queue() != queue {
        return json_error(
            StatusCode::BAD_REQUEST,
            "queue_mismatch",
            format!("payload belongs to queue {}", payload.queue()),
        );
    }

    match services.queue.enqueue(payload) {
        Ok(outcome) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "job_id": outcome.job.id,
                "queue": outcome.job.queue,
            })),
        )
            .into_response(),
        Err(err) => queue_error_to_response(err),
    }
}

/// GET /queues/:queue/jobs/:id
pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path((queue, id)): Path<(String, String)>,
) -> axum::response::Response {
    match services.queue.get(&queue, &JobId::from(id)) {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        Err(err) => queue_error_to_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    state: Option<JobState>,
    #[serde(default)]
    start: usize,
    #[serde(default = "default_end")]
    end: usize,
}

fn default_end() -> usize {
    50
}

/// GET /queues/:queue/jobs?state=&start=&end=
pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Path(queue): Path<String>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    match services
        .queue
        .list(&queue, query.state, query.start, query.end)
    {
        Ok(jobs) => Json(jobs).into_response(),
        Err(err) => queue_error_to_response(err),
    }
}
