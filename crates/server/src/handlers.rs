use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blog2pod_core::{Reply, parse_command, validate_url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{AppState, Job, JobStatus};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
}

/// A chat message relayed by a webhook.
#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub content: String,
    #[serde(default)]
    pub webhook_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub job_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

/// POST /blog2pod
pub async fn submit_url(State(state): State<AppState>, Json(request): Json<SubmitRequest>) -> Response {
    submit(&state, &request.url).await
}

/// POST /webhook
///
/// Messages that are not `!blog2pod` commands are ignored with 204.
pub async fn webhook(State(state): State<AppState>, Json(message): Json<WebhookMessage>) -> Response {
    match parse_command(&message.content) {
        Some(url) => {
            info!(webhook_id = ?message.webhook_id, "command received");
            submit(&state, &url).await
        }
        None => {
            debug!(webhook_id = ?message.webhook_id, "ignoring non-command message");
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

/// GET /jobs/{id}
pub async fn job_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.job(id).await {
        Some(job) => Json(job).into_response(),
        None => (StatusCode::NOT_FOUND, Json(ErrorBody { error: format!("unknown job {}", id) })).into_response(),
    }
}

async fn submit(state: &AppState, url: &str) -> Response {
    if let Err(e) = validate_url(url) {
        info!(url, "rejected invalid URL");
        let body = ErrorBody { error: Reply::failure(&e).to_string() };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let job = Job::queued(url);
    let id = job.id;
    state.jobs.write().await.insert(id, job);
    info!(%id, url, "{}", Reply::Acknowledged);

    tokio::spawn(run_job(state.clone(), id, url.to_string()));

    let body = Accepted { job_id: id, message: Reply::Acknowledged.to_string() };
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

async fn run_job(state: AppState, id: Uuid, url: String) {
    if let Some(job) = state.jobs.write().await.get_mut(&id) {
        job.status = JobStatus::Running;
    }

    let result = state.pipeline.run(&url).await;

    state
        .finish_job(id, |job| match result {
            Ok(podcast) => {
                info!(%id, path = %podcast.path.display(), "job succeeded");
                job.status = JobStatus::Succeeded;
                job.message = Some(Reply::success(&podcast).to_string());
                job.file = Some(podcast.path.display().to_string());
            }
            Err(e) => {
                warn!(%id, error = %e, "job failed");
                job.status = JobStatus::Failed;
                job.message = Some(Reply::failure(&e).to_string());
            }
        })
        .await;
}
