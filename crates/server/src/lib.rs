//! HTTP command surface for blog2pod.
//!
//! Requests are acknowledged immediately and the podcast is built on a
//! background task. Job state lives in memory only and is lost on restart;
//! only the most recent finished jobs are kept.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::routing::{get, post};
use blog2pod_core::Blog2Pod;
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::debug;
use uuid::Uuid;

pub mod handlers;

/// Finished jobs kept for status lookups before the oldest are evicted.
pub const DEFAULT_FINISHED_JOB_LIMIT: usize = 256;

/// Lifecycle of a podcast request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// One podcast request and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub status: JobStatus,
    /// Reply text for the requester once the job has finished.
    pub message: Option<String>,
    /// Path of the finished podcast.
    pub file: Option<String>,
    #[serde(skip)]
    finished_seq: Option<u64>,
}

impl Job {
    pub fn queued(url: &str) -> Self {
        Self { id: Uuid::new_v4(), url: url.to_string(), status: JobStatus::Queued, message: None, file: None, finished_seq: None }
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Blog2Pod>,
    pub jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
    finished_job_limit: usize,
    finished_count: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(pipeline: Blog2Pod) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            jobs: Arc::default(),
            finished_job_limit: DEFAULT_FINISHED_JOB_LIMIT,
            finished_count: Arc::default(),
        }
    }

    pub fn with_finished_job_limit(mut self, limit: usize) -> Self {
        self.finished_job_limit = limit;
        self
    }

    /// Applies the outcome of job `id`, then evicts the oldest finished jobs
    /// beyond the limit. Queued and running jobs are never evicted.
    pub async fn finish_job(&self, id: Uuid, update: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else { return };
        update(job);
        job.finished_seq = Some(self.finished_count.fetch_add(1, Ordering::Relaxed));

        let mut finished: Vec<(u64, Uuid)> =
            jobs.values().filter_map(|job| job.finished_seq.map(|seq| (seq, job.id))).collect();
        if finished.len() > self.finished_job_limit {
            finished.sort_unstable();
            let excess = finished.len() - self.finished_job_limit;
            for (_, old) in finished.into_iter().take(excess) {
                debug!(id = %old, "evicting finished job");
                jobs.remove(&old);
            }
        }
    }

    pub async fn job(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/blog2pod", post(handlers::submit_url))
        .route("/webhook", post(handlers::webhook))
        .route("/jobs/{id}", get(handlers::job_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
