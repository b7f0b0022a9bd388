//! Background job store for the HTTP layer.
//!
//! Each accepted upload becomes a job that runs the pipeline on a spawned
//! task. Progress lines are kept as a replayable history plus a live
//! broadcast channel, recorded under one lock so a late subscriber sees
//! every line exactly once.

use crate::config::Config;
use crate::error::{AnalyzerError, Result};
use crate::llm::LlmRouter;
use crate::orchestrator;
use crate::pipeline::{AnalysisArtifacts, EventTap, PipelineEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Line that closes a successful progress stream
pub const WORKFLOW_DONE_LINE: &str = "event:WORKFLOW_DONE";

const CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Done,
    Error,
}

/// Snapshot returned by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct JobRecord {
    status: JobStatus,
    artifacts: Option<AnalysisArtifacts>,
    error: Option<String>,
    history: Vec<String>,
    live: broadcast::Sender<String>,
    created_at: DateTime<Utc>,
}

type JobStore = Arc<Mutex<HashMap<String, JobRecord>>>;

/// Owns the job store and spawns one pipeline run per submitted archive
pub struct JobManager {
    jobs: JobStore,
    config: Arc<Config>,
    llm: Option<Arc<LlmRouter>>,
}

/// Returns true for the line that must close a progress stream
pub fn is_terminal_line(line: &str) -> bool {
    line == WORKFLOW_DONE_LINE || line.starts_with("error:")
}

fn lock(jobs: &JobStore) -> MutexGuard<'_, HashMap<String, JobRecord>> {
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Appends a line to the job's history and relays it to live subscribers.
///
/// History push and broadcast happen under the same lock, which is what
/// keeps replay plus live tail gap-free and duplicate-free.
fn record_line(jobs: &JobStore, job_id: &str, line: String) {
    let mut guard = lock(jobs);
    if let Some(record) = guard.get_mut(job_id) {
        record.history.push(line.clone());
        let _ = record.live.send(line);
    }
}

impl JobManager {
    pub fn new(config: Config) -> Result<Self> {
        let llm = if config.polish {
            Some(Arc::new(LlmRouter::from_config(&config)?))
        } else {
            None
        };
        Ok(Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            config: Arc::new(config),
            llm,
        })
    }

    /// Registers a job for the archive and starts the pipeline in the
    /// background. Returns the new job id immediately.
    pub fn submit(&self, archive_path: PathBuf) -> String {
        let job_id = Uuid::new_v4().simple().to_string();
        let (live, _) = broadcast::channel(CHANNEL_CAPACITY);
        lock(&self.jobs).insert(
            job_id.clone(),
            JobRecord {
                status: JobStatus::Running,
                artifacts: None,
                error: None,
                history: Vec::new(),
                live,
                created_at: Utc::now(),
            },
        );

        let jobs = Arc::clone(&self.jobs);
        let config = Arc::clone(&self.config);
        let llm = self.llm.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            run_job(jobs, config, llm, id, archive_path).await;
        });
        job_id
    }

    /// Upload size cap for the HTTP layer, one MB above the archive ceiling
    /// so the validator, not the transport, reports the limit violation
    pub fn upload_limit_bytes(&self) -> usize {
        self.config.zip_size_limit_bytes() as usize + 1_048_576
    }

    pub fn status(&self, job_id: &str) -> Result<StatusReport> {
        let guard = lock(&self.jobs);
        let record = guard
            .get(job_id)
            .ok_or_else(|| AnalyzerError::UnknownJob(job_id.to_string()))?;
        Ok(StatusReport {
            job_id: job_id.to_string(),
            status: record.status,
            error: record.error.clone(),
            created_at: record.created_at,
        })
    }

    /// Final artifacts for a finished job
    pub fn result(&self, job_id: &str) -> Result<AnalysisArtifacts> {
        let guard = lock(&self.jobs);
        let record = guard
            .get(job_id)
            .ok_or_else(|| AnalyzerError::UnknownJob(job_id.to_string()))?;
        match record.status {
            JobStatus::Running => Err(AnalyzerError::NotReady(job_id.to_string())),
            JobStatus::Error => Err(AnalyzerError::JobFailed(
                record.error.clone().unwrap_or_else(|| "unknown".to_string()),
            )),
            JobStatus::Done => record
                .artifacts
                .clone()
                .ok_or_else(|| AnalyzerError::JobFailed("artifacts missing".to_string())),
        }
    }

    /// History so far plus a live receiver for lines recorded afterwards.
    ///
    /// Both are taken under one lock, so concatenating the history with the
    /// receiver's lines yields the complete stream.
    pub fn subscribe(&self, job_id: &str) -> Result<(Vec<String>, broadcast::Receiver<String>)> {
        let guard = lock(&self.jobs);
        let record = guard
            .get(job_id)
            .ok_or_else(|| AnalyzerError::UnknownJob(job_id.to_string()))?;
        Ok((record.history.clone(), record.live.subscribe()))
    }
}

async fn run_job(
    jobs: JobStore,
    config: Arc<Config>,
    llm: Option<Arc<LlmRouter>>,
    job_id: String,
    archive_path: PathBuf,
) {
    let tap: EventTap = {
        let jobs = Arc::clone(&jobs);
        let job_id = job_id.clone();
        Box::new(move |event: &PipelineEvent| {
            record_line(&jobs, &job_id, format!("event:{}", event.kind()));
        })
    };

    match orchestrator::run_analysis(&config, llm, archive_path.clone(), Some(tap)).await {
        Ok(artifacts) => {
            {
                let mut guard = lock(&jobs);
                if let Some(record) = guard.get_mut(&job_id) {
                    record.status = JobStatus::Done;
                    record.artifacts = Some(artifacts);
                }
            }
            tracing::info!(%job_id, "analysis finished");
            record_line(&jobs, &job_id, WORKFLOW_DONE_LINE.to_string());
        }
        Err(failure) => {
            let message = failure.error.to_string();
            {
                let mut guard = lock(&jobs);
                if let Some(record) = guard.get_mut(&job_id) {
                    record.status = JobStatus::Error;
                    record.error = Some(message.clone());
                    record.artifacts = Some(failure.partial);
                }
            }
            tracing::error!(%job_id, error = %message, "analysis failed");
            record_line(&jobs, &job_id, format!("error:{message}"));
        }
    }

    // The uploaded archive belongs to this job; the extraction workdir is
    // handled by the pipeline, the upload itself is handled here.
    if let Err(error) = tokio::fs::remove_file(&archive_path).await {
        tracing::warn!(archive = %archive_path.display(), %error, "upload removal failed");
    }
}
