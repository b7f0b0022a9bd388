//! Wires the stages onto a fresh bus and drives one analysis run.

use crate::config::Config;
use crate::error::AnalyzerError;
use crate::llm::LlmRouter;
use crate::pipeline::{AnalysisArtifacts, EventBus, EventTap, JobContext, PipelineEvent};
use crate::stages::{
    AnalysisStage, CleanupStage, ExtractorStage, SynthesizerStage, TreeBuilderStage, TriageStage,
    ValidatorStage,
};
use std::path::PathBuf;
use std::sync::Arc;

/// A run that did not reach the final summary, with whatever artifacts
/// were produced before the failure
pub struct RunFailure {
    pub error: AnalyzerError,
    pub partial: AnalysisArtifacts,
}

/// Builds a bus with the full stage set in execution order
pub fn build_bus(config: &Config, llm: Option<Arc<LlmRouter>>) -> EventBus {
    let mut bus = EventBus::new();
    bus.register(Box::new(ValidatorStage::new(config)));
    bus.register(Box::new(ExtractorStage::new()));
    bus.register(Box::new(TreeBuilderStage::new()));
    bus.register(Box::new(TriageStage::new(config.clone())));
    bus.register(Box::new(AnalysisStage::new()));
    bus.register(Box::new(SynthesizerStage::new(llm)));
    bus.register(Box::new(CleanupStage::new(config.delete_temp_after_run)));
    bus
}

/// Runs the whole pipeline for one uploaded archive.
///
/// On failure the working directory is still removed (when configured) and
/// the artifacts produced so far come back with the error.
pub async fn run_analysis(
    config: &Config,
    llm: Option<Arc<LlmRouter>>,
    archive_path: PathBuf,
    tap: Option<EventTap>,
) -> std::result::Result<AnalysisArtifacts, RunFailure> {
    let mut bus = build_bus(config, llm);
    if let Some(tap) = tap {
        bus.set_tap(tap);
    }

    let mut job = JobContext::new();
    let outcome = bus
        .publish(PipelineEvent::UploadReceived { archive_path }, &mut job)
        .await;

    match outcome {
        Ok(()) => {
            if let Some(reason) = job.invalid_reason.take() {
                return Err(RunFailure {
                    error: AnalyzerError::InvalidArchive(reason),
                    partial: job.into_artifacts(),
                });
            }
            Ok(job.into_artifacts())
        }
        Err(error) => {
            // The cleanup stage never ran; do not leave the extraction behind.
            if config.delete_temp_after_run {
                if let Some(workdir) = job.workdir.take() {
                    if let Err(error) = tokio::fs::remove_dir_all(&workdir).await {
                        tracing::warn!(workdir = %workdir.display(), %error, "cleanup failed");
                    }
                }
            }
            Err(RunFailure {
                error,
                partial: job.into_artifacts(),
            })
        }
    }
}
