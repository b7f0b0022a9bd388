use crate::error::{AnalyzerError, Result};
use crate::pipeline::{EventKind, JobContext, PipelineEvent, Stage};
use crate::summarize;
use async_trait::async_trait;
use std::collections::HashSet;

/// Summarizes each accepted file and appends the record to the job.
///
/// A file that fails to summarize is logged and dropped; one bad file
/// never fails the run.
pub struct AnalysisStage {
    seen: HashSet<String>,
}

impl AnalysisStage {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }
}

impl Default for AnalysisStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for AnalysisStage {
    fn name(&self) -> &'static str {
        "analysis"
    }

    fn consumes(&self) -> &'static [EventKind] {
        &[EventKind::FileForAnalysis, EventKind::TriageComplete]
    }

    fn produces(&self) -> &'static [EventKind] {
        &[EventKind::FileAnalysed, EventKind::AnalysisComplete]
    }

    async fn handle(
        &mut self,
        event: &PipelineEvent,
        job: &mut JobContext,
    ) -> Result<Vec<PipelineEvent>> {
        match event {
            PipelineEvent::FileForAnalysis { path, .. } => {
                let base = job.workdir.clone().ok_or_else(|| {
                    AnalyzerError::Pipeline("file offered for analysis before extraction".into())
                })?;
                let summary = match summarize::analyse_file(path, &base) {
                    Ok(record) => record,
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "file analysis failed");
                        return Ok(vec![]);
                    }
                };
                if !self.seen.insert(summary.rel_path.clone()) {
                    return Ok(vec![]);
                }
                job.file_summaries.push(summary.clone());
                Ok(vec![PipelineEvent::FileAnalysed { summary }])
            }
            PipelineEvent::TriageComplete => Ok(vec![PipelineEvent::AnalysisComplete]),
            _ => Ok(vec![]),
        }
    }
}
