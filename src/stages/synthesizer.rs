use crate::error::Result;
use crate::llm::LlmRouter;
use crate::pipeline::{EventKind, FileSummary, JobContext, PipelineEvent, Stage};
use crate::synthesis;
use async_trait::async_trait;
use std::sync::Arc;

/// Joins the tree rendering with the completed analysis pass, composes the
/// overview draft, and runs the optional polish.
///
/// Fires exactly once, when both inputs have arrived. A failed or empty
/// polish falls back to the draft so the run still completes.
pub struct SynthesizerStage {
    llm: Option<Arc<LlmRouter>>,
    tree_ready: bool,
    analysis_done: bool,
    finished: bool,
    analyses: Vec<FileSummary>,
}

impl SynthesizerStage {
    pub fn new(llm: Option<Arc<LlmRouter>>) -> Self {
        Self {
            llm,
            tree_ready: false,
            analysis_done: false,
            finished: false,
            analyses: Vec::new(),
        }
    }

    async fn maybe_finish(&mut self, job: &mut JobContext) -> Result<Vec<PipelineEvent>> {
        if !self.tree_ready || !self.analysis_done || self.finished {
            return Ok(vec![]);
        }
        self.finished = true;

        let tree_text = job.tree_text.as_deref().unwrap_or_default();
        let draft = synthesis::compose_draft(&self.analyses, tree_text);

        let polished = match &self.llm {
            Some(router) => match router.polish(&draft).await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => {
                    tracing::warn!("polish returned empty text, keeping draft");
                    draft.clone()
                }
                Err(error) => {
                    tracing::warn!(%error, "polish failed, keeping draft");
                    draft.clone()
                }
            },
            None => draft.clone(),
        };
        job.project_summary = Some(polished);

        Ok(vec![
            PipelineEvent::ProjectDraft { draft },
            PipelineEvent::SummaryPolished,
        ])
    }
}

#[async_trait]
impl Stage for SynthesizerStage {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn consumes(&self) -> &'static [EventKind] {
        &[
            EventKind::TreeBuilt,
            EventKind::FileAnalysed,
            EventKind::AnalysisComplete,
        ]
    }

    fn produces(&self) -> &'static [EventKind] {
        &[EventKind::ProjectDraft, EventKind::SummaryPolished]
    }

    async fn handle(
        &mut self,
        event: &PipelineEvent,
        job: &mut JobContext,
    ) -> Result<Vec<PipelineEvent>> {
        match event {
            PipelineEvent::TreeBuilt => {
                self.tree_ready = true;
                self.maybe_finish(job).await
            }
            PipelineEvent::FileAnalysed { summary } => {
                self.analyses.push(summary.clone());
                Ok(vec![])
            }
            PipelineEvent::AnalysisComplete => {
                self.analysis_done = true;
                self.maybe_finish(job).await
            }
            _ => Ok(vec![]),
        }
    }
}
