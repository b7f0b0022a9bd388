use crate::error::Result;
use crate::pipeline::{EventKind, JobContext, PipelineEvent, Stage};
use async_trait::async_trait;

/// Removes the working directory once the summary is final.
///
/// Removal failure is logged, not fatal; the artifacts are already in the
/// job context by this point.
pub struct CleanupStage {
    delete_temp: bool,
}

impl CleanupStage {
    pub fn new(delete_temp: bool) -> Self {
        Self { delete_temp }
    }
}

#[async_trait]
impl Stage for CleanupStage {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn consumes(&self) -> &'static [EventKind] {
        &[EventKind::SummaryPolished]
    }

    fn produces(&self) -> &'static [EventKind] {
        &[EventKind::CleanupDone]
    }

    async fn handle(
        &mut self,
        event: &PipelineEvent,
        job: &mut JobContext,
    ) -> Result<Vec<PipelineEvent>> {
        let PipelineEvent::SummaryPolished = event else {
            return Ok(vec![]);
        };

        if self.delete_temp {
            if let Some(workdir) = job.workdir.take() {
                if let Err(error) = tokio::fs::remove_dir_all(&workdir).await {
                    tracing::warn!(workdir = %workdir.display(), %error, "cleanup failed");
                }
            }
        }
        Ok(vec![PipelineEvent::CleanupDone])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_removes_workdir() {
        let dir = TempDir::new().unwrap().keep();
        std::fs::write(dir.join("file.txt"), "x").unwrap();

        let mut job = JobContext::new();
        job.workdir = Some(dir.clone());
        let out = CleanupStage::new(true)
            .handle(&PipelineEvent::SummaryPolished, &mut job)
            .await
            .unwrap();

        assert!(matches!(out[0], PipelineEvent::CleanupDone));
        assert!(!dir.exists());
        assert!(job.workdir.is_none());
    }

    #[tokio::test]
    async fn test_keeps_workdir_when_disabled() {
        let dir = TempDir::new().unwrap().keep();
        let mut job = JobContext::new();
        job.workdir = Some(dir.clone());

        let out = CleanupStage::new(false)
            .handle(&PipelineEvent::SummaryPolished, &mut job)
            .await
            .unwrap();
        assert!(matches!(out[0], PipelineEvent::CleanupDone));
        assert!(dir.exists());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_workdir_is_harmless() {
        let mut job = JobContext::new();
        let out = CleanupStage::new(true)
            .handle(&PipelineEvent::SummaryPolished, &mut job)
            .await
            .unwrap();
        assert!(matches!(out[0], PipelineEvent::CleanupDone));
    }
}
