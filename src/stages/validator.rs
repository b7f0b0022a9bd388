use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{EventKind, JobContext, PipelineEvent, Stage};
use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use zip::ZipArchive;

/// Stage 0 guard: the uploaded archive must exist, stay under the size
/// ceiling, parse as a ZIP, and contain no member that is oversized or
/// would escape the extraction root.
pub struct ValidatorStage {
    size_limit_mb: u64,
    member_limit_mb: u64,
}

impl ValidatorStage {
    pub fn new(config: &Config) -> Self {
        Self {
            size_limit_mb: config.zip_size_limit_mb,
            member_limit_mb: config.max_member_size_mb,
        }
    }

    fn check(&self, archive_path: &Path) -> std::result::Result<(), String> {
        let metadata = std::fs::metadata(archive_path)
            .map_err(|_| "File does not exist".to_string())?;
        if metadata.len() > self.size_limit_mb * 1_048_576 {
            return Err(format!("Archive exceeds {} MB", self.size_limit_mb));
        }

        let file = File::open(archive_path).map_err(|e| format!("Cannot open archive: {e}"))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| format!("Not a readable ZIP archive: {e}"))?;

        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|e| format!("Corrupt archive member: {e}"))?;
            if entry.enclosed_name().is_none() {
                return Err(format!("Illegal member path: {}", entry.name()));
            }
            if entry.size() > self.member_limit_mb * 1_048_576 {
                return Err(format!(
                    "Member {} exceeds {} MB",
                    entry.name(),
                    self.member_limit_mb
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for ValidatorStage {
    fn name(&self) -> &'static str {
        "validator"
    }

    fn consumes(&self) -> &'static [EventKind] {
        &[EventKind::UploadReceived]
    }

    fn produces(&self) -> &'static [EventKind] {
        &[EventKind::ArchiveValid, EventKind::ArchiveInvalid]
    }

    async fn handle(
        &mut self,
        event: &PipelineEvent,
        job: &mut JobContext,
    ) -> Result<Vec<PipelineEvent>> {
        let PipelineEvent::UploadReceived { archive_path } = event else {
            return Ok(vec![]);
        };

        match self.check(archive_path) {
            Ok(()) => Ok(vec![PipelineEvent::ArchiveValid {
                archive_path: archive_path.clone(),
            }]),
            Err(reason) => {
                tracing::warn!(%reason, "archive rejected");
                job.invalid_reason = Some(reason.clone());
                Ok(vec![PipelineEvent::ArchiveInvalid { reason }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_zip(dir: &TempDir, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.path().join("upload.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn validator() -> ValidatorStage {
        ValidatorStage::new(&Config::default())
    }

    #[tokio::test]
    async fn test_valid_archive_passes() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("README.md", b"# hi")]);
        let mut job = JobContext::new();
        let events = validator()
            .handle(
                &PipelineEvent::UploadReceived { archive_path: path },
                &mut job,
            )
            .await
            .unwrap();
        assert!(matches!(events[0], PipelineEvent::ArchiveValid { .. }));
        assert!(job.invalid_reason.is_none());
    }

    #[tokio::test]
    async fn test_zip_slip_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("../evil.txt", b"pwned")]);
        let mut job = JobContext::new();
        let events = validator()
            .handle(
                &PipelineEvent::UploadReceived { archive_path: path },
                &mut job,
            )
            .await
            .unwrap();
        let PipelineEvent::ArchiveInvalid { reason } = &events[0] else {
            panic!("expected ArchiveInvalid");
        };
        assert!(reason.contains("Illegal member path"));
        assert!(job.invalid_reason.is_some());
    }

    #[tokio::test]
    async fn test_not_a_zip_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        let mut job = JobContext::new();
        let events = validator()
            .handle(
                &PipelineEvent::UploadReceived { archive_path: path },
                &mut job,
            )
            .await
            .unwrap();
        assert!(matches!(events[0], PipelineEvent::ArchiveInvalid { .. }));
    }

    #[tokio::test]
    async fn test_size_ceiling() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("README.md", b"# hi")]);
        let config = Config {
            zip_size_limit_mb: 0,
            ..Config::default()
        };
        let mut job = JobContext::new();
        let events = ValidatorStage::new(&config)
            .handle(
                &PipelineEvent::UploadReceived { archive_path: path },
                &mut job,
            )
            .await
            .unwrap();
        let PipelineEvent::ArchiveInvalid { reason } = &events[0] else {
            panic!("expected ArchiveInvalid");
        };
        assert!(reason.contains("exceeds 0 MB"));
    }
}
