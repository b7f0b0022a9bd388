use crate::error::{AnalyzerError, Result};
use crate::pipeline::{EventKind, JobContext, PipelineEvent, Stage};
use async_trait::async_trait;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Unpacks a validated archive into a fresh temporary directory and
/// announces every regular file it finds there.
pub struct ExtractorStage;

impl ExtractorStage {
    pub fn new() -> Self {
        Self
    }

    async fn extract(&self, archive_path: &Path, dest: &Path) -> Result<()> {
        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(file)?;

        for index in 0..archive.len() {
            let (target, bytes) = {
                let mut entry = archive.by_index(index)?;
                let relative = entry.enclosed_name().map(Path::to_path_buf).ok_or_else(|| {
                    AnalyzerError::Extraction(format!("illegal member path: {}", entry.name()))
                })?;
                let target = dest.join(relative);
                if entry.is_dir() {
                    // No await while the archive entry is borrowed; the
                    // handle future must stay Send.
                    std::fs::create_dir_all(&target)?;
                    continue;
                }
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                (target, bytes)
            };
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, bytes).await?;
        }
        Ok(())
    }

    fn discovered_files(&self, base: &Path) -> Vec<PathBuf> {
        WalkDir::new(base)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    }
}

impl Default for ExtractorStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ExtractorStage {
    fn name(&self) -> &'static str {
        "extractor"
    }

    fn consumes(&self) -> &'static [EventKind] {
        &[EventKind::ArchiveValid]
    }

    fn produces(&self) -> &'static [EventKind] {
        &[EventKind::FileDiscovered, EventKind::ExtractionDone]
    }

    async fn handle(
        &mut self,
        event: &PipelineEvent,
        job: &mut JobContext,
    ) -> Result<Vec<PipelineEvent>> {
        let PipelineEvent::ArchiveValid { archive_path } = event else {
            return Ok(vec![]);
        };

        let workdir = tempfile::Builder::new()
            .prefix("analyzer_")
            .tempdir()?
            .keep();
        self.extract(archive_path, &workdir).await?;
        job.workdir = Some(workdir.clone());
        tracing::info!(workdir = %workdir.display(), "archive extracted");

        let mut events: Vec<PipelineEvent> = self
            .discovered_files(&workdir)
            .into_iter()
            .map(|path| PipelineEvent::FileDiscovered { path })
            .collect();
        events.push(PipelineEvent::ExtractionDone { base_dir: workdir });
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_zip(dir: &TempDir, entries: &[(&str, &[u8])]) -> PathBuf {
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

    #[tokio::test]
    async fn test_extracts_and_discovers_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            &dir,
            &[
                ("src/main.py", b"print('hi')".as_slice()),
                ("README.md", b"# demo".as_slice()),
            ],
        );
        let mut job = JobContext::new();
        let events = ExtractorStage::new()
            .handle(&PipelineEvent::ArchiveValid { archive_path: path }, &mut job)
            .await
            .unwrap();

        let base = job.workdir.clone().unwrap();
        assert!(base.join("README.md").is_file());
        assert!(base.join("src/main.py").is_file());

        // Two FileDiscovered (sorted by file name) then the completion marker.
        assert_eq!(events.len(), 3);
        let PipelineEvent::FileDiscovered { path: first } = &events[0] else {
            panic!("expected FileDiscovered");
        };
        assert!(first.ends_with("README.md"));
        assert!(matches!(events[2], PipelineEvent::ExtractionDone { .. }));

        tokio::fs::remove_dir_all(base).await.unwrap();
    }

    #[tokio::test]
    async fn test_explicit_directory_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.add_directory("assets", options).unwrap();
        writer.start_file("assets/data.txt", options).unwrap();
        writer.write_all(b"payload").unwrap();
        writer.finish().unwrap();

        let mut job = JobContext::new();
        let events = ExtractorStage::new()
            .handle(&PipelineEvent::ArchiveValid { archive_path: path }, &mut job)
            .await
            .unwrap();

        let base = job.workdir.clone().unwrap();
        assert!(base.join("assets").is_dir());
        assert!(base.join("assets/data.txt").is_file());
        // One FileDiscovered for the regular file, none for the directory.
        assert_eq!(events.len(), 2);

        tokio::fs::remove_dir_all(base).await.unwrap();
    }

    #[tokio::test]
    async fn test_nested_directories_created() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("a/b/c/deep.txt", b"x".as_slice())]);
        let mut job = JobContext::new();
        ExtractorStage::new()
            .handle(&PipelineEvent::ArchiveValid { archive_path: path }, &mut job)
            .await
            .unwrap();

        let base = job.workdir.clone().unwrap();
        assert!(base.join("a/b/c/deep.txt").is_file());
        tokio::fs::remove_dir_all(base).await.unwrap();
    }
}
