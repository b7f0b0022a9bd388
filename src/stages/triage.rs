use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{EventKind, JobContext, PipelineEvent, Stage};
use crate::summarize::ASSET_EXTS;
use async_trait::async_trait;
use content_inspector::{inspect, ContentType};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Sniff window for binary detection
const SNIFF_BYTES: usize = 1024;

/// Scores discovered files and queues the accepted ones, flushing them in
/// priority order once extraction finishes.
///
/// Skips ignored paths, known asset extensions, and anything whose first
/// kilobyte sniffs as binary.
pub struct TriageStage {
    config: Config,
    queue: Vec<(u32, PathBuf)>,
}

impl TriageStage {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            queue: Vec::new(),
        }
    }

    fn skip_reason(&self, path: &Path, base: Option<&Path>) -> Option<String> {
        let rel = base
            .and_then(|b| path.strip_prefix(b).ok())
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if self.config.is_ignored_path(Path::new(&rel)) {
            return Some("ignored path".to_string());
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if ASSET_EXTS.contains(ext.as_str()) {
            return Some("asset extension".to_string());
        }

        // Unreadable files are skipped rather than failing the run.
        let mut head = [0u8; SNIFF_BYTES];
        let read = match File::open(path).and_then(|mut f| f.read(&mut head)) {
            Ok(n) => n,
            Err(e) => return Some(format!("unreadable: {e}")),
        };
        if inspect(&head[..read]) == ContentType::BINARY {
            return Some("binary content".to_string());
        }
        None
    }
}

/// Priority for the analysis queue: well-known project files first, then
/// source and config, then docs, then everything else.
pub fn priority_score(path: &Path) -> u32 {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    const HIGH_SIGNAL_STEMS: &[&str] = &[
        "readme",
        "license",
        "setup",
        "pyproject",
        "package",
        "requirements",
        "dockerfile",
        "compose",
        "makefile",
        "main",
        "app",
        "cargo",
    ];
    const SOURCE_EXTS: &[&str] = &["py", "js", "json", "yml", "yaml", "toml", "sh", "rs"];
    const DOC_EXTS: &[&str] = &["md", "rst", "txt"];

    if HIGH_SIGNAL_STEMS.contains(&stem.as_str()) {
        100
    } else if SOURCE_EXTS.contains(&ext.as_str()) {
        80
    } else if DOC_EXTS.contains(&ext.as_str()) {
        70
    } else {
        10
    }
}

#[async_trait]
impl Stage for TriageStage {
    fn name(&self) -> &'static str {
        "triage"
    }

    fn consumes(&self) -> &'static [EventKind] {
        &[EventKind::FileDiscovered, EventKind::ExtractionDone]
    }

    fn produces(&self) -> &'static [EventKind] {
        &[
            EventKind::FileForAnalysis,
            EventKind::FileSkipped,
            EventKind::TriageComplete,
        ]
    }

    async fn handle(
        &mut self,
        event: &PipelineEvent,
        job: &mut JobContext,
    ) -> Result<Vec<PipelineEvent>> {
        match event {
            PipelineEvent::FileDiscovered { path } => {
                if let Some(reason) = self.skip_reason(path, job.workdir.as_deref()) {
                    return Ok(vec![PipelineEvent::FileSkipped {
                        path: path.clone(),
                        reason,
                    }]);
                }
                self.queue.push((priority_score(path), path.clone()));
                Ok(vec![])
            }
            PipelineEvent::ExtractionDone { .. } => {
                let mut queue = std::mem::take(&mut self.queue);
                queue.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
                let mut events: Vec<PipelineEvent> = queue
                    .into_iter()
                    .map(|(score, path)| PipelineEvent::FileForAnalysis { path, score })
                    .collect();
                events.push(PipelineEvent::TriageComplete);
                Ok(events)
            }
            _ => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("README.md", 100 ; "readme stem")]
    #[test_case("Dockerfile", 100 ; "dockerfile")]
    #[test_case("src/app.py", 100 ; "app stem beats source ext")]
    #[test_case("src/engine.rs", 80 ; "source extension")]
    #[test_case("config.yaml", 80 ; "config extension")]
    #[test_case("docs/guide.rst", 70 ; "doc extension")]
    #[test_case("data.bin", 10 ; "everything else")]
    fn test_priority_score(path: &str, expected: u32) {
        assert_eq!(priority_score(Path::new(path)), expected);
    }

    #[tokio::test]
    async fn test_flush_orders_by_score_then_path() {
        let dir = TempDir::new().unwrap();
        for name in ["b.rs", "a.rs", "README.md", "notes.txt"] {
            std::fs::write(dir.path().join(name), "text content").unwrap();
        }
        let mut job = JobContext::new();
        job.workdir = Some(dir.path().to_path_buf());
        let mut stage = TriageStage::new(Config::default());

        for name in ["b.rs", "a.rs", "README.md", "notes.txt"] {
            let out = stage
                .handle(
                    &PipelineEvent::FileDiscovered {
                        path: dir.path().join(name),
                    },
                    &mut job,
                )
                .await
                .unwrap();
            assert!(out.is_empty());
        }

        let out = stage
            .handle(
                &PipelineEvent::ExtractionDone {
                    base_dir: dir.path().to_path_buf(),
                },
                &mut job,
            )
            .await
            .unwrap();

        let order: Vec<String> = out
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::FileForAnalysis { path, .. } => Some(
                    path.file_name().unwrap().to_string_lossy().into_owned(),
                ),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec!["README.md", "a.rs", "b.rs", "notes.txt"]);
        assert!(matches!(
            out.last(),
            Some(PipelineEvent::TriageComplete)
        ));
    }

    #[tokio::test]
    async fn test_ignored_path_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let path = dir.path().join(".git/HEAD");
        std::fs::write(&path, "ref: refs/heads/main").unwrap();

        let mut job = JobContext::new();
        job.workdir = Some(dir.path().to_path_buf());
        let mut stage = TriageStage::new(Config::default());
        let out = stage
            .handle(&PipelineEvent::FileDiscovered { path }, &mut job)
            .await
            .unwrap();
        let PipelineEvent::FileSkipped { reason, .. } = &out[0] else {
            panic!("expected FileSkipped");
        };
        assert_eq!(reason, "ignored path");
    }

    #[tokio::test]
    async fn test_binary_content_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.dat");
        std::fs::write(&path, [0u8, 159, 146, 150, 0, 1, 2]).unwrap();

        let mut job = JobContext::new();
        job.workdir = Some(dir.path().to_path_buf());
        let mut stage = TriageStage::new(Config::default());
        let out = stage
            .handle(&PipelineEvent::FileDiscovered { path }, &mut job)
            .await
            .unwrap();
        let PipelineEvent::FileSkipped { reason, .. } = &out[0] else {
            panic!("expected FileSkipped");
        };
        assert_eq!(reason, "binary content");
    }

    #[tokio::test]
    async fn test_asset_extension_skipped_without_sniff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, [0x89, 0x50, 0x4e, 0x47, 0, 0]).unwrap();

        let mut job = JobContext::new();
        job.workdir = Some(dir.path().to_path_buf());
        let mut stage = TriageStage::new(Config::default());
        let out = stage
            .handle(&PipelineEvent::FileDiscovered { path }, &mut job)
            .await
            .unwrap();
        let PipelineEvent::FileSkipped { reason, .. } = &out[0] else {
            panic!("expected FileSkipped");
        };
        assert_eq!(reason, "asset extension");
    }
}
