use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Coarse content classification assigned by per-file analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Binary asset whose content is never read
    Asset,
    Json,
    Yaml,
    Python,
    Rust,
    /// Plain prose, markup, or anything without a dedicated parser
    Text,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Asset => "asset",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// One per-file summary record, appended to the job artifacts in
/// completion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    /// Path relative to the extraction root, unique within a job
    pub rel_path: String,
    pub kind: FileKind,
    /// Short natural-language description of the file
    pub summary: String,
}

/// Final artifact bundle handed back to clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArtifacts {
    pub tree_text: String,
    pub file_summaries: Vec<FileSummary>,
    pub project_summary: String,
}

/// Mutable per-job state shared by the stages of one pipeline run.
///
/// The working directory exists only between extraction and cleanup;
/// everything else accumulates and survives into the artifact bundle.
#[derive(Debug, Default)]
pub struct JobContext {
    /// Extraction root, exclusively owned by this job
    pub workdir: Option<PathBuf>,
    pub tree_text: Option<String>,
    pub file_summaries: Vec<FileSummary>,
    pub project_summary: Option<String>,
    /// Set by the validator when the archive is rejected
    pub invalid_reason: Option<String>,
}

impl JobContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the context into the artifact bundle
    pub fn into_artifacts(self) -> AnalysisArtifacts {
        AnalysisArtifacts {
            tree_text: self.tree_text.unwrap_or_default(),
            file_summaries: self.file_summaries,
            project_summary: self.project_summary.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_into_artifacts_defaults() {
        let artifacts = JobContext::new().into_artifacts();
        assert_eq!(artifacts.tree_text, "");
        assert!(artifacts.file_summaries.is_empty());
        assert_eq!(artifacts.project_summary, "");
    }

    #[test]
    fn test_file_summary_json_shape() {
        let record = FileSummary {
            rel_path: "src/app.py".to_string(),
            kind: FileKind::Python,
            summary: "Python; funcs=main".to_string(),
        };
        let json = serde_json::to_value(&record).expect("serializable");
        assert_eq!(json["kind"], "python");
        assert_eq!(json["rel_path"], "src/app.py");
    }
}
