use crate::pipeline::context::FileSummary;
use std::fmt;
use std::path::PathBuf;

/// Closed set of events flowing through one job's pipeline.
///
/// Each variant carries its typed payload; the payload-free [`EventKind`]
/// tag is what routing and progress reporting work with.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Seed event: an archive landed on disk and a job was created
    UploadReceived { archive_path: PathBuf },
    /// The archive passed all validation checks
    ArchiveValid { archive_path: PathBuf },
    /// The archive was rejected; the pipeline halts here
    ArchiveInvalid { reason: String },
    /// One extracted file, emitted per regular file in the working directory
    FileDiscovered { path: PathBuf },
    /// Extraction finished; no more FileDiscovered events will follow
    ExtractionDone { base_dir: PathBuf },
    /// The directory tree rendering landed in the job context
    TreeBuilt,
    /// Triage accepted a file for analysis, with its priority score
    FileForAnalysis { path: PathBuf, score: u32 },
    /// Triage rejected a file
    FileSkipped { path: PathBuf, reason: String },
    /// Triage flushed its queue; no more FileForAnalysis events will follow
    TriageComplete,
    /// One per-file summary record was produced
    FileAnalysed { summary: FileSummary },
    /// Analysis finished for every accepted file
    AnalysisComplete,
    /// The heuristic overview draft, before the polish pass
    ProjectDraft { draft: String },
    /// The final overview landed in the job context
    SummaryPolished,
    /// The working directory was removed; terminal event
    CleanupDone,
}

/// Payload-free tag for a [`PipelineEvent`], used for subscription routing,
/// declared-output checking, and progress lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UploadReceived,
    ArchiveValid,
    ArchiveInvalid,
    FileDiscovered,
    ExtractionDone,
    TreeBuilt,
    FileForAnalysis,
    FileSkipped,
    TriageComplete,
    FileAnalysed,
    AnalysisComplete,
    ProjectDraft,
    SummaryPolished,
    CleanupDone,
}

impl PipelineEvent {
    /// Returns the tag for this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::UploadReceived { .. } => EventKind::UploadReceived,
            Self::ArchiveValid { .. } => EventKind::ArchiveValid,
            Self::ArchiveInvalid { .. } => EventKind::ArchiveInvalid,
            Self::FileDiscovered { .. } => EventKind::FileDiscovered,
            Self::ExtractionDone { .. } => EventKind::ExtractionDone,
            Self::TreeBuilt => EventKind::TreeBuilt,
            Self::FileForAnalysis { .. } => EventKind::FileForAnalysis,
            Self::FileSkipped { .. } => EventKind::FileSkipped,
            Self::TriageComplete => EventKind::TriageComplete,
            Self::FileAnalysed { .. } => EventKind::FileAnalysed,
            Self::AnalysisComplete => EventKind::AnalysisComplete,
            Self::ProjectDraft { .. } => EventKind::ProjectDraft,
            Self::SummaryPolished => EventKind::SummaryPolished,
            Self::CleanupDone => EventKind::CleanupDone,
        }
    }
}

impl EventKind {
    /// Stable name used in progress stream lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadReceived => "UploadReceived",
            Self::ArchiveValid => "ArchiveValid",
            Self::ArchiveInvalid => "ArchiveInvalid",
            Self::FileDiscovered => "FileDiscovered",
            Self::ExtractionDone => "ExtractionDone",
            Self::TreeBuilt => "TreeBuilt",
            Self::FileForAnalysis => "FileForAnalysis",
            Self::FileSkipped => "FileSkipped",
            Self::TriageComplete => "TriageComplete",
            Self::FileAnalysed => "FileAnalysed",
            Self::AnalysisComplete => "AnalysisComplete",
            Self::ProjectDraft => "ProjectDraft",
            Self::SummaryPolished => "SummaryPolished",
            Self::CleanupDone => "CleanupDone",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
