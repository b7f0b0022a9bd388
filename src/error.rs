use async_openai::error::OpenAIError;
use std::io;
use thiserror::Error;

/// Custom result type alias for the application
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors that can occur while analysing an uploaded archive
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// ZIP file processing errors
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Directory traversal errors
    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// OpenAI API errors
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),

    /// Archive failed validation (size, format, or member paths)
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// Errors while unpacking a validated archive
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Per-file analysis errors
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Overview generation errors
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Language model back-end errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Event bus / stage wiring errors
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Queried job identifier does not exist
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// Result requested while the job is still running
    #[error("Job still running: {0}")]
    NotReady(String),

    /// Job finished in the error state
    #[error("Job failed: {0}")]
    JobFailed(String),
}

impl AnalyzerError {
    /// Creates a new pipeline error with the specified message
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline(message.into())
    }

    /// Checks if this error should surface as a client error (HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArchive(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_constructor() {
        let error = AnalyzerError::pipeline("stage wiring broken");
        assert!(matches!(error, AnalyzerError::Pipeline(_)));
        assert_eq!(error.to_string(), "Pipeline error: stage wiring broken");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(AnalyzerError::InvalidArchive("too big".into()).is_client_error());
        assert!(!AnalyzerError::Extraction("disk full".into()).is_client_error());
    }
}
