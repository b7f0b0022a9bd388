//! Source-archive analysis pipeline.
//!
//! Takes a ZIP of source code, validates and extracts it, triages the
//! files, summarizes each accepted one, renders the directory tree, and
//! synthesizes a project overview. The stages communicate over a per-job
//! event bus; an HTTP layer exposes upload, progress streaming, and
//! result retrieval.

pub mod config;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod server;
pub mod stages;
pub mod summarize;
pub mod synthesis;

pub use config::Config;
pub use error::{AnalyzerError, Result};
