//! Concrete pipeline stages, in execution order.

mod analysis;
mod cleanup;
mod extractor;
mod synthesizer;
mod tree;
mod triage;
mod validator;

pub use analysis::AnalysisStage;
pub use cleanup::CleanupStage;
pub use extractor::ExtractorStage;
pub use synthesizer::SynthesizerStage;
pub use tree::TreeBuilderStage;
pub use triage::TriageStage;
pub use validator::ValidatorStage;
