//! Project-level synthesis heuristics.
//!
//! Combines the per-file summaries into a short overview draft: README
//! first line, dominant file kind, inferred tech stack, and packaging
//! hints. The draft is what the optional LLM polish pass rewrites.

use crate::pipeline::{FileKind, FileSummary};
use std::collections::HashMap;
use std::path::Path;

const DRAFT_MAX_CHARS: usize = 300;

/// Infers a high-level project type from the analysed file paths
pub fn guess_stack(summaries: &[FileSummary]) -> &'static str {
    let paths: Vec<String> = summaries
        .iter()
        .map(|s| s.rel_path.to_lowercase())
        .collect();
    let has = |suffix: &str| paths.iter().any(|p| p.ends_with(suffix));

    if has("setup.py") || has("pyproject.toml") {
        "Python package"
    } else if has("cargo.toml") {
        "Rust crate"
    } else if has("package.json") {
        "Node.js project"
    } else if has("dockerfile") {
        "Containerized service"
    } else if has("go.mod") {
        "Go module"
    } else if has("pom.xml") {
        "Java Maven project"
    } else {
        "Unknown or mixed-language project"
    }
}

/// Most common file kind and its count; ties break on the kind name so the
/// result is deterministic
pub fn dominant_kind(summaries: &[FileSummary]) -> Option<(FileKind, usize)> {
    let mut counts: HashMap<FileKind, usize> = HashMap::new();
    for record in summaries {
        *counts.entry(record.kind).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.to_string().cmp(&a.0.to_string())))
}

/// First README-style entry's one-liner, normalized to end with a period
pub fn readme_first_line(summaries: &[FileSummary]) -> Option<String> {
    summaries
        .iter()
        .find(|record| {
            Path::new(&record.rel_path)
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase().starts_with("readme"))
                .unwrap_or(false)
        })
        .map(|record| format!("{}.", record.summary.trim_end_matches('.')))
}

/// Composes the heuristic overview paragraph from the summaries and tree
pub fn compose_draft(summaries: &[FileSummary], _tree_text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(snippet) = readme_first_line(summaries) {
        parts.push(snippet);
    }

    let (kind, count) = dominant_kind(summaries)
        .map(|(k, c)| (k.to_string(), c))
        .unwrap_or_else(|| ("unknown".to_string(), 0));
    parts.push(format!("The dominant file type is *{kind}* (count: {count})."));

    parts.push(format!("Inferred tech stack: {}.", guess_stack(summaries)));

    let lower: Vec<String> = summaries
        .iter()
        .map(|s| s.rel_path.to_lowercase())
        .collect();
    if lower.iter().any(|p| p.ends_with("dockerfile")) {
        parts.push("Presence of a Dockerfile suggests containerized deployment.".to_string());
    }
    if lower
        .iter()
        .any(|p| p.ends_with("setup.py") || p.ends_with("pyproject.toml"))
    {
        parts.push("Packaging metadata indicates a Python package.".to_string());
    }
    if lower.iter().any(|p| p.ends_with("package.json")) {
        parts.push("Including 'package.json' reveals a Node.js component.".to_string());
    }

    let mut draft = parts.join(" ");
    if draft.chars().count() > DRAFT_MAX_CHARS {
        draft = draft.chars().take(DRAFT_MAX_CHARS - 1).collect();
        draft = format!("{}…", draft.trim_end());
    }
    draft
}
