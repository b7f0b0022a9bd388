//! Per-file summarization heuristics.
//!
//! Produces one [`FileSummary`] per accepted file: a coarse kind plus a
//! one-line description. Structured formats get a key/definition listing;
//! everything else falls back to the first heading or sentence.

use crate::error::Result;
use crate::pipeline::{FileKind, FileSummary};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Extensions that are summarized as opaque assets without reading content
pub static ASSET_EXTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "pdf", "mp4", "mp3", "woff", "woff2", "ttf",
    ]
    .into_iter()
    .collect()
});

const SUMMARY_MAX_CHARS: usize = 160;

/// Reads a file as text, replacing invalid UTF-8 instead of failing
pub fn read_text_safe(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Produces the summary record for one extracted file.
///
/// `base` is the extraction root; the record's `rel_path` is relative to it
/// and always uses forward slashes.
pub fn analyse_file(path: &Path, base: &Path) -> Result<FileSummary> {
    let rel_path = path
        .strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if ASSET_EXTS.contains(ext.as_str()) {
        return Ok(FileSummary {
            rel_path,
            kind: FileKind::Asset,
            summary: "(binary skipped)".to_string(),
        });
    }

    let raw = read_text_safe(path)?;
    let parsed = match ext.as_str() {
        "json" => summarize_json(&raw),
        "yml" | "yaml" => summarize_yaml(&raw),
        "py" => summarize_python(&raw),
        "rs" => summarize_rust(&raw),
        _ => None,
    };
    let (kind, summary) =
        parsed.unwrap_or_else(|| (FileKind::Text, summarise_text(&raw, SUMMARY_MAX_CHARS)));

    Ok(FileSummary {
        rel_path,
        kind,
        summary,
    })
}

fn summarize_json(raw: &str) -> Option<(FileKind, String)> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let keys = object.keys().take(5).cloned().collect::<Vec<_>>().join(", ");
    Some((FileKind::Json, format!("JSON with keys: {keys}")))
}

fn summarize_yaml(raw: &str) -> Option<(FileKind, String)> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw).ok()?;
    let mapping = value.as_mapping()?;
    let keys = mapping
        .keys()
        .filter_map(|k| k.as_str())
        .take(5)
        .collect::<Vec<_>>()
        .join(", ");
    Some((FileKind::Yaml, format!("YAML with keys: {keys}")))
}

fn summarize_python(raw: &str) -> Option<(FileKind, String)> {
    let classes = top_level_names(raw, "class ");
    let funcs = top_level_names(raw, "def ");

    let mut parts = vec!["Python".to_string()];
    if !classes.is_empty() {
        parts.push(format!("classes={}", join_first(&classes, 3)));
    }
    if !funcs.is_empty() {
        parts.push(format!("funcs={}", join_first(&funcs, 3)));
    }
    Some((FileKind::Python, parts.join("; ")))
}

fn summarize_rust(raw: &str) -> Option<(FileKind, String)> {
    let mut types = top_level_names(raw, "struct ");
    types.extend(top_level_names(raw, "pub struct "));
    types.extend(top_level_names(raw, "enum "));
    types.extend(top_level_names(raw, "pub enum "));
    let mut funcs = top_level_names(raw, "fn ");
    funcs.extend(top_level_names(raw, "pub fn "));

    let mut parts = vec!["Rust".to_string()];
    if !types.is_empty() {
        parts.push(format!("types={}", join_first(&types, 3)));
    }
    if !funcs.is_empty() {
        parts.push(format!("fns={}", join_first(&funcs, 3)));
    }
    Some((FileKind::Rust, parts.join("; ")))
}

/// Collects identifiers from unindented lines beginning with `keyword`
fn top_level_names(raw: &str, keyword: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.strip_prefix(keyword))
        .filter_map(|rest| {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            (!name.is_empty()).then_some(name)
        })
        .collect()
}

fn join_first(names: &[String], count: usize) -> String {
    names
        .iter()
        .take(count)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

/// One-line summary of free-form text: leading markdown heading if present,
/// otherwise the first sentence, otherwise a truncated prefix
pub fn summarise_text(text: &str, max_chars: usize) -> String {
    let text = text.trim();

    if let Some(heading) = leading_heading(text) {
        return heading;
    }

    if let Some(end) = first_sentence_end(text, max_chars) {
        return text[..end].trim().to_string();
    }

    if text.chars().count() > max_chars {
        let mut prefix: String = text.chars().take(max_chars).collect();
        prefix.push('…');
        prefix
    } else {
        text.to_string()
    }
}

fn leading_heading(text: &str) -> Option<String> {
    let first_line = text.lines().next()?;
    let hashes = first_line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = first_line[hashes..].trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Byte index just past the first sentence terminator followed by
/// whitespace, if it lies within `max_chars` characters
fn first_sentence_end(text: &str, max_chars: usize) -> Option<usize> {
    let mut chars_seen = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((idx, ch)) = iter.next() {
        if chars_seen >= max_chars {
            return None;
        }
        chars_seen += 1;
        if matches!(ch, '.' | '!' | '?') {
            if let Some((_, next)) = iter.peek() {
                if next.is_whitespace() {
                    return Some(idx + ch.len_utf8());
                }
            }
        }
    }
    None
}
