use crate::error::Result;
use crate::pipeline::{EventKind, JobContext, PipelineEvent, Stage};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Collects discovered file paths and, once extraction finishes, renders
/// an ASCII directory tree into the job context.
///
/// The root is always printed as `.` so the rendering is identical across
/// runs regardless of the temporary directory name.
pub struct TreeBuilderStage {
    paths: Vec<PathBuf>,
}

#[derive(Default)]
struct Node {
    dirs: BTreeMap<String, Node>,
    files: BTreeSet<String>,
}

impl TreeBuilderStage {
    pub fn new() -> Self {
        Self { paths: Vec::new() }
    }
}

impl Default for TreeBuilderStage {
    fn default() -> Self {
        Self::new()
    }
}

fn insert(root: &mut Node, rel: &Path) {
    let mut node = root;
    let mut components = rel.components().peekable();
    while let Some(component) = components.next() {
        let name = component.as_os_str().to_string_lossy().into_owned();
        if components.peek().is_some() {
            node = node.dirs.entry(name).or_default();
        } else {
            node.files.insert(name);
        }
    }
}

fn render(node: &Node, prefix: &str, out: &mut String) {
    let total = node.dirs.len() + node.files.len();
    let mut index = 0;

    for (name, child) in &node.dirs {
        index += 1;
        let last = index == total;
        let branch = if last { "└── " } else { "├── " };
        out.push_str(&format!("{prefix}{branch}{name}\n"));
        let child_prefix = if last { "    " } else { "│   " };
        render(child, &format!("{prefix}{child_prefix}"), out);
    }
    for name in &node.files {
        index += 1;
        let branch = if index == total { "└── " } else { "├── " };
        out.push_str(&format!("{prefix}{branch}{name}\n"));
    }
}

/// Renders the collected relative paths as a tree rooted at `.`
pub fn render_tree(relative_paths: &[PathBuf]) -> String {
    let mut root = Node::default();
    for path in relative_paths {
        insert(&mut root, path);
    }
    let mut out = String::from(".\n");
    render(&root, "", &mut out);
    out
}

#[async_trait]
impl Stage for TreeBuilderStage {
    fn name(&self) -> &'static str {
        "tree_builder"
    }

    fn consumes(&self) -> &'static [EventKind] {
        &[EventKind::FileDiscovered, EventKind::ExtractionDone]
    }

    fn produces(&self) -> &'static [EventKind] {
        &[EventKind::TreeBuilt]
    }

    async fn handle(
        &mut self,
        event: &PipelineEvent,
        job: &mut JobContext,
    ) -> Result<Vec<PipelineEvent>> {
        match event {
            PipelineEvent::FileDiscovered { path } => {
                self.paths.push(path.clone());
                Ok(vec![])
            }
            PipelineEvent::ExtractionDone { base_dir } => {
                let relative: Vec<PathBuf> = self
                    .paths
                    .drain(..)
                    .map(|p| p.strip_prefix(base_dir).map(Path::to_path_buf).unwrap_or(p))
                    .collect();
                job.tree_text = Some(render_tree(&relative));
                Ok(vec![PipelineEvent::TreeBuilt])
            }
            _ => Ok(vec![]),
        }
    }
}
