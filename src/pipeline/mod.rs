//! Per-job event bus and the stage contract.
//!
//! One [`EventBus`] exists per job. Stages declare the event kinds they
//! consume and produce; the bus routes published events to subscribers in
//! registration order and dispatches depth-first: events emitted by a
//! handler are fully processed before the next subscriber of the outer
//! event runs.

pub mod context;
pub mod events;

pub use context::{AnalysisArtifacts, FileKind, FileSummary, JobContext};
pub use events::{EventKind, PipelineEvent};

use crate::error::{AnalyzerError, Result};
use async_recursion::async_recursion;
use async_trait::async_trait;
use std::collections::HashMap;

/// Observer invoked for every published event, before dispatch
pub type EventTap = Box<dyn Fn(&PipelineEvent) + Send>;

/// One unit of the pipeline: consumes declared event kinds, produces others.
///
/// A handler returns the events it wants published; it never publishes
/// directly, which lets the bus enforce the declared output set.
#[async_trait]
pub trait Stage: Send {
    fn name(&self) -> &'static str;

    /// Event kinds this stage subscribes to
    fn consumes(&self) -> &'static [EventKind];

    /// Event kinds this stage is allowed to emit
    fn produces(&self) -> &'static [EventKind];

    async fn handle(
        &mut self,
        event: &PipelineEvent,
        job: &mut JobContext,
    ) -> Result<Vec<PipelineEvent>>;
}

/// In-process publish/subscribe dispatcher scoped to one job
pub struct EventBus {
    stages: Vec<Box<dyn Stage>>,
    routes: HashMap<EventKind, Vec<usize>>,
    tap: Option<EventTap>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            routes: HashMap::new(),
            tap: None,
        }
    }

    /// Installs an observer called for every published event
    pub fn set_tap(&mut self, tap: EventTap) {
        self.tap = Some(tap);
    }

    /// Wires a stage onto the bus for every event kind it consumes.
    ///
    /// Registration order is delivery order for subscribers of the same
    /// event kind.
    pub fn register(&mut self, stage: Box<dyn Stage>) {
        let index = self.stages.len();
        for kind in stage.consumes() {
            self.routes.entry(*kind).or_default().push(index);
        }
        self.stages.push(stage);
    }

    /// Publishes an event and runs the resulting cascade to completion.
    ///
    /// Handler errors are not caught here; they unwind to the caller, which
    /// is expected to move the job into the error state.
    #[async_recursion]
    pub async fn publish(&mut self, event: PipelineEvent, job: &mut JobContext) -> Result<()> {
        if let Some(tap) = &self.tap {
            tap(&event);
        }
        tracing::debug!(event = %event.kind(), "dispatching");

        let subscribers = self
            .routes
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for index in subscribers {
            let emitted = self.stages[index].handle(&event, job).await?;
            if let Some(stray) = emitted
                .iter()
                .find(|out| !self.stages[index].produces().contains(&out.kind()))
            {
                return Err(AnalyzerError::Pipeline(format!(
                    "stage {} emitted undeclared event {}",
                    self.stages[index].name(),
                    stray.kind()
                )));
            }
            for out in emitted {
                self.publish(out, job).await?;
            }
        }
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
