use crate::cache::StepOutputCache;
use crate::document::{Block, Document, Row};
use crate::errors::FlowdeckError;
use crate::events::{EventEnvelope, LifecycleEvent, WorkflowEvent};
use crate::flatten::flatten;
use crate::graph::WorkflowGraph;
use crate::logging::{LogRecord, Logger};
use crate::options::PresenterOptions;
use crate::render::{format_clock, render_document, status_color};
use crate::runtime::{Clock, ProductionClock, Surface, TerminalSurface};
use ratatui::style::Color;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const DOCUMENT_ID: &str = "workflow";
const LOG_CATEGORY: &str = "workflows";

/// Bridges the workflow event stream to the rendering surface: one live
/// document, rebuilt in full from the snapshot carried by every event.
pub struct WorkflowPresenter {
    options: PresenterOptions,
    surface: Arc<dyn Surface>,
    owns_surface: bool,
    logger: Option<Arc<dyn Logger>>,
    clock: Arc<dyn Clock>,
    cache: StepOutputCache,
    hooked: bool,
}

impl WorkflowPresenter {
    /// Presenter with a surface of its own; the surface lifecycle (ticker
    /// start/stop) is owned here too.
    pub fn new(options: PresenterOptions) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(ProductionClock);
        let surface: Arc<dyn Surface> = Arc::new(TerminalSurface::new(Arc::clone(&clock)));
        Self {
            options,
            surface,
            owns_surface: true,
            logger: None,
            clock,
            cache: StepOutputCache::new(),
            hooked: false,
        }
    }

    /// Presenter over externally supplied collaborators. The surface is not
    /// owned: its start/stop stays with the caller.
    pub fn with_collaborators(
        options: PresenterOptions,
        surface: Arc<dyn Surface>,
        logger: Option<Arc<dyn Logger>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            options,
            surface,
            owns_surface: false,
            logger,
            clock,
            cache: StepOutputCache::new(),
            hooked: false,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn is_hooked(&self) -> bool {
        self.hooked
    }

    /// Hooks the presenter up and appends the initial document. Idempotent:
    /// a second call on a hooked presenter is a no-op.
    pub fn present(&mut self, graph: &WorkflowGraph) -> Result<(), FlowdeckError> {
        if self.hooked {
            return Ok(());
        }
        self.hooked = true;

        if self.owns_surface {
            self.surface.start()?;
        }
        self.surface.append(DOCUMENT_ID, self.build_document(graph))
    }

    /// Single dispatch point for every event on the stream. Runs entirely
    /// within the caller's thread; cache write and rebuild are atomic with
    /// respect to the event source.
    pub fn handle(&mut self, envelope: &EventEnvelope) -> Result<(), FlowdeckError> {
        if !self.hooked {
            return Ok(());
        }

        match &envelope.event {
            WorkflowEvent::StepOutput {
                routine,
                index,
                data,
            } => {
                self.cache.record(routine, *index, data);
            }
            WorkflowEvent::Lifecycle(event) => {
                self.announce(event)?;
                self.log_record(event)?;
            }
            WorkflowEvent::End => {
                self.surface
                    .update(DOCUMENT_ID, self.build_document(&envelope.graph))?;
                return self.teardown();
            }
        }

        self.surface
            .update(DOCUMENT_ID, self.build_document(&envelope.graph))
    }

    fn build_document(&self, graph: &WorkflowGraph) -> Document {
        let rows = flatten(graph, &self.options);
        render_document(graph, &rows, &self.cache)
    }

    /// Leaves the final frame visible for the grace delay, then takes the
    /// document down and drops the hook so no further update can land.
    fn teardown(&mut self) -> Result<(), FlowdeckError> {
        let deadline = self.clock.now() + self.options.teardown_grace;
        self.clock.sleep_until(deadline)?;

        self.surface.remove(DOCUMENT_ID)?;
        self.hooked = false;
        if self.owns_surface {
            self.surface.stop()?;
        }
        Ok(())
    }

    /// One discrete announcement line per lifecycle event.
    fn announce(&self, event: &LifecycleEvent) -> Result<(), FlowdeckError> {
        if !self.options.log_events {
            return Ok(());
        }

        let badge_color = event
            .kind
            .status()
            .map(status_color)
            .unwrap_or(Color::Red);
        let mut blocks = vec![
            Block::badge(event.scope.badge(), badge_color),
            Block::text(format!(" {}", event.name)),
            Block::text(format!(" {} ", event.kind.label())).bold(),
            Block::text(format_clock(self.clock.now())),
        ];
        if let Some(measurement) = event.measurement {
            blocks.push(Block::text(" "));
            blocks.push(Block::text(measurement.to_string()));
        }
        if let Some(error) = &event.error {
            blocks.push(Block::text(" "));
            blocks.push(Block::text(error.clone()).fg(Color::Red));
        }

        self.surface.log(Row::from_blocks(blocks))
    }

    fn log_record(&self, event: &LifecycleEvent) -> Result<(), FlowdeckError> {
        let Some(logger) = &self.logger else {
            return Ok(());
        };

        logger.log(&LogRecord {
            level: event.kind.severity(),
            title: format!(
                "{} '{}' {}",
                event.scope.title(),
                event.name,
                event.kind.label()
            ),
            measurement: event.measurement,
            error: event.error.clone(),
            metadata: event_metadata(event),
            category: Some(LOG_CATEGORY.to_string()),
        })
    }
}

/// Event payload as log metadata, with the graph sub-object stripped. None
/// when nothing remains after stripping.
fn event_metadata(event: &LifecycleEvent) -> Option<Value> {
    let mut map = Map::new();
    if let Some(routine) = &event.routine {
        map.insert("routine".to_string(), json!(routine));
    }
    if let Some(index) = event.index {
        map.insert("index".to_string(), json!(index));
    }
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::event_metadata;
    use crate::events::{EventScope, LifecycleEvent, LifecycleKind};
    use serde_json::json;

    #[test]
    fn metadata_is_omitted_when_nothing_survives_stripping() {
        let event = LifecycleEvent::new(
            EventScope::Workflow,
            LifecycleKind::Running,
            "Sleep good",
        );
        assert_eq!(event_metadata(&event), None);
    }

    #[test]
    fn metadata_keeps_step_addressing_fields() {
        let mut event =
            LifecycleEvent::new(EventScope::Step, LifecycleKind::Failure, "cargo build");
        event.routine = Some("build".to_string());
        event.index = Some(1);
        assert_eq!(
            event_metadata(&event),
            Some(json!({"routine": "build", "index": 1}))
        );
    }
}
