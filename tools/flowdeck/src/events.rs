use crate::graph::{Measurement, WorkflowGraph};
use crate::logging::LogLevel;
use crate::status::Status;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventScope {
    Workflow,
    Routine,
    Step,
}

impl EventScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::Routine => "routine",
            Self::Step => "step",
        }
    }

    /// Badge text for announcement lines, padded to a common width.
    pub fn badge(self) -> &'static str {
        match self {
            Self::Workflow => " WORKFLOW ",
            Self::Routine => " ROUTINE  ",
            Self::Step => " STEP     ",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Workflow => "Workflow",
            Self::Routine => "Routine",
            Self::Step => "Step",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    Running,
    Success,
    Failure,
    Error,
    Stopping,
    Stopped,
}

impl LifecycleKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Error => "Error",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        }
    }

    /// Declarative severity table for the structured-log side channel.
    pub fn severity(self) -> LogLevel {
        match self {
            Self::Running | Self::Stopping => LogLevel::Debug,
            Self::Success => LogLevel::Info,
            Self::Failure | Self::Error | Self::Stopped => LogLevel::Error,
        }
    }

    /// The status a lifecycle event reports, when it maps onto one.
    /// `error` events carry no status of their own.
    pub fn status(self) -> Option<Status> {
        match self {
            Self::Running => Some(Status::Running),
            Self::Success => Some(Status::Success),
            Self::Failure => Some(Status::Failure),
            Self::Stopping => Some(Status::Stopping),
            Self::Stopped => Some(Status::Stopped),
            Self::Error => None,
        }
    }
}

/// One named lifecycle transition at workflow, routine or step scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub scope: EventScope,
    pub kind: LifecycleKind,
    /// Display name of the node: workflow or routine name, step label.
    pub name: String,
    /// Owning routine, for step-scoped events.
    pub routine: Option<String>,
    /// Step index within the owning routine, for step-scoped events.
    pub index: Option<usize>,
    pub measurement: Option<Measurement>,
    pub error: Option<String>,
}

impl LifecycleEvent {
    pub fn new(scope: EventScope, kind: LifecycleKind, name: impl Into<String>) -> Self {
        Self {
            scope,
            kind,
            name: name.into(),
            routine: None,
            index: None,
            measurement: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    Lifecycle(LifecycleEvent),
    StepOutput {
        routine: String,
        index: usize,
        data: String,
    },
    /// Terminal event: the workflow run is over and teardown may begin.
    End,
}

/// An event paired with the graph snapshot current at emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: WorkflowEvent,
    pub graph: WorkflowGraph,
}
