use crate::errors::FlowdeckError;
use crate::events::{EventEnvelope, EventScope, LifecycleEvent, LifecycleKind, WorkflowEvent};
use crate::graph::{
    LevelNode, Measurement, RoutineGraph, StepGraph, StrategyGraph, WorkflowGraph,
};
use crate::logging::JsonlLogger;
use crate::options::PresenterOptions;
use crate::presenter::WorkflowPresenter;
use crate::status::{validate_transition, Status};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 64;

/// The scripted demo workflow: a build routine followed by a two-member
/// test strategy whose second member fails.
pub fn sleep_good_graph() -> WorkflowGraph {
    let step = |command: &str| StepGraph {
        name: None,
        command: command.to_string(),
        status: Status::Idle,
        started_at: None,
        ended_at: None,
        measurement: None,
        output: String::new(),
    };
    let routine = |name: &str, steps: Vec<StepGraph>| RoutineGraph {
        name: name.to_string(),
        status: Status::Idle,
        started_at: None,
        ended_at: None,
        measurement: None,
        steps,
    };

    WorkflowGraph {
        name: "Sleep good".to_string(),
        status: Status::Idle,
        started_at: None,
        ended_at: None,
        measurement: None,
        levels: vec![
            vec![LevelNode::Routine(routine(
                "build",
                vec![step("cargo fetch"), step("cargo build")],
            ))],
            vec![LevelNode::Strategy(StrategyGraph {
                name: "test matrix".to_string(),
                members: vec![
                    routine("cargo test [0]", vec![step("cargo test --lib")]),
                    routine("cargo test [1]", vec![step("cargo test --doc")]),
                ],
            })],
        ],
    }
}

/// Node address within the demo graph: (level, node, strategy member).
type NodePath = (usize, usize, Option<usize>);

struct ScriptEngine {
    graph: WorkflowGraph,
    tx: mpsc::Sender<EventEnvelope>,
    pace: Duration,
}

impl ScriptEngine {
    fn emit(&self, event: WorkflowEvent) -> Result<(), FlowdeckError> {
        self.tx
            .blocking_send(EventEnvelope {
                event,
                graph: self.graph.clone(),
            })
            .map_err(|e| FlowdeckError::Channel(e.to_string()))
    }

    fn pace(&self) {
        if !self.pace.is_zero() {
            thread::sleep(self.pace);
        }
    }

    fn routine_mut(&mut self, path: NodePath) -> Result<&mut RoutineGraph, FlowdeckError> {
        let (level, node, member) = path;
        let node = self
            .graph
            .levels
            .get_mut(level)
            .and_then(|nodes| nodes.get_mut(node))
            .ok_or_else(|| FlowdeckError::Lifecycle(format!("no node at {level}:{node}")))?;
        match (node, member) {
            (LevelNode::Routine(routine), None) => Ok(routine),
            (LevelNode::Strategy(strategy), Some(member)) => strategy
                .members
                .get_mut(member)
                .ok_or_else(|| FlowdeckError::Lifecycle(format!("no member {member}"))),
            _ => Err(FlowdeckError::Lifecycle(
                "path does not address a routine".to_string(),
            )),
        }
    }

    fn workflow_to(&mut self, status: Status) -> Result<(), FlowdeckError> {
        let now = SystemTime::now();
        let kind = announced_kind(status)?;
        validate_transition(self.graph.status, status)?;
        self.graph.status = status;
        if status == Status::Running {
            self.graph.started_at = Some(now);
        } else if status.is_terminal() {
            self.graph.ended_at = Some(now);
            if let Some(start) = self.graph.started_at {
                self.graph.measurement = Some(Measurement::from_span(start, now));
            }
        }

        let mut event = LifecycleEvent::new(EventScope::Workflow, kind, self.graph.name.clone());
        event.measurement = self.graph.measurement;
        self.emit(WorkflowEvent::Lifecycle(event))
    }

    fn routine_to(&mut self, path: NodePath, status: Status) -> Result<(), FlowdeckError> {
        let now = SystemTime::now();
        let kind = announced_kind(status)?;
        let (name, measurement) = {
            let routine = self.routine_mut(path)?;
            validate_transition(routine.status, status)?;
            routine.status = status;
            if status == Status::Running {
                routine.started_at = Some(now);
            } else if status.is_terminal() {
                routine.ended_at = Some(now);
                if let Some(start) = routine.started_at {
                    routine.measurement = Some(Measurement::from_span(start, now));
                }
            }
            (routine.name.clone(), routine.measurement)
        };

        let mut event = LifecycleEvent::new(EventScope::Routine, kind, name);
        event.measurement = measurement;
        self.emit(WorkflowEvent::Lifecycle(event))
    }

    fn step_to(&mut self, path: NodePath, index: usize, status: Status) -> Result<(), FlowdeckError> {
        let now = SystemTime::now();
        let kind = announced_kind(status)?;
        let (routine_name, label, measurement) = {
            let routine = self.routine_mut(path)?;
            let routine_name = routine.name.clone();
            let step = routine
                .steps
                .get_mut(index)
                .ok_or_else(|| FlowdeckError::Lifecycle(format!("no step {index}")))?;
            validate_transition(step.status, status)?;
            step.status = status;
            if status == Status::Running {
                step.started_at = Some(now);
            } else if status.is_terminal() {
                step.ended_at = Some(now);
                if let Some(start) = step.started_at {
                    step.measurement = Some(Measurement::from_span(start, now));
                }
            }
            (routine_name, step.label().to_string(), step.measurement)
        };

        let mut event = LifecycleEvent::new(EventScope::Step, kind, label);
        event.routine = Some(routine_name);
        event.index = Some(index);
        event.measurement = measurement;
        self.emit(WorkflowEvent::Lifecycle(event))
    }

    fn step_output(&mut self, path: NodePath, index: usize, line: &str) -> Result<(), FlowdeckError> {
        let routine_name = {
            let routine = self.routine_mut(path)?;
            let routine_name = routine.name.clone();
            let step = routine
                .steps
                .get_mut(index)
                .ok_or_else(|| FlowdeckError::Lifecycle(format!("no step {index}")))?;
            step.output = line.to_string();
            routine_name
        };
        self.emit(WorkflowEvent::StepOutput {
            routine: routine_name,
            index,
            data: line.to_string(),
        })
    }
}

/// The announcement kind for a transition target. Idle is never a target
/// (`validate_transition` rejects it), so it maps to nothing.
fn kind_for(status: Status) -> Option<LifecycleKind> {
    match status {
        Status::Idle => None,
        Status::Running => Some(LifecycleKind::Running),
        Status::Success => Some(LifecycleKind::Success),
        Status::Failure => Some(LifecycleKind::Failure),
        Status::Stopping => Some(LifecycleKind::Stopping),
        Status::Stopped => Some(LifecycleKind::Stopped),
    }
}

fn announced_kind(status: Status) -> Result<LifecycleKind, FlowdeckError> {
    kind_for(status)
        .ok_or_else(|| FlowdeckError::Lifecycle(format!("{:?} is never announced", status)))
}

const BUILD: NodePath = (0, 0, None);
const TEST_A: NodePath = (1, 0, Some(0));
const TEST_B: NodePath = (1, 0, Some(1));

fn run_script(mut engine: ScriptEngine) -> Result<(), FlowdeckError> {
    engine.workflow_to(Status::Running)?;
    engine.pace();

    engine.routine_to(BUILD, Status::Running)?;
    engine.step_to(BUILD, 0, Status::Running)?;
    engine.step_output(BUILD, 0, "updating crates.io index")?;
    engine.pace();
    engine.step_to(BUILD, 0, Status::Success)?;
    engine.step_to(BUILD, 1, Status::Running)?;
    engine.step_output(BUILD, 1, "compiling flowdeck v0.1.0")?;
    engine.pace();
    engine.step_to(BUILD, 1, Status::Success)?;
    engine.routine_to(BUILD, Status::Success)?;
    engine.pace();

    engine.routine_to(TEST_A, Status::Running)?;
    engine.routine_to(TEST_B, Status::Running)?;
    engine.step_to(TEST_A, 0, Status::Running)?;
    engine.step_to(TEST_B, 0, Status::Running)?;
    engine.step_output(TEST_A, 0, "running 48 tests")?;
    engine.step_output(TEST_B, 0, "running 12 tests")?;
    engine.pace();
    engine.step_to(TEST_A, 0, Status::Success)?;
    engine.routine_to(TEST_A, Status::Success)?;
    engine.pace();
    engine.step_output(TEST_B, 0, "error: X")?;
    engine.step_to(TEST_B, 0, Status::Failure)?;
    engine.routine_to(TEST_B, Status::Failure)?;
    engine.pace();

    engine.workflow_to(Status::Failure)?;
    engine.emit(WorkflowEvent::End)
}

/// Runs the scripted engine on its own thread and pumps every envelope
/// through the presenter on the calling thread.
pub fn drive(presenter: &mut WorkflowPresenter, pace: Duration) -> Result<(), FlowdeckError> {
    let graph = sleep_good_graph();
    let (tx, mut rx) = mpsc::channel::<EventEnvelope>(CHANNEL_CAPACITY);

    let engine_graph = graph.clone();
    let engine = thread::spawn(move || {
        run_script(ScriptEngine {
            graph: engine_graph,
            tx,
            pace,
        })
    });

    presenter.present(&graph)?;
    while let Some(envelope) = rx.blocking_recv() {
        presenter.handle(&envelope)?;
    }

    engine
        .join()
        .map_err(|_| FlowdeckError::Channel("engine thread panicked".to_string()))?
}

pub fn run_demo(
    options: PresenterOptions,
    pace: Duration,
    log_path: Option<PathBuf>,
) -> Result<i32, FlowdeckError> {
    let mut presenter = WorkflowPresenter::new(options);
    if let Some(path) = log_path {
        presenter = presenter.with_logger(Arc::new(JsonlLogger::new(path)));
    }
    drive(&mut presenter, pace)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_graph_has_two_levels_with_a_strategy() {
        let graph = sleep_good_graph();
        assert_eq!(graph.name, "Sleep good");
        assert_eq!(graph.levels.len(), 2);
        assert!(matches!(graph.levels[0][0], LevelNode::Routine(_)));
        match &graph.levels[1][0] {
            LevelNode::Strategy(strategy) => assert_eq!(strategy.members.len(), 2),
            LevelNode::Routine(_) => panic!("second level must hold the strategy"),
        }
    }

    #[test]
    fn idle_is_never_announced() {
        assert_eq!(kind_for(Status::Idle), None);
        assert_eq!(kind_for(Status::Running), Some(LifecycleKind::Running));
        assert_eq!(kind_for(Status::Stopped), Some(LifecycleKind::Stopped));
        assert!(
            announced_kind(Status::Idle).is_err(),
            "idle as a transition target is a script bug, not a Running event"
        );
    }

    #[test]
    fn script_engine_rejects_bad_addresses() {
        let (tx, _rx) = mpsc::channel(1);
        let mut engine = ScriptEngine {
            graph: sleep_good_graph(),
            tx,
            pace: Duration::ZERO,
        };
        assert!(engine.routine_mut((9, 0, None)).is_err());
        assert!(engine.routine_mut((1, 0, Some(7))).is_err());
        assert!(engine.routine_mut((1, 0, None)).is_err(), "strategy needs a member index");
    }
}
