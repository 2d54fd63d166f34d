use crate::graph::{
    strategy_member_index, LevelNode, RoutineGraph, StepGraph, StrategyGraph, WorkflowGraph,
};
use crate::options::{PresenterOptions, RoutinePolicy, StepPolicy, StrategyRoutinePolicy};
use crate::status::Status;

/// A renderable unit derived from the graph under a visibility policy.
#[derive(Debug, Clone, PartialEq)]
pub enum RowItem {
    Strategy(StrategyRowItem),
    Routine(RoutineRowItem),
    Step(StepRowItem),
    /// Readability spacer after a routine's step rows.
    Separator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRowItem {
    pub level: usize,
    pub level_count: usize,
    pub graph: StrategyGraph,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineRowItem {
    pub level: usize,
    pub level_count: usize,
    pub is_strategy_member: bool,
    /// Badge index for strategy members, derived from the member name.
    pub strategy_index: usize,
    pub graph: RoutineGraph,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRowItem {
    pub routine_name: String,
    pub index: usize,
    pub step_count: usize,
    pub multi_level: bool,
    pub is_strategy_member: bool,
    pub graph: StepGraph,
}

impl StepRowItem {
    /// Leading indentation of the step row: two columns under single-level
    /// workflows, four under multi-level ones, plus two more when the owning
    /// routine is a strategy member.
    pub fn indent(&self) -> usize {
        let base = if self.multi_level { 4 } else { 2 };
        if self.is_strategy_member {
            base + 2
        } else {
            base
        }
    }
}

/// Walks the graph level by level and produces the ordered row sequence for
/// the configured visibility policies. Failed nodes are always included, no
/// matter what the policy says.
pub fn flatten(graph: &WorkflowGraph, options: &PresenterOptions) -> Vec<RowItem> {
    let level_count = graph.levels.len();
    let multi_level = level_count > 1;
    let mut rows = Vec::new();

    for (level, nodes) in graph.levels.iter().enumerate() {
        for node in nodes {
            match node {
                LevelNode::Strategy(strategy) => {
                    if !strategy_visible(strategy, options.show_routines) {
                        continue;
                    }
                    rows.push(RowItem::Strategy(StrategyRowItem {
                        level,
                        level_count,
                        graph: strategy.clone(),
                    }));

                    let any_suffixed = strategy
                        .members
                        .iter()
                        .any(|m| strategy_member_index(&m.name).is_some());
                    for (position, member) in strategy.members.iter().enumerate() {
                        let visible = member_visible(
                            member,
                            strategy,
                            options.show_strategy_routines,
                        );
                        if !visible && member.status != Status::Failure {
                            continue;
                        }
                        let strategy_index = strategy_member_index(&member.name)
                            .unwrap_or(if any_suffixed { 0 } else { position });
                        rows.push(RowItem::Routine(RoutineRowItem {
                            level,
                            level_count,
                            is_strategy_member: true,
                            strategy_index,
                            graph: member.clone(),
                        }));
                        push_steps(&mut rows, member, true, multi_level, options);
                    }
                }
                LevelNode::Routine(routine) => {
                    let visible = routine_visible(routine.status, options.show_routines);
                    if !visible && routine.status != Status::Failure {
                        continue;
                    }
                    rows.push(RowItem::Routine(RoutineRowItem {
                        level,
                        level_count,
                        is_strategy_member: false,
                        strategy_index: 0,
                        graph: routine.clone(),
                    }));
                    push_steps(&mut rows, routine, false, multi_level, options);
                }
            }
        }
    }

    rows
}

fn routine_visible(status: Status, policy: RoutinePolicy) -> bool {
    match policy {
        RoutinePolicy::Always => true,
        RoutinePolicy::Pending => status.is_pending(),
        RoutinePolicy::Running => status.is_active(),
    }
}

/// Strategy headers are judged on the aggregate status of their members.
fn strategy_visible(strategy: &StrategyGraph, policy: RoutinePolicy) -> bool {
    let aggregate_visible = match policy {
        RoutinePolicy::Always => true,
        RoutinePolicy::Pending => strategy.any_pending(),
        RoutinePolicy::Running => strategy.any_active(),
    };
    aggregate_visible || strategy.members.iter().any(|m| m.status == Status::Failure)
}

fn member_visible(
    member: &RoutineGraph,
    strategy: &StrategyGraph,
    policy: StrategyRoutinePolicy,
) -> bool {
    match policy {
        StrategyRoutinePolicy::Always => true,
        StrategyRoutinePolicy::StrategyActive => strategy.any_active(),
        StrategyRoutinePolicy::Pending => member.status.is_pending(),
        StrategyRoutinePolicy::Running => member.status.is_active(),
    }
}

fn push_steps(
    rows: &mut Vec<RowItem>,
    routine: &RoutineGraph,
    is_strategy_member: bool,
    multi_level: bool,
    options: &PresenterOptions,
) {
    let mut rendered_any = false;

    for (index, step) in routine.steps.iter().enumerate() {
        let visible = match options.show_routine_steps {
            StepPolicy::Always => true,
            StepPolicy::RoutineActive => routine.status.is_active(),
            StepPolicy::Pending => step.status.is_pending(),
            StepPolicy::Running => step.status.is_active(),
        };
        if !visible && step.status != Status::Failure {
            continue;
        }
        rendered_any = true;
        rows.push(RowItem::Step(StepRowItem {
            routine_name: routine.name.clone(),
            index,
            step_count: routine.steps.len(),
            multi_level,
            is_strategy_member,
            graph: step.clone(),
        }));
    }

    if rendered_any {
        rows.push(RowItem::Separator);
    }
}
