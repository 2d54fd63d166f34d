use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Elapsed milliseconds reported by the engine alongside terminal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Measurement {
    pub millis: u64,
}

impl Measurement {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn from_span(start: SystemTime, end: SystemTime) -> Self {
        let millis = end
            .duration_since(start)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { millis }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis < 1_000 {
            write!(f, "{}ms", self.millis)
        } else if self.millis < 60_000 {
            write!(f, "{:.1}s", self.millis as f64 / 1_000.0)
        } else {
            let minutes = self.millis / 60_000;
            let seconds = (self.millis % 60_000) as f64 / 1_000.0;
            write!(f, "{minutes}m{seconds:.1}s")
        }
    }
}

/// Read-only snapshot of one step, the smallest unit of execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepGraph {
    pub name: Option<String>,
    pub command: String,
    pub status: Status,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub measurement: Option<Measurement>,
    pub output: String,
}

impl StepGraph {
    /// Display label for the step: its name when the engine supplied one,
    /// otherwise the command line itself.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.command)
    }
}

/// Read-only snapshot of a named unit of work and its ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineGraph {
    pub name: String,
    pub status: Status,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub measurement: Option<Measurement>,
    pub steps: Vec<StepGraph>,
}

/// A group of routines executed in parallel (or as alternatives) within one
/// level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyGraph {
    pub name: String,
    pub members: Vec<RoutineGraph>,
}

impl StrategyGraph {
    pub fn any_active(&self) -> bool {
        self.members.iter().any(|m| m.status.is_active())
    }

    pub fn any_pending(&self) -> bool {
        self.members.iter().any(|m| m.status.is_pending())
    }

    pub fn all_success(&self) -> bool {
        self.members.iter().all(|m| m.status == Status::Success)
    }

    pub fn any_failed(&self) -> bool {
        self.members
            .iter()
            .any(|m| matches!(m.status, Status::Failure | Status::Stopped))
    }

    pub fn earliest_start(&self) -> Option<SystemTime> {
        self.members.iter().filter_map(|m| m.started_at).min()
    }

    pub fn latest_end(&self) -> Option<SystemTime> {
        self.members.iter().filter_map(|m| m.ended_at).max()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelNode {
    Routine(RoutineGraph),
    Strategy(StrategyGraph),
}

/// The full execution graph: ordered levels, each an ordered sequence of
/// routines and strategy groups. Supplied fresh by the engine on every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub name: String,
    pub status: Status,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub measurement: Option<Measurement>,
    pub levels: Vec<Vec<LevelNode>>,
}

/// Parses the trailing `[n]` badge index engines embed in strategy member
/// names ("test [2]" -> 2). Returns None when the name carries no suffix.
pub fn strategy_member_index(name: &str) -> Option<usize> {
    let stripped = name.trim_end().strip_suffix(']')?;
    let open = stripped.rfind('[')?;
    let digits = &stripped[open + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn measurement_formats_scale_with_magnitude() {
        assert_eq!(Measurement::from_millis(873).to_string(), "873ms");
        assert_eq!(Measurement::from_millis(2_400).to_string(), "2.4s");
        assert_eq!(Measurement::from_millis(73_800).to_string(), "1m13.8s");
    }

    #[test]
    fn measurement_span_is_clamped_to_zero_on_inverted_clocks() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let earlier = SystemTime::UNIX_EPOCH + Duration::from_secs(50);
        assert_eq!(Measurement::from_span(now, earlier).millis, 0);
    }

    #[test]
    fn member_index_parses_trailing_suffix_only() {
        assert_eq!(strategy_member_index("test [0]"), Some(0));
        assert_eq!(strategy_member_index("test [12]"), Some(12));
        assert_eq!(strategy_member_index("test [12] extra"), None);
        assert_eq!(strategy_member_index("test"), None);
        assert_eq!(strategy_member_index("test []"), None);
        assert_eq!(strategy_member_index("test [a]"), None);
    }

    fn member(status: Status, start: Option<u64>, end: Option<u64>) -> RoutineGraph {
        RoutineGraph {
            name: "m".to_string(),
            status,
            started_at: start.map(|s| SystemTime::UNIX_EPOCH + Duration::from_secs(s)),
            ended_at: end.map(|s| SystemTime::UNIX_EPOCH + Duration::from_secs(s)),
            measurement: None,
            steps: Vec::new(),
        }
    }

    #[test]
    fn strategy_span_covers_earliest_start_to_latest_end() {
        let strategy = StrategyGraph {
            name: "matrix".to_string(),
            members: vec![
                member(Status::Success, Some(20), Some(40)),
                member(Status::Success, Some(10), Some(90)),
                member(Status::Idle, None, None),
            ],
        };
        assert_eq!(
            strategy.earliest_start(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(10))
        );
        assert_eq!(
            strategy.latest_end(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(90))
        );
        assert!(!strategy.all_success(), "idle member is not success");
        assert!(!strategy.any_failed());
        assert!(strategy.any_pending());
    }

    #[test]
    fn stopped_members_count_as_failed() {
        let strategy = StrategyGraph {
            name: "matrix".to_string(),
            members: vec![member(Status::Stopped, None, None)],
        };
        assert!(strategy.any_failed());
    }
}
