use crate::errors::FlowdeckError;
use serde::{Deserialize, Serialize};

/// Execution status of a workflow, routine or step, as reported by the
/// external engine. This crate only ever observes these values; it never
/// drives a transition itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Idle,
    Running,
    Stopping,
    Success,
    Failure,
    Stopped,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Stopped => "stopped",
        }
    }

    /// Running or Stopping: the node is currently doing work.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    /// Idle, Running or Stopping: the node has not reached a terminal state.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Idle | Self::Running | Self::Stopping)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Stopped)
    }
}

/// Checks one edge of the observed lifecycle:
/// Idle -> Running -> {Success, Failure}; Running -> Stopping -> Stopped.
/// Terminal states absorb.
pub fn validate_transition(from: Status, to: Status) -> Result<(), FlowdeckError> {
    use Status as S;

    let allowed = match from {
        S::Idle => matches!(to, S::Running),
        S::Running => matches!(to, S::Success | S::Failure | S::Stopping),
        S::Stopping => matches!(to, S::Stopped),
        S::Success | S::Failure | S::Stopped => false,
    };

    if !allowed {
        return Err(FlowdeckError::Lifecycle(format!(
            "illegal transition: {:?} -> {:?}",
            from, to
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_partition_the_status_set() {
        for status in [
            Status::Idle,
            Status::Running,
            Status::Stopping,
            Status::Success,
            Status::Failure,
            Status::Stopped,
        ] {
            assert_eq!(status.is_pending(), !status.is_terminal());
            if status.is_active() {
                assert!(status.is_pending());
            }
        }
    }

    #[test]
    fn lifecycle_accepts_the_two_happy_paths() {
        validate_transition(Status::Idle, Status::Running).expect("idle -> running");
        validate_transition(Status::Running, Status::Success).expect("running -> success");
        validate_transition(Status::Running, Status::Failure).expect("running -> failure");
        validate_transition(Status::Running, Status::Stopping).expect("running -> stopping");
        validate_transition(Status::Stopping, Status::Stopped).expect("stopping -> stopped");
    }

    #[test]
    fn terminal_states_absorb() {
        for terminal in [Status::Success, Status::Failure, Status::Stopped] {
            let err = validate_transition(terminal, Status::Running).expect_err("must reject");
            assert!(
                matches!(err, FlowdeckError::Lifecycle(message) if message.contains("illegal transition"))
            );
        }
    }

    #[test]
    fn idle_cannot_skip_to_terminal() {
        validate_transition(Status::Idle, Status::Success).expect_err("must reject");
        validate_transition(Status::Idle, Status::Stopped).expect_err("must reject");
    }
}
