use crate::errors::FlowdeckError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_millis(1_000);

/// Visibility policy for bare routines and strategy group headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RoutinePolicy {
    Always,
    Pending,
    Running,
}

/// Visibility policy for routines inside a strategy group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyRoutinePolicy {
    Always,
    StrategyActive,
    Pending,
    Running,
}

/// Visibility policy for the steps of an included routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StepPolicy {
    Always,
    RoutineActive,
    Pending,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenterOptions {
    pub show_routines: RoutinePolicy,
    pub show_strategy_routines: StrategyRoutinePolicy,
    pub show_routine_steps: StepPolicy,
    /// Announce lifecycle events as discrete lines above the live document.
    pub log_events: bool,
    /// How long the final frame stays visible before teardown.
    pub teardown_grace: Duration,
}

impl Default for PresenterOptions {
    fn default() -> Self {
        Self {
            show_routines: RoutinePolicy::Always,
            show_strategy_routines: StrategyRoutinePolicy::StrategyActive,
            show_routine_steps: StepPolicy::Running,
            log_events: true,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
        }
    }
}

/// TOML shape of an on-disk options file. Every field is optional; present
/// fields override the defaults, and CLI flags override both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OptionsFile {
    pub show_routines: Option<RoutinePolicy>,
    pub show_strategy_routines: Option<StrategyRoutinePolicy>,
    pub show_routine_steps: Option<StepPolicy>,
    pub log_events: Option<bool>,
    pub teardown_grace_ms: Option<u64>,
}

impl OptionsFile {
    pub fn apply(self, mut base: PresenterOptions) -> PresenterOptions {
        if let Some(policy) = self.show_routines {
            base.show_routines = policy;
        }
        if let Some(policy) = self.show_strategy_routines {
            base.show_strategy_routines = policy;
        }
        if let Some(policy) = self.show_routine_steps {
            base.show_routine_steps = policy;
        }
        if let Some(log_events) = self.log_events {
            base.log_events = log_events;
        }
        if let Some(millis) = self.teardown_grace_ms {
            base.teardown_grace = Duration::from_millis(millis);
        }
        base
    }
}

pub fn parse_options_file(contents: &str) -> Result<OptionsFile, FlowdeckError> {
    toml::from_str(contents).map_err(|e| FlowdeckError::ConfigParse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policies() {
        let options = PresenterOptions::default();
        assert_eq!(options.show_routines, RoutinePolicy::Always);
        assert_eq!(
            options.show_strategy_routines,
            StrategyRoutinePolicy::StrategyActive
        );
        assert_eq!(options.show_routine_steps, StepPolicy::Running);
        assert!(options.log_events);
        assert_eq!(options.teardown_grace, Duration::from_millis(1_000));
    }

    #[test]
    fn options_file_overrides_only_present_fields() {
        let file = parse_options_file(
            "show-routine-steps = \"always\"\nteardown-grace-ms = 250\n",
        )
        .expect("parse");
        let options = file.apply(PresenterOptions::default());
        assert_eq!(options.show_routine_steps, StepPolicy::Always);
        assert_eq!(options.teardown_grace, Duration::from_millis(250));
        assert_eq!(
            options.show_routines,
            RoutinePolicy::Always,
            "untouched fields keep their defaults"
        );
    }

    #[test]
    fn kebab_case_policy_values_round_trip() {
        let file = parse_options_file("show-strategy-routines = \"strategy-active\"\n")
            .expect("parse");
        assert_eq!(
            file.show_strategy_routines,
            Some(StrategyRoutinePolicy::StrategyActive)
        );
    }

    #[test]
    fn malformed_options_file_is_a_parse_error() {
        let err = parse_options_file("show-routines = 3").expect_err("must reject");
        assert!(matches!(err, FlowdeckError::ConfigParse(_)));
    }
}
