pub mod cache;
pub mod demo;
pub mod document;
pub mod errors;
pub mod events;
pub mod flatten;
pub mod graph;
pub mod logging;
pub mod options;
pub mod presenter;
pub mod render;
pub mod runtime;
pub mod status;

use clap::{error::ErrorKind, Parser};
use errors::FlowdeckError;
use options::{
    parse_options_file, PresenterOptions, RoutinePolicy, StepPolicy, StrategyRoutinePolicy,
};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "flowdeck")]
#[command(about = "Live terminal presenter for workflow execution graphs")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long, value_enum)]
    pub show_routines: Option<RoutinePolicy>,
    #[arg(long, value_enum)]
    pub show_strategy_routines: Option<StrategyRoutinePolicy>,
    #[arg(long, value_enum)]
    pub show_routine_steps: Option<StepPolicy>,
    #[arg(long, default_value_t = false)]
    pub no_event_log: bool,
    #[arg(long = "grace-ms")]
    pub grace_ms: Option<u64>,
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,
    #[arg(long = "pace-ms", default_value_t = 400)]
    pub pace_ms: u64,
}

pub fn run() -> Result<i32, FlowdeckError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    run_with(&args)
}

pub fn run_with(args: &[std::ffi::OsString]) -> Result<i32, FlowdeckError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(FlowdeckError::Cli(error.to_string())),
        },
    };

    let options = resolve_options(&cli)?;
    demo::run_demo(
        options,
        Duration::from_millis(cli.pace_ms),
        cli.log_file.clone(),
    )
}

/// Layered options: built-in defaults, then the TOML file, then CLI flags.
pub fn resolve_options(cli: &Cli) -> Result<PresenterOptions, FlowdeckError> {
    let mut options = PresenterOptions::default();

    if let Some(path) = &cli.config {
        let contents =
            std::fs::read_to_string(path).map_err(|e| FlowdeckError::Io(e.to_string()))?;
        options = parse_options_file(&contents)?.apply(options);
    }

    if let Some(policy) = cli.show_routines {
        options.show_routines = policy;
    }
    if let Some(policy) = cli.show_strategy_routines {
        options.show_strategy_routines = policy;
    }
    if let Some(policy) = cli.show_routine_steps {
        options.show_routine_steps = policy;
    }
    if cli.no_event_log {
        options.log_events = false;
    }
    if let Some(grace) = cli.grace_ms {
        options.teardown_grace = Duration::from_millis(grace);
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::{resolve_options, Cli};
    use crate::options::{RoutinePolicy, StepPolicy, StrategyRoutinePolicy};
    use clap::Parser;
    use std::io::Write;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("cli parse")
    }

    #[test]
    fn defaults_hold_without_flags_or_config() {
        let options = resolve_options(&parse(&["flowdeck"])).expect("resolve");
        assert_eq!(options.show_routines, RoutinePolicy::Always);
        assert_eq!(
            options.show_strategy_routines,
            StrategyRoutinePolicy::StrategyActive
        );
        assert_eq!(options.show_routine_steps, StepPolicy::Running);
        assert!(options.log_events);
        assert_eq!(options.teardown_grace, Duration::from_secs(1));
    }

    #[test]
    fn cli_flags_override_the_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "show-routines = \"pending\"\nshow-routine-steps = \"always\"\nteardown-grace-ms = 250"
        )
        .expect("write config");

        let path = file.path().to_string_lossy().into_owned();
        let cli = parse(&[
            "flowdeck",
            "--config",
            &path,
            "--show-routines",
            "running",
            "--no-event-log",
        ]);
        let options = resolve_options(&cli).expect("resolve");

        assert_eq!(options.show_routines, RoutinePolicy::Running, "flag wins");
        assert_eq!(
            options.show_routine_steps,
            StepPolicy::Always,
            "file value survives where no flag was given"
        );
        assert_eq!(options.teardown_grace, Duration::from_millis(250));
        assert!(!options.log_events);
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let cli = parse(&["flowdeck", "--config", "/nonexistent/flowdeck.toml"]);
        assert!(resolve_options(&cli).is_err());
    }
}
