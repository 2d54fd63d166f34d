use flowdeck::demo::drive;
use flowdeck::logging::{LogLevel, MemoryLogger};
use flowdeck::options::PresenterOptions;
use flowdeck::presenter::WorkflowPresenter;
use flowdeck::runtime::{FakeClock, FakeSurface};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn scripted_demo_drives_the_presenter_end_to_end() {
    let surface = FakeSurface::new();
    let clock = FakeClock::default();
    let logger = MemoryLogger::new();
    let mut presenter = WorkflowPresenter::with_collaborators(
        PresenterOptions::default(),
        Arc::new(surface.clone()),
        Some(Arc::new(logger.clone())),
        Arc::new(clock.clone()),
    );

    drive(&mut presenter, Duration::ZERO).expect("demo run");

    assert_eq!(surface.appends().len(), 1, "one live document");
    assert_eq!(surface.removes(), vec!["workflow".to_string()]);
    assert!(!presenter.is_hooked());
    assert_eq!(clock.sleeps().len(), 1, "one grace delay before teardown");

    // 16 lifecycle transitions, 5 output lines, one end event.
    assert_eq!(surface.logs().len(), 16);
    assert_eq!(surface.updates().len(), 22);

    let records = logger.records();
    assert_eq!(records.len(), 16);
    let last = records.last().expect("records");
    assert_eq!(last.level, LogLevel::Error);
    assert_eq!(last.title, "Workflow 'Sleep good' Failure");
    assert!(
        records
            .iter()
            .any(|r| r.title == "Routine 'build' Success" && r.level == LogLevel::Info),
        "routine completions log at info"
    );

    let final_lines = surface
        .updates()
        .last()
        .expect("final update")
        .1
        .text_lines();
    assert!(final_lines[0].contains("Sleep good"));
    assert!(
        final_lines.iter().any(|l| l.contains("error: X")),
        "failed member's last output stays on the final frame"
    );
    assert!(
        final_lines.iter().any(|l| l.contains("test matrix")),
        "strategy header survives the failure"
    );
}
