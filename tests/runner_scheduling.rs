use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use assetflow::config::{BuildConfig, Mode};
use assetflow::dag::{TaskGraph, TaskNode};
use assetflow::engine::TaskStatus;
use assetflow::Pipeline;
use assetflow_test_utils::{
    init_tracing, with_timeout, ConfigBuilder, ProjectFixture, RecordingTransform, UnitLog,
};

type TestResult = Result<(), Box<dyn Error>>;

fn names(tasks: &[&str]) -> Vec<String> {
    tasks.iter().map(|t| t.to_string()).collect()
}

fn session(project: &ProjectFixture, nodes: Vec<TaskNode>) -> Result<Pipeline, Box<dyn Error>> {
    let cfg: BuildConfig = project.config(&ConfigBuilder::new());
    let graph = TaskGraph::new(nodes)?;
    Ok(Pipeline::with_graph(Arc::new(cfg), Mode::Development, graph))
}

#[tokio::test]
async fn independent_tasks_run_concurrently() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let log = UnitLog::new();
    let slow = Duration::from_millis(200);

    let pipeline = session(
        &project,
        vec![
            TaskNode::single("images", RecordingTransform::new("images", &log).delay(slow).into_unit()),
            TaskNode::single("styles", RecordingTransform::new("styles", &log).delay(slow).into_unit()),
        ],
    )?;

    let result = with_timeout(pipeline.run_all()).await?;

    assert!(result.is_success());
    assert!(log.overlapped("images", "styles"), "events: {:?}", log.events());
    Ok(())
}

#[tokio::test]
async fn dependents_start_after_their_dependencies_finish() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let log = UnitLog::new();

    let pipeline = session(
        &project,
        vec![
            TaskNode::single("styles", RecordingTransform::new("styles", &log).into_unit()),
            TaskNode::single("scripts", RecordingTransform::new("scripts", &log).into_unit())
                .after("styles"),
            TaskNode::single("index", RecordingTransform::new("index", &log).into_unit())
                .after("scripts"),
        ],
    )?;

    let result = with_timeout(pipeline.run_all()).await?;

    assert!(result.is_success());
    assert!(log.finished_before_start("styles", "scripts"));
    assert!(log.finished_before_start("scripts", "index"));
    Ok(())
}

#[tokio::test]
async fn untriggered_dependencies_do_not_hold_back_a_run() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let log = UnitLog::new();

    let pipeline = session(
        &project,
        vec![
            TaskNode::single("styles", RecordingTransform::new("styles", &log).into_unit()),
            TaskNode::single("scripts", RecordingTransform::new("scripts", &log).into_unit())
                .after("styles"),
        ],
    )?;

    let result = with_timeout(pipeline.run_tasks(&names(&["scripts"]))).await?;

    assert!(result.is_success());
    assert!(log.started("scripts"));
    assert!(!log.started("styles"));
    assert!(result.status("styles").is_none());
    Ok(())
}

#[tokio::test]
async fn fan_out_units_run_concurrently_and_merge() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let log = UnitLog::new();
    let slow = Duration::from_millis(200);

    let pipeline = session(
        &project,
        vec![TaskNode::fan_out(
            "scripts",
            vec![
                RecordingTransform::new("scripts[app.js]", &log)
                    .delay(slow)
                    .writes("app.js")
                    .into_unit(),
                RecordingTransform::new("scripts[vendor.js]", &log)
                    .delay(slow)
                    .writes("vendor.js")
                    .writes("vendor.js.map")
                    .into_unit(),
            ],
        )],
    )?;

    let result = with_timeout(pipeline.run_all()).await?;

    assert!(log.overlapped("scripts[app.js]", "scripts[vendor.js]"));
    assert!(matches!(
        result.status("scripts"),
        Some(TaskStatus::Succeeded { files_written: 3, up_to_date: false })
    ));
    Ok(())
}

#[tokio::test]
async fn one_failing_unit_fails_the_whole_task() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let log = UnitLog::new();

    let pipeline = session(
        &project,
        vec![TaskNode::fan_out(
            "scripts",
            vec![
                RecordingTransform::new("scripts[app.js]", &log).writes("app.js").into_unit(),
                RecordingTransform::new("scripts[vendor.js]", &log).fails_fatally().into_unit(),
            ],
        )],
    )?;

    let result = with_timeout(pipeline.run_all()).await?;

    assert!(!result.is_success());
    assert!(matches!(
        result.status("scripts"),
        Some(TaskStatus::Failed { fatal: true, files_written: 1, errors }) if errors.len() == 1
    ));
    Ok(())
}

#[tokio::test]
async fn fatal_failure_blocks_transitive_dependents_only() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let log = UnitLog::new();

    let pipeline = session(
        &project,
        vec![
            TaskNode::single("scripts", RecordingTransform::new("scripts", &log).fails_fatally().into_unit()),
            TaskNode::single("styles", RecordingTransform::new("styles", &log).into_unit())
                .after("scripts"),
            TaskNode::single("index", RecordingTransform::new("index", &log).into_unit())
                .after("styles"),
            TaskNode::single("images", RecordingTransform::new("images", &log).into_unit()),
        ],
    )?;

    let result = with_timeout(pipeline.run_all()).await?;

    assert!(!result.is_success());
    assert_eq!(result.first_fatal.as_deref(), Some("scripts"));
    for blocked in ["styles", "index"] {
        assert!(
            matches!(result.status(blocked), Some(TaskStatus::Blocked { by }) if by == "scripts"),
            "{blocked}: {:?}",
            result.status(blocked)
        );
        assert!(!log.started(blocked));
    }
    assert!(matches!(result.status("images"), Some(TaskStatus::Succeeded { .. })));
    Ok(())
}

#[tokio::test]
async fn recoverable_failure_releases_dependents() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let log = UnitLog::new();

    let pipeline = session(
        &project,
        vec![
            TaskNode::single("styles", RecordingTransform::new("styles", &log).fails_recoverably().into_unit()),
            TaskNode::single("index", RecordingTransform::new("index", &log).into_unit())
                .after("styles"),
        ],
    )?;

    let result = with_timeout(pipeline.run_all()).await?;

    assert!(result.is_success());
    assert!(log.finished_before_start("styles", "index"));
    assert!(matches!(
        result.status("styles"),
        Some(TaskStatus::Failed { fatal: false, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn successful_writes_notify_reload_subscribers() -> TestResult {
    init_tracing();
    let project = ProjectFixture::new();
    let log = UnitLog::new();

    let pipeline = session(
        &project,
        vec![
            TaskNode::single("styles", RecordingTransform::new("styles", &log).writes("styles.css").into_unit()),
            TaskNode::single("images", RecordingTransform::new("images", &log).into_unit()),
        ],
    )?;
    let mut reloads = pipeline.reloader().subscribe();

    with_timeout(pipeline.run_all()).await?;

    let event = reloads.try_recv()?;
    assert_eq!(event.task, "styles");
    assert_eq!(event.files, vec![std::path::PathBuf::from("styles.css")]);
    // `images` wrote nothing, so nothing else was pushed.
    assert!(reloads.try_recv().is_err());
    Ok(())
}
