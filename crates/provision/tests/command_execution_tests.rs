use provision::commands::{
    CommandError, CommandRunner, CommandSpec, NullObserver, OutputLine, ProcessCommandRunner,
    RunState,
};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

#[tokio::test]
async fn test_command_execution_with_long_output() {
    let runner = ProcessCommandRunner::default();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let lines_clone = lines.clone();

    let result = runner
        .run(
            &sh("for i in $(seq 1 1000); do echo \"Line $i\"; echo \"Err $i\" >&2; done"),
            &mut move |line: OutputLine| lines_clone.lock().unwrap().push(line),
        )
        .await;

    assert!(result.unwrap().is_success());

    let lines = lines.lock().unwrap();
    let stdout: Vec<_> = lines.iter().filter(|l| !l.is_stderr()).collect();
    assert_eq!(stdout.len(), 1000);
    assert_eq!(lines.len(), 2000);
    assert_eq!(stdout[999].text(), "Line 1000");
}

#[tokio::test]
async fn test_diagnostic_keeps_only_the_last_twenty_stderr_lines() {
    let runner = ProcessCommandRunner::default();
    let spec = sh("for i in $(seq 1 30); do echo \"problem $i\" >&2; done; exit 3");

    let error = runner.run(&spec, &mut NullObserver).await.unwrap_err();

    assert_eq!(error.exit_code(), Some(3));
    assert_eq!(error.state(), RunState::FailedExitCode);

    let diagnostic = error.diagnostic().unwrap();
    assert_eq!(diagnostic.lines().count(), 20);
    assert!(diagnostic.starts_with("problem 11"));
    assert!(diagnostic.ends_with("problem 30"));
}

#[tokio::test]
async fn test_timeout_kills_the_whole_process_group() {
    let runner = ProcessCommandRunner::default();
    // The background sleep holds the output pipes open after the shell dies.
    let spec = sh("sleep 5 & sleep 5; wait").with_timeout(Some(Duration::from_millis(200)));

    let started = Instant::now();
    let error = runner.run(&spec, &mut NullObserver).await.unwrap_err();

    assert!(matches!(error, CommandError::Timeout { .. }));
    assert_eq!(error.state(), RunState::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_timed_out_step_fails_the_workflow() {
    use provision::{
        fs::real::RealFileSystem,
        workflow::{Stage, Step, Workflow, WorkflowRunner},
    };
    use test_common::{collect_events, completion};

    let workflow = Workflow::new("slow").stage(Stage::new(
        "Waiting",
        vec![
            Step::run(
                "Sleeping",
                CommandSpec::new("sleep")
                    .arg("5")
                    .with_timeout(Some(Duration::from_millis(200))),
            ),
            Step::run("Never reached", CommandSpec::new("true")),
        ],
    ));
    let runner = WorkflowRunner::new(ProcessCommandRunner::default(), RealFileSystem);

    let events = collect_events(runner.start(workflow)).await;

    let failure = completion(&events).unwrap().as_ref().unwrap_err();
    assert_eq!(failure.step(), "Sleeping");
    assert!(failure.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_dropping_the_event_stream_stops_the_run() {
    use futures::StreamExt;
    use provision::{
        fs::real::RealFileSystem,
        workflow::{Stage, Step, Workflow, WorkflowEvent, WorkflowRunner},
    };

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("second-step-ran");
    let workflow = Workflow::new("abandoned").stage(Stage::new(
        "Working",
        vec![
            Step::run("Sleeping", CommandSpec::new("sleep").arg("0.3")),
            Step::run(
                "Touching",
                CommandSpec::new("touch").arg(marker.display().to_string()),
            ),
        ],
    ));
    let runner = WorkflowRunner::new(ProcessCommandRunner::default(), RealFileSystem);

    let mut events = runner.start(workflow);
    let first = events.next().await;
    assert!(matches!(first, Some(WorkflowEvent::Started { .. })));
    drop(events);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(!marker.exists());
}
