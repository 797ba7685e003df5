//! Integration tests for local execution

#![cfg(unix)]

use futures::StreamExt;
use remote_exec::{Command, Error, Executor, ProcessEventType, RunOptions};
use serde::Deserialize;
use std::time::{Duration, Instant};

fn shell(script: &str) -> Command {
    Command::builder("sh").arg("-c").arg(script).build()
}

#[smol_potat::test]
async fn test_collect_echo() {
    let executor = Executor::local();
    let cmd = Command::builder("echo").arg("hello world").build();

    let result = executor.collect(cmd, &RunOptions::default()).await.unwrap();

    assert_eq!(result.out, ["hello world"]);
    assert!(result.err.is_empty());
    assert_eq!(result.code, Some(0));
}

#[smol_potat::test]
async fn test_false_rejects_with_empty_output() {
    let executor = Executor::local();

    let err = executor
        .collect(Command::new("false"), &RunOptions::default())
        .await
        .unwrap_err();

    let result = err.into_result().expect("non-zero exit carries the result");
    assert_eq!(result.code, Some(1));
    assert!(result.out.is_empty());
    assert!(result.err.is_empty());
}

#[smol_potat::test]
async fn test_stdout_and_stderr_are_split() {
    let executor = Executor::local();
    let cmd = shell("echo out1; echo err1 >&2; echo out2; exit 3");

    let err = executor.collect(cmd, &RunOptions::default()).await.unwrap_err();
    let result = err.into_result().unwrap();

    assert_eq!(result.out, ["out1", "out2"]);
    assert_eq!(result.err, ["err1"]);
    assert_eq!(result.code, Some(3));
}

#[smol_potat::test]
async fn test_unterminated_tail_is_dropped() {
    let executor = Executor::local();

    let result = executor
        .collect(shell("printf 'a\\nb'"), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(result.out, ["a"]);
}

#[smol_potat::test]
async fn test_env_and_cwd() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Executor::local();
    let options = RunOptions::new().cwd(dir.path()).env("GREETING", "hi there");

    let result = executor
        .collect(shell("pwd; echo \"$GREETING\""), &options)
        .await
        .unwrap();

    let cwd = std::fs::canonicalize(dir.path()).unwrap();
    assert_eq!(result.out[0], cwd.display().to_string());
    assert_eq!(result.out[1], "hi there");
}

#[smol_potat::test]
async fn test_missing_cwd_fails_to_spawn() {
    let executor = Executor::local();
    let options = RunOptions::new().cwd("/definitely/not/here");

    let mut handle = executor.execute(Command::new("true"), &options);
    let events: Vec<_> = (&mut handle).collect().await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].event_type, ProcessEventType::Failed { .. }));

    let err = executor.collect(Command::new("true"), &options).await.unwrap_err();
    assert!(matches!(err, Error::SpawnFailed { .. }));
}

#[smol_potat::test]
async fn test_missing_program_fails_to_spawn() {
    let executor = Executor::local();

    let err = executor
        .collect(Command::new("no-such-program"), &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SpawnFailed { .. }));
}

#[smol_potat::test]
async fn test_arguments_reach_program_verbatim() {
    let executor = Executor::local();
    let cmd = Command::builder("printf")
        .args(["%s|%s|%s\n", "two words", "", "$HOME"])
        .build();

    let result = executor.collect(cmd, &RunOptions::default()).await.unwrap();

    assert_eq!(result.out, ["two words||$HOME"]);
}

#[smol_potat::test]
async fn test_terminal_event_is_last() {
    let executor = Executor::local();
    let mut handle = executor.execute(shell("seq 1 200"), &RunOptions::default());

    let events: Vec<_> = (&mut handle).collect().await;

    assert_eq!(events.len(), 201);
    assert!(events[..200].iter().all(|e| !e.is_terminal()));
    assert!(matches!(
        events[200].event_type,
        ProcessEventType::Exited { code: Some(0), .. }
    ));
    assert!(handle.is_finished());
}

#[smol_potat::test]
async fn test_stdin_is_forwarded() {
    let executor = Executor::local();
    let mut handle = executor.execute(Command::new("cat"), &RunOptions::default());

    handle.stdin_mut().write_line("first").await.unwrap();
    handle.stdin_mut().write_line("second").await.unwrap();
    handle.stdin_mut().close();
    assert!(handle.stdin_mut().write_line("third").await.is_err());

    let mut lines = Vec::new();
    while let Some(event) = handle.next().await {
        if event.event_type == ProcessEventType::Stdout {
            lines.push(event.data.unwrap());
        }
    }
    assert_eq!(lines, ["first", "second"]);
}

#[smol_potat::test]
async fn test_wait_returns_exit_status() {
    let executor = Executor::local();
    let mut handle = executor.execute(shell("exit 7"), &RunOptions::default());

    let status = handle.wait().await.unwrap();
    assert_eq!(status.code, Some(7));
    assert!(!status.success());
    assert_eq!(handle.executor().unwrap().description(), "local");
}

#[smol_potat::test]
async fn test_killed_process_reports_signal() {
    let executor = Executor::local();

    let err = executor
        .collect(shell("kill -TERM $$"), &RunOptions::default())
        .await
        .unwrap_err();

    let result = err.into_result().unwrap();
    assert_eq!(result.code, None);
    assert_eq!(result.signal.as_deref(), Some("SIGTERM"));
}

#[derive(Debug, Deserialize, PartialEq)]
struct Payload {
    a: u32,
    tags: Vec<String>,
}

#[smol_potat::test]
async fn test_collect_json() {
    let executor = Executor::local();
    let cmd = Command::builder("echo")
        .arg(r#"{"a":1,"tags":["x","y"]}"#)
        .build();

    let payload: Payload = executor.collect_json(cmd, &RunOptions::default()).await.unwrap();

    assert_eq!(
        payload,
        Payload {
            a: 1,
            tags: vec!["x".into(), "y".into()]
        }
    );
}

#[smol_potat::test]
async fn test_collect_json_multiline() {
    let executor = Executor::local();

    let value: serde_json::Value = executor
        .collect_json(shell("echo '{'; echo '\"a\": 1'; echo '}'"), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(value["a"], 1);
}

#[smol_potat::test]
async fn test_collect_json_gives_up() {
    let executor = Executor::local();
    let options = RunOptions::new()
        .collect_timeout(Duration::from_millis(20))
        .collect_tries(3);

    let start = Instant::now();
    let err = executor
        .collect_json::<serde_json::Value>(Command::builder("echo").arg("{oops").build(), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::JsonDecode { attempts: 3, .. }));
    // quiescence window plus two retry intervals
    assert!(start.elapsed() >= Duration::from_millis(60));
}

#[smol_potat::test]
async fn test_collect_json_propagates_exit_failure() {
    let executor = Executor::local();

    let err = executor
        .collect_json::<serde_json::Value>(shell("echo '{}'; exit 2"), &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NonZeroExit(_)));
}

#[smol_potat::test]
async fn test_executor_factory_defaults_to_local() {
    let executor = remote_exec::executor(None).await.unwrap();
    assert_eq!(executor.description(), "local");
    executor.close().await.unwrap();
    executor.close().await.unwrap();
}
