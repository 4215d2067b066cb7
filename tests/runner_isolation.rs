//! Contract tests for the isolated entity-recognition runner.
//!
//! The success/failure protocol is exercised against the real `entity-worker`
//! binary; the timeout and malformed-reply paths use small stub workers so no
//! model files are required.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use eznlp::ner::{IsolatedNerRunner, NerError};

fn worker_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_entity-worker"))
}

fn runner_with(worker: PathBuf, model_dir: PathBuf) -> IsolatedNerRunner {
    IsolatedNerRunner::with_worker(worker, model_dir, Duration::from_secs(30))
}

/// Write an executable shell script and return its path.
#[cfg(unix)]
fn stub_worker(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("stub-worker.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub");
    let mut perms = std::fs::metadata(&path).expect("stat").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

#[tokio::test]
async fn empty_document_yields_empty_set_without_a_model() {
    // The worker short-circuits before model load, so a bogus model dir is fine.
    let runner = runner_with(worker_bin(), PathBuf::from("/nonexistent/model"));
    let entities = runner.named_entities("   \n\t  ").await.expect("empty set");
    assert!(entities.is_empty());
}

#[tokio::test]
async fn missing_model_is_reported_as_worker_failure_not_a_hang() {
    let runner = runner_with(worker_bin(), PathBuf::from("/nonexistent/model"));
    let error = runner
        .named_entities("The capital of France is Paris.")
        .await
        .expect_err("worker failure");
    match error {
        NerError::WorkerFailed(message) => assert!(!message.is_empty()),
        other => panic!("expected WorkerFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn worker_env_toggles_never_leak_into_the_parent() {
    let before = std::env::var_os("TOKENIZERS_PARALLELISM");

    let runner = runner_with(worker_bin(), PathBuf::from("/nonexistent/model"));
    // Two sequential invocations; each worker sets the toggle in its own
    // process before failing on the model load.
    for _ in 0..2 {
        let _ = runner.named_entities("Some document text.").await;
        assert_eq!(
            std::env::var_os("TOKENIZERS_PARALLELISM"),
            before,
            "worker environment toggle leaked into the parent"
        );
    }
}

#[tokio::test]
async fn unstartable_worker_is_a_spawn_error() {
    let runner = runner_with(
        PathBuf::from("/definitely/not/an/executable"),
        PathBuf::from("/model"),
    );
    let error = runner.named_entities("text").await.expect_err("spawn error");
    assert!(matches!(error, NerError::Spawn { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn duplicate_entities_collapse_into_a_set() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stub = stub_worker(
        &dir,
        r#"cat >/dev/null
echo '{"status":"ok","entities":["Paris","Paris","France"]}'"#,
    );

    let runner = runner_with(stub, PathBuf::from("/model"));
    let entities = runner.named_entities("doc").await.expect("entities");
    let expected: BTreeSet<String> = ["France", "Paris"].iter().map(|s| s.to_string()).collect();
    assert_eq!(entities, expected);
}

#[cfg(unix)]
#[tokio::test]
async fn stuck_worker_is_killed_at_the_deadline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stub = stub_worker(&dir, "cat >/dev/null\nsleep 30");

    let runner = IsolatedNerRunner::with_worker(
        stub,
        PathBuf::from("/model"),
        Duration::from_millis(300),
    );
    let error = runner.named_entities("doc").await.expect_err("timeout");
    assert!(matches!(error, NerError::Timeout { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn garbage_reply_with_clean_exit_is_a_protocol_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stub = stub_worker(&dir, "cat >/dev/null\necho 'not json at all'");

    let runner = runner_with(stub, PathBuf::from("/model"));
    let error = runner.named_entities("doc").await.expect_err("protocol");
    assert!(matches!(error, NerError::Protocol(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn silent_crash_is_a_worker_failure_with_stderr_attached() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stub = stub_worker(&dir, "cat >/dev/null\necho 'model blew up' >&2\nexit 3");

    let runner = runner_with(stub, PathBuf::from("/model"));
    let error = runner.named_entities("doc").await.expect_err("failure");
    match error {
        NerError::WorkerFailed(message) => assert!(message.contains("model blew up")),
        other => panic!("expected WorkerFailed, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn concurrent_calls_get_independent_workers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stub = stub_worker(
        &dir,
        r#"cat >/dev/null
echo '{"status":"ok","entities":["Oslo"]}'"#,
    );

    let runner_a = runner_with(stub.clone(), PathBuf::from("/model"));
    let runner_b = runner_with(stub, PathBuf::from("/model"));
    let (a, b) = tokio::join!(
        runner_a.named_entities("first doc"),
        runner_b.named_entities("second doc")
    );
    assert_eq!(a.expect("a").len(), 1);
    assert_eq!(b.expect("b").len(), 1);
}
