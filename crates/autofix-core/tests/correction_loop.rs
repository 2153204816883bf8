//! Correction loop behaviour through the public operations

use async_trait::async_trait;
use autofix_core::{AutofixError, CodeAssistant, LoopStatus, RetryBudget};
use autofix_sandbox::{ExecutionOutput, SandboxError, SandboxExecutor};
use autofix_store::HistorySearch;
use autofix_synthesis::ModelError;
use autofix_test_utils::{
    filename, project, test_config, Harness, ScriptedModel, ScriptedRun, ScriptedSandbox,
};
use mockall::mock;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Sandbox {}

    #[async_trait]
    impl SandboxExecutor for Sandbox {
        async fn execute(&self, artifact: &Path) -> Result<ExecutionOutput, SandboxError>;
        fn timeout(&self) -> Duration;
    }
}

/// Fails every run after a pause, giving concurrent requests room to interleave
#[derive(Debug)]
struct SlowFailingSandbox;

#[async_trait]
impl SandboxExecutor for SlowFailingSandbox {
    async fn execute(&self, _artifact: &Path) -> Result<ExecutionOutput, SandboxError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(ExecutionOutput::new("", "still broken", 1))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }
}

fn slow_assistant(dir: &Path) -> CodeAssistant {
    CodeAssistant::builder(test_config(dir))
        .with_model(ScriptedModel::always("print(2)"))
        .with_sandbox(Arc::new(SlowFailingSandbox))
        .build()
        .unwrap()
}

#[tokio::test]
async fn passing_program_runs_once_and_records_once() {
    let h = Harness::new(
        ScriptedModel::always("print('ok')"),
        ScriptedSandbox::always(ScriptedRun::ok("ok\n")),
    );
    h.seed_artifact("print('ok')");

    let response = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("print ok"), None)
        .await
        .unwrap();

    assert_eq!(response.status, LoopStatus::Succeeded);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.stdout, "ok\n");
    assert_eq!(response.message, "Code ran successfully; no fix was needed");
    assert_eq!(h.sandbox.invocations(), 1);
    assert_eq!(h.model.calls(), 0);

    let history = h
        .assistant
        .search_history(&h.project, &HistorySearch::new())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].exit_status, Some(0));
}

#[tokio::test]
async fn always_failing_program_exhausts_default_budget() {
    let h = Harness::new(
        ScriptedModel::sequence(&["x = 1 / 0  # v2", "x = 1 / 0  # v3"]),
        ScriptedSandbox::new(vec![
            ScriptedRun::fail("ZeroDivisionError: first"),
            ScriptedRun::fail("ZeroDivisionError: second"),
            ScriptedRun::fail("ZeroDivisionError: third"),
        ]),
    );
    h.seed_artifact("x = 1 / 0");

    let response = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("divide"), None)
        .await
        .unwrap();

    assert_eq!(response.status, LoopStatus::Exhausted);
    assert_eq!(response.attempts, 3);
    assert_eq!(response.stderr, "ZeroDivisionError: third");
    assert_eq!(response.exit_status, Some(1));
    assert_eq!(response.message, "Could not fix the code after 3 attempt(s)");

    assert_eq!(h.sandbox.invocations(), 3);
    // No repair after the final attempt
    assert_eq!(h.model.calls(), 2);
    assert_eq!(
        h.sandbox.executed_sources(),
        vec!["x = 1 / 0", "x = 1 / 0  # v2", "x = 1 / 0  # v3"]
    );

    let history = h
        .assistant
        .search_history(&h.project, &HistorySearch::new())
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    let attempts: Vec<u32> = history.iter().map(|a| a.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(history.iter().all(|a| a.request_id == response.request_id));
}

#[tokio::test]
async fn repair_receives_failing_source_and_trace() {
    let h = Harness::new(
        ScriptedModel::always("print(1)"),
        ScriptedSandbox::new(vec![
            ScriptedRun::fail("NameError: name 'prnt' is not defined"),
            ScriptedRun::ok("1\n"),
        ]),
    );
    h.seed_artifact("prnt(1)");

    let response = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("print one"), None)
        .await
        .unwrap();

    assert_eq!(response.status, LoopStatus::Succeeded);
    assert_eq!(response.attempts, 2);
    assert_eq!(response.message, "Code fixed after 2 attempts");

    let requests = h.model.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].user.contains("prnt(1)"));
    assert!(requests[0].user.contains("NameError"));

    assert_eq!(
        h.assistant.get_code(&h.project, &h.filename).await.unwrap(),
        "print(1)"
    );
}

#[tokio::test]
async fn explicit_budget_overrides_config() {
    let h = Harness::new(
        ScriptedModel::always("raise SystemExit(2)"),
        ScriptedSandbox::always(ScriptedRun::fail("boom")),
    );
    h.seed_artifact("raise SystemExit(2)");

    let response = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("exit"), Some(RetryBudget::new(5)))
        .await
        .unwrap();

    assert_eq!(response.attempts, 5);
    assert_eq!(h.sandbox.invocations(), 5);
}

#[tokio::test]
async fn timeout_counts_as_failed_attempt() {
    let h = Harness::new(
        ScriptedModel::always("print('done')"),
        ScriptedSandbox::new(vec![ScriptedRun::Timeout, ScriptedRun::ok("done\n")]),
    );
    h.seed_artifact("while True: pass");

    let response = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("terminate"), None)
        .await
        .unwrap();

    assert_eq!(response.status, LoopStatus::Succeeded);
    assert_eq!(response.attempts, 2);

    let history = h
        .assistant
        .search_history(&h.project, &HistorySearch::new())
        .await
        .unwrap();
    assert_eq!(history[0].exit_status, None);
    assert!(history[0].stderr.contains("exceeded"));
    assert_eq!(history[1].exit_status, Some(0));
}

#[tokio::test]
async fn missing_instruction_reuses_latest_for_file() {
    let h = Harness::new(
        ScriptedModel::always("print(2)"),
        ScriptedSandbox::new(vec![
            ScriptedRun::fail("first run"),
            ScriptedRun::fail("second run"),
            ScriptedRun::ok("2\n"),
        ]),
    );

    h.assistant
        .generate_code(&h.project, &h.filename, "print two", None)
        .await
        .unwrap();
    let response = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, None, None)
        .await
        .unwrap();
    assert_eq!(response.status, LoopStatus::Succeeded);

    let latest = h.assistant.latest_history(&h.project).await.unwrap().unwrap();
    assert_eq!(latest.instruction, "print two");
}

#[tokio::test]
async fn synthesis_failure_mid_loop_aborts() {
    let h = Harness::new(
        ScriptedModel::failing(ModelError::RateLimited("quota".into())),
        ScriptedSandbox::always(ScriptedRun::fail("broken")),
    );
    h.seed_artifact("broken(");

    let err = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("fix"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AutofixError::SynthesisUnavailable { .. }));
    assert!(err.is_infrastructure());
    assert_eq!(h.sandbox.invocations(), 1);
    assert_eq!(
        h.assistant.get_code(&h.project, &h.filename).await.unwrap(),
        "broken("
    );
}

#[tokio::test]
async fn spawn_failure_is_sandbox_unavailable() {
    let h = Harness::new(
        ScriptedModel::always("print(1)"),
        ScriptedSandbox::always(ScriptedRun::SpawnFailure),
    );
    h.seed_artifact("print(1)");

    let err = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("print"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AutofixError::SandboxUnavailable { .. }));
}

#[tokio::test]
async fn mocked_sandbox_sees_the_live_artifact_path() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join("workspaces").join("demo").join("main.py");

    let mut sandbox = MockSandbox::new();
    let expected_path = expected.clone();
    sandbox
        .expect_execute()
        .withf(move |path: &Path| path == expected_path.as_path())
        .times(1)
        .returning(|_| Ok(ExecutionOutput::new("hi\n", "", 0)));
    sandbox.expect_timeout().return_const(Duration::from_secs(10));

    let config = autofix_test_utils::test_config(dir.path());
    let assistant = autofix_core::CodeAssistant::builder(config)
        .with_model(ScriptedModel::always("print('hi')"))
        .with_sandbox(Arc::new(sandbox))
        .build()
        .unwrap();

    let project = autofix_test_utils::project("demo");
    let filename = autofix_test_utils::filename("main.py");
    let response = assistant
        .generate_code(&project, &filename, "say hi", None)
        .await
        .unwrap();

    assert_eq!(response.file_path, expected);
    assert_eq!(response.stdout, "hi\n");
}

#[tokio::test]
async fn identical_repair_is_rerun_without_rewrite() {
    let h = Harness::build(
        ScriptedModel::always("print(0)"),
        ScriptedSandbox::always(ScriptedRun::fail("boom")),
        |config| config.with_snapshot_repairs(true),
        None,
        None,
    );
    h.seed_artifact("print(0)");

    let response = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("print zero"), None)
        .await
        .unwrap();

    assert_eq!(response.status, LoopStatus::Exhausted);
    assert_eq!(response.attempts, 3);
    assert_eq!(h.model.calls(), 2);
    assert_eq!(h.sandbox.executed_sources(), vec!["print(0)"; 3]);
    assert!(h.assistant.list_versions(&h.project).await.unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_repairs_adds_a_version_per_repair() {
    let h = Harness::build(
        ScriptedModel::sequence(&["print(1)", "print(2)"]),
        ScriptedSandbox::always(ScriptedRun::fail("boom")),
        |config| config.with_snapshot_repairs(true),
        None,
        None,
    );
    h.seed_artifact("print(0)");

    let response = h
        .assistant
        .auto_fix_code(&h.project, &h.filename, Some("count"), Some(RetryBudget::new(3)))
        .await
        .unwrap();
    assert_eq!(response.status, LoopStatus::Exhausted);

    // The seeded source is never snapshotted; each of the two repairs is
    let versions = h.assistant.list_versions(&h.project).await.unwrap();
    assert_eq!(versions.len(), 2);
    let newest = versions.last().unwrap().key.to_string();
    let restored = h
        .assistant
        .rollback_to_version(&h.project, &newest, None)
        .await
        .unwrap();
    assert_eq!(restored.filename, h.filename);
    assert_eq!(
        h.assistant.get_code(&h.project, &h.filename).await.unwrap(),
        "print(2)"
    );
}

#[tokio::test]
async fn concurrent_fixes_on_one_artifact_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = slow_assistant(dir.path());
    let (project, main) = (project("demo"), filename("main.py"));
    let path = assistant.workspace().path(&project, &main);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "print(1)").unwrap();

    let budget = Some(RetryBudget::new(3));
    let (first, second) = tokio::join!(
        assistant.auto_fix_code(&project, &main, Some("first"), budget),
        assistant.auto_fix_code(&project, &main, Some("second"), budget),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_ne!(first.request_id, second.request_id);

    let history = assistant
        .search_history(&project, &HistorySearch::new())
        .await
        .unwrap();
    assert_eq!(history.len(), 6);
    let attempts: Vec<u32> = history.iter().map(|a| a.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3, 1, 2, 3]);
    let (earlier, later) = history.split_at(3);
    assert!(earlier.iter().all(|a| a.request_id == earlier[0].request_id));
    assert!(later.iter().all(|a| a.request_id == later[0].request_id));
    assert_ne!(earlier[0].request_id, later[0].request_id);
}

#[tokio::test]
async fn queued_fix_reuses_instruction_of_generate_ahead_of_it() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = slow_assistant(dir.path());
    let (project, main) = (project("demo"), filename("main.py"));

    let (generated, fixed) = tokio::join!(
        assistant.generate_code(&project, &main, "print two", Some(RetryBudget::new(1))),
        assistant.auto_fix_code(&project, &main, None, Some(RetryBudget::new(1))),
    );
    let (generated, fixed) = (generated.unwrap(), fixed.unwrap());

    let history = assistant
        .search_history(&project, &HistorySearch::new())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].request_id, generated.request_id);
    assert_eq!(history[1].request_id, fixed.request_id);
    assert_eq!(history[1].instruction, "print two");
}
