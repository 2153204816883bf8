//! Real interpreter round trip; skipped when `python3` is not installed

use autofix_core::{CodeAssistant, LoopStatus, RetryBudget};
use autofix_sandbox::{ProcessSandbox, SandboxConfig};
use autofix_test_utils::{filename, project, test_config, ScriptedModel};
use std::sync::Arc;

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn division_by_zero_is_generated_then_fixed() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let sandbox = ProcessSandbox::from_config(&SandboxConfig::new().with_timeout_secs(10));
    let model = ScriptedModel::sequence(&["print(1/0)", "```python\nprint(1/1)\n```"]);
    let assistant = CodeAssistant::builder(test_config(dir.path()))
        .with_model(model.clone())
        .with_sandbox(Arc::new(sandbox))
        .build()
        .unwrap();

    let project = project("scenario");
    let main = filename("main.py");

    let generated = assistant
        .generate_code(&project, &main, "print(1/0)", None)
        .await
        .unwrap();
    assert_eq!(generated.status, LoopStatus::Exhausted);
    assert!(generated.stderr.contains("ZeroDivisionError"));

    let ran = assistant.run_code(&project, &main).await.unwrap();
    assert_ne!(ran.exit_status, 0);

    let fixed = assistant
        .auto_fix_code(&project, &main, None, None)
        .await
        .unwrap();
    assert_eq!(fixed.status, LoopStatus::Succeeded);
    assert_eq!(fixed.attempts, 2);
    assert_eq!(fixed.stdout.trim(), "1.0");
    assert_eq!(assistant.get_code(&project, &main).await.unwrap(), "print(1/1)");

    let repair = &model.requests()[1];
    assert!(repair.user.contains("ZeroDivisionError"));
}

#[tokio::test]
async fn unrepairable_division_by_zero_exhausts_three_attempts() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::always("print(1/0)");
    let assistant = CodeAssistant::builder(test_config(dir.path()))
        .with_model(model.clone())
        .with_sandbox(Arc::new(ProcessSandbox::new("python3")))
        .build()
        .unwrap();

    let project = project("scenario");
    let main = filename("main.py");
    let response = assistant
        .generate_code(&project, &main, "print(1/0)", Some(RetryBudget::new(3)))
        .await
        .unwrap();

    assert_eq!(response.status, LoopStatus::Exhausted);
    assert_eq!(response.attempts, 3);
    assert!(response.stderr.contains("ZeroDivisionError"));
    // One synthesis plus two repairs
    assert_eq!(model.calls(), 3);
}

#[tokio::test]
async fn hung_program_times_out() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let sandbox = ProcessSandbox::from_config(&SandboxConfig::new().with_timeout_secs(1));
    let assistant = CodeAssistant::builder(test_config(dir.path()))
        .with_model(ScriptedModel::always("import time\ntime.sleep(30)"))
        .with_sandbox(Arc::new(sandbox))
        .build()
        .unwrap();

    let project = project("scenario");
    let main = filename("main.py");
    let generated = assistant
        .generate_code(&project, &main, "sleep", None)
        .await
        .unwrap();

    assert_eq!(generated.status, LoopStatus::Exhausted);
    assert_eq!(generated.attempts, 1);
    let latest = assistant.latest_history(&project).await.unwrap().unwrap();
    assert_eq!(latest.exit_status, None);
}
