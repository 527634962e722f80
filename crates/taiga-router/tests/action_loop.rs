//! End-to-end turns: raw model reply in, rendered feedback out.

use std::sync::Arc;

use async_trait::async_trait;

use taiga_core::context::ActionContext;
use taiga_core::error::CapabilityError;
use taiga_core::types::{ActionKind, ActionStatus, CommandOutcome};
use taiga_protocol::{decode_lenient, parse_text};
use taiga_router::capability::{CapResult, CommandExecutor};
use taiga_router::feedback;
use taiga_router::fs::LocalFileManager;
use taiga_router::{ActionRouter, CancelToken};

struct EchoCommands;

#[async_trait]
impl CommandExecutor for EchoCommands {
    async fn run(&self, command: &str) -> CapResult<CommandOutcome> {
        if !command.starts_with("echo ") {
            return Err(CapabilityError::op(format!("unknown command: {command}")));
        }
        Ok(CommandOutcome {
            command_id: "cmd-1".into(),
            exit_code: 0,
            stdout: format!("{}\n", &command[5..]),
            stderr: String::new(),
            timed_out: false,
        })
    }
}

fn actx() -> ActionContext {
    ActionContext::new("agent-1", "bead-1")
}

#[tokio::test]
async fn think_tagged_reply_executes_to_completion() {
    let reply = "<think>reasoning</think>{\"actions\":[{\"type\":\"done\"}]}";
    let envelope = decode_lenient(reply.as_bytes()).unwrap();
    assert!(envelope.notes.is_none());

    let router = ActionRouter::new();
    let results = router
        .execute(&CancelToken::new(), &envelope, &actx())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ActionStatus::Executed);
    assert!(results[0].message.to_lowercase().contains("complete"));
}

#[tokio::test]
async fn run_command_turn_feeds_output_back_to_the_model() {
    let reply = r#"{"actions":[{"type":"run_command","command":"echo hi"}]}"#;
    let envelope = decode_lenient(reply.as_bytes()).unwrap();

    let mut router = ActionRouter::new();
    router.commands = Some(Arc::new(EchoCommands));
    let results = router
        .execute(&CancelToken::new(), &envelope, &actx())
        .await;

    assert_eq!(results[0].status, ActionStatus::Executed);
    assert_eq!(results[0].metadata["command_id"], "cmd-1");
    assert_eq!(results[0].metadata["exit_code"], 0);

    let rendered = feedback::render(&results);
    assert!(rendered.contains("hi"));
}

#[tokio::test]
async fn text_form_edit_runs_against_a_real_project_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.go"), "func foo() {\n\treturn true\n}").unwrap();

    let mut router = ActionRouter::new();
    router.files = Some(Arc::new(LocalFileManager::new(dir.path())));

    let reply = "ACTION: EDIT main.go\n<<<\nfunc foo() {\n  return true\n}\n>>>\n<<<\nfunc foo() {\n  return false\n}\n>>>\n";
    let envelope = parse_text(reply).unwrap();
    let results = router
        .execute(&CancelToken::new(), &envelope, &actx())
        .await;

    assert_eq!(results[0].status, ActionStatus::Executed);
    assert_eq!(results[0].metadata["match_strategy"], "indent-flexible");
    let content = std::fs::read_to_string(dir.path().join("main.go")).unwrap();
    assert!(content.contains("return false"));

    // The identical edit no longer applies; the feedback coaches a re-read.
    let results = router
        .execute(&CancelToken::new(), &envelope, &actx())
        .await;
    assert_eq!(results[0].status, ActionStatus::Error);
    assert!(results[0].message.starts_with("OLD text not found"));
    let rendered = feedback::render(&results);
    assert!(rendered.contains("READ the file first"));
}

#[tokio::test]
async fn multi_action_turn_preserves_order_across_mixed_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();

    let mut router = ActionRouter::new();
    router.files = Some(Arc::new(LocalFileManager::new(dir.path())));

    let reply = r#"{
        "actions": [
            {"type": "read_file", "path": "a.txt"},
            {"type": "read_file", "path": "missing.txt"},
            {"type": "write_file", "path": "b.txt", "content": "beta\n"},
            {"type": "done"}
        ],
        "notes": "one miss expected"
    }"#;
    let envelope = decode_lenient(reply.as_bytes()).unwrap();
    let results = router
        .execute(&CancelToken::new(), &envelope, &actx())
        .await;

    let kinds: Vec<ActionKind> = results.iter().map(|r| r.action_type).collect();
    assert_eq!(
        kinds,
        vec![
            ActionKind::ReadFile,
            ActionKind::ReadFile,
            ActionKind::WriteFile,
            ActionKind::Done
        ]
    );
    let statuses: Vec<ActionStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ActionStatus::Executed,
            ActionStatus::Error,
            ActionStatus::Executed,
            ActionStatus::Executed
        ]
    );
    assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "beta\n");
}
