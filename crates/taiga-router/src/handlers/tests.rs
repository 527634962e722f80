//! Router-level tests over mock capabilities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use taiga_core::context::ActionContext;
use taiga_core::error::CapabilityError;
use taiga_core::types::{
    Action, ActionEnvelope, ActionKind, ActionResult, ActionStatus, AgentMessage, BeadType,
    CommandOutcome, NewBead, SearchMatch, TreeEntry, TreeEntryType,
};

use crate::capability::{
    ActionLogger, BeadCreator, CapResult, CommandExecutor, FileManager, MessageBus, PatchOutcome,
    PrReviewer, ReviewEvent,
};
use crate::cancel::CancelToken;
use crate::router::ActionRouter;

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockFiles {
    store: Mutex<HashMap<String, String>>,
}

impl MockFiles {
    fn with(path: &str, content: &str) -> Arc<Self> {
        let files = Self::default();
        files
            .store
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Arc::new(files)
    }

    fn get(&self, path: &str) -> Option<String> {
        self.store.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl FileManager for MockFiles {
    async fn read(&self, path: &str) -> CapResult<String> {
        self.get(path)
            .ok_or_else(|| CapabilityError::op(format!("no such file or directory: {path}")))
    }

    async fn write(&self, path: &str, content: &str) -> CapResult<usize> {
        self.store
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(content.len())
    }

    async fn delete(&self, path: &str) -> CapResult<()> {
        self.store
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| CapabilityError::op(format!("no such file or directory: {path}")))
    }

    async fn rename(&self, from: &str, to: &str) -> CapResult<()> {
        let mut store = self.store.lock().unwrap();
        let content = store
            .remove(from)
            .ok_or_else(|| CapabilityError::op(format!("no such file or directory: {from}")))?;
        store.insert(to.to_string(), content);
        Ok(())
    }

    async fn list_tree(&self, _path: Option<&str>, _depth: u32) -> CapResult<Vec<TreeEntry>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .keys()
            .map(|path| TreeEntry {
                path: path.clone(),
                entry_type: TreeEntryType::File,
                depth: 1,
            })
            .collect())
    }

    async fn search(&self, query: &str, _path: Option<&str>) -> CapResult<Vec<SearchMatch>> {
        let store = self.store.lock().unwrap();
        let mut matches = Vec::new();
        for (path, content) in store.iter() {
            for (i, line) in content.lines().enumerate() {
                if line.contains(query) {
                    matches.push(SearchMatch {
                        path: path.clone(),
                        line: i as u32 + 1,
                        text: line.to_string(),
                    });
                }
            }
        }
        Ok(matches)
    }

    async fn apply_patch(&self, _patch: &str) -> CapResult<PatchOutcome> {
        Err(CapabilityError::op("patching unsupported in mock"))
    }
}

struct MockCommands;

#[async_trait]
impl CommandExecutor for MockCommands {
    async fn run(&self, _command: &str) -> CapResult<CommandOutcome> {
        Ok(CommandOutcome {
            command_id: "cmd-1".into(),
            exit_code: 0,
            stdout: "hi\n".into(),
            stderr: String::new(),
            timed_out: false,
        })
    }
}

#[derive(Default)]
struct MockBeadCreator {
    beads: Mutex<Vec<NewBead>>,
}

#[async_trait]
impl BeadCreator for MockBeadCreator {
    async fn create_bead(&self, bead: NewBead) -> CapResult<String> {
        let mut beads = self.beads.lock().unwrap();
        beads.push(bead);
        Ok(format!("bead-{}", beads.len()))
    }
}

struct MockBus;

#[async_trait]
impl MessageBus for MockBus {
    async fn send(&self, _message: AgentMessage) -> CapResult<String> {
        Ok("msg-7".into())
    }

    async fn resolve_role(&self, role: &str) -> CapResult<Option<String>> {
        Ok(match role {
            "qa_reviewer" => Some("agent-qa".into()),
            _ => None,
        })
    }
}

struct MockPr;

#[async_trait]
impl PrReviewer for MockPr {
    async fn fetch_pr(&self, pr_number: u64) -> CapResult<Value> {
        Ok(json!({"number": pr_number, "title": "stub"}))
    }

    async fn review_code(&self, _pr_number: u64) -> CapResult<Value> {
        Ok(json!({"files": 0}))
    }

    async fn add_comment(
        &self,
        _pr_number: u64,
        _body: &str,
        position: Option<(String, u32)>,
    ) -> CapResult<Value> {
        Ok(json!({"inline": position.is_some()}))
    }

    async fn submit_review(
        &self,
        _pr_number: u64,
        event: ReviewEvent,
        _body: Option<&str>,
    ) -> CapResult<Value> {
        Ok(json!({"event": format!("{event:?}")}))
    }

    async fn request_review(&self, _pr_number: u64, reviewers: &[String]) -> CapResult<Value> {
        Ok(json!({"requested": reviewers.len()}))
    }
}

#[derive(Default)]
struct CountingLogger {
    calls: AtomicUsize,
}

impl ActionLogger for CountingLogger {
    fn log(&self, _actx: &ActionContext, _action: &Action, _result: &ActionResult) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

fn actx() -> ActionContext {
    ActionContext::new("agent-1", "bead-1")
}

async fn run_one(router: &ActionRouter, action: Action) -> ActionResult {
    let results = router
        .execute(
            &CancelToken::new(),
            &ActionEnvelope::single(action),
            &actx(),
        )
        .await;
    assert_eq!(results.len(), 1);
    results.into_iter().next().unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn done_on_an_empty_router_executes() {
    let router = ActionRouter::new();
    let result = run_one(&router, Action::done()).await;
    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.action_type, ActionKind::Done);
    assert!(result.message.to_lowercase().contains("complete"));
}

#[tokio::test]
async fn results_preserve_order_and_action_types() {
    let router = ActionRouter::new();
    let envelope = ActionEnvelope::new(vec![
        Action::read_file("a.rs"),
        Action::done(),
        Action::run_command("echo x"),
    ]);
    let results = router.execute(&CancelToken::new(), &envelope, &actx()).await;

    assert_eq!(results.len(), envelope.actions.len());
    for (result, action) in results.iter().zip(envelope.actions.iter()) {
        assert_eq!(result.action_type, action.kind());
    }
    assert_eq!(results[0].status, ActionStatus::Error);
    assert_eq!(results[1].status, ActionStatus::Executed);
    assert_eq!(results[2].status, ActionStatus::Error);
}

#[tokio::test]
async fn run_command_reports_stable_metadata() {
    let mut router = ActionRouter::new();
    router.commands = Some(Arc::new(MockCommands));
    let result = run_one(&router, Action::run_command("echo hi")).await;

    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.metadata["command_id"], "cmd-1");
    assert_eq!(result.metadata["exit_code"], 0);
    assert_eq!(result.metadata["stdout"], "hi\n");
}

#[tokio::test]
async fn edit_code_walks_the_ladder_and_reports_strategy() {
    let files = MockFiles::with("main.go", "func foo() {\n\treturn true\n}");
    let mut router = ActionRouter::new();
    router.files = Some(files.clone());

    let edit = Action::edit_code(
        "main.go",
        "func foo() {\n  return true\n}",
        "func foo() {\n  return false\n}",
    );
    let result = run_one(&router, edit.clone()).await;
    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.metadata["match_strategy"], "indent-flexible");
    assert!(files.get("main.go").unwrap().contains("return false"));

    // The same edit again no longer matches anything.
    let result = run_one(&router, edit).await;
    assert_eq!(result.status, ActionStatus::Error);
    assert!(result.message.starts_with("OLD text not found"));
    assert!(result.message.contains("main.go"));
}

#[tokio::test]
async fn edit_code_identity_is_idempotent() {
    let files = MockFiles::with("lib.rs", "fn f() -> u8 { 1 }\n");
    let mut router = ActionRouter::new();
    router.files = Some(files.clone());

    let edit = Action::edit_code("lib.rs", "fn f() -> u8 { 1 }", "fn f() -> u8 { 1 }");
    let result = run_one(&router, edit).await;
    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(files.get("lib.rs").unwrap(), "fn f() -> u8 { 1 }\n");
}

#[tokio::test]
async fn edit_code_replaces_only_the_first_occurrence() {
    let files = MockFiles::with("x.txt", "one\ntwo\none\n");
    let mut router = ActionRouter::new();
    router.files = Some(files.clone());

    run_one(&router, Action::edit_code("x.txt", "one", "ONE")).await;
    assert_eq!(files.get("x.txt").unwrap(), "ONE\ntwo\none\n");
}

#[tokio::test]
async fn write_then_read_round_trips() {
    let files: Arc<MockFiles> = Arc::new(MockFiles::default());
    let mut router = ActionRouter::new();
    router.files = Some(files);

    let content = "fn main() {}\n";
    let write = run_one(&router, Action::write_file("src/main.rs", content)).await;
    assert_eq!(write.metadata["bytes_written"], content.len());

    let read = run_one(&router, Action::read_file("src/main.rs")).await;
    assert_eq!(read.metadata["content"], content);
    assert_eq!(read.metadata["size"], content.len());
}

#[tokio::test]
async fn auto_file_parse_failure_mints_a_bug_bead() {
    let creator = Arc::new(MockBeadCreator::default());
    let mut router = ActionRouter::new();
    router.bead_creator = Some(creator.clone());

    let result = router
        .auto_file_parse_failure("unexpected token", "not json", &actx())
        .await;

    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.action_type, ActionKind::CreateBead);
    assert!(result.metadata.contains_key("bead_id"));

    let beads = creator.beads.lock().unwrap();
    assert_eq!(beads.len(), 1);
    assert_eq!(beads[0].bead_type, BeadType::Bug);
    assert!(beads[0].description.contains("unexpected token"));
    assert!(beads[0].description.contains("not json"));
}

#[tokio::test]
async fn auto_file_parse_failure_without_creator_is_an_error() {
    let router = ActionRouter::new();
    let result = router
        .auto_file_parse_failure("unexpected token", "not json", &actx())
        .await;
    assert_eq!(result.status, ActionStatus::Error);
}

#[tokio::test]
async fn missing_mutating_capability_falls_back_to_a_bead() {
    let creator = Arc::new(MockBeadCreator::default());
    let mut router = ActionRouter::new();
    router.bead_creator = Some(creator.clone());

    let result = run_one(&router, Action::write_file("src/new.rs", "x")).await;
    // The action type stays write_file; the work survives as a bead.
    assert_eq!(result.action_type, ActionKind::WriteFile);
    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.metadata["fallback"], "create_bead");
    assert!(result.metadata.contains_key("bead_id"));

    let beads = creator.beads.lock().unwrap();
    assert!(beads[0].description.contains("write_file"));
}

#[tokio::test]
async fn missing_mutating_capability_without_creator_is_an_error() {
    let router = ActionRouter::new();
    let result = run_one(&router, Action::write_file("src/new.rs", "x")).await;
    assert_eq!(result.status, ActionStatus::Error);
    assert!(result.message.contains("FileManager"));
}

#[tokio::test]
async fn missing_pr_reviewer_falls_back_to_a_bead() {
    let creator = Arc::new(MockBeadCreator::default());
    let mut router = ActionRouter::new();
    router.bead_creator = Some(creator.clone());

    let mut action = Action::of(ActionKind::SubmitReview);
    action.pr_number = Some(12);
    action.review_event = Some("APPROVE".into());
    action.review_body = Some("ship it".into());

    let result = run_one(&router, action).await;
    assert_eq!(result.action_type, ActionKind::SubmitReview);
    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.metadata["fallback"], "create_bead");

    // The verdict and body survive inside the filed bead.
    let beads = creator.beads.lock().unwrap();
    assert_eq!(beads.len(), 1);
    assert!(beads[0].description.contains("APPROVE"));
    assert!(beads[0].description.contains("ship it"));
}

#[tokio::test]
async fn missing_message_bus_falls_back_to_a_bead() {
    let creator = Arc::new(MockBeadCreator::default());
    let mut router = ActionRouter::new();
    router.bead_creator = Some(creator.clone());

    let mut action = Action::of(ActionKind::SendAgentMessage);
    action.message_type = Some("question".into());
    action.message = Some("are the fixtures committed?".into());
    action.to_role = Some("qa_reviewer".into());

    let result = run_one(&router, action).await;
    assert_eq!(result.action_type, ActionKind::SendAgentMessage);
    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.metadata["fallback"], "create_bead");

    let beads = creator.beads.lock().unwrap();
    assert!(beads[0].description.contains("are the fixtures committed?"));
}

#[tokio::test]
async fn missing_query_capability_is_a_plain_error() {
    let creator = Arc::new(MockBeadCreator::default());
    let mut router = ActionRouter::new();
    router.bead_creator = Some(creator.clone());

    let result = run_one(&router, Action::read_file("a.rs")).await;
    assert_eq!(result.status, ActionStatus::Error);
    // Queries never fall back to beads.
    assert!(creator.beads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn workflow_actions_without_operator_are_mcp_required() {
    let router = ActionRouter::new();
    for kind in [
        ActionKind::StartDev,
        ActionKind::WhatsNext,
        ActionKind::ConductReview,
    ] {
        let result = run_one(&router, Action::of(kind)).await;
        assert_eq!(result.status, ActionStatus::McpRequired, "{kind}");
    }
    // Approve/reject are not phase-driving: plain errors instead.
    let result = run_one(&router, Action::of(ActionKind::ApproveBead)).await;
    assert_eq!(result.status, ActionStatus::Error);
}

#[tokio::test]
async fn cancelled_token_returns_partial_results() {
    let router = ActionRouter::new();
    let cancel = CancelToken::new();
    cancel.cancel();
    let envelope = ActionEnvelope::new(vec![Action::done(), Action::done()]);
    let results = router.execute(&cancel, &envelope, &actx()).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn logger_sees_every_result() {
    let logger = Arc::new(CountingLogger::default());
    let mut router = ActionRouter::new();
    router.logger = Some(logger.clone());

    let envelope = ActionEnvelope::new(vec![Action::done(), Action::read_file("a.rs")]);
    router.execute(&CancelToken::new(), &envelope, &actx()).await;
    assert_eq!(logger.calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn send_agent_message_resolves_roles() {
    let mut router = ActionRouter::new();
    router.message_bus = Some(Arc::new(MockBus));

    let mut action = Action::of(ActionKind::SendAgentMessage);
    action.message_type = Some("question".into());
    action.message = Some("is the fixture committed?".into());
    action.to_role = Some("qa_reviewer".into());

    let result = run_one(&router, action).await;
    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.metadata["message_id"], "msg-7");
    assert_eq!(result.metadata["to_agent_id"], "agent-qa");
}

#[tokio::test]
async fn send_agent_message_rejects_bad_type_and_unknown_role() {
    let mut router = ActionRouter::new();
    router.message_bus = Some(Arc::new(MockBus));

    let mut action = Action::of(ActionKind::SendAgentMessage);
    action.message_type = Some("shout".into());
    action.message = Some("hello".into());
    action.to_role = Some("qa_reviewer".into());
    let result = run_one(&router, action.clone()).await;
    assert_eq!(result.status, ActionStatus::Error);
    assert!(result.message.contains("message_type"));

    action.message_type = Some("question".into());
    action.to_role = Some("nonexistent_role".into());
    let result = run_one(&router, action).await;
    assert_eq!(result.status, ActionStatus::Error);
    assert!(result.message.contains("nonexistent_role"));
}

#[tokio::test]
async fn submit_review_validates_the_event() {
    let mut router = ActionRouter::new();
    router.pr = Some(Arc::new(MockPr));

    let mut action = Action::of(ActionKind::SubmitReview);
    action.pr_number = Some(12);
    action.review_event = Some("MAYBE".into());
    let result = run_one(&router, action.clone()).await;
    assert_eq!(result.status, ActionStatus::Error);
    assert!(result.message.contains("review_event"));

    action.review_event = Some("APPROVE".into());
    let result = run_one(&router, action).await;
    assert_eq!(result.status, ActionStatus::Executed);
    assert_eq!(result.metadata["review_event"], "APPROVE");
}

#[tokio::test]
async fn add_pr_comment_dispatches_inline_vs_general() {
    let mut router = ActionRouter::new();
    router.pr = Some(Arc::new(MockPr));

    let mut action = Action::of(ActionKind::AddPrComment);
    action.pr_number = Some(5);
    action.comment_body = Some("nit".into());
    let result = run_one(&router, action.clone()).await;
    assert_eq!(result.metadata["comment_kind"], "general");

    action.comment_path = Some("src/lib.rs".into());
    action.comment_line = Some(14);
    let result = run_one(&router, action).await;
    assert_eq!(result.metadata["comment_kind"], "inline");
}

#[tokio::test]
async fn create_bead_uses_router_defaults() {
    let creator = Arc::new(MockBeadCreator::default());
    let mut router = ActionRouter::new();
    router.bead_creator = Some(creator.clone());
    router.default_bead_type = BeadType::Task;
    router.default_p0 = true;

    let result = run_one(&router, Action::create_bead("Fix flaky test", "details")).await;
    assert_eq!(result.status, ActionStatus::Executed);

    let beads = creator.beads.lock().unwrap();
    assert_eq!(beads[0].bead_type, BeadType::Task);
    assert_eq!(beads[0].priority.to_string(), "P0");
}

#[tokio::test]
async fn search_text_reports_matches_and_count() {
    let files = MockFiles::with("a.rs", "alpha\nbeta\n");
    let mut router = ActionRouter::new();
    router.files = Some(files);

    let mut action = Action::of(ActionKind::SearchText);
    action.query = Some("beta".into());
    let result = run_one(&router, action).await;
    assert_eq!(result.metadata["count"], 1);
    assert_eq!(result.metadata["matches"][0]["line"], 2);
}

#[tokio::test]
async fn capability_monotonicity_only_affects_the_missing_handler() {
    // With files wired, read succeeds; removing commands must not change
    // the read result, only the command one.
    let files = MockFiles::with("a.rs", "x");
    let mut router = ActionRouter::new();
    router.files = Some(files);
    router.commands = Some(Arc::new(MockCommands));

    let envelope = ActionEnvelope::new(vec![
        Action::read_file("a.rs"),
        Action::run_command("echo hi"),
    ]);
    let full: Vec<ActionStatus> = router
        .execute(&CancelToken::new(), &envelope, &actx())
        .await
        .iter()
        .map(|r| r.status)
        .collect();
    assert_eq!(full, vec![ActionStatus::Executed, ActionStatus::Executed]);

    router.commands = None;
    let degraded: Vec<ActionStatus> = router
        .execute(&CancelToken::new(), &envelope, &actx())
        .await
        .iter()
        .map(|r| r.status)
        .collect();
    assert_eq!(degraded, vec![ActionStatus::Executed, ActionStatus::Error]);
}
