//! Result rendering for the next model turn.
//!
//! Each result becomes one markdown block: a short outcome line, the
//! machine detail the model actually needs (file content, command output,
//! matches), and a remediation tip when the failure is one the loop knows
//! how to coach the model through.

use serde_json::Value;

use taiga_core::types::{ActionKind, ActionResult, ActionStatus};

/// Cap on any single embedded content block. Oversized file reads and build
/// logs are truncated with a marker rather than blowing the prompt budget.
const MAX_BLOCK_BYTES: usize = 8_000;

/// Render the whole result list.
pub fn render(results: &[ActionResult]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_result(&mut out, result);
    }
    out
}

fn render_result(out: &mut String, result: &ActionResult) {
    let status = match result.status {
        ActionStatus::Executed => "executed",
        ActionStatus::Error => "ERROR",
        ActionStatus::McpRequired => "mcp_required",
    };
    out.push_str(&format!("### {} — {status}\n", result.action_type));
    out.push_str(&result.message);
    out.push('\n');

    match result.status {
        ActionStatus::Executed => render_detail(out, result),
        ActionStatus::Error => {
            if let Some(tip) = tip_for(&result.message) {
                out.push_str(&format!("Tip: {tip}\n"));
            }
        }
        ActionStatus::McpRequired => {
            out.push_str("This action must be handled by the workflow service.\n");
        }
    }

    if result.metadata.get("timed_out").and_then(Value::as_bool) == Some(true) {
        out.push_str("Note: the invocation hit its timeout; consider a narrower command.\n");
    }
}

fn render_detail(out: &mut String, result: &ActionResult) {
    let meta = &result.metadata;
    match result.action_type {
        ActionKind::ReadFile | ActionKind::ReadCode => {
            if let Some(content) = meta.get("content").and_then(Value::as_str) {
                fenced(out, content);
            }
        }
        ActionKind::ReadTree => {
            if let Some(entries) = meta.get("entries").and_then(Value::as_array) {
                for entry in entries {
                    let kind = entry.get("type").and_then(Value::as_str).unwrap_or("file");
                    let path = entry.get("path").and_then(Value::as_str).unwrap_or("");
                    out.push_str(&format!("- [{kind}] {path}\n"));
                }
            }
        }
        ActionKind::SearchText => {
            if let Some(matches) = meta.get("matches").and_then(Value::as_array) {
                for m in matches {
                    let path = m.get("path").and_then(Value::as_str).unwrap_or("");
                    let line = m.get("line").and_then(Value::as_u64).unwrap_or(0);
                    let text = m.get("text").and_then(Value::as_str).unwrap_or("");
                    out.push_str(&format!("- {path}:{line}: {text}\n"));
                }
            }
        }
        ActionKind::RunCommand => {
            if let Some(stdout) = meta.get("stdout").and_then(Value::as_str) {
                if !stdout.is_empty() {
                    fenced(out, stdout);
                }
            }
            if let Some(stderr) = meta.get("stderr").and_then(Value::as_str) {
                if !stderr.is_empty() {
                    out.push_str("stderr:\n");
                    fenced(out, stderr);
                }
            }
        }
        ActionKind::BuildProject | ActionKind::RunTests => {
            if let Some(output) = meta.get("output").and_then(Value::as_str) {
                if !output.is_empty() {
                    fenced(out, output);
                }
            }
        }
        ActionKind::RunLinter => {
            if let Some(violations) = meta.get("violations").and_then(Value::as_array) {
                for v in violations {
                    let file = v.get("file").and_then(Value::as_str).unwrap_or("");
                    let line = v.get("line").and_then(Value::as_u64).unwrap_or(0);
                    let severity = v.get("severity").and_then(Value::as_str).unwrap_or("");
                    let message = v.get("message").and_then(Value::as_str).unwrap_or("");
                    out.push_str(&format!("- {file}:{line} [{severity}] {message}\n"));
                }
            }
        }
        ActionKind::GitDiff => {
            if let Some(diff) = meta.get("diff").and_then(Value::as_str) {
                if !diff.is_empty() {
                    fenced(out, diff);
                }
            }
        }
        ActionKind::GitLog | ActionKind::BeadCommits => {
            if let Some(commits) = meta.get("commits").and_then(Value::as_array) {
                for c in commits {
                    let oid = c.get("oid").and_then(Value::as_str).unwrap_or("");
                    let message = c.get("message").and_then(Value::as_str).unwrap_or("");
                    out.push_str(&format!("- {oid} {message}\n"));
                }
            }
        }
        ActionKind::FindReferences => {
            if let Some(references) = meta.get("references").and_then(Value::as_array) {
                for r in references {
                    let file = r.get("file").and_then(Value::as_str).unwrap_or("");
                    let line = r.get("line").and_then(Value::as_u64).unwrap_or(0);
                    out.push_str(&format!("- {file}:{line}\n"));
                }
            }
        }
        _ => {
            // Compact scalar echo for everything else (bead ids, branches,
            // message ids).
            for (key, value) in meta {
                match value {
                    Value::String(s) if s.len() <= 120 => {
                        out.push_str(&format!("- {key}: {s}\n"));
                    }
                    Value::Bool(b) => out.push_str(&format!("- {key}: {b}\n")),
                    Value::Number(n) => out.push_str(&format!("- {key}: {n}\n")),
                    _ => {}
                }
            }
        }
    }
}

fn fenced(out: &mut String, content: &str) {
    out.push_str("```\n");
    if content.len() > MAX_BLOCK_BYTES {
        let mut cut = MAX_BLOCK_BYTES;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push_str(&content[..cut]);
        out.push_str("\n… (truncated)");
    } else {
        out.push_str(content);
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n");
}

/// Remediation coaching for failure messages the loop recognizes.
fn tip_for(message: &str) -> Option<&'static str> {
    if message.starts_with("OLD text not found") {
        return Some("READ the file first to get the exact current text, then retry the edit.");
    }
    if message.contains("no such file or directory") {
        return Some("use SCOPE or TREE to inspect the project layout before reading.");
    }
    if message.contains("escapes project root") {
        return Some("use relative paths within the project root.");
    }
    if message.contains("git operations require project context") {
        return Some("this bead has no project bound; git actions are unavailable here.");
    }
    if message.contains("patch did not apply cleanly") {
        return Some("READ the file and regenerate the patch against its current content.");
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
